//! Backend session pool.
//!
//! Capacity is fixed at open time and split between two bounded queues:
//!
//! ```text
//! ready     live idle sessions, sanitized before each reuse
//! reserved  placeholders for capacity not currently realized as a session
//! ```
//!
//! Every slot is always in exactly one of ready, reserved, or borrowed.
//! Acquire takes a ready session if one is queued, otherwise it waits on
//! both queues at once: a reserved slot is promoted by connecting a fresh
//! session, while a ready session released by another borrower in the
//! meantime is taken directly. Releasing a tainted session closes it and
//! turns its slot back into a reservation.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::PoolConfig;
use crate::error::{PoolError, PoolResult, SessionError};
use crate::handle::BorrowedSession;
use crate::session::{Connector, Session, Target, sanitize};
use crate::slots::SlotQueue;
use crate::state::{AtomicHealthState, HealthState};

/// Capacity used when the configured maximum is zero.
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Sessions established up front when the default capacity is used.
pub const DEFAULT_INIT_CONNECTIONS: usize = 16;

/// Below this capacity every slot is pre-warmed.
const PREWARM_ALL_BELOW: usize = 16;

/// Resolve `(max_connections, initial_connections)` from a configured maximum.
pub fn clamp_capacity(max_connections: usize) -> (usize, usize) {
    if max_connections == 0 {
        return (DEFAULT_MAX_CONNECTIONS, DEFAULT_INIT_CONNECTIONS);
    }
    if max_connections < PREWARM_ALL_BELOW {
        (max_connections, max_connections)
    } else {
        (max_connections, max_connections / 4)
    }
}

/// Capacity that is accounted for but not connected.
#[derive(Debug)]
struct Reserved;

struct Slots {
    ready: SlotQueue<Box<dyn Session>>,
    reserved: SlotQueue<Reserved>,
}

impl Slots {
    fn new(capacity: usize) -> Self {
        Self {
            ready: SlotQueue::new(capacity),
            reserved: SlotQueue::new(capacity),
        }
    }

    /// Close `session` and give its slot back as a reservation.
    fn discard(&self, mut session: Box<dyn Session>) {
        session.close();
        // Reserved holds max_connections entries, so this only fails once closed.
        let _ = self.reserved.try_push(Reserved);
    }

    fn close_ready(&self) -> usize {
        let mut closed = 0;
        while let Some(mut session) = self.ready.try_pop() {
            session.close();
            closed += 1;
        }
        closed
    }
}

pub(crate) struct PoolInner {
    target: Target,
    charset: String,
    max_connections: usize,
    initial_connections: usize,
    state: AtomicHealthState,
    /// `None` once the pool has been shut down.
    slots: RwLock<Option<Arc<Slots>>>,
    check_session: Mutex<Option<Box<dyn Session>>>,
    connector: Arc<dyn Connector>,
}

impl PoolInner {
    fn slots(&self) -> Option<Arc<Slots>> {
        self.slots.read().clone()
    }

    fn connect(&self) -> Result<Box<dyn Session>, SessionError> {
        self.connector.connect(&self.target)
    }

    /// Turn a reserved slot into a live session, or put it back on failure.
    fn promote(&self, reserved: Reserved) -> PoolResult<Box<dyn Session>> {
        match self.connect() {
            Ok(session) => {
                debug!(
                    addr = %self.target.addr,
                    conn_id = session.connection_id(),
                    "promoted reserved slot to new session"
                );
                Ok(session)
            }
            Err(e) => {
                warn!(addr = %self.target.addr, error = %e, "failed to connect reserved slot");
                if let Some(slots) = self.slots.read().as_ref() {
                    let _ = slots.reserved.try_push(reserved);
                }
                Err(PoolError::Connect(e))
            }
        }
    }

    /// Sanitize a reused session, discarding it on failure.
    fn reset(&self, mut session: Box<dyn Session>) -> PoolResult<Box<dyn Session>> {
        match sanitize(&mut *session, &self.charset) {
            Ok(()) => Ok(session),
            Err(e) => {
                warn!(
                    addr = %self.target.addr,
                    conn_id = session.connection_id(),
                    error = %e,
                    "failed to reset reused session"
                );
                self.release(session, true);
                Err(PoolError::Sanitation(e))
            }
        }
    }

    /// Run backend work for one slot on the blocking pool.
    ///
    /// A session produced after the caller stopped waiting is released back
    /// to the pool. If the work dies without reporting, its slot goes back
    /// to reserved.
    async fn off_runtime<F>(
        self: &Arc<Self>,
        slots: &Slots,
        work: F,
    ) -> PoolResult<Box<dyn Session>>
    where
        F: FnOnce(&PoolInner) -> PoolResult<Box<dyn Session>> + Send + 'static,
    {
        let inner = Arc::clone(self);
        let (tx, rx) = oneshot::channel();
        tokio::task::spawn_blocking(move || {
            if let Err(Ok(session)) = tx.send(work(&inner)) {
                debug!(
                    addr = %inner.target.addr,
                    conn_id = session.connection_id(),
                    "acquire abandoned, returning session to pool"
                );
                inner.release(session, false);
            }
        });

        match rx.await {
            Ok(result) => result,
            Err(_) => {
                error!(addr = %self.target.addr, "backend task exited without a session");
                let _ = slots.reserved.try_push(Reserved);
                Err(PoolError::NilSession)
            }
        }
    }

    /// Return a borrowed session to the pool.
    ///
    /// Holds the read guard for the push so nothing lands in a queue that
    /// `shutdown` has already drained.
    pub(crate) fn release(&self, mut session: Box<dyn Session>, had_error: bool) {
        let guard = self.slots.read();
        let Some(slots) = guard.as_ref() else {
            session.close();
            return;
        };

        if had_error {
            debug!(
                addr = %self.target.addr,
                conn_id = session.connection_id(),
                "discarding broken session"
            );
            slots.discard(session);
            return;
        }

        if let Err(session) = slots.ready.try_push(session) {
            debug!(
                addr = %self.target.addr,
                conn_id = session.connection_id(),
                "ready queue full, discarding released session"
            );
            slots.discard(session);
        }
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        if let Some(slots) = self.slots.get_mut().take() {
            slots.ready.close();
            slots.reserved.close();
            slots.close_ready();
        }
        if let Some(mut session) = self.check_session.get_mut().take() {
            session.close();
        }
    }
}

/// Bounded pool of sessions to one backend.
///
/// Cheap to clone; clones share the same sessions.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Open a pool and pre-warm its initial sessions.
    ///
    /// The health-check session is established first so an unreachable
    /// backend fails here rather than producing a pool that looks healthy.
    pub fn open(config: &PoolConfig, connector: Arc<dyn Connector>) -> PoolResult<Self> {
        let (max_connections, initial_connections) = clamp_capacity(config.max_connections);
        let target = config.target();

        let mut check_session = connector.connect(&target).map_err(|e| {
            warn!(addr = %target.addr, error = %e, "backend unreachable, pool not opened");
            PoolError::Init(e)
        })?;

        let mut sessions: Vec<Box<dyn Session>> = Vec::with_capacity(initial_connections);
        for _ in 0..initial_connections {
            match connector.connect(&target) {
                Ok(session) => sessions.push(session),
                Err(e) => {
                    warn!(
                        addr = %target.addr,
                        established = sessions.len(),
                        wanted = initial_connections,
                        error = %e,
                        "failed to pre-warm pool"
                    );
                    for session in sessions.iter_mut() {
                        session.close();
                    }
                    check_session.close();
                    return Err(PoolError::Init(e));
                }
            }
        }

        let slots = Slots::new(max_connections);
        for session in sessions {
            if let Err(mut session) = slots.ready.try_push(session) {
                session.close();
            }
        }
        for _ in initial_connections..max_connections {
            let _ = slots.reserved.try_push(Reserved);
        }

        info!(
            addr = %target.addr,
            db = %target.db,
            max_connections,
            initial_connections,
            "connection pool opened"
        );

        Ok(Self {
            inner: Arc::new(PoolInner {
                target,
                charset: config.charset.clone(),
                max_connections,
                initial_connections,
                state: AtomicHealthState::new(HealthState::Unknown),
                slots: RwLock::new(Some(Arc::new(slots))),
                check_session: Mutex::new(Some(check_session)),
                connector,
            }),
        })
    }

    /// Borrow a session.
    ///
    /// Waits without limit while every slot is borrowed; wrap in
    /// `tokio::time::timeout` to bound the wait. Connecting and resetting
    /// sessions run on the blocking pool, so a slow backend never stalls
    /// the runtime.
    pub async fn acquire(&self) -> PoolResult<BorrowedSession> {
        let slots = self.inner.slots().ok_or(PoolError::Closed)?;

        let session = match slots.ready.try_pop() {
            Some(session) => session,
            None => {
                tokio::select! {
                    biased;
                    session = slots.ready.pop() => session.ok_or(PoolError::Closed)?,
                    reserved = slots.reserved.pop() => {
                        let reserved = reserved.ok_or(PoolError::Closed)?;
                        let session = self
                            .inner
                            .off_runtime(&slots, move |inner| inner.promote(reserved))
                            .await?;
                        return Ok(self.borrow(session));
                    }
                }
            }
        };

        let session = self
            .inner
            .off_runtime(&slots, move |inner| inner.reset(session))
            .await?;
        Ok(self.borrow(session))
    }

    fn borrow(&self, session: Box<dyn Session>) -> BorrowedSession {
        BorrowedSession::new(session, Arc::downgrade(&self.inner))
    }

    /// Ping the backend over the dedicated health-check session.
    ///
    /// The session is created on first use and discarded when a ping fails.
    /// Once the pool is shut down no new session is created.
    pub fn health_check(&self) -> Result<(), SessionError> {
        let mut slot = self.inner.check_session.lock();
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let mut session = match slot.take() {
            Some(session) => session,
            None => self.inner.connect()?,
        };

        match session.ping() {
            Ok(()) => {
                *slot = Some(session);
                Ok(())
            }
            Err(e) => {
                session.close();
                Err(e)
            }
        }
    }

    /// Close the pool. Idle sessions are closed; borrowed ones are closed on release.
    pub fn shutdown(&self) -> PoolResult<()> {
        let Some(slots) = self.inner.slots.write().take() else {
            return Ok(());
        };

        slots.ready.close();
        slots.reserved.close();
        let closed = slots.close_ready();

        if let Some(mut session) = self.inner.check_session.lock().take() {
            session.close();
        }

        info!(addr = %self.inner.target.addr, closed, "connection pool shut down");
        Ok(())
    }

    pub fn addr(&self) -> &str {
        &self.inner.target.addr
    }

    pub fn state(&self) -> HealthState {
        self.inner.state.load()
    }

    /// Record the backend's health, returning the previous label.
    pub fn set_state(&self, state: HealthState) -> HealthState {
        self.inner.state.swap(state)
    }

    /// Number of idle ready sessions. A snapshot; may be stale under concurrency.
    pub fn idle_count(&self) -> usize {
        self.inner
            .slots
            .read()
            .as_ref()
            .map_or(0, |slots| slots.ready.len())
    }

    /// Number of unconnected reserved slots. A snapshot, like [`idle_count`](Self::idle_count).
    pub fn reserved_count(&self) -> usize {
        self.inner
            .slots
            .read()
            .as_ref()
            .map_or(0, |slots| slots.reserved.len())
    }

    pub fn max_connections(&self) -> usize {
        self.inner.max_connections
    }

    pub fn initial_connections(&self) -> usize {
        self.inner.initial_connections
    }

    pub fn is_closed(&self) -> bool {
        self.inner.slots.read().is_none()
    }
}

impl fmt::Debug for Pool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("addr", &self.inner.target.addr)
            .field("max_connections", &self.inner.max_connections)
            .field("state", &self.state())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
