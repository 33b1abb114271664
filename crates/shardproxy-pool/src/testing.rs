//! Mock session and connector shared by the unit tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::SessionError;
use crate::session::{Connector, DEFAULT_CHARSET, Session, Target};

/// Externally controllable state of one mock session.
#[derive(Debug, Default)]
pub(crate) struct Flags {
    pub in_tx: AtomicBool,
    pub protocol_error: AtomicBool,
    pub fail_rollback: AtomicBool,
    pub fail_ping: AtomicBool,
    pub closed: AtomicBool,
    /// Calls to `in_transaction`, i.e. how often sanitation looked at it.
    pub inspections: AtomicUsize,
    pub rollbacks: AtomicUsize,
}

#[derive(Debug)]
pub(crate) struct MockSession {
    id: u32,
    autocommit: bool,
    charset: String,
    flags: Arc<Flags>,
}

impl Session for MockSession {
    fn connection_id(&self) -> u32 {
        self.id
    }

    fn ping(&mut self) -> Result<(), SessionError> {
        if self.flags.fail_ping.load(Ordering::SeqCst) {
            return Err(SessionError::Other("ping failed".into()));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.flags.closed.store(true, Ordering::SeqCst);
    }

    fn in_transaction(&self) -> bool {
        self.flags.inspections.fetch_add(1, Ordering::SeqCst);
        self.flags.in_tx.load(Ordering::SeqCst)
    }

    fn rollback(&mut self) -> Result<(), SessionError> {
        self.flags.rollbacks.fetch_add(1, Ordering::SeqCst);
        if self.flags.fail_rollback.load(Ordering::SeqCst) {
            return Err(SessionError::Server {
                code: 2013,
                message: "lost connection during rollback".into(),
            });
        }
        self.flags.in_tx.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn autocommit(&self) -> bool {
        self.autocommit
    }

    fn set_autocommit(&mut self, on: bool) -> Result<(), SessionError> {
        self.autocommit = on;
        Ok(())
    }

    fn charset(&self) -> &str {
        &self.charset
    }

    fn set_charset(&mut self, charset: &str) -> Result<(), SessionError> {
        self.charset = charset.to_string();
        Ok(())
    }

    fn has_protocol_error(&self) -> bool {
        self.flags.protocol_error.load(Ordering::SeqCst)
    }
}

/// Connector handing out [`MockSession`]s with sequential connection ids.
pub(crate) struct MockConnector {
    next_id: AtomicU32,
    connects: AtomicUsize,
    /// Connect attempts at or beyond this count fail.
    fail_after: AtomicUsize,
    /// Simulated connect latency in milliseconds.
    delay_ms: AtomicU64,
    panicking: AtomicBool,
    sessions: Mutex<HashMap<u32, Arc<Flags>>>,
}

impl MockConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicU32::new(1),
            connects: AtomicUsize::new(0),
            fail_after: AtomicUsize::new(usize::MAX),
            delay_ms: AtomicU64::new(0),
            panicking: AtomicBool::new(false),
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Successful connects so far.
    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_after(&self, attempts: usize) {
        self.fail_after.store(attempts, Ordering::SeqCst);
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        let limit = if failing { 0 } else { usize::MAX };
        self.fail_after.store(limit, Ordering::SeqCst);
    }

    pub(crate) fn set_connect_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub(crate) fn set_panicking(&self, panicking: bool) {
        self.panicking.store(panicking, Ordering::SeqCst);
    }

    pub(crate) fn flags(&self, id: u32) -> Arc<Flags> {
        Arc::clone(&self.sessions.lock()[&id])
    }

    pub(crate) fn closed_count(&self) -> usize {
        self.sessions
            .lock()
            .values()
            .filter(|f| f.closed.load(Ordering::SeqCst))
            .count()
    }
}

impl Connector for MockConnector {
    fn connect(&self, _target: &Target) -> Result<Box<dyn Session>, SessionError> {
        if self.panicking.load(Ordering::SeqCst) {
            panic!("connector panicked");
        }
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.connects.load(Ordering::SeqCst) >= self.fail_after.load(Ordering::SeqCst) {
            return Err(SessionError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }
        self.connects.fetch_add(1, Ordering::SeqCst);

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let flags = Arc::new(Flags::default());
        self.sessions.lock().insert(id, Arc::clone(&flags));

        Ok(Box::new(MockSession {
            id,
            autocommit: true,
            charset: DEFAULT_CHARSET.to_string(),
            flags,
        }))
    }
}
