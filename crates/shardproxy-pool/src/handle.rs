//! Borrowed session handle.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Weak;

use crate::pool::PoolInner;
use crate::session::Session;

/// A session borrowed from a [`Pool`](crate::Pool).
///
/// Derefs to the wrapped [`Session`]. Give it back with
/// [`close`](Self::close); dropping the handle does the same. A session
/// whose protocol-error marker is set at release time is closed instead of
/// recycled.
pub struct BorrowedSession {
    session: Option<Box<dyn Session>>,
    pool: Weak<PoolInner>,
}

impl BorrowedSession {
    pub(crate) fn new(session: Box<dyn Session>, pool: Weak<PoolInner>) -> Self {
        Self {
            session: Some(session),
            pool,
        }
    }

    /// Return the session to its pool.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let had_error = session.has_protocol_error();
        match self.pool.upgrade() {
            Some(pool) => pool.release(session, had_error),
            None => session.close(),
        }
    }
}

impl Deref for BorrowedSession {
    type Target = dyn Session;

    fn deref(&self) -> &Self::Target {
        self.session.as_deref().expect("session taken")
    }
}

impl DerefMut for BorrowedSession {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.session.as_deref_mut().expect("session taken")
    }
}

impl Drop for BorrowedSession {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for BorrowedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BorrowedSession")
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}
