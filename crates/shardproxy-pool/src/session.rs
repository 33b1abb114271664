//! Backend session capability consumed by the pool.
//!
//! The pool never speaks the backend wire protocol itself. A [`Connector`]
//! establishes authenticated sessions for a [`Target`], and each
//! [`Session`] exposes just enough state for the pool to decide whether it
//! can be handed to the next borrower.

use std::fmt;

use crate::error::SessionError;

/// Charset every reused session is reset to unless configured otherwise.
pub const DEFAULT_CHARSET: &str = "utf8";

/// Where and as whom the pool connects.
#[derive(Clone, PartialEq, Eq)]
pub struct Target {
    pub addr: String,
    pub user: String,
    pub password: String,
    pub db: String,
}

impl Target {
    pub fn new(addr: &str, user: &str, password: &str, db: &str) -> Self {
        Self {
            addr: addr.to_string(),
            user: user.to_string(),
            password: password.to_string(),
            db: db.to_string(),
        }
    }
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("addr", &self.addr)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("db", &self.db)
            .finish()
    }
}

/// A live, authenticated backend session.
///
/// Methods may perform backend round-trips and block the calling thread.
pub trait Session: Send + fmt::Debug {
    /// Backend-assigned identifier of this session, used in logs.
    fn connection_id(&self) -> u32;

    /// Lightweight liveness probe.
    fn ping(&mut self) -> Result<(), SessionError>;

    /// Close the underlying transport. Must be safe to call more than once.
    fn close(&mut self);

    /// Whether a transaction is currently open on this session.
    fn in_transaction(&self) -> bool;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> Result<(), SessionError>;

    /// Whether autocommit is enabled.
    fn autocommit(&self) -> bool;

    fn set_autocommit(&mut self, on: bool) -> Result<(), SessionError>;

    /// Charset currently negotiated for this session.
    fn charset(&self) -> &str;

    fn set_charset(&mut self, charset: &str) -> Result<(), SessionError>;

    /// Set when the borrower's last operation hit a protocol-level error.
    ///
    /// Read by [`BorrowedSession::close`](crate::BorrowedSession::close) to
    /// decide whether the session may be recycled.
    fn has_protocol_error(&self) -> bool;
}

/// Factory for new sessions, injected into the pool.
pub trait Connector: Send + Sync {
    /// Establish and authenticate a fresh session against `target`.
    fn connect(&self, target: &Target) -> Result<Box<dyn Session>, SessionError>;
}

/// Reset a reused session to a clean state before handing it out.
///
/// Transaction state is cleared first, then autocommit, then charset. A
/// session already in a clean state sees no mutating calls.
pub(crate) fn sanitize(session: &mut dyn Session, charset: &str) -> Result<(), SessionError> {
    if session.in_transaction() {
        session.rollback()?;
    }

    if !session.autocommit() {
        session.set_autocommit(true)?;
    }

    if session.charset() != charset {
        session.set_charset(charset)?;
    }

    Ok(())
}
