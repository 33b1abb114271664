//! Error types for the backend session pool.

use thiserror::Error;

/// Result type alias for pool operations.
pub type PoolResult<T> = Result<T, PoolError>;

/// Errors reported by a [`Session`](crate::Session) or
/// [`Connector`](crate::Connector) implementation.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("server error {code}: {message}")]
    Server { code: u16, message: String },

    #[error("session is closed")]
    Closed,

    #[error("{0}")]
    Other(String),
}

/// Errors returned by [`Pool`](crate::Pool) operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// The pool has been shut down.
    #[error("connection pool is closed")]
    Closed,

    /// Pre-warming sessions during `open` failed.
    #[error("failed to initialize connection pool: {0}")]
    Init(#[source] SessionError),

    /// A reserved slot could not be promoted to a live session.
    #[error("failed to connect to backend: {0}")]
    Connect(#[source] SessionError),

    /// The task connecting or resetting a session exited without one.
    #[error("pool slot yielded no session")]
    NilSession,

    /// Resetting a reused session to a clean state failed.
    #[error("failed to reset reused session: {0}")]
    Sanitation(#[source] SessionError),
}
