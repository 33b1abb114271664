//! shardproxy-pool: backend session pool for the ShardProxy database proxy.
//!
//! Each backend gets one bounded [`Pool`]. The proxy borrows a session with
//! [`Pool::acquire`], runs its statements, and hands the session back by
//! closing (or dropping) the [`BorrowedSession`].
//!
//! # Architecture
//!
//! ```text
//! Pool::acquire()
//!   ├── ready queue non-empty → pop, sanitize → BorrowedSession
//!   └── otherwise wait on both queues
//!       ├── reserved slot → Connector::connect() → BorrowedSession
//!       └── ready session released meanwhile → sanitize → BorrowedSession
//!
//! BorrowedSession::close()
//!   ├── protocol error → close session, slot back to reserved
//!   └── clean          → push to ready (discard if full)
//! ```
//!
//! Sanitizing a reused session rolls back any open transaction, re-enables
//! autocommit, and restores the pool's charset, so no per-session state
//! leaks between borrowers.
//!
//! The wire protocol lives behind the [`Session`] and [`Connector`] traits.
//! A [`HealthMonitor`] can be started per pool to keep its [`HealthState`]
//! current.

pub mod config;
pub mod error;
pub mod handle;
pub mod monitor;
pub mod pool;
pub mod session;
pub mod state;

mod slots;

#[cfg(test)]
mod testing;

pub use config::{HealthCheckConfig, PoolConfig};
pub use error::{PoolError, PoolResult, SessionError};
pub use handle::BorrowedSession;
pub use monitor::{HealthMonitor, HealthTracker, ProbeResult};
pub use pool::{DEFAULT_INIT_CONNECTIONS, DEFAULT_MAX_CONNECTIONS, Pool, clamp_capacity};
pub use session::{Connector, DEFAULT_CHARSET, Session, Target};
pub use state::HealthState;
