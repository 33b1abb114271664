//! Supervising health-check loop.
//!
//! The pool never labels itself. A [`HealthMonitor`] runs in the
//! background, pings the backend over the pool's dedicated health-check
//! session every interval, and writes the resulting [`HealthState`] back
//! to the pool. A single successful probe marks the backend up; it is
//! marked down after `down_after` consecutive failures.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::HealthCheckConfig;
use crate::pool::Pool;
use crate::state::HealthState;

/// Result of a single health probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeResult {
    Healthy,
    Failed,
}

/// Tracks consecutive probe results for one backend.
#[derive(Debug)]
pub struct HealthTracker {
    status: HealthState,
    consecutive_failures: u32,
    down_after: u32,
}

impl HealthTracker {
    pub fn new(down_after: u32) -> Self {
        Self {
            status: HealthState::Unknown,
            consecutive_failures: 0,
            down_after: down_after.max(1),
        }
    }

    /// Record a probe result and return the new health state.
    pub fn record(&mut self, result: ProbeResult) -> HealthState {
        match result {
            ProbeResult::Healthy => {
                self.consecutive_failures = 0;
                self.status = HealthState::Up;
            }
            ProbeResult::Failed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.down_after {
                    self.status = HealthState::Down;
                }
            }
        }
        self.status
    }

    pub fn status(&self) -> HealthState {
        self.status
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }
}

/// Background health checker for one pool.
pub struct HealthMonitor {
    handle: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl HealthMonitor {
    /// Spawn the health loop for `pool` on the current tokio runtime.
    pub fn start(pool: Pool, config: &HealthCheckConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let interval = config.interval();
        let down_after = config.down_after;

        info!(addr = %pool.addr(), ?interval, down_after, "health monitor started");

        let handle = tokio::spawn(async move {
            run_health_loop(pool, interval, down_after, shutdown_rx).await;
        });

        Self {
            handle,
            shutdown_tx,
        }
    }

    /// Signal the loop to stop and wait for it to exit.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(e) = self.handle.await {
            error!(error = %e, "health monitor task failed");
        }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

async fn run_health_loop(
    pool: Pool,
    interval: Duration,
    down_after: u32,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut tracker = HealthTracker::new(down_after);

    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = shutdown.changed() => {
                debug!(addr = %pool.addr(), "health loop shutting down");
                break;
            }
        }

        if pool.is_closed() {
            debug!(addr = %pool.addr(), "pool closed, health loop exiting");
            break;
        }

        let result = probe(&pool).await;
        let status = tracker.record(result);
        let previous = pool.set_state(status);

        if status != previous {
            match status {
                HealthState::Down => warn!(
                    addr = %pool.addr(),
                    failures = tracker.consecutive_failures(),
                    "backend marked down"
                ),
                _ => info!(addr = %pool.addr(), %previous, %status, "backend health changed"),
            }
        }
    }
}

/// Ping on a blocking thread; the health-check session does backend I/O.
async fn probe(pool: &Pool) -> ProbeResult {
    let pool = pool.clone();
    match tokio::task::spawn_blocking(move || pool.health_check()).await {
        Ok(Ok(())) => ProbeResult::Healthy,
        Ok(Err(e)) => {
            debug!(error = %e, "health probe failed");
            ProbeResult::Failed
        }
        Err(e) => {
            error!(error = %e, "health probe task failed");
            ProbeResult::Failed
        }
    }
}
