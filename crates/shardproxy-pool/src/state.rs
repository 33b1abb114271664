//! Tri-state backend health label.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Health of a backend as last reported by its supervising health check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum HealthState {
    Up,
    Down,
    /// No health check has completed yet.
    #[default]
    Unknown,
}

impl HealthState {
    fn as_u8(self) -> u8 {
        match self {
            HealthState::Up => 0,
            HealthState::Down => 1,
            HealthState::Unknown => 2,
        }
    }

    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => HealthState::Up,
            1 => HealthState::Down,
            _ => HealthState::Unknown,
        }
    }
}

impl fmt::Display for HealthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HealthState::Up => write!(f, "up"),
            HealthState::Down => write!(f, "down"),
            HealthState::Unknown => write!(f, "unknown"),
        }
    }
}

/// [`HealthState`] cell read and written only through atomic operations.
#[derive(Debug)]
pub(crate) struct AtomicHealthState(AtomicU8);

impl AtomicHealthState {
    pub(crate) fn new(state: HealthState) -> Self {
        Self(AtomicU8::new(state.as_u8()))
    }

    pub(crate) fn load(&self) -> HealthState {
        HealthState::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Store `state`, returning the previous value.
    pub(crate) fn swap(&self, state: HealthState) -> HealthState {
        HealthState::from_u8(self.0.swap(state.as_u8(), Ordering::AcqRel))
    }
}
