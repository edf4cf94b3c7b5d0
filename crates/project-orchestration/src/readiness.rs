//! Readiness gate consumed by health-check infrastructure.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Name reported by the projects health check
pub const HEALTH_CHECK_NAME: &str = "Projects";

/// One-way readiness flag
///
/// Starts `false` and is flipped to `true` once bootstrap has completed.
/// There is no way to flip it back: a process restart is the only reset.
#[derive(Debug, Clone, Default)]
pub struct Readiness {
    ready: Arc<AtomicBool>,
}

impl Readiness {
    /// Create a gate in the not-ready state
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of the gate
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Flip the gate to ready; returns `true` if this call flipped it
    pub(crate) fn mark_ready(&self) -> bool {
        !self.ready.swap(true, Ordering::AcqRel)
    }

    /// Health check view of the gate
    pub fn report(&self) -> HealthReport {
        HealthReport {
            name: HEALTH_CHECK_NAME.to_string(),
            up: self.is_ready(),
        }
    }
}

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthReport {
    /// Check name
    pub name: String,
    /// Whether the check passes
    pub up: bool,
}
