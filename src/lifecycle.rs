//! Worker lifecycle states and the registration seam.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Lifecycle state of the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Built but not yet installed.
    Parsed,
    Installing,
    /// Installed and waiting to activate.
    Installed,
    Activating,
    /// Active and handling fetch events.
    Activated,
    /// Discarded after a failed install or replacement.
    Redundant,
}

impl WorkerState {
    /// Returns whether moving from `self` to `next` is allowed.
    ///
    /// `Activating -> Installed` is allowed so a failed activation can be retried.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Parsed, Self::Installing)
                | (Self::Installing, Self::Installed | Self::Redundant)
                | (Self::Installed, Self::Activating | Self::Redundant)
                | (Self::Activating, Self::Activated | Self::Installed)
                | (Self::Activated, Self::Redundant)
        )
    }

    /// Returns true once the worker controls fetches.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Activated)
    }
}

/// Abstraction over the worker's registration.
#[async_trait]
pub trait Registration: Send + Sync {
    /// Asks the platform to activate this worker without waiting for the
    /// previous one's clients to close.
    async fn skip_waiting(&self) -> Result<()>;
}

/// In-memory registration that remembers whether skip-waiting was requested.
#[derive(Debug, Default)]
pub struct MemoryRegistration {
    skip_waiting: AtomicBool,
}

impl MemoryRegistration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once skip-waiting has been requested.
    #[must_use]
    pub fn skipped_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Registration for MemoryRegistration {
    async fn skip_waiting(&self) -> Result<()> {
        self.skip_waiting.store(true, Ordering::Relaxed);
        Ok(())
    }
}
