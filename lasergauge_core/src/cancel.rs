use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{GaugeError, Result};

/// Cooperative cancellation flag, checked between protocol steps.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// `Err(Cancelled)` once `cancel` has been called.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            tracing::info!("cancellation requested");
            return Err(GaugeError::Cancelled.report());
        }
        Ok(())
    }
}
