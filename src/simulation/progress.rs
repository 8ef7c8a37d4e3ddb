//! Progress reporting for long simulations.
//!
//! Reporting is a cooperative callback on the simulating thread; observers
//! must return quickly.

use serde::{Deserialize, Serialize};

/// Snapshot passed to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationProgress {
    /// Runs finished.
    pub completed: usize,
    /// Runs requested.
    pub total: usize,
}

impl SimulationProgress {
    /// Completed fraction in `[0, 1]`.
    #[must_use]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }

    /// Whether every run has finished.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}

/// Receives progress reports.
pub trait ProgressObserver {
    /// Called every `progress_interval` runs and once at the end.
    fn on_progress(&mut self, progress: SimulationProgress);
}

impl<F: FnMut(SimulationProgress)> ProgressObserver for F {
    fn on_progress(&mut self, progress: SimulationProgress) {
        self(progress);
    }
}

/// Observer that emits `tracing` debug events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn on_progress(&mut self, progress: SimulationProgress) {
        tracing::debug!(
            completed = progress.completed,
            total = progress.total,
            "simulation progress"
        );
    }
}
