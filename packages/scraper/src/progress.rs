//! Progress reporting for collection runs.
//!
//! The orchestrator reports one tick per unit through [`ProgressCallback`];
//! the CLI renders it with `indicatif`, tests and library callers use
//! [`NullProgress`].

use std::sync::Arc;

/// Receives per-unit progress from a collection run.
pub trait ProgressCallback: Send + Sync {
    /// Total units the run will visit.
    fn set_total(&self, total: u64);

    /// Advance by `delta` units.
    fn inc(&self, delta: u64);

    /// Update the message shown alongside the indicator.
    fn set_message(&self, msg: String);

    /// Mark the run as complete with a final message.
    fn finish(&self, msg: String);
}

/// Ignores all progress updates.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
