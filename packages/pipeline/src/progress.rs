//! Progress and cancellation contract for pipeline runs.
//!
//! The host supplies one [`ProgressFeedback`] per run. The orchestrator
//! declares the worst-case step total up front, advances the current step
//! in strict increasing order as work actually happens, and polls
//! [`ProgressFeedback::is_cancelled`] at every step boundary. Warnings
//! (fallback engaged, lookup misses) flow through the same sink.

use std::sync::Arc;

/// Trait for step-level progress reporting and cooperative cancellation.
///
/// Implementations must be `Send + Sync` so a single sink can be shared
/// with the Ctrl-C handler that flips the cancellation flag.
pub trait ProgressFeedback: Send + Sync {
    /// Declares the worst-case number of steps for this run.
    fn set_total_steps(&self, total: u32);

    /// Reports that step `step` has completed. Strictly increasing.
    fn set_current_step(&self, step: u32);

    /// Surfaces a non-fatal condition to the user.
    fn push_warning(&self, message: &str);

    /// Polled at every step boundary; `true` stops the run cleanly.
    fn is_cancelled(&self) -> bool;
}

/// A no-op implementation of [`ProgressFeedback`] that never cancels.
///
/// Useful for headless callers and tests that do not observe progress.
pub struct NullFeedback;

impl ProgressFeedback for NullFeedback {
    fn set_total_steps(&self, _total: u32) {}
    fn set_current_step(&self, _step: u32) {}
    fn push_warning(&self, message: &str) {
        log::warn!("{message}");
    }
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Returns a shared [`NullFeedback`] instance for convenient use.
#[must_use]
pub fn null_feedback() -> Arc<dyn ProgressFeedback> {
    Arc::new(NullFeedback)
}

/// Tracks the monotonically increasing step counter for one run.
pub(crate) struct StepTracker<'a> {
    current: u32,
    feedback: &'a dyn ProgressFeedback,
}

impl<'a> StepTracker<'a> {
    pub(crate) const fn new(feedback: &'a dyn ProgressFeedback) -> Self {
        Self {
            current: 0,
            feedback,
        }
    }

    /// Advances one step and reports it. Returns `false` when the host
    /// has requested cancellation; the caller must stop immediately.
    pub(crate) fn advance(&mut self) -> bool {
        self.current += 1;
        self.feedback.set_current_step(self.current);
        !self.feedback.is_cancelled()
    }

    pub(crate) const fn completed(&self) -> u32 {
        self.current
    }
}
