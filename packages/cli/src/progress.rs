//! `indicatif`-backed progress feedback.
//!
//! Wraps [`indicatif::ProgressBar`] behind the pipeline's
//! [`ProgressFeedback`] trait so step reporting stays decoupled from the
//! rendering backend. Cancellation is a shared atomic flag flipped by the
//! Ctrl-C handler and polled by the pipeline at step boundaries.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use cn_generator_pipeline::progress::ProgressFeedback;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// An `indicatif` [`ProgressBar`] that implements [`ProgressFeedback`].
pub struct IndicatifFeedback {
    bar: ProgressBar,
    cancelled: Arc<AtomicBool>,
}

impl IndicatifFeedback {
    /// Creates a step bar registered on `multi`, sharing the `cancelled`
    /// flag with whoever flips it (the Ctrl-C handler).
    #[must_use]
    pub fn new(multi: &MultiProgress, cancelled: Arc<AtomicBool>) -> Self {
        let bar = multi.add(ProgressBar::no_length());
        bar.set_style(
            ProgressStyle::with_template(
                "{msg} {wide_bar:.green/dim} {pos}/{len} [{elapsed_precise}]",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
        );
        bar.set_message("Curve number pipeline");
        Self { bar, cancelled }
    }

    /// Finishes the bar with a closing message.
    pub fn finish(&self, msg: &str) {
        self.bar.finish_with_message(msg.to_string());
    }
}

impl ProgressFeedback for IndicatifFeedback {
    fn set_total_steps(&self, total: u32) {
        self.bar.set_length(u64::from(total));
        self.bar.set_position(0);
    }

    fn set_current_step(&self, step: u32) {
        self.bar.set_position(u64::from(step));
    }

    fn push_warning(&self, message: &str) {
        log::warn!("{message}");
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
