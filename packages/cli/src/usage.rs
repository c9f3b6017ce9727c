//! File-backed usage counter.
//!
//! Implements the pipeline's [`Telemetry`] hook with a plain counter file
//! in the output directory. Failures are logged and swallowed; telemetry
//! must never affect a run's outcome.

use std::path::PathBuf;

use cn_generator_pipeline::telemetry::Telemetry;

/// Counts completed runs in a small state file.
pub struct UsageCounter {
    path: PathBuf,
}

impl UsageCounter {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl Telemetry for UsageCounter {
    fn record_run(&self) {
        let count = std::fs::read_to_string(&self.path)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(0)
            + 1;

        if let Err(e) = std::fs::write(&self.path, count.to_string()) {
            log::debug!("could not update usage counter: {e}");
            return;
        }

        if count.is_multiple_of(25) {
            log::info!("This tool has completed {count} runs on this machine.");
        }
    }
}
