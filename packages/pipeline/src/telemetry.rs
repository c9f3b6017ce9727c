//! Optional usage telemetry.
//!
//! The pipeline reports a completed run to an injected collaborator; the
//! default does nothing, keeping telemetry entirely outside the core test
//! surface. Hosts that want a usage counter implement [`Telemetry`].

/// Receiver for run-completed notifications.
pub trait Telemetry: Send + Sync {
    /// Called once after a successful, non-cancelled run.
    fn record_run(&self);
}

/// The default: no telemetry at all.
pub struct NullTelemetry;

impl Telemetry for NullTelemetry {
    fn record_run(&self) {}
}
