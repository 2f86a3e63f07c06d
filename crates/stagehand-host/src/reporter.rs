//! Structured reporting for worker lifecycle events.

use std::path::Path;
use std::sync::Arc;

use crate::error::HostError;
use crate::process::{ShutdownOutcome, ShutdownStage};

/// Log target for lifecycle events.
pub(crate) const LIFECYCLE_TARGET: &str = "stagehand_host::lifecycle";

/// Which worker stream a diagnostic line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    /// The worker's stdout, shared with protocol responses.
    Stdout,
    /// The worker's stderr.
    Stderr,
}

impl OutputStream {
    /// Lowercase stream name used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stdout => "stdout",
            Self::Stderr => "stderr",
        }
    }
}

/// Observer trait used to surface worker lifecycle events to telemetry sinks.
pub trait HostReporter: Send + Sync {
    /// Invoked before the worker process is spawned.
    fn worker_starting(&self, command: &Path);

    /// Invoked once the worker survived its settle delay.
    fn worker_ready(&self, pid: u32);

    /// Invoked when the worker could not be started.
    fn worker_failed(&self, error: &HostError);

    /// Invoked for each line of non-protocol worker output.
    fn worker_output(&self, stream: OutputStream, line: &str);

    /// Invoked when shutdown moves past the cooperative stage.
    fn shutdown_escalated(&self, stage: ShutdownStage);

    /// Invoked once the worker has been stopped.
    fn worker_stopped(&self, outcome: ShutdownOutcome);
}

impl<T> HostReporter for Arc<T>
where
    T: HostReporter + ?Sized,
{
    fn worker_starting(&self, command: &Path) {
        (**self).worker_starting(command);
    }

    fn worker_ready(&self, pid: u32) {
        (**self).worker_ready(pid);
    }

    fn worker_failed(&self, error: &HostError) {
        (**self).worker_failed(error);
    }

    fn worker_output(&self, stream: OutputStream, line: &str) {
        (**self).worker_output(stream, line);
    }

    fn shutdown_escalated(&self, stage: ShutdownStage) {
        (**self).shutdown_escalated(stage);
    }

    fn worker_stopped(&self, outcome: ShutdownOutcome) {
        (**self).worker_stopped(outcome);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredHostReporter;

impl StructuredHostReporter {
    /// Builds a new reporter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl HostReporter for StructuredHostReporter {
    fn worker_starting(&self, command: &Path) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "worker_starting",
            command = %command.display(),
            "starting worker process"
        );
    }

    fn worker_ready(&self, pid: u32) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "worker_ready",
            pid,
            "worker process ready"
        );
    }

    fn worker_failed(&self, error: &HostError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "worker_failed",
            error = %error,
            "worker process failed to start"
        );
    }

    fn worker_output(&self, stream: OutputStream, line: &str) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "worker_output",
            stream = stream.as_str(),
            line,
            "worker diagnostic output"
        );
    }

    fn shutdown_escalated(&self, stage: ShutdownStage) {
        tracing::warn!(
            target: LIFECYCLE_TARGET,
            event = "shutdown_escalated",
            stage = stage.as_str(),
            "worker did not stop in time, escalating"
        );
    }

    fn worker_stopped(&self, outcome: ShutdownOutcome) {
        tracing::info!(
            target: LIFECYCLE_TARGET,
            event = "worker_stopped",
            stage = outcome.stage.as_str(),
            exit_code = ?outcome.exit_code,
            "worker process stopped"
        );
    }
}
