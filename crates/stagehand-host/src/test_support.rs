//! Shared fixtures for unit tests.

use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::client::Liveness;
use crate::error::HostError;
use crate::process::{ShutdownOutcome, ShutdownStage};
use crate::reporter::{HostReporter, OutputStream};

/// Liveness flag flipped by the test.
#[derive(Debug)]
pub(crate) struct LivenessFlag(AtomicBool);

impl LivenessFlag {
    pub(crate) const fn alive() -> Self {
        Self(AtomicBool::new(true))
    }

    pub(crate) fn set_dead(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Liveness for LivenessFlag {
    fn is_alive(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Reporter that records events as strings.
#[derive(Debug, Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub(crate) fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    fn record(&self, event: String) {
        self.events
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .push(event);
    }
}

impl HostReporter for RecordingReporter {
    fn worker_starting(&self, command: &Path) {
        self.record(format!("starting {}", command.display()));
    }

    fn worker_ready(&self, _pid: u32) {
        self.record("ready".to_owned());
    }

    fn worker_failed(&self, error: &HostError) {
        self.record(format!("failed {error}"));
    }

    fn worker_output(&self, stream: OutputStream, line: &str) {
        self.record(format!("{}: {line}", stream.as_str()));
    }

    fn shutdown_escalated(&self, stage: ShutdownStage) {
        self.record(format!("escalated {}", stage.as_str()));
    }

    fn worker_stopped(&self, outcome: ShutdownOutcome) {
        self.record(format!("stopped {}", outcome.stage.as_str()));
    }
}
