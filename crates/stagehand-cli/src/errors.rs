//! Error type for the front-end runtime.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use stagehand_config::telemetry::TelemetryError;
use stagehand_host::HostError;
use thiserror::Error;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to start the worker: {0}")]
    Start(#[from] HostError),
    #[error("'{command}' timed out")]
    Timeout { command: String },
    #[error("the worker is unavailable; '{command}' was not answered")]
    Unavailable { command: String },
    #[error("{message}")]
    CommandFailed { message: String },
    #[error("no position update within {waited:?}")]
    MonitorStalled { waited: Duration },
    #[error("failed to serialise output: {0}")]
    Serialise(serde_json::Error),
    #[error("failed to write output: {0}")]
    Write(io::Error),
}
