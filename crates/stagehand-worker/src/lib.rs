//! The Stagehand worker: owns the motion driver and answers commands.
//!
//! The worker reads one JSON command per line from stdin and writes exactly
//! one JSON response per line to stdout. A startup and a stop banner are
//! printed as plain text so the host's multiplexer sees them as diagnostics.
//! Logs go to stderr. The loop ends on `shutdown` or when stdin closes; in
//! both cases every device is disconnected first.

pub mod arguments;
pub mod dispatcher;
pub mod provider;
pub mod session;
pub mod simulated;

#[cfg(test)]
mod tests;

use std::io::{BufRead, Write};

use stagehand_protocol::{RequestId, Response, decode_command};
use thiserror::Error;
use tracing::{info, warn};

pub use dispatcher::{DispatchSettings, Dispatcher};
pub use provider::{ChannelSettings, DeviceError, MotionProvider};
pub use simulated::SimulatedProvider;

/// Printed on stdout when the loop starts.
pub const STARTED_BANNER: &str = "Stagehand worker started";

/// Printed on stdout when the loop ends.
pub const STOPPED_BANNER: &str = "Stagehand worker stopped";

const WORKER_TARGET: &str = "stagehand_worker";

/// Errors that end the worker loop.
#[derive(Debug, Error)]
pub enum WorkerError {
    /// Reading a command from stdin failed.
    #[error("failed to read command: {source}")]
    Read {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Writing to stdout failed.
    #[error("failed to write response: {source}")]
    Write {
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// Serialising a response failed.
    #[error("failed to serialise response: {source}")]
    Serialize {
        /// Underlying serialisation error.
        #[source]
        source: serde_json::Error,
    },
}

/// Reads commands from `stdin` until shutdown or end of input.
///
/// # Errors
///
/// Returns an error if stdin cannot be read or stdout cannot be written.
/// Malformed commands are answered, not returned as errors.
pub fn run<P: MotionProvider>(
    stdin: &mut impl BufRead,
    stdout: &mut impl Write,
    dispatcher: &mut Dispatcher<P>,
) -> Result<(), WorkerError> {
    write_text(stdout, STARTED_BANNER)?;
    info!(target: WORKER_TARGET, "worker loop started");

    let result = serve(stdin, stdout, dispatcher);

    dispatcher.disconnect_all();
    info!(target: WORKER_TARGET, "worker loop stopped");
    result?;
    write_text(stdout, STOPPED_BANNER)
}

fn serve<P: MotionProvider>(
    stdin: &mut impl BufRead,
    stdout: &mut impl Write,
    dispatcher: &mut Dispatcher<P>,
) -> Result<(), WorkerError> {
    let mut buffer = Vec::new();
    while dispatcher.is_running() {
        buffer.clear();
        let read = stdin
            .read_until(b'\n', &mut buffer)
            .map_err(|source| WorkerError::Read { source })?;
        if read == 0 {
            info!(target: WORKER_TARGET, "input closed");
            break;
        }

        let line = String::from_utf8_lossy(&buffer);
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        let response = match decode_command(text) {
            Ok(command) => dispatcher.dispatch(&command),
            Err(error) => {
                warn!(target: WORKER_TARGET, error = %error, "undecodable command");
                Response::invalid_json(error).with_id(salvage_id(text))
            }
        };
        write_response(stdout, &response)?;
    }
    Ok(())
}

/// Recovers the `id` of a line that parsed as JSON but not as a command.
fn salvage_id(text: &str) -> Option<RequestId> {
    serde_json::from_str::<serde_json::Value>(text)
        .ok()?
        .get("id")?
        .as_u64()
}

fn write_response(stdout: &mut impl Write, response: &Response) -> Result<(), WorkerError> {
    let payload =
        serde_json::to_string(response).map_err(|source| WorkerError::Serialize { source })?;
    write_text(stdout, &payload)
}

fn write_text(stdout: &mut impl Write, text: &str) -> Result<(), WorkerError> {
    stdout
        .write_all(text.as_bytes())
        .and_then(|()| stdout.write_all(b"\n"))
        .and_then(|()| stdout.flush())
        .map_err(|source| WorkerError::Write { source })
}
