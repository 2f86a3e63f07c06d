//! Single-in-flight RPC client over the worker's stdio.
//!
//! Callers are served strictly in arrival order; at most one command is in
//! flight at a time. Every failure the client can observe (timeout, dead
//! worker, broken pipe, unencodable arguments) comes back as a synthesised
//! error [`Response`] rather than a `Result`, so callers branch on a single
//! shape.

use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use stagehand_protocol::{Command, RequestId, RequestIds, Response, encode};
use tracing::{debug, warn};

use crate::gate::CallGate;
use crate::multiplexer::{Multiplexer, QueueEntry};
use crate::reporter::HostReporter;

/// Log target for RPC client operations.
const CLIENT_TARGET: &str = "stagehand_host::client";

/// Reports whether the worker process is still alive.
pub trait Liveness: Send + Sync {
    /// Returns `false` once the worker has exited.
    fn is_alive(&self) -> bool;
}

impl<T> Liveness for Arc<T>
where
    T: Liveness + ?Sized,
{
    fn is_alive(&self) -> bool {
        (**self).is_alive()
    }
}

/// Write half plus demultiplexed read half of the worker's stdio.
struct Channel {
    writer: Box<dyn Write + Send>,
    multiplexer: Multiplexer,
}

impl Channel {
    fn send(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        self.writer.flush()
    }
}

/// Sends commands to the worker and waits for their responses.
pub struct RpcClient {
    channel: CallGate<Channel>,
    liveness: Arc<dyn Liveness>,
    reporter: Arc<dyn HostReporter>,
    ids: RequestIds,
    default_timeout: Duration,
    liveness_interval: Duration,
}

impl RpcClient {
    pub(crate) fn new(
        writer: Box<dyn Write + Send>,
        multiplexer: Multiplexer,
        liveness: Arc<dyn Liveness>,
        reporter: Arc<dyn HostReporter>,
        default_timeout: Duration,
        liveness_interval: Duration,
    ) -> Self {
        Self {
            channel: CallGate::new(Channel {
                writer,
                multiplexer,
            }),
            liveness,
            reporter,
            ids: RequestIds::new(),
            default_timeout,
            liveness_interval,
        }
    }

    /// Sends `name` with `args` and waits up to `timeout` for the answer.
    ///
    /// The timeout bounds the whole call, including time spent queued behind
    /// other callers.
    #[must_use = "the response carries the outcome, including timeouts"]
    pub fn call(&self, name: &str, args: Vec<Value>, timeout: Duration) -> Response {
        let deadline = Instant::now() + timeout;
        if !self.liveness.is_alive() {
            debug!(target: CLIENT_TARGET, command = name, "worker not running");
            return Response::unavailable();
        }

        let Some(mut channel) = self.channel.enter_until(deadline) else {
            warn!(
                target: CLIENT_TARGET,
                command = name,
                timeout_ms = duration_ms(timeout),
                "timed out waiting for the channel"
            );
            return Response::timeout();
        };
        // The turn can arrive exactly as the deadline passes.
        if Instant::now() >= deadline {
            warn!(
                target: CLIENT_TARGET,
                command = name,
                timeout_ms = duration_ms(timeout),
                "deadline passed before the command was sent"
            );
            return Response::timeout();
        }
        if channel.multiplexer.is_closed() || !self.liveness.is_alive() {
            debug!(target: CLIENT_TARGET, command = name, "worker not running");
            return Response::unavailable();
        }

        // Anything still queued belongs to an earlier call that gave up.
        self.discard_stale(&channel.multiplexer);

        let id = self.ids.next_id();
        let command = Command::new(name, args).with_id(id);
        let line = match encode(&command) {
            Ok(line) => line,
            Err(error) => {
                warn!(target: CLIENT_TARGET, command = name, error = %error, "cannot encode command");
                return Response::error(error.to_string());
            }
        };

        debug!(target: CLIENT_TARGET, command = name, id, "sending command");
        if let Err(error) = channel.send(&line) {
            warn!(
                target: CLIENT_TARGET,
                command = name,
                error = %error,
                "failed to write command"
            );
            return Response::unavailable();
        }

        let response = self.await_response(&channel.multiplexer, name, id, deadline);
        if response.is_timeout() {
            warn!(
                target: CLIENT_TARGET,
                command = name,
                id,
                timeout_ms = duration_ms(timeout),
                "command timed out"
            );
        }
        response
    }

    /// Like [`RpcClient::call`] with the configured default timeout.
    #[must_use = "the response carries the outcome, including timeouts"]
    pub fn call_default(&self, name: &str, args: Vec<Value>) -> Response {
        self.call(name, args, self.default_timeout)
    }

    /// Whether the worker process is still alive.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.liveness.is_alive()
    }

    /// Logs and discards any output queued while no call was waiting.
    pub fn drain_diagnostics(&self) {
        let deadline = Instant::now() + self.liveness_interval;
        if let Some(channel) = self.channel.enter_until(deadline) {
            self.discard_stale(&channel.multiplexer);
        }
    }

    fn await_response(
        &self,
        multiplexer: &Multiplexer,
        name: &str,
        id: RequestId,
        deadline: Instant,
    ) -> Response {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Response::timeout();
            }
            let slice = (deadline - now).min(self.liveness_interval);
            match multiplexer.next_entry(slice) {
                Some(QueueEntry::Response(response)) => {
                    if let Some(response) = Self::accept(response, name, id) {
                        return response;
                    }
                }
                Some(QueueEntry::Diagnostic { stream, text }) => {
                    self.reporter.worker_output(stream, &text);
                }
                Some(QueueEntry::Closed) => return Response::unavailable(),
                None if multiplexer.is_closed() || !self.liveness.is_alive() => {
                    return self.final_response(multiplexer, name, id);
                }
                None => {}
            }
        }
    }

    /// Collects a response the worker wrote just before exiting.
    fn final_response(&self, multiplexer: &Multiplexer, name: &str, id: RequestId) -> Response {
        for entry in multiplexer.drain() {
            match entry {
                QueueEntry::Response(response) => {
                    if let Some(response) = Self::accept(response, name, id) {
                        return response;
                    }
                }
                QueueEntry::Diagnostic { stream, text } => {
                    self.reporter.worker_output(stream, &text);
                }
                QueueEntry::Closed => break,
            }
        }
        warn!(target: CLIENT_TARGET, command = name, id, "worker exited during call");
        Response::unavailable()
    }

    fn accept(response: Response, name: &str, id: RequestId) -> Option<Response> {
        match response.id() {
            Some(other) if other != id => {
                warn!(
                    target: CLIENT_TARGET,
                    command = name,
                    expected = id,
                    received = other,
                    "discarding response to an abandoned command"
                );
                None
            }
            _ => Some(response),
        }
    }

    fn discard_stale(&self, multiplexer: &Multiplexer) {
        for entry in multiplexer.drain() {
            match entry {
                QueueEntry::Response(response) => warn!(
                    target: CLIENT_TARGET,
                    received = ?response.id(),
                    "discarding unsolicited response"
                ),
                QueueEntry::Diagnostic { stream, text } => {
                    self.reporter.worker_output(stream, &text);
                }
                QueueEntry::Closed => {}
            }
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
