//! Demultiplexes worker output into responses and diagnostics.
//!
//! One reader thread per stream feeds a single unbounded queue, so the
//! worker can never block on a full pipe while no call is waiting. Stdout
//! lines are classified; stderr lines are always diagnostic. End of stdout
//! sets the shared `closed` flag and enqueues [`QueueEntry::Closed`].

use std::io::{BufRead, BufReader, Read};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use stagehand_protocol::{Inbound, Response, classify};
use tracing::{debug, warn};

use crate::error::HostError;
use crate::reporter::OutputStream;

/// Log target for multiplexer operations.
const MULTIPLEXER_TARGET: &str = "stagehand_host::multiplexer";

/// One item observed on the worker's output streams.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum QueueEntry {
    Response(Response),
    Diagnostic { stream: OutputStream, text: String },
    Closed,
}

/// Receiving side of the output queue plus its reader threads.
#[derive(Debug)]
pub(crate) struct Multiplexer {
    receiver: Receiver<QueueEntry>,
    closed: Arc<AtomicBool>,
}

impl Multiplexer {
    /// Starts reader threads for `stdout` and, when given, `stderr`.
    pub(crate) fn spawn<O, E>(stdout: O, stderr: Option<E>) -> Result<Self, HostError>
    where
        O: Read + Send + 'static,
        E: Read + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let closed = Arc::new(AtomicBool::new(false));

        spawn_reader(
            "stagehand-stdout",
            stdout,
            OutputStream::Stdout,
            sender.clone(),
            Some(Arc::clone(&closed)),
        )?;
        if let Some(stderr) = stderr {
            spawn_reader(
                "stagehand-stderr",
                stderr,
                OutputStream::Stderr,
                sender,
                None,
            )?;
        }

        Ok(Self { receiver, closed })
    }

    /// Waits up to `timeout` for the next entry.
    pub(crate) fn next_entry(&self, timeout: Duration) -> Option<QueueEntry> {
        match self.receiver.recv_timeout(timeout) {
            Ok(entry) => Some(entry),
            Err(RecvTimeoutError::Timeout) => None,
            // Every reader has exited and the queue is drained.
            Err(RecvTimeoutError::Disconnected) => Some(QueueEntry::Closed),
        }
    }

    /// Removes and returns every entry already queued.
    pub(crate) fn drain(&self) -> Vec<QueueEntry> {
        self.receiver.try_iter().collect()
    }

    /// Whether the worker's stdout has reached end of stream.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

fn spawn_reader<R>(
    name: &str,
    stream: R,
    kind: OutputStream,
    sender: Sender<QueueEntry>,
    closed: Option<Arc<AtomicBool>>,
) -> Result<(), HostError>
where
    R: Read + Send + 'static,
{
    thread::Builder::new()
        .name(name.to_owned())
        .spawn(move || read_lines(stream, kind, &sender, closed.as_deref()))
        .map(drop)
        .map_err(|error| HostError::thread_spawn("output reader", error))
}

fn read_lines<R: Read>(
    stream: R,
    kind: OutputStream,
    sender: &Sender<QueueEntry>,
    closed: Option<&AtomicBool>,
) {
    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::new();
    loop {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buffer);
                if sender.send(entry_for(kind, &line)).is_err() {
                    // The client is gone; nobody is listening any more.
                    return;
                }
            }
            Err(error) => {
                warn!(
                    target: MULTIPLEXER_TARGET,
                    stream = kind.as_str(),
                    error = %error,
                    "failed to read worker output"
                );
                break;
            }
        }
    }

    debug!(
        target: MULTIPLEXER_TARGET,
        stream = kind.as_str(),
        "worker stream closed"
    );
    if let Some(closed) = closed {
        closed.store(true, Ordering::Release);
        drop(sender.send(QueueEntry::Closed));
    }
}

fn entry_for(kind: OutputStream, line: &str) -> QueueEntry {
    match kind {
        OutputStream::Stdout => match classify(line) {
            Inbound::Response(response) => QueueEntry::Response(response),
            Inbound::Diagnostic(text) => QueueEntry::Diagnostic { stream: kind, text },
        },
        OutputStream::Stderr => QueueEntry::Diagnostic {
            stream: kind,
            text: line.trim_end().to_owned(),
        },
    }
}
