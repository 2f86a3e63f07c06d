//! Error types for worker supervision.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors raised while starting or supervising the worker.
///
/// Call-level failures never surface here: the RPC client reports those as
/// synthesised [`stagehand_protocol::Response`] values so callers handle a
/// single shape.
#[derive(Debug, Clone, Error)]
pub enum HostError {
    /// The worker executable could not be found.
    #[error("worker binary not found: {command}")]
    BinaryNotFound {
        /// The command that was not found.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The worker process could not be spawned.
    #[error("failed to spawn worker process: {message}")]
    SpawnFailed {
        /// Description of the spawn failure.
        message: String,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },

    /// The worker exited during the settle delay.
    #[error("worker exited during startup{}", render_exit_code(*exit_code))]
    StartupFailed {
        /// Exit code, when the worker exited normally.
        exit_code: Option<i32>,
    },

    /// A background thread could not be started.
    #[error("failed to start {role} thread")]
    ThreadSpawn {
        /// Which thread failed to start.
        role: &'static str,
        /// The underlying I/O error.
        #[source]
        source: Arc<io::Error>,
    },
}

impl HostError {
    pub(crate) fn thread_spawn(role: &'static str, source: io::Error) -> Self {
        Self::ThreadSpawn {
            role,
            source: Arc::new(source),
        }
    }
}

fn render_exit_code(exit_code: Option<i32>) -> String {
    exit_code.map_or_else(
        || " (terminated by signal)".to_owned(),
        |code| format!(" with code {code}"),
    )
}
