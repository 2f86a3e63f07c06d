//! Supervision of the worker subprocess.
//!
//! [`WorkerProcess::start`] spawns the worker with piped stdio, waits out a
//! settle delay, and fails if the child has already exited. Shutdown
//! escalates through fixed tiers: a cooperative `shutdown` command, a grace
//! wait, `SIGTERM`, and finally a kill. Dropping a running supervisor kills
//! the child so a worker is never orphaned.

use std::io::{self, BufWriter};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use stagehand_protocol::commands;
use tracing::{debug, warn};

use crate::client::{Liveness, RpcClient};
use crate::error::HostError;
use crate::multiplexer::Multiplexer;
use crate::reporter::HostReporter;
use crate::settings::WorkerSettings;

#[cfg(unix)]
use libc::{SIGTERM, kill};

/// Log target for supervisor operations.
const PROCESS_TARGET: &str = "stagehand_host::process";

/// Polling interval while waiting for the child to exit.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How far shutdown had to go before the worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownStage {
    /// The worker had already exited before shutdown began.
    AlreadyStopped,
    /// The worker exited after the `shutdown` command.
    Cooperative,
    /// The worker exited after `SIGTERM`.
    Terminated,
    /// The worker had to be killed.
    Killed,
}

impl ShutdownStage {
    /// Lowercase stage name used in log fields.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlreadyStopped => "already_stopped",
            Self::Cooperative => "cooperative",
            Self::Terminated => "terminated",
            Self::Killed => "killed",
        }
    }
}

/// Result of [`WorkerProcess::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownOutcome {
    /// The tier at which the worker stopped.
    pub stage: ShutdownStage,
    /// Exit code, when the worker exited normally.
    pub exit_code: Option<i32>,
}

/// Shared handle on the spawned child.
#[derive(Debug)]
pub(crate) struct WorkerChild {
    child: Mutex<Child>,
    pid: u32,
}

impl WorkerChild {
    fn new(child: Child) -> Self {
        let pid = child.id();
        Self {
            child: Mutex::new(child),
            pid,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    /// Exit status if the child has exited; never blocks.
    fn exit_status(&self) -> Option<ExitStatus> {
        match self.lock().try_wait() {
            Ok(status) => status,
            Err(error) => {
                warn!(
                    target: PROCESS_TARGET,
                    pid = self.pid,
                    error = %error,
                    "failed to query worker status"
                );
                None
            }
        }
    }

    /// Polls for exit until `timeout` elapses.
    fn wait_timeout(&self, timeout: Duration) -> Option<ExitStatus> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(status) = self.exit_status() {
                return Some(status);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            thread::sleep(EXIT_POLL_INTERVAL.min(deadline - now));
        }
    }

    /// Asks the child to terminate.
    fn terminate(&self) -> io::Result<()> {
        // Checking and signalling under one lock keeps the pid from being
        // reaped (and reused) in between.
        let mut child = self.lock();
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        #[cfg(unix)]
        {
            let pid = libc::pid_t::try_from(self.pid).map_err(io::Error::other)?;
            // SAFETY: `kill(2)` is memory-safe even when the PID is invalid;
            // the kernel simply returns an error. The child has not been
            // reaped, so the PID still names it.
            let result = unsafe { kill(pid, SIGTERM) };
            if result == 0 {
                Ok(())
            } else {
                Err(io::Error::last_os_error())
            }
        }
        #[cfg(not(unix))]
        {
            child.kill()
        }
    }

    /// Kills the child and reaps it.
    fn kill(&self) -> Option<ExitStatus> {
        let mut child = self.lock();
        if let Err(error) = child.kill() {
            debug!(
                target: PROCESS_TARGET,
                pid = self.pid,
                error = %error,
                "kill failed; worker may already have exited"
            );
        }
        child.wait().ok()
    }
}

impl Liveness for WorkerChild {
    fn is_alive(&self) -> bool {
        self.exit_status().is_none()
    }
}

/// A running worker and the client connected to it.
pub struct WorkerProcess {
    child: Arc<WorkerChild>,
    client: Arc<RpcClient>,
    settings: WorkerSettings,
    reporter: Arc<dyn HostReporter>,
}

impl WorkerProcess {
    /// Spawns the worker and verifies it survives the settle delay.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::BinaryNotFound`] or [`HostError::SpawnFailed`]
    /// when the process cannot be created, and [`HostError::StartupFailed`]
    /// when it exits before the settle delay ends.
    pub fn start(
        settings: WorkerSettings,
        reporter: Arc<dyn HostReporter>,
    ) -> Result<Self, HostError> {
        reporter.worker_starting(&settings.command);
        let result = Self::spawn(settings, Arc::clone(&reporter));
        match &result {
            Ok(process) => reporter.worker_ready(process.pid()),
            Err(error) => reporter.worker_failed(error),
        }
        result
    }

    fn spawn(settings: WorkerSettings, reporter: Arc<dyn HostReporter>) -> Result<Self, HostError> {
        debug!(
            target: PROCESS_TARGET,
            command = %settings.command.display(),
            args = ?settings.args,
            "spawning worker process"
        );

        let mut command = Command::new(&settings.command);
        command
            .args(&settings.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &settings.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|error| {
            if error.kind() == io::ErrorKind::NotFound {
                HostError::BinaryNotFound {
                    command: settings.command.display().to_string(),
                    source: Arc::new(error),
                }
            } else {
                HostError::SpawnFailed {
                    message: format!("failed to start {}", settings.command.display()),
                    source: Arc::new(error),
                }
            }
        })?;

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr: Option<ChildStderr> = child.stderr.take();
        let child = Arc::new(WorkerChild::new(child));

        let multiplexer = match Multiplexer::spawn(stdout, stderr) {
            Ok(multiplexer) => multiplexer,
            Err(error) => {
                child.kill();
                return Err(error);
            }
        };
        let client = Arc::new(RpcClient::new(
            Box::new(BufWriter::new(stdin)),
            multiplexer,
            Arc::clone(&child) as Arc<dyn Liveness>,
            Arc::clone(&reporter),
            settings.call_timeout,
            settings.liveness_interval,
        ));

        debug!(
            target: PROCESS_TARGET,
            pid = child.pid,
            settle = ?settings.settle,
            "worker spawned; waiting for it to settle"
        );
        if let Some(status) = child.wait_timeout(settings.settle) {
            client.drain_diagnostics();
            return Err(HostError::StartupFailed {
                exit_code: status.code(),
            });
        }
        client.drain_diagnostics();

        Ok(Self {
            child,
            client,
            settings,
            reporter,
        })
    }

    /// The client connected to this worker.
    #[must_use]
    pub fn client(&self) -> Arc<RpcClient> {
        Arc::clone(&self.client)
    }

    /// The worker's process id.
    #[must_use]
    pub fn pid(&self) -> u32 {
        self.child.pid
    }

    /// Whether the worker is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.child.is_alive()
    }

    /// Stops the worker, escalating until it has exited.
    ///
    /// Always completes within the sum of the configured shutdown tiers plus
    /// the time needed to reap a killed process.
    #[must_use = "the outcome reports how far shutdown had to escalate"]
    pub fn shutdown(&self) -> ShutdownOutcome {
        let outcome = self.escalate();
        self.reporter.worker_stopped(outcome);
        outcome
    }

    fn escalate(&self) -> ShutdownOutcome {
        if let Some(status) = self.child.exit_status() {
            return outcome(ShutdownStage::AlreadyStopped, Some(status));
        }

        let response = self.client.call(
            commands::SHUTDOWN,
            Vec::new(),
            self.settings.shutdown_call_timeout,
        );
        debug!(
            target: PROCESS_TARGET,
            pid = self.child.pid,
            success = response.is_success(),
            message = %response.message(),
            "shutdown command answered"
        );
        if let Some(status) = self.child.wait_timeout(self.settings.grace_period) {
            return outcome(ShutdownStage::Cooperative, Some(status));
        }

        self.reporter.shutdown_escalated(ShutdownStage::Terminated);
        match self.child.terminate() {
            Ok(()) => {
                if let Some(status) = self.child.wait_timeout(self.settings.terminate_grace) {
                    return outcome(ShutdownStage::Terminated, Some(status));
                }
            }
            Err(error) => warn!(
                target: PROCESS_TARGET,
                pid = self.child.pid,
                error = %error,
                "failed to signal worker"
            ),
        }

        self.reporter.shutdown_escalated(ShutdownStage::Killed);
        outcome(ShutdownStage::Killed, self.child.kill())
    }
}

impl Drop for WorkerProcess {
    fn drop(&mut self) {
        if self.child.is_alive() {
            warn!(
                target: PROCESS_TARGET,
                pid = self.child.pid,
                "worker still running on drop; killing"
            );
            self.child.kill();
        }
    }
}

fn outcome(stage: ShutdownStage, status: Option<ExitStatus>) -> ShutdownOutcome {
    ShutdownOutcome {
        stage,
        exit_code: status.and_then(|status| status.code()),
    }
}

fn missing_pipe(name: &str) -> HostError {
    HostError::SpawnFailed {
        message: format!("failed to capture {name}"),
        source: Arc::new(io::Error::other(format!("no {name}"))),
    }
}
