//! Runtime settings derived from [`Config`].

use std::path::PathBuf;
use std::time::Duration;

use stagehand_config::Config;

/// How often a waiting call re-checks that the worker is still alive.
pub const DEFAULT_LIVENESS_INTERVAL: Duration = Duration::from_millis(100);

/// Settings for spawning and stopping the worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    /// The executable path or command name.
    pub command: PathBuf,
    /// Arguments passed to the worker.
    pub args: Vec<String>,
    /// Working directory for the spawned process.
    pub working_dir: Option<PathBuf>,
    /// Delay between spawning and the startup liveness check.
    pub settle: Duration,
    /// Timeout applied by [`crate::RpcClient::call_default`].
    pub call_timeout: Duration,
    /// Timeout for the cooperative `shutdown` command.
    pub shutdown_call_timeout: Duration,
    /// How long to wait for a voluntary exit after `shutdown`.
    pub grace_period: Duration,
    /// How long to wait after SIGTERM before killing.
    pub terminate_grace: Duration,
    /// Slice length used while waiting for a response.
    pub liveness_interval: Duration,
}

impl WorkerSettings {
    /// Settings for `command` with the built-in timings.
    #[must_use]
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self::from_config(&Config::default()).with_command(command)
    }

    /// Settings derived from a loaded configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            command: PathBuf::from(config.worker_command()),
            args: config.worker_args().to_vec(),
            working_dir: None,
            settle: config.settle(),
            call_timeout: config.call_timeout(),
            shutdown_call_timeout: config.shutdown_call_timeout(),
            grace_period: config.grace_period(),
            terminate_grace: config.terminate_grace(),
            liveness_interval: DEFAULT_LIVENESS_INTERVAL,
        }
    }

    /// Replaces the worker command.
    #[must_use]
    pub fn with_command(mut self, command: impl Into<PathBuf>) -> Self {
        self.command = command.into();
        self
    }

    /// Replaces the worker arguments.
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Sets a custom working directory.
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Overrides the settle delay.
    #[must_use]
    pub const fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    /// Overrides every shutdown tier at once.
    #[must_use]
    pub const fn with_shutdown_timings(
        mut self,
        shutdown_call_timeout: Duration,
        grace_period: Duration,
        terminate_grace: Duration,
    ) -> Self {
        self.shutdown_call_timeout = shutdown_call_timeout;
        self.grace_period = grace_period;
        self.terminate_grace = terminate_grace;
        self
    }
}

/// Settings for the monitoring scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Delay between the end of one cycle and the start of the next.
    pub period: Duration,
    /// Timeout applied to each `get_position` call.
    pub call_timeout: Duration,
}

impl MonitorSettings {
    /// Settings derived from a loaded configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            period: config.poll_period(),
            call_timeout: config.poll_timeout(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}
