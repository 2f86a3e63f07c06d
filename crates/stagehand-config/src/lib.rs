//! Shared configuration for the Stagehand host and worker binaries.
//!
//! Both processes load the same [`Config`] so the front end and the worker it
//! supervises agree on log settings, protocol timeouts, and motion defaults.
//! Values are layered by `ortho_config`: built-in defaults, then an optional
//! configuration file (`--config-path` or `STAGEHAND_CONFIG_PATH`), then
//! `STAGEHAND_*` environment variables, then command-line flags.

mod defaults;
mod logging;
pub mod telemetry;

use std::time::Duration;

pub use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CALL_TIMEOUT_MS, DEFAULT_GRACE_PERIOD_MS, DEFAULT_JOG_MAX, DEFAULT_JOG_MIN,
    DEFAULT_LOG_FILTER, DEFAULT_POLL_PERIOD_MS, DEFAULT_POLL_TIMEOUT_MS, DEFAULT_SETTLE_MS,
    DEFAULT_SHUTDOWN_CALL_TIMEOUT_MS, DEFAULT_SIMULATED_LATENCY_MS, DEFAULT_STEP_ACCELERATION,
    DEFAULT_STEP_RATE, DEFAULT_TERMINATE_GRACE_MS, DEFAULT_WORKER_COMMAND, default_log_filter,
    default_log_format,
};
pub use logging::{LogFormat, LogFormatParseError};

/// Resolved configuration shared by the front end and the worker.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "STAGEHAND")]
pub struct Config {
    /// `tracing` filter expression, for example `info` or `stagehand_host=debug`.
    #[ortho_config(default = defaults::default_log_filter_string())]
    #[serde(default = "defaults::default_log_filter_string")]
    pub log_filter: String,
    /// Output format for log records.
    #[ortho_config(default = defaults::default_log_format())]
    #[serde(default = "defaults::default_log_format")]
    pub log_format: LogFormat,
    /// Executable launched as the worker process.
    #[ortho_config(default = defaults::default_worker_command())]
    #[serde(default = "defaults::default_worker_command")]
    pub worker_command: String,
    /// Extra arguments passed to the worker executable.
    #[ortho_config(default = Vec::new())]
    #[serde(default)]
    pub worker_args: Vec<String>,
    /// Delay between spawning the worker and the first liveness check.
    #[ortho_config(default = defaults::default_settle_ms())]
    #[serde(default = "defaults::default_settle_ms")]
    pub settle_ms: u64,
    /// Default bound for a front-end call.
    #[ortho_config(default = defaults::default_call_timeout_ms())]
    #[serde(default = "defaults::default_call_timeout_ms")]
    pub call_timeout_ms: u64,
    /// Bound for the cooperative `shutdown` call.
    #[ortho_config(default = defaults::default_shutdown_call_timeout_ms())]
    #[serde(default = "defaults::default_shutdown_call_timeout_ms")]
    pub shutdown_call_timeout_ms: u64,
    /// How long the worker may take to exit after the `shutdown` call.
    #[ortho_config(default = defaults::default_grace_period_ms())]
    #[serde(default = "defaults::default_grace_period_ms")]
    pub grace_period_ms: u64,
    /// How long the worker may take to exit after the terminate signal.
    #[ortho_config(default = defaults::default_terminate_grace_ms())]
    #[serde(default = "defaults::default_terminate_grace_ms")]
    pub terminate_grace_ms: u64,
    /// Interval between monitoring cycles.
    #[ortho_config(default = defaults::default_poll_period_ms())]
    #[serde(default = "defaults::default_poll_period_ms")]
    pub poll_period_ms: u64,
    /// Bound for each `get_position` call issued by the monitor.
    #[ortho_config(default = defaults::default_poll_timeout_ms())]
    #[serde(default = "defaults::default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Lowest position a jog may reach.
    #[ortho_config(default = defaults::default_jog_min())]
    #[serde(default = "defaults::default_jog_min")]
    pub jog_min: i64,
    /// Highest position a jog may reach.
    #[ortho_config(default = defaults::default_jog_max())]
    #[serde(default = "defaults::default_jog_max")]
    pub jog_max: i64,
    /// Step rate applied to a channel on first use.
    #[ortho_config(default = defaults::default_step_rate())]
    #[serde(default = "defaults::default_step_rate")]
    pub step_rate: u32,
    /// Step acceleration applied to a channel on first use.
    #[ortho_config(default = defaults::default_step_acceleration())]
    #[serde(default = "defaults::default_step_acceleration")]
    pub step_acceleration: u32,
    /// Device identifiers served by the simulated motion provider.
    #[ortho_config(default = Vec::new())]
    #[serde(default)]
    pub simulated_devices: Vec<String>,
    /// Delay the simulated provider adds to every device operation.
    #[ortho_config(default = defaults::default_simulated_latency_ms())]
    #[serde(default = "defaults::default_simulated_latency_ms")]
    pub simulated_latency_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_filter: defaults::default_log_filter_string(),
            log_format: defaults::default_log_format(),
            worker_command: defaults::default_worker_command(),
            worker_args: Vec::new(),
            settle_ms: DEFAULT_SETTLE_MS,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            shutdown_call_timeout_ms: DEFAULT_SHUTDOWN_CALL_TIMEOUT_MS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            terminate_grace_ms: DEFAULT_TERMINATE_GRACE_MS,
            poll_period_ms: DEFAULT_POLL_PERIOD_MS,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            jog_min: DEFAULT_JOG_MIN,
            jog_max: DEFAULT_JOG_MAX,
            step_rate: DEFAULT_STEP_RATE,
            step_acceleration: DEFAULT_STEP_ACCELERATION,
            simulated_devices: Vec::new(),
            simulated_latency_ms: DEFAULT_SIMULATED_LATENCY_MS,
        }
    }
}

impl Config {
    /// Log filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Worker executable.
    #[must_use]
    pub fn worker_command(&self) -> &str {
        self.worker_command.as_str()
    }

    /// Worker arguments.
    #[must_use]
    pub fn worker_args(&self) -> &[String] {
        &self.worker_args
    }

    /// Settle interval after spawning the worker.
    #[must_use]
    pub const fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Default call timeout.
    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Timeout for the cooperative shutdown call.
    #[must_use]
    pub const fn shutdown_call_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_call_timeout_ms)
    }

    /// Grace period after the cooperative shutdown call.
    #[must_use]
    pub const fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    /// Grace period after the terminate signal.
    #[must_use]
    pub const fn terminate_grace(&self) -> Duration {
        Duration::from_millis(self.terminate_grace_ms)
    }

    /// Monitoring cycle period.
    #[must_use]
    pub const fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    /// Per-target monitoring call timeout.
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Delay added by the simulated provider to each device operation.
    #[must_use]
    pub const fn simulated_latency(&self) -> Duration {
        Duration::from_millis(self.simulated_latency_ms)
    }

    /// Inclusive jog bounds as `(min, max)`.
    #[must_use]
    pub const fn jog_bounds(&self) -> (i64, i64) {
        (self.jog_min, self.jog_max)
    }
}
