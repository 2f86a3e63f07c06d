use crate::logging::LogFormat;

/// Default delay added by the simulated provider, in milliseconds.
pub const DEFAULT_SIMULATED_LATENCY_MS: u64 = 0;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Worker executable resolved through `PATH` when none is configured.
pub const DEFAULT_WORKER_COMMAND: &str = "stagehand-worker";

/// Settle interval before the first liveness check of a new worker.
pub const DEFAULT_SETTLE_MS: u64 = 1_000;

/// Default bound for a front-end call.
pub const DEFAULT_CALL_TIMEOUT_MS: u64 = 10_000;

/// Bound for the cooperative `shutdown` call.
pub const DEFAULT_SHUTDOWN_CALL_TIMEOUT_MS: u64 = 3_000;

/// Natural-exit window after the cooperative `shutdown` call.
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 3_000;

/// Exit window after the terminate signal, before the forced kill.
pub const DEFAULT_TERMINATE_GRACE_MS: u64 = 2_000;

/// Monitoring cycle period.
pub const DEFAULT_POLL_PERIOD_MS: u64 = 2_000;

/// Bound for each monitoring `get_position` call.
pub const DEFAULT_POLL_TIMEOUT_MS: u64 = 5_000;

/// Lower jog bound in device position units.
pub const DEFAULT_JOG_MIN: i64 = 0;

/// Upper jog bound in device position units.
pub const DEFAULT_JOG_MAX: i64 = 65_535;

/// Channel step rate applied on first use.
pub const DEFAULT_STEP_RATE: u32 = 500;

/// Channel step acceleration applied on first use.
pub const DEFAULT_STEP_ACCELERATION: u32 = 100_000;

/// Default log filter expression used by the binaries.
#[must_use]
pub const fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub(crate) fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
#[must_use]
pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}

pub(crate) fn default_worker_command() -> String {
    DEFAULT_WORKER_COMMAND.to_owned()
}

pub(crate) const fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_MS
}

pub(crate) const fn default_call_timeout_ms() -> u64 {
    DEFAULT_CALL_TIMEOUT_MS
}

pub(crate) const fn default_shutdown_call_timeout_ms() -> u64 {
    DEFAULT_SHUTDOWN_CALL_TIMEOUT_MS
}

pub(crate) const fn default_grace_period_ms() -> u64 {
    DEFAULT_GRACE_PERIOD_MS
}

pub(crate) const fn default_terminate_grace_ms() -> u64 {
    DEFAULT_TERMINATE_GRACE_MS
}

pub(crate) const fn default_poll_period_ms() -> u64 {
    DEFAULT_POLL_PERIOD_MS
}

pub(crate) const fn default_poll_timeout_ms() -> u64 {
    DEFAULT_POLL_TIMEOUT_MS
}

pub(crate) const fn default_jog_min() -> i64 {
    DEFAULT_JOG_MIN
}

pub(crate) const fn default_jog_max() -> i64 {
    DEFAULT_JOG_MAX
}

pub(crate) const fn default_step_rate() -> u32 {
    DEFAULT_STEP_RATE
}

pub(crate) const fn default_step_acceleration() -> u32 {
    DEFAULT_STEP_ACCELERATION
}

pub(crate) const fn default_simulated_latency_ms() -> u64 {
    DEFAULT_SIMULATED_LATENCY_MS
}
