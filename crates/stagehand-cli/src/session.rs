//! The worker session a subcommand runs against.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::Duration;

use serde_json::Value;
use stagehand_config::{Config, telemetry};
use stagehand_host::{
    HostContext, MonitorSettings, MonitoringTarget, PositionUpdate, ShutdownOutcome,
    StructuredHostReporter, WorkerSettings,
};
use stagehand_protocol::Response;

use crate::errors::AppError;

const SERVICE_NAME: &str = "stagehand";

/// A running worker as seen by the front end.
pub(crate) trait Session {
    /// Issues one command with the configured default timeout.
    fn call(&mut self, name: &str, args: Vec<Value>) -> Response;
    /// Adds a target to the monitor.
    fn watch(&mut self, target: MonitoringTarget);
    /// Waits up to `timeout` for the next position update.
    fn next_update(&mut self, timeout: Duration) -> Option<PositionUpdate>;
    /// Stops the monitor and the worker.
    fn close(self) -> ShutdownOutcome;
}

/// Starts sessions.
pub(crate) trait Launcher {
    type Session: Session;

    /// Starts a worker configured by `config`, passing `forwarded` ahead of
    /// the configured worker arguments.
    fn launch(&self, config: &Config, forwarded: &[String]) -> Result<Self::Session, AppError>;
}

/// Launches the real worker through [`HostContext`].
pub(crate) struct HostLauncher;

impl Launcher for HostLauncher {
    type Session = HostSession;

    fn launch(&self, config: &Config, forwarded: &[String]) -> Result<HostSession, AppError> {
        telemetry::initialise(config, SERVICE_NAME)?;

        let args: Vec<String> = forwarded
            .iter()
            .chain(config.worker_args())
            .cloned()
            .collect();
        let worker = WorkerSettings::from_config(config).with_args(args);
        let (sender, updates) = mpsc::channel();
        let context = HostContext::start_with(
            worker,
            MonitorSettings::from_config(config),
            Arc::new(sender),
            Arc::new(StructuredHostReporter::new()),
        )?;
        Ok(HostSession { context, updates })
    }
}

pub(crate) struct HostSession {
    context: HostContext,
    updates: Receiver<PositionUpdate>,
}

impl Session for HostSession {
    fn call(&mut self, name: &str, args: Vec<Value>) -> Response {
        self.context.client().call_default(name, args)
    }

    fn watch(&mut self, target: MonitoringTarget) {
        self.context.monitor().add_target(target);
    }

    fn next_update(&mut self, timeout: Duration) -> Option<PositionUpdate> {
        self.updates.recv_timeout(timeout).ok()
    }

    fn close(self) -> ShutdownOutcome {
        self.context.shutdown()
    }
}
