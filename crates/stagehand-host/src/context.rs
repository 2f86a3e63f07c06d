//! Explicit wiring of the host-side components.

use std::sync::Arc;

use stagehand_config::Config;

use crate::client::RpcClient;
use crate::error::HostError;
use crate::monitor::{MonitorHandle, MonitorListener, PositionSource, spawn_monitor};
use crate::process::{ShutdownOutcome, WorkerProcess};
use crate::reporter::HostReporter;
use crate::settings::{MonitorSettings, WorkerSettings};

/// The running worker, its client, and the monitor polling through it.
///
/// Everything a front end needs is reached through this value; nothing is
/// held in globals.
pub struct HostContext {
    process: WorkerProcess,
    monitor: MonitorHandle,
}

impl HostContext {
    /// Starts the worker and a monitor using settings from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker fails to start or the monitor thread
    /// cannot be spawned.
    pub fn start(
        config: &Config,
        listener: Arc<dyn MonitorListener>,
        reporter: Arc<dyn HostReporter>,
    ) -> Result<Self, HostError> {
        Self::start_with(
            WorkerSettings::from_config(config),
            MonitorSettings::from_config(config),
            listener,
            reporter,
        )
    }

    /// Starts the worker and monitor with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the worker fails to start or the monitor thread
    /// cannot be spawned.
    pub fn start_with(
        worker: WorkerSettings,
        monitor: MonitorSettings,
        listener: Arc<dyn MonitorListener>,
        reporter: Arc<dyn HostReporter>,
    ) -> Result<Self, HostError> {
        let process = WorkerProcess::start(worker, reporter)?;
        let source: Arc<dyn PositionSource> = process.client();
        let monitor = spawn_monitor(source, listener, monitor)?;
        Ok(Self { process, monitor })
    }

    /// The RPC client for issuing commands.
    #[must_use]
    pub fn client(&self) -> Arc<RpcClient> {
        self.process.client()
    }

    /// The monitor's control handle.
    #[must_use]
    pub const fn monitor(&self) -> &MonitorHandle {
        &self.monitor
    }

    /// The supervised worker process.
    #[must_use]
    pub const fn process(&self) -> &WorkerProcess {
        &self.process
    }

    /// Stops the monitor, then the worker.
    #[must_use = "the outcome reports how far shutdown had to escalate"]
    pub fn shutdown(self) -> ShutdownOutcome {
        self.monitor.stop();
        self.process.shutdown()
    }
}
