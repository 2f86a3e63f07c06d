//! Periodic position polling for registered targets.
//!
//! The scheduler thread wakes every [`MonitorSettings::period`], snapshots
//! the active targets, and issues `get_position` for each in turn through a
//! [`PositionSource`]. Targets live behind their own short-held lock, distinct
//! from the RPC channel, so registering or toggling a target never waits on an
//! in-flight call. Stop requests are checked between targets and interrupt the
//! inter-cycle wait immediately.

mod targets;

#[cfg(test)]
mod tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::json;
use stagehand_protocol::{Response, commands};
use tracing::{debug, info, warn};

pub use self::targets::{MonitoringTarget, TargetParseError, TargetSet};
use crate::client::RpcClient;
use crate::error::HostError;
use crate::settings::MonitorSettings;

/// Log target for monitoring operations.
const MONITOR_TARGET: &str = "stagehand_host::monitor";

/// Where the scheduler obtains positions from.
pub trait PositionSource: Send + Sync {
    /// Reads the position of `target`, waiting at most `timeout`.
    fn get_position(&self, target: &MonitoringTarget, timeout: Duration) -> Response;
}

impl PositionSource for RpcClient {
    fn get_position(&self, target: &MonitoringTarget, timeout: Duration) -> Response {
        self.call(
            commands::GET_POSITION,
            vec![json!(target.device()), json!(target.channel())],
            timeout,
        )
    }
}

impl<T> PositionSource for Arc<T>
where
    T: PositionSource + ?Sized,
{
    fn get_position(&self, target: &MonitoringTarget, timeout: Duration) -> Response {
        (**self).get_position(target, timeout)
    }
}

/// One polling result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionUpdate {
    /// The polled target.
    pub target: MonitoringTarget,
    /// The position, or the failure message.
    pub result: Result<i64, String>,
}

impl PositionUpdate {
    fn from_response(target: MonitoringTarget, response: &Response) -> Self {
        let result = if response.is_success() {
            response
                .data()
                .as_i64()
                .ok_or_else(|| format!("non-integer position: {}", response.data()))
        } else {
            Err(response.message())
        };
        Self { target, result }
    }
}

/// Receives polling results, on the scheduler thread.
pub trait MonitorListener: Send + Sync {
    /// Invoked once per polled target per cycle.
    fn position_updated(&self, update: &PositionUpdate);
}

impl<T> MonitorListener for Arc<T>
where
    T: MonitorListener + ?Sized,
{
    fn position_updated(&self, update: &PositionUpdate) {
        (**self).position_updated(update);
    }
}

impl MonitorListener for Sender<PositionUpdate> {
    fn position_updated(&self, update: &PositionUpdate) {
        // A dropped receiver just means nobody is watching any more.
        drop(self.send(update.clone()));
    }
}

/// Listener that only logs updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingListener;

impl MonitorListener for LoggingListener {
    fn position_updated(&self, update: &PositionUpdate) {
        match &update.result {
            Ok(position) => info!(
                target: MONITOR_TARGET,
                target_id = %update.target,
                position,
                "position updated"
            ),
            Err(message) => warn!(
                target: MONITOR_TARGET,
                target_id = %update.target,
                error = %message,
                "position poll failed"
            ),
        }
    }
}

/// Control handle for the scheduler thread.
///
/// Dropping the handle stops the scheduler.
#[derive(Debug)]
pub struct MonitorHandle {
    targets: Arc<Mutex<TargetSet>>,
    stop_requested: Arc<AtomicBool>,
    wake: Mutex<Option<Sender<()>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

/// Starts the scheduler thread.
///
/// # Errors
///
/// Returns [`HostError::ThreadSpawn`] if the thread cannot be created.
pub fn spawn_monitor(
    source: Arc<dyn PositionSource>,
    listener: Arc<dyn MonitorListener>,
    settings: MonitorSettings,
) -> Result<MonitorHandle, HostError> {
    let targets = Arc::new(Mutex::new(TargetSet::new()));
    let stop_requested = Arc::new(AtomicBool::new(false));
    let (wake, sleeper) = mpsc::channel();

    let scheduler = Scheduler {
        source,
        listener,
        settings,
        targets: Arc::clone(&targets),
        stop_requested: Arc::clone(&stop_requested),
        sleeper,
    };
    let thread = thread::Builder::new()
        .name("stagehand-monitor".to_owned())
        .spawn(move || scheduler.run())
        .map_err(|error| HostError::thread_spawn("monitor", error))?;

    Ok(MonitorHandle {
        targets,
        stop_requested,
        wake: Mutex::new(Some(wake)),
        thread: Mutex::new(Some(thread)),
    })
}

impl MonitorHandle {
    /// Ensures `target` is registered and active.
    pub fn add_target(&self, target: MonitoringTarget) {
        debug!(target: MONITOR_TARGET, target_id = %target, "adding target");
        self.lock_targets().add(target);
    }

    /// Unregisters `target`. Returns `false` if it was absent.
    #[must_use = "false means the target was never registered"]
    pub fn remove_target(&self, target: &MonitoringTarget) -> bool {
        debug!(target: MONITOR_TARGET, target_id = %target, "removing target");
        self.lock_targets().remove(target)
    }

    /// Pauses or resumes polling of a registered target.
    ///
    /// Returns `false`, changing nothing, if the target is absent.
    #[must_use = "false means the target was never registered"]
    pub fn set_active(&self, target: &MonitoringTarget, active: bool) -> bool {
        debug!(target: MONITOR_TARGET, target_id = %target, active, "toggling target");
        self.lock_targets().set_active(target, active)
    }

    /// Replaces `from` with `to`, keeping its active flag.
    pub fn retarget(&self, from: &MonitoringTarget, to: MonitoringTarget) {
        debug!(target: MONITOR_TARGET, from = %from, to = %to, "retargeting");
        self.lock_targets().retarget(from, to);
    }

    /// Snapshot of every target with its active flag.
    #[must_use]
    pub fn targets(&self) -> Vec<(MonitoringTarget, bool)> {
        self.lock_targets().entries()
    }

    /// Whether the scheduler thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.thread)
            .as_ref()
            .is_some_and(|thread| !thread.is_finished())
    }

    /// Stops the scheduler and waits for its thread to finish.
    ///
    /// The wait covers at most the call in flight when the request arrives.
    /// Calling this more than once, or from a listener, is harmless.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::Release);
        lock(&self.wake).take();

        let Some(thread) = lock(&self.thread).take() else {
            return;
        };
        if thread.thread().id() == thread::current().id() {
            return;
        }
        if thread.join().is_err() {
            warn!(target: MONITOR_TARGET, "monitor thread panicked");
        }
    }

    fn lock_targets(&self) -> MutexGuard<'_, TargetSet> {
        lock(&self.targets)
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poison| poison.into_inner())
}

struct Scheduler {
    source: Arc<dyn PositionSource>,
    listener: Arc<dyn MonitorListener>,
    settings: MonitorSettings,
    targets: Arc<Mutex<TargetSet>>,
    stop_requested: Arc<AtomicBool>,
    sleeper: Receiver<()>,
}

impl Scheduler {
    fn run(self) {
        info!(
            target: MONITOR_TARGET,
            period = ?self.settings.period,
            "monitor started"
        );
        while !self.stopping() {
            self.run_cycle();
            match self.sleeper.recv_timeout(self.settings.period) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        info!(target: MONITOR_TARGET, "monitor stopped");
    }

    fn run_cycle(&self) {
        let active = lock(&self.targets).active();
        for target in active {
            if self.stopping() {
                return;
            }
            let response = self
                .source
                .get_position(&target, self.settings.call_timeout);
            let update = PositionUpdate::from_response(target, &response);
            if let Err(message) = &update.result {
                debug!(
                    target: MONITOR_TARGET,
                    target_id = %update.target,
                    error = %message,
                    "position poll failed"
                );
            }
            self.listener.position_updated(&update);
        }
    }

    fn stopping(&self) -> bool {
        self.stop_requested.load(Ordering::Acquire)
    }
}
