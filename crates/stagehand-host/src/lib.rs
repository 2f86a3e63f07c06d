//! Host side of Stagehand: worker supervision and RPC.
//!
//! The host spawns the `stagehand-worker` process, talks to it over
//! newline-delimited JSON on its standard streams, and polls device
//! positions in the background. The pieces are:
//!
//! - [`WorkerProcess`] starts the worker, verifies it survives a settle delay,
//!   and stops it with an escalating shutdown.
//! - [`RpcClient`] serialises calls so exactly one command is in flight, and
//!   turns every failure into a synthesised error response.
//! - [`MonitorHandle`] controls a thread that polls registered targets and
//!   publishes [`PositionUpdate`]s to a [`MonitorListener`].
//! - [`HostContext`] wires the three together for front ends.

mod client;
mod context;
mod error;
mod gate;
pub mod monitor;
mod multiplexer;
mod process;
mod reporter;
mod settings;

#[cfg(test)]
mod test_support;

pub use client::{Liveness, RpcClient};
pub use context::HostContext;
pub use error::HostError;
pub use monitor::{
    LoggingListener, MonitorHandle, MonitorListener, MonitoringTarget, PositionSource,
    PositionUpdate, TargetParseError, TargetSet, spawn_monitor,
};
pub use process::{ShutdownOutcome, ShutdownStage, WorkerProcess};
pub use reporter::{HostReporter, OutputStream, StructuredHostReporter};
pub use settings::{DEFAULT_LIVENESS_INTERVAL, MonitorSettings, WorkerSettings};
