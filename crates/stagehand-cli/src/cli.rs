//! Command-line argument definitions for the `stagehand` front end.

use clap::{Parser, Subcommand};
use stagehand_host::MonitoringTarget;

/// Command-line interface for driving a Stagehand worker.
#[derive(Parser, Debug)]
#[command(name = "stagehand", disable_help_subcommand = true)]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: CliCommand,
}

/// Subcommands, each run against a freshly started worker.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum CliCommand {
    /// Sends one command to the worker and prints the payload as JSON.
    Call {
        /// Command name, for example `get_position`.
        #[arg(value_name = "NAME")]
        name: String,
        /// Command arguments. JSON scalars are sent as-is, anything else as
        /// a string.
        #[arg(value_name = "ARG", num_args = 0.., allow_hyphen_values = true)]
        arguments: Vec<String>,
    },
    /// Lists the devices visible to the worker.
    Devices,
    /// Polls positions and prints one JSON line per update.
    Monitor {
        /// Targets to poll.
        #[arg(value_name = "DEVICE:CHANNEL", required = true, num_args = 1..)]
        targets: Vec<MonitoringTarget>,
        /// Updates to collect from every target before stopping.
        #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        cycles: u32,
    },
}
