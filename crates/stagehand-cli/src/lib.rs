//! Command-line front end for the Stagehand host.
//!
//! The runtime splits configuration flags from the subcommand, loads
//! [`stagehand_config::Config`], starts the worker under supervision, runs one
//! subcommand against it, and always shuts the worker down before returning.
//! Configuration loading and worker launch are injectable so the runtime can
//! be exercised without spawning processes.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use clap::error::ErrorKind;
use serde::Serialize;
use serde_json::Value;
use stagehand_config::Config;
use stagehand_host::{MonitoringTarget, PositionUpdate};
use stagehand_protocol::commands;
use tracing::debug;

mod cli;
mod config;
mod errors;
mod session;

#[cfg(test)]
mod tests;

use cli::{Cli, CliCommand};
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use errors::AppError;
use session::{HostLauncher, Launcher, Session};

const CLI_TARGET: &str = "stagehand_cli";

/// Runs the front end with `args`, writing results to `stdout` and failures
/// to `stderr`.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    run_with(args, stdout, stderr, &OrthoConfigLoader, &HostLauncher)
}

pub(crate) fn run_with<I, W, E, L, H>(
    args: I,
    stdout: &mut W,
    stderr: &mut E,
    loader: &L,
    launcher: &H,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
    H: Launcher,
{
    let args: Vec<OsString> = args.into_iter().collect();
    let split = split_config_arguments(&args);

    let result = Cli::try_parse_from(&split.command_arguments)
        .map_err(AppError::CliUsage)
        .and_then(|cli| {
            loader
                .load(&split.config_arguments)
                .map(|config| (cli, config))
        })
        .and_then(|(cli, config)| {
            let session = launcher.launch(&config, &split.forwarded())?;
            execute(cli.command, &config, session, stdout)
        });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::CliUsage(error))
            if matches!(error.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) =>
        {
            write!(stdout, "{error}").ok();
            ExitCode::SUCCESS
        }
        Err(error) => {
            writeln!(stderr, "stagehand: {error}").ok();
            ExitCode::FAILURE
        }
    }
}

fn execute<S, W>(
    command: CliCommand,
    config: &Config,
    mut session: S,
    stdout: &mut W,
) -> Result<(), AppError>
where
    S: Session,
    W: Write,
{
    let result = match command {
        CliCommand::Call { name, arguments } => {
            let args = arguments.iter().map(|text| parse_argument(text)).collect();
            call(&mut session, &name, args, stdout)
        }
        CliCommand::Devices => call(&mut session, commands::LIST_DEVICES, Vec::new(), stdout),
        CliCommand::Monitor { targets, cycles } => {
            let wait = update_wait(config, targets.len());
            monitor(&mut session, targets, cycles, wait, stdout)
        }
    };
    let outcome = session.close();
    debug!(
        target: CLI_TARGET,
        stage = outcome.stage.as_str(),
        exit_code = ?outcome.exit_code,
        "worker stopped"
    );
    result
}

/// Reads a command-line token as a JSON scalar, falling back to a string.
fn parse_argument(text: &str) -> Value {
    match serde_json::from_str::<Value>(text) {
        Ok(value) if !matches!(value, Value::Array(_) | Value::Object(_)) => value,
        _ => Value::String(text.to_owned()),
    }
}

fn call<S, W>(
    session: &mut S,
    name: &str,
    args: Vec<Value>,
    stdout: &mut W,
) -> Result<(), AppError>
where
    S: Session,
    W: Write,
{
    let response = session.call(name, args);
    if response.is_timeout() {
        return Err(AppError::Timeout {
            command: name.to_owned(),
        });
    }
    if response.is_unavailable() {
        return Err(AppError::Unavailable {
            command: name.to_owned(),
        });
    }
    if !response.is_success() {
        return Err(AppError::CommandFailed {
            message: response.message(),
        });
    }
    serde_json::to_writer(&mut *stdout, response.data()).map_err(AppError::Serialise)?;
    writeln!(stdout).map_err(AppError::Write)
}

/// Longest plausible gap between two updates: one period plus one timed-out
/// call per target, with a second of slack.
fn update_wait(config: &Config, targets: usize) -> Duration {
    let calls = u32::try_from(targets).unwrap_or(u32::MAX);
    config
        .poll_timeout()
        .saturating_mul(calls)
        .saturating_add(config.poll_period())
        .saturating_add(Duration::from_secs(1))
}

fn monitor<S, W>(
    session: &mut S,
    targets: Vec<MonitoringTarget>,
    cycles: u32,
    wait: Duration,
    stdout: &mut W,
) -> Result<(), AppError>
where
    S: Session,
    W: Write,
{
    let mut remaining: BTreeMap<MonitoringTarget, u32> = BTreeMap::new();
    for target in targets {
        remaining.insert(target.clone(), cycles);
        session.watch(target);
    }

    while !remaining.is_empty() {
        let update = session
            .next_update(wait)
            .ok_or(AppError::MonitorStalled { waited: wait })?;
        write_update(stdout, &update)?;
        if let Some(count) = remaining.get_mut(&update.target) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                remaining.remove(&update.target);
            }
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct UpdateLine<'a> {
    target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    position: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

fn write_update<W: Write>(stdout: &mut W, update: &PositionUpdate) -> Result<(), AppError> {
    let line = UpdateLine {
        target: update.target.to_string(),
        position: update.result.as_ref().ok().copied(),
        error: update.result.as_ref().err().map(String::as_str),
    };
    serde_json::to_writer(&mut *stdout, &line).map_err(AppError::Serialise)?;
    writeln!(stdout).map_err(AppError::Write)
}
