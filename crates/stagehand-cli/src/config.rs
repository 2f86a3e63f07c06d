//! Configuration loading for the front end.
//!
//! Flags understood by `ortho_config` must come before the subcommand. They
//! are split off here so clap only sees the subcommand tokens, and the same
//! flags are later forwarded to the worker.

use std::ffi::{OsStr, OsString};

use stagehand_config::{Config, OrthoConfig};

use crate::errors::AppError;

/// Flags owned by the configuration loader.
///
/// Keep in sync with the fields of [`Config`] that make sense per invocation.
pub(crate) const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--log-filter",
    "--log-format",
    "--worker-command",
    "--settle-ms",
    "--call-timeout-ms",
    "--shutdown-call-timeout-ms",
    "--grace-period-ms",
    "--terminate-grace-ms",
    "--poll-period-ms",
    "--poll-timeout-ms",
];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the program name plus configuration flags.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Include { needs_value: bool },
    Stop,
}

fn classify_flag(argument: &OsStr) -> FlagAction {
    let text = argument.to_string_lossy();
    if !text.starts_with("--") {
        return FlagAction::Stop;
    }
    let (flag, inline_value) = match text.split_once('=') {
        Some((flag, _)) => (flag, true),
        None => (text.as_ref(), false),
    };
    if CONFIG_CLI_FLAGS.contains(&flag) {
        FlagAction::Include {
            needs_value: !inline_value,
        }
    } else {
        FlagAction::Stop
    }
}

/// Leading configuration flags separated from the subcommand tokens.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    /// Program name followed by the configuration flags.
    pub(crate) config_arguments: Vec<OsString>,
    /// Program name followed by everything after the configuration flags.
    pub(crate) command_arguments: Vec<OsString>,
}

impl ConfigArgumentSplit {
    /// Configuration flags without the program name, as UTF-8 strings.
    pub(crate) fn forwarded(&self) -> Vec<String> {
        self.config_arguments
            .iter()
            .skip(1)
            .map(|argument| argument.to_string_lossy().into_owned())
            .collect()
    }
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut remaining = args.iter();
    let Some(program) = remaining.next() else {
        return ConfigArgumentSplit::default();
    };

    let mut config_arguments = vec![program.clone()];
    let mut command_arguments = vec![program.clone()];
    let mut pending_value = false;
    for argument in remaining.by_ref() {
        if pending_value {
            config_arguments.push(argument.clone());
            pending_value = false;
            continue;
        }
        match classify_flag(argument) {
            FlagAction::Include { needs_value } => {
                config_arguments.push(argument.clone());
                pending_value = needs_value;
            }
            FlagAction::Stop => {
                command_arguments.push(argument.clone());
                break;
            }
        }
    }
    command_arguments.extend(remaining.cloned());

    ConfigArgumentSplit {
        config_arguments,
        command_arguments,
    }
}
