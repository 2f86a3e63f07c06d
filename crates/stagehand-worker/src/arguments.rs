//! Typed argument parsing for worker commands.
//!
//! Arguments arrive as a positional list of JSON primitives. Integers are
//! accepted as JSON numbers or numeric strings, and device identifiers as
//! strings or numbers, since front ends differ in how they send serial
//! numbers.

use serde_json::Value;
use thiserror::Error;

use crate::provider::CHANNEL_RANGE;

/// Errors raised while parsing command arguments.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgumentError {
    /// Wrong number of arguments.
    #[error("{command} expects {expected} argument(s), got {actual}")]
    Count {
        /// Command name.
        command: String,
        /// Required argument count.
        expected: usize,
        /// Supplied argument count.
        actual: usize,
    },

    /// An argument had the wrong type.
    #[error("argument {index} of {command} must be {expected}")]
    Type {
        /// Command name.
        command: String,
        /// Zero-based argument position.
        index: usize,
        /// Description of the accepted type.
        expected: &'static str,
    },

    /// A channel number outside the supported range.
    #[error("Invalid channel: {channel}. Must be 1-4.")]
    Channel {
        /// The rejected channel number.
        channel: i64,
    },

    /// A jog direction other than +1 or -1.
    #[error("Invalid direction: {direction}. Must be 1 or -1.")]
    Direction {
        /// The rejected direction.
        direction: i64,
    },
}

/// A device and one of its channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelArgs {
    /// Device identifier.
    pub device: String,
    /// Channel number.
    pub channel: u8,
}

/// Arguments of `move_to`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MoveArgs {
    /// Target channel.
    pub target: ChannelArgs,
    /// Absolute position.
    pub position: i64,
}

/// Arguments of `jog`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JogArgs {
    /// Target channel.
    pub target: ChannelArgs,
    /// `1` for forward, `-1` for reverse.
    pub direction: i64,
    /// Steps to move.
    pub step_size: i64,
}

/// Positional argument reader for one command.
pub(crate) struct Arguments<'a> {
    command: &'a str,
    values: &'a [Value],
}

impl<'a> Arguments<'a> {
    pub(crate) const fn new(command: &'a str, values: &'a [Value]) -> Self {
        Self { command, values }
    }

    /// Fails unless exactly `expected` arguments were supplied.
    pub(crate) fn expect_count(&self, expected: usize) -> Result<(), ArgumentError> {
        if self.values.len() == expected {
            Ok(())
        } else {
            Err(ArgumentError::Count {
                command: self.command.to_owned(),
                expected,
                actual: self.values.len(),
            })
        }
    }

    /// Reads a device identifier.
    pub(crate) fn device(&self, index: usize) -> Result<String, ArgumentError> {
        match self.values.get(index) {
            Some(Value::String(text)) if !text.trim().is_empty() => Ok(text.trim().to_owned()),
            Some(Value::Number(number)) => Ok(number.to_string()),
            _ => Err(self.type_error(index, "a device identifier")),
        }
    }

    /// Reads an integer.
    pub(crate) fn integer(&self, index: usize) -> Result<i64, ArgumentError> {
        let parsed = match self.values.get(index) {
            Some(Value::Number(number)) => number.as_i64(),
            Some(Value::String(text)) => text.trim().parse().ok(),
            _ => None,
        };
        parsed.ok_or_else(|| self.type_error(index, "an integer"))
    }

    /// Reads a channel number in the supported range.
    pub(crate) fn channel(&self, index: usize) -> Result<u8, ArgumentError> {
        let channel = self.integer(index)?;
        u8::try_from(channel)
            .ok()
            .filter(|value| CHANNEL_RANGE.contains(value))
            .ok_or(ArgumentError::Channel { channel })
    }

    fn type_error(&self, index: usize, expected: &'static str) -> ArgumentError {
        ArgumentError::Type {
            command: self.command.to_owned(),
            index,
            expected,
        }
    }
}

impl ChannelArgs {
    /// Parses `[device, channel]`.
    ///
    /// # Errors
    ///
    /// Returns an error for a wrong argument count, a bad device identifier,
    /// or a channel outside `1..=4`.
    pub fn parse(command: &str, values: &[Value]) -> Result<Self, ArgumentError> {
        let arguments = Arguments::new(command, values);
        arguments.expect_count(2)?;
        Self::read(&arguments)
    }

    fn read(arguments: &Arguments<'_>) -> Result<Self, ArgumentError> {
        Ok(Self {
            device: arguments.device(0)?,
            channel: arguments.channel(1)?,
        })
    }
}

impl MoveArgs {
    /// Parses `[device, channel, position]`.
    ///
    /// # Errors
    ///
    /// Returns an error for a wrong argument count or an ill-typed argument.
    pub fn parse(command: &str, values: &[Value]) -> Result<Self, ArgumentError> {
        let arguments = Arguments::new(command, values);
        arguments.expect_count(3)?;
        Ok(Self {
            target: ChannelArgs::read(&arguments)?,
            position: arguments.integer(2)?,
        })
    }
}

impl JogArgs {
    /// Parses `[device, channel, direction, step_size]`.
    ///
    /// # Errors
    ///
    /// Returns an error for a wrong argument count, an ill-typed argument, or
    /// a direction other than `1` or `-1`.
    pub fn parse(command: &str, values: &[Value]) -> Result<Self, ArgumentError> {
        let arguments = Arguments::new(command, values);
        arguments.expect_count(4)?;
        let target = ChannelArgs::read(&arguments)?;
        let direction = arguments.integer(2)?;
        if direction != 1 && direction != -1 {
            return Err(ArgumentError::Direction { direction });
        }
        Ok(Self {
            target,
            direction,
            step_size: arguments.integer(3)?,
        })
    }
}

/// Parses `[device]`.
///
/// # Errors
///
/// Returns an error for a wrong argument count or a bad device identifier.
pub fn parse_device(command: &str, values: &[Value]) -> Result<String, ArgumentError> {
    let arguments = Arguments::new(command, values);
    arguments.expect_count(1)?;
    arguments.device(0)
}

/// Fails unless `values` is empty.
///
/// # Errors
///
/// Returns [`ArgumentError::Count`] when arguments were supplied.
pub fn expect_no_arguments(command: &str, values: &[Value]) -> Result<(), ArgumentError> {
    Arguments::new(command, values).expect_count(0)
}
