//! Line codec for the newline-delimited JSON transport.
//!
//! Classification is deliberately asymmetric. A line that parses as a
//! response envelope is a [`Response`]. A line that *looks* structured (it
//! starts with `{` and ends with `}`) but does not parse becomes an error
//! [`Response`], because a truncated or corrupted answer must still release
//! the caller waiting for it. Everything else, including valid JSON that is
//! not an envelope, is [`Inbound::Diagnostic`] text.


use serde_json::Value;

use crate::command::Command;
use crate::error::CodecError;
use crate::response::Response;

/// A classified line read from the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A protocol response, parsed or synthesised from a malformed line.
    Response(Response),
    /// Non-protocol text kept for logging only.
    Diagnostic(String),
}

impl Inbound {
    /// Returns the response, if this is one.
    #[must_use]
    pub const fn as_response(&self) -> Option<&Response> {
        match self {
            Self::Response(response) => Some(response),
            Self::Diagnostic(_) => None,
        }
    }
}

/// Encodes a command as a single newline-terminated line.
///
/// # Errors
///
/// Returns [`CodecError::NonPrimitiveArgument`] when an argument is an array
/// or object, and [`CodecError::Json`] if serialisation fails.
pub fn encode(command: &Command) -> Result<String, CodecError> {
    if let Some(index) = command.args().iter().position(is_compound) {
        return Err(CodecError::NonPrimitiveArgument {
            command: command.name().to_owned(),
            index,
        });
    }
    let mut line = serde_json::to_string(command)?;
    line.push('\n');
    Ok(line)
}

/// Classifies one line of worker output.
#[must_use]
pub fn classify(line: &str) -> Inbound {
    let text = line.trim();
    match serde_json::from_str::<Value>(text) {
        Ok(value @ Value::Object(_)) => match serde_json::from_value::<Response>(value) {
            Ok(response) => Inbound::Response(response),
            Err(_) => Inbound::Diagnostic(text.to_owned()),
        },
        Ok(_) => Inbound::Diagnostic(text.to_owned()),
        Err(_) if looks_structured(text) => Inbound::Response(Response::invalid_json(text)),
        Err(_) => Inbound::Diagnostic(text.to_owned()),
    }
}

/// Decodes a command line read by the worker.
///
/// # Errors
///
/// Returns [`CodecError::Json`] for text that is not JSON or has ill-typed
/// members, and [`CodecError::NotACommand`] for JSON lacking a `command`
/// member.
pub fn decode_command(line: &str) -> Result<Command, CodecError> {
    let value: Value = serde_json::from_str(line.trim())?;
    let is_command = value
        .as_object()
        .is_some_and(|object| object.contains_key("command"));
    if !is_command {
        return Err(CodecError::NotACommand);
    }
    Ok(serde_json::from_value(value)?)
}

fn looks_structured(text: &str) -> bool {
    text.starts_with('{') && text.ends_with('}')
}

const fn is_compound(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}
