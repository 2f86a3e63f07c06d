//! Codec failures.

use thiserror::Error;

/// Errors raised while encoding or decoding protocol lines.
#[derive(Debug, Error)]
pub enum CodecError {
    /// A command argument was an array or object.
    #[error("argument {index} of '{command}' is not a primitive value")]
    NonPrimitiveArgument {
        /// Command name.
        command: String,
        /// Zero-based argument position.
        index: usize,
    },

    /// The line was not valid JSON.
    #[error("{0}")]
    Json(#[from] serde_json::Error),

    /// The line was JSON but not a command envelope.
    #[error("expected a JSON object with a 'command' member")]
    NotACommand,
}
