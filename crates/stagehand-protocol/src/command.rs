//! Command envelope written by the host.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier correlating a [`Command`] with the [`Response`](crate::Response)
/// that answers it.
pub type RequestId = u64;

/// Monotonic request identifier source.
///
/// Each RPC client owns one generator so identifiers are unique per worker
/// connection without any process-wide state.
#[derive(Debug)]
pub struct RequestIds {
    next: AtomicU64,
}

impl RequestIds {
    /// Creates a generator whose first identifier is `1`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    /// Returns the next identifier.
    #[must_use]
    pub fn next_id(&self) -> RequestId {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RequestIds {
    fn default() -> Self {
        Self::new()
    }
}

/// A named command with positional arguments.
///
/// Serialised as `{"command": <name>, "args": [...], "id": <n>}`; the `id`
/// member is omitted when unset so workers without id support see the plain shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    #[serde(rename = "command")]
    name: String,
    #[serde(default)]
    args: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
}

impl Command {
    /// Creates a command without a correlation identifier.
    #[must_use]
    pub fn new(name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            args,
            id: None,
        }
    }

    /// Attaches a correlation identifier.
    #[must_use]
    pub const fn with_id(mut self, id: RequestId) -> Self {
        self.id = Some(id);
        self
    }

    /// Command name.
    #[must_use]
    pub const fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Positional arguments.
    #[must_use]
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Correlation identifier, when present.
    #[must_use]
    pub const fn id(&self) -> Option<RequestId> {
        self.id
    }
}
