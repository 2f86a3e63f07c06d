//! Response envelope written by the worker or synthesised by the host.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::RequestId;

/// Payload of a synthesised response when a call exceeds its bound.
pub const TIMEOUT_DATA: &str = "timeout";

/// Payload of a synthesised response when the worker is not running.
pub const UNAVAILABLE_DATA: &str = "unavailable";

/// Outcome carried by a [`Response`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The command completed.
    Success,
    /// The command failed; `data` describes why.
    Error,
}

/// The `{status, data}` envelope answering one command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    status: Status,
    #[serde(default)]
    data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<RequestId>,
}

impl Response {
    /// Successful response carrying `data`.
    #[must_use]
    pub fn success(data: impl Into<Value>) -> Self {
        Self {
            status: Status::Success,
            data: data.into(),
            id: None,
        }
    }

    /// Error response carrying `data`, usually a message string.
    #[must_use]
    pub fn error(data: impl Into<Value>) -> Self {
        Self {
            status: Status::Error,
            data: data.into(),
            id: None,
        }
    }

    /// Synthesised response for a call that ran out of time.
    #[must_use]
    pub fn timeout() -> Self {
        Self::error(TIMEOUT_DATA)
    }

    /// Synthesised response for a call made while the worker is down.
    #[must_use]
    pub fn unavailable() -> Self {
        Self::error(UNAVAILABLE_DATA)
    }

    /// Error response for a line that looked structured but did not parse.
    #[must_use]
    pub fn invalid_json(detail: impl std::fmt::Display) -> Self {
        Self::error(format!("Invalid JSON: {detail}"))
    }

    /// Attaches the identifier of the command being answered.
    #[must_use]
    pub const fn with_id(mut self, id: Option<RequestId>) -> Self {
        self.id = id;
        self
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> Status {
        self.status
    }

    /// Whether the status is [`Status::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, Status::Success)
    }

    /// Response payload.
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }

    /// Consumes the response, returning its payload.
    #[must_use]
    pub fn into_data(self) -> Value {
        self.data
    }

    /// Identifier echoed from the command, when present.
    #[must_use]
    pub const fn id(&self) -> Option<RequestId> {
        self.id
    }

    /// Whether this is the synthesised timeout response.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.is_error_with(TIMEOUT_DATA)
    }

    /// Whether this is the synthesised unavailable response.
    #[must_use]
    pub fn is_unavailable(&self) -> bool {
        self.is_error_with(UNAVAILABLE_DATA)
    }

    /// Renders the payload for log and error messages.
    ///
    /// Strings are returned without JSON quoting.
    #[must_use]
    pub fn message(&self) -> String {
        match &self.data {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }

    fn is_error_with(&self, marker: &str) -> bool {
        self.status == Status::Error && self.data.as_str() == Some(marker)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn synthesised_markers_are_recognised() {
        assert!(Response::timeout().is_timeout());
        assert!(Response::unavailable().is_unavailable());
        assert!(!Response::success(TIMEOUT_DATA).is_timeout());
        assert!(!Response::error("Move failed").is_unavailable());
    }

    #[rstest]
    #[case(Response::success(json!(["a", "b"])), r#"["a","b"]"#)]
    #[case(Response::error("Failed to get position"), "Failed to get position")]
    #[case(Response::success(1200), "1200")]
    fn message_renders_payload(#[case] response: Response, #[case] expected: &str) {
        assert_eq!(response.message(), expected);
    }

    #[rstest]
    fn missing_data_defaults_to_null() {
        let response: Response = serde_json::from_str(r#"{"status":"error"}"#).expect("parse");

        assert_eq!(response.data(), &Value::Null);
        assert_eq!(response.status(), Status::Error);
    }

    #[rstest]
    fn unknown_status_is_rejected() {
        let result = serde_json::from_str::<Response>(r#"{"status":"pending","data":1}"#);

        assert!(result.is_err());
    }
}
