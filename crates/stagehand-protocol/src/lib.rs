//! Wire protocol spoken between the Stagehand host and its worker process.
//!
//! The protocol is newline-delimited JSON over the worker's standard streams.
//! The host writes one [`Command`] per line to the worker's stdin; the worker
//! answers each with exactly one [`Response`] line on stdout. Anything else the
//! worker prints (startup banners, stray driver output) is diagnostic text and
//! is classified as such by [`classify`] so it can never be mistaken for an
//! answer.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use stagehand_protocol::{Command, Inbound, classify, encode};
//!
//! let command = Command::new("get_position", vec![json!("97251312"), json!(1)]);
//! let line = encode(&command).expect("primitive arguments encode");
//! assert!(line.ends_with('\n'));
//!
//! match classify(r#"{"status":"success","data":1200}"#) {
//!     Inbound::Response(response) => assert!(response.is_success()),
//!     Inbound::Diagnostic(text) => panic!("unexpected diagnostic: {text}"),
//! }
//! ```

pub mod codec;
mod command;
pub mod commands;
mod error;
mod response;

pub use codec::{Inbound, classify, decode_command, encode};
pub use command::{Command, RequestId, RequestIds};
pub use error::CodecError;
pub use response::{Response, Status, TIMEOUT_DATA, UNAVAILABLE_DATA};
