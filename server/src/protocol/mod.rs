//! Protocol module for rqueue.
//!
//! Contains all protocol-related types, commands, responses, and serialization.
//!
//! # Framing
//! If the first byte of a connection is printable (`PUSH ...` or `{"cmd":...}`),
//! the connection speaks newline-delimited text. Otherwise it is binary mode:
//! length-prefixed MessagePack frames.

mod command;
mod error;
mod response;
mod types;

use serde::{Deserialize, Serialize};

pub use command::Command;
pub use error::ProtocolError;
pub use response::Response;
pub use types::{BlockTimeout, ConsumerId, Delivery, Job, JobId, Payload, QueueInfo, StatsData};

// ============== Binary Protocol Functions ==============

/// Serialize a value to MessagePack bytes (with named fields for interoperability)
#[inline]
pub fn serialize_msgpack<T: Serialize>(value: &T) -> Result<Vec<u8>, ProtocolError> {
    rmp_serde::to_vec_named(value).map_err(|e| ProtocolError::MsgPack(e.to_string()))
}

/// Deserialize a value from MessagePack bytes
#[inline]
pub fn deserialize_msgpack<'a, T: Deserialize<'a>>(bytes: &'a [u8]) -> Result<T, ProtocolError> {
    rmp_serde::from_slice(bytes).map_err(|e| ProtocolError::MsgPack(e.to_string()))
}

/// Create a length-prefixed binary frame
#[inline]
pub fn create_binary_frame(data: &[u8]) -> Vec<u8> {
    let len = data.len() as u32;
    let mut frame = Vec::with_capacity(4 + data.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(data);
    frame
}

/// Check if the first byte of a connection selects the text protocol
#[inline]
pub fn is_text_protocol(first_byte: u8) -> bool {
    first_byte.is_ascii_graphic() || first_byte.is_ascii_whitespace()
}

// ============== Request/Response Wrappers ==============

/// Request wrapper with optional request ID for multiplexing
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    /// Optional request ID for response matching (multiplexing)
    #[serde(default, rename = "reqId")]
    pub req_id: Option<String>,
    /// The actual command
    #[serde(flatten)]
    pub command: Command,
}

impl Request {
    /// Parse one text-protocol line: a JSON object or an inline command.
    pub fn parse_line(line: &str) -> Result<Request, ProtocolError> {
        let line = line.trim();
        if line.starts_with('{') {
            serde_json::from_str(line).map_err(|e| ProtocolError::Json(e.to_string()))
        } else {
            Ok(Request {
                req_id: None,
                command: Command::parse_inline(line)?,
            })
        }
    }
}

/// Response wrapper that includes the request ID if provided
#[derive(Debug, Serialize)]
pub struct ResponseWithId {
    /// Echo back the request ID for client matching
    #[serde(rename = "reqId", skip_serializing_if = "Option::is_none")]
    pub req_id: Option<String>,
    /// The actual response
    #[serde(flatten)]
    pub response: Response,
}

impl ResponseWithId {
    #[inline(always)]
    pub fn new(response: Response, req_id: Option<String>) -> Self {
        Self { req_id, response }
    }
}
