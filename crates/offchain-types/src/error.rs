//! The off-chain error taxonomy.
//!
//! Errors travel in two shapes: embedded in a failure `CommandResponse` on
//! the inbound path, or raised locally as [`Error`] on the outbound path.
//! The wire object distinguishes `command_error` (the command could not be
//! applied: validation, illegal transition, missing fields) from
//! `protocol_error` (the envelope itself is broken: signature, malformed
//! JSON, missing headers).

use serde::{Deserialize, Serialize};
use std::fmt;

/// Whether the failure is about the command or the carrying protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The command failed to apply: validation or transition errors.
    CommandError,
    /// A failure at the envelope/transport layer of the protocol.
    ProtocolError,
}

/// Well-known error codes.
pub mod codes {
    pub const INVALID_REQUEST: &str = "invalid-request";
}

/// The structured error object embedded in failure responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffChainError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub code: String,
    /// The field this error occurred on, when attributable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl fmt::Display for OffChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            ErrorKind::CommandError => "command_error",
            ErrorKind::ProtocolError => "protocol_error",
        };
        write!(f, "{kind}/{}", self.code)?;
        if let Some(field) = &self.field {
            write!(f, " on {field}")?;
        }
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        Ok(())
    }
}

/// A local failure carrying the wire error that describes it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{object}")]
pub struct Error {
    pub object: OffChainError,
}

impl Error {
    pub fn command(
        code: impl Into<String>,
        field: Option<String>,
        message: Option<String>,
    ) -> Self {
        Error {
            object: OffChainError {
                kind: ErrorKind::CommandError,
                code: code.into(),
                field,
                message,
            },
        }
    }

    pub fn protocol(
        code: impl Into<String>,
        field: Option<String>,
        message: Option<String>,
    ) -> Self {
        Error {
            object: OffChainError {
                kind: ErrorKind::ProtocolError,
                code: code.into(),
                field,
                message,
            },
        }
    }

    /// The catch-all command error for inbound requests that fail validation.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Error::command(codes::INVALID_REQUEST, None, Some(message.into()))
    }

    /// Same code, attributed to a specific field.
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::command(
            codes::INVALID_REQUEST,
            Some(field.into()),
            Some(message.into()),
        )
    }
}
