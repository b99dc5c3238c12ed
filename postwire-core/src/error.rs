//! Error types shared by hosts, clients and transports.

use serde::{Deserialize, Serialize};

use crate::envelope::Payload;

/// Error value produced by a remote handler.
///
/// Travels inside an error response and reaches the caller as-is: the client
/// never wraps or translates it. The shape mirrors a thrown error object
/// (`name` + `message`) with optional structured `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{name}: {message}")]
pub struct RemoteError {
    /// Error class, `"Error"` unless the handler says otherwise.
    #[serde(default = "default_name")]
    pub name: String,

    /// Human-readable description.
    #[serde(default)]
    pub message: String,

    /// Optional structured details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
}

fn default_name() -> String {
    RemoteError::DEFAULT_NAME.to_string()
}

impl RemoteError {
    /// Name used when a handler gives none.
    pub const DEFAULT_NAME: &'static str = "Error";

    /// Name of the error sent when a host cancels an execution explicitly.
    pub const CANCELLED: &'static str = "CancelledError";

    /// Name of the error sent when a handler panics.
    pub const PANICKED: &'static str = "PanicError";

    /// Name of the error sent when a request body has the wrong shape.
    pub const INVALID_BODY: &'static str = "InvalidBodyError";

    /// Name of the error sent when a produced value cannot be serialized.
    pub const INVALID_VALUE: &'static str = "InvalidValueError";

    /// Plain error with the default name.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            name: default_name(),
            message: message.into(),
            data: None,
        }
    }

    /// Replace the error name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attach structured details.
    pub fn with_data(mut self, data: Payload) -> Self {
        self.data = Some(data);
        self
    }

    /// Terminal error for an execution cancelled through the termination signal.
    pub fn cancelled(id: &str) -> Self {
        Self::new(format!("call {id} was cancelled")).with_name(Self::CANCELLED)
    }

    /// Error for a handler that panicked while running.
    pub fn panicked(message: impl Into<String>) -> Self {
        Self::new(message).with_name(Self::PANICKED)
    }

    /// Error for a request body that does not match the handler's input type.
    pub fn invalid_body(error: impl std::fmt::Display) -> Self {
        Self::new(error.to_string()).with_name(Self::INVALID_BODY)
    }

    /// Error for a handler value that cannot be turned into a payload.
    pub fn invalid_value(error: impl std::fmt::Display) -> Self {
        Self::new(error.to_string()).with_name(Self::INVALID_VALUE)
    }
}

/// Failure of a transport's send or respond primitive.
///
/// The protocol core reports these and never retries; whether to retry or
/// drop is the transport's decision.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The channel is gone (port disconnected, worker terminated, ...).
    #[error("transport closed")]
    Closed,

    /// The transport refused the frame.
    #[error("transport rejected frame: {message}")]
    Rejected {
        /// Why the frame was refused.
        message: String,
    },
}
