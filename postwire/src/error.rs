//! Error types for hosts and clients.

use crate::{CodecError, RemoteError, TransportError};

/// Errors surfaced by a call's result stream.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    /// The remote handler failed; carries its error unchanged.
    #[error("remote handler failed: {0}")]
    Remote(#[from] RemoteError),

    /// The request could not be handed to the transport.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request could not be encoded.
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    /// A produced value did not have the expected type.
    #[error("response body did not decode: {message}")]
    Decode {
        /// Details about the mismatch.
        message: String,
    },

    /// The response stream ended before a terminal response arrived.
    #[error("response stream ended before the call completed")]
    Disconnected,
}

impl CallError {
    /// The remote error, if the handler failed.
    pub fn as_remote(&self) -> Option<&RemoteError> {
        match self {
            CallError::Remote(error) => Some(error),
            _ => None,
        }
    }
}

/// Misuse of a host's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostError {
    /// `listen` was called twice.
    #[error("host is already listening")]
    AlreadyListening,

    /// The host was disposed and cannot listen again.
    #[error("host has been disposed")]
    Disposed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_error_is_not_wrapped() {
        let original = RemoteError::new("boom");
        let error = CallError::from(original.clone());

        assert_eq!(error.as_remote(), Some(&original));
        assert_eq!(error.to_string(), "remote handler failed: Error: boom");
    }

    #[test]
    fn test_non_remote_errors() {
        assert!(CallError::Disconnected.as_remote().is_none());
        assert_eq!(
            CallError::from(TransportError::Closed).to_string(),
            "transport error: transport closed"
        );
        assert_eq!(
            HostError::AlreadyListening.to_string(),
            "host is already listening"
        );
    }
}
