//! Wire envelopes exchanged between peers.
//!
//! A call is one [`RequestEnvelope`] followed by a run of [`ResponseEnvelope`]s
//! sharing its `id`: zero or more `Data` responses, then exactly one terminal
//! (`Complete` or `Error`).
//!
//! Responses keep the flat wire shape web peers expect:
//!
//! ```text
//! { "id": "7", "completed": false, "body": ... }    // Data
//! { "id": "7", "completed": true }                  // Complete
//! { "id": "7", "completed": true, "error": {...} }  // Error
//! ```
//!
//! Frames that do not fit this shape fail to deserialize. Hosts and clients
//! treat that as a protocol violation and drop the frame.

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::RemoteError;

/// Opaque request and response body.
pub type Payload = serde_json::Value;

/// A request for the handlers registered on `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    /// Selects the handler(s) on the remote host.
    pub path: String,

    /// Correlation id chosen by the caller.
    ///
    /// Must be unique among the calls in flight on one client.
    pub id: String,

    /// Request payload.
    pub body: Payload,
}

impl RequestEnvelope {
    /// Create a request envelope.
    pub fn new(path: impl Into<String>, id: impl Into<String>, body: Payload) -> Self {
        Self {
            path: path.into(),
            id: id.into(),
            body,
        }
    }
}

/// One response for a call, keyed by the call's correlation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireResponse", into = "WireResponse")]
pub enum ResponseEnvelope {
    /// One value produced by a handler.
    Data {
        /// Correlation id of the call.
        id: String,
        /// The produced value.
        body: Payload,
    },

    /// The handler finished normally. Terminal.
    Complete {
        /// Correlation id of the call.
        id: String,
    },

    /// The handler failed. Terminal.
    Error {
        /// Correlation id of the call.
        id: String,
        /// The error the handler produced, unchanged.
        error: RemoteError,
    },
}

impl ResponseEnvelope {
    /// Data response carrying `body`.
    pub fn data(id: impl Into<String>, body: Payload) -> Self {
        Self::Data {
            id: id.into(),
            body,
        }
    }

    /// Completion response.
    pub fn complete(id: impl Into<String>) -> Self {
        Self::Complete { id: id.into() }
    }

    /// Error response.
    pub fn error(id: impl Into<String>, error: RemoteError) -> Self {
        ResponseEnvelope::Error {
            id: id.into(),
            error,
        }
    }

    /// Correlation id of the call this response belongs to.
    pub fn id(&self) -> &str {
        match self {
            Self::Data { id, .. }
            | Self::Complete { id }
            | ResponseEnvelope::Error { id, .. } => id,
        }
    }

    /// Whether no further response may follow for this id.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Data { .. })
    }
}

/// Flat on-the-wire form of [`ResponseEnvelope`].
#[derive(Serialize, Deserialize)]
struct WireResponse {
    id: String,
    completed: bool,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    body: Option<Payload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<RemoteError>,
}

/// Keeps an explicit `"body": null` distinct from a missing body.
fn present<'de, D>(deserializer: D) -> Result<Option<Payload>, D::Error>
where
    D: Deserializer<'de>,
{
    Payload::deserialize(deserializer).map(Some)
}

impl From<ResponseEnvelope> for WireResponse {
    fn from(envelope: ResponseEnvelope) -> Self {
        match envelope {
            ResponseEnvelope::Data { id, body } => Self {
                id,
                completed: false,
                body: Some(body),
                error: None,
            },
            ResponseEnvelope::Complete { id } => Self {
                id,
                completed: true,
                body: None,
                error: None,
            },
            ResponseEnvelope::Error { id, error } => Self {
                id,
                completed: true,
                body: None,
                error: Some(error),
            },
        }
    }
}

impl TryFrom<WireResponse> for ResponseEnvelope {
    type Error = String;

    fn try_from(wire: WireResponse) -> Result<Self, String> {
        match (wire.completed, wire.body, wire.error) {
            (false, Some(body), None) => Ok(Self::Data { id: wire.id, body }),
            (false, None, _) => Err(format!("data response {} has no body", wire.id)),
            (false, Some(_), Some(_)) => Err(format!(
                "response {} carries an error but is not completed",
                wire.id
            )),
            (true, _, Some(error)) => Ok(ResponseEnvelope::Error { id: wire.id, error }),
            // A body on a completion is ignored; completions carry no value.
            (true, _, None) => Ok(Self::Complete { id: wire.id }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(envelope: &ResponseEnvelope) -> serde_json::Value {
        serde_json::to_value(envelope).expect("serialize")
    }

    fn parse(value: serde_json::Value) -> Result<ResponseEnvelope, serde_json::Error> {
        serde_json::from_value(value)
    }

    #[test]
    fn test_data_wire_shape() {
        let envelope = ResponseEnvelope::data("1", json!("aListener"));
        assert_eq!(
            wire(&envelope),
            json!({"id": "1", "completed": false, "body": "aListener"})
        );
    }

    #[test]
    fn test_complete_wire_shape_has_no_body() {
        let envelope = ResponseEnvelope::complete("1");
        assert_eq!(wire(&envelope), json!({"id": "1", "completed": true}));
    }

    #[test]
    fn test_error_wire_shape() {
        let envelope = ResponseEnvelope::error("5", RemoteError::new("boom"));
        assert_eq!(
            wire(&envelope),
            json!({
                "id": "5",
                "completed": true,
                "error": {"name": "Error", "message": "boom"}
            })
        );
    }

    #[test]
    fn test_null_body_is_still_data() {
        let envelope = parse(json!({"id": "3", "completed": false, "body": null}))
            .expect("null body is a value");
        assert_eq!(envelope, ResponseEnvelope::data("3", json!(null)));
    }

    #[test]
    fn test_missing_body_is_rejected() {
        let result = parse(json!({"id": "3", "completed": false}));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let result = parse(json!({"completed": true}));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_completed_is_rejected() {
        let result = parse(json!({"id": "3", "body": 1}));
        assert!(result.is_err());
    }

    #[test]
    fn test_error_without_completed_is_rejected() {
        let result = parse(json!({
            "id": "3",
            "completed": false,
            "body": 1,
            "error": {"message": "x"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_terminal_classification() {
        assert!(!ResponseEnvelope::data("1", json!(1)).is_terminal());
        assert!(ResponseEnvelope::complete("1").is_terminal());
        assert!(ResponseEnvelope::error("1", RemoteError::new("x")).is_terminal());
        assert_eq!(ResponseEnvelope::complete("42").id(), "42");
    }

    #[test]
    fn test_request_missing_path_is_rejected() {
        let result: Result<RequestEnvelope, _> =
            serde_json::from_value(json!({"id": "1", "body": "foo"}));
        assert!(result.is_err());
    }
}
