//! Pluggable frame serialization.
//!
//! Envelopes cross the transport as opaque byte frames. The [`MessageCodec`]
//! trait decides how envelopes become frames and back; [`JsonCodec`] is the
//! default and matches the shape web peers post to each other.
//!
//! # Example
//!
//! ```rust
//! use postwire_core::{JsonCodec, MessageCodec, RequestEnvelope};
//! use serde_json::json;
//!
//! let codec = JsonCodec;
//! let request = RequestEnvelope::new("greet", "1", json!("world"));
//!
//! let frame = codec.encode(&request).unwrap();
//! let decoded: RequestEnvelope = codec.decode(&frame).unwrap();
//! assert_eq!(decoded, request);
//! ```

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Error type for codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Failed to encode a value into a frame.
    #[error("encode error: {0}")]
    Encode(Box<dyn std::error::Error + Send + Sync>),

    /// Failed to decode a frame into a value.
    #[error("decode error: {0}")]
    Decode(Box<dyn std::error::Error + Send + Sync>),
}

/// Frame serialization format used by hosts and clients.
///
/// Codecs are cloned into every host and client, so they should be cheap to
/// clone (usually a unit struct).
///
/// Payloads are `serde_json::Value`, so a codec must be self-describing on
/// the decode side. Binary formats such as postcard cannot round-trip them.
pub trait MessageCodec: Clone + 'static {
    /// Encode a serializable value to a frame.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError>;

    /// Decode a frame into a value.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Decode`] if the frame is malformed or does not
    /// have the shape of `T`.
    fn decode<T: DeserializeOwned>(&self, frame: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec using serde_json.
#[derive(Clone, Default, Debug, Copy)]
pub struct JsonCodec;

impl MessageCodec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode(Box::new(e)))
    }

    fn decode<T: DeserializeOwned>(&self, frame: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(frame).map_err(|e| CodecError::Decode(Box::new(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RequestEnvelope, ResponseEnvelope};
    use serde_json::json;

    #[test]
    fn test_json_codec_request_frame_shape() {
        let codec = JsonCodec;
        let request = RequestEnvelope::new("a", "1", json!("foo"));

        let frame = codec.encode(&request).expect("encode should succeed");
        let raw: serde_json::Value = serde_json::from_slice(&frame).expect("valid json");

        assert_eq!(raw, json!({"path": "a", "id": "1", "body": "foo"}));
    }

    #[test]
    fn test_json_codec_decode_error() {
        let codec = JsonCodec;

        let result: Result<ResponseEnvelope, CodecError> = codec.decode(b"not valid json {");
        let err = result.expect_err("garbage must not decode");

        assert!(matches!(err, CodecError::Decode(_)));
        assert!(err.to_string().contains("decode error"));
    }

    #[test]
    fn test_json_codec_wrong_shape_is_decode_error() {
        let codec = JsonCodec;

        // A response frame is not a request frame.
        let result: Result<RequestEnvelope, CodecError> =
            codec.decode(br#"{"id":"1","completed":true}"#);

        assert!(matches!(result, Err(CodecError::Decode(_))));
    }

    #[test]
    fn test_codec_error_display() {
        let encode_err = CodecError::Encode(Box::new(std::io::Error::other("boom")));
        assert_eq!(encode_err.to_string(), "encode error: boom");

        let decode_err = CodecError::Decode(Box::new(std::io::Error::other("bad")));
        assert_eq!(decode_err.to_string(), "decode error: bad");
    }
}
