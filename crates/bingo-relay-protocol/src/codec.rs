//! Codec trait and the JSON implementation.
//!
//! The relay speaks textual frames, so a codec turns messages into `String`s
//! and back. Decoding a client frame is a two-step affair: the `type` tag is
//! read first so that an unknown type can be told apart from a known type
//! with bad fields.

use serde::{Serialize, de::DeserializeOwned};

use crate::{ClientMessage, ProtocolError};

/// Encodes messages to text frames and decodes them back.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into a text frame.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes a text frame into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the text is malformed or does not
    /// match the expected shape.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;

    /// Decodes an inbound client frame.
    ///
    /// # Errors
    /// - `ProtocolError::UnknownType`: the `type` tag is not a client message
    /// - `ProtocolError::InvalidMessage`: there is no string `type` tag
    /// - `ProtocolError::Decode`: not JSON, or required fields are missing
    ///   or ill-typed
    fn decode_client(&self, text: &str) -> Result<ClientMessage, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ```rust
/// use bingo_relay_protocol::{ClientMessage, Codec, JsonCodec, ServerMessage};
///
/// let codec = JsonCodec;
/// let ping = codec.decode_client(r#"{"type":"ping"}"#).unwrap();
/// assert_eq!(ping, ClientMessage::Ping);
///
/// let text = codec.encode(&ServerMessage::Pong).unwrap();
/// assert_eq!(text, r#"{"type":"pong"}"#);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }

    fn decode_client(&self, text: &str) -> Result<ClientMessage, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_str(text).map_err(ProtocolError::Decode)?;

        let kind = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ProtocolError::InvalidMessage("missing string `type` field".into()))?;

        if !ClientMessage::TYPES.contains(&kind) {
            return Err(ProtocolError::UnknownType(kind.to_owned()));
        }

        serde_json::from_value(value).map_err(ProtocolError::Decode)
    }
}
