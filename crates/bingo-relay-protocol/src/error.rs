//! Error types for the protocol layer.
//!
//! Decoding distinguishes two client mistakes because they are reported
//! differently: a `type` the server has never heard of, and a known `type`
//! whose fields are missing or ill-typed.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// The frame is not JSON, or a known message has missing or
    /// ill-typed fields.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame is JSON but its `type` tag is not a known client message.
    #[error("unknown message type: {0}")]
    UnknownType(String),

    /// The message is invalid at the protocol level (e.g. no `type` tag).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
