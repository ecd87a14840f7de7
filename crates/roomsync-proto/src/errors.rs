//! Codec error types.

use thiserror::Error;

/// Result alias for codec operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while encoding or strictly decoding channel messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Text is not a JSON object with a string `t` field
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope tag names no known command
    #[error("unknown command tag: {0}")]
    UnknownTag(String),

    /// Payload does not match the shape the tag requires
    #[error("invalid payload for {tag}: {reason}")]
    InvalidPayload {
        /// Tag of the offending message
        tag: &'static str,
        /// Decoder message
        reason: String,
    },

    /// Serialization failed
    #[error("failed to encode {tag}: {reason}")]
    Encode {
        /// Tag of the command being encoded
        tag: &'static str,
        /// Encoder message
        reason: String,
    },
}

impl ProtocolError {
    /// Returns true if the message came from a peer speaking a newer or
    /// different dialect rather than a broken one.
    ///
    /// Unknown tags are expected during rolling upgrades and are surfaced to
    /// the application, never treated as a protocol violation.
    pub fn is_forward_compatible(&self) -> bool {
        matches!(self, Self::UnknownTag(_))
    }
}
