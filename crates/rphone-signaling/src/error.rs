//! Signaling-layer error taxonomy.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SignalingError {
    /// A constructor would have produced a packet over the JSON size
    /// budget (spec.md §3/§6: 436 bytes). The packet is never built or
    /// sent.
    #[error("message too large: {size} bytes, limit is {limit}")]
    MessageTooLarge { size: usize, limit: usize },

    /// The wire bytes were not valid UTF-8 JSON at all.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// `type` was missing or not one of the accepted values.
    #[error("unknown or missing message type: {0:?}")]
    UnknownType(Option<String>),

    /// A field required for this message's `type` was absent.
    #[error("missing required field {field:?} for message type {msg_type}")]
    MissingField {
        msg_type: &'static str,
        field: &'static str,
    },

    /// A present field did not parse into its expected shape (e.g.
    /// `call_dest` not 64 hex characters, `codec_type` not recognized).
    #[error("invalid value for field {field:?}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: String,
    },
}
