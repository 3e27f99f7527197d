//! Canonical JSON wire encoding and the typed constructors.
//!
//! Encoding rules (spec.md §4.1/§6): fields are omitted when absent, the
//! parser accepts any field ordering, unknown fields are ignored for
//! forward compatibility, and a missing required field for the message's
//! `type` is a parse failure — the packet is dropped, never half-handled.
//!
//! Public keys are never carried here; recipients resolve them from the
//! peer directory populated by prior announces, which is what keeps the
//! JSON payload inside the 436-byte target (spec.md §3, §6).

use rphone_identity::NodeId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SignalingError;
use crate::message::{CallMessage, CodecPref, CodecType, Envelope};

/// Encrypted-packet size budget is 500 bytes on all interfaces; after the
/// transport's ~64-byte encryption overhead the JSON target is 436 bytes.
pub const MAX_JSON_BYTES: usize = 436;

#[derive(Serialize, Deserialize)]
struct WireRepr {
    #[serde(rename = "type")]
    type_: String,
    call_id: Uuid,
    from: String,
    to: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_dest: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    codec_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    codec_bitrate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<u64>,
}

fn parse_call_dest(s: &str) -> Result<[u8; 32], SignalingError> {
    let bytes = hex::decode(s).map_err(|_| SignalingError::InvalidField {
        field: "call_dest",
        reason: "not valid hex".to_string(),
    })?;
    bytes.try_into().map_err(|_| SignalingError::InvalidField {
        field: "call_dest",
        reason: "expected 32 bytes".to_string(),
    })
}

/// Parse a wire packet (the JSON payload after transport decryption).
///
/// Drops (returns `Err`) on malformed JSON, an unrecognized `type`, or a
/// missing required field for that `type` — callers log at `WARN` and
/// discard the packet, per spec.md §7.
pub fn parse(bytes: &[u8]) -> Result<CallMessage, SignalingError> {
    let raw: WireRepr =
        serde_json::from_slice(bytes).map_err(|e| SignalingError::Malformed(e.to_string()))?;

    let from: NodeId = raw
        .from
        .parse()
        .map_err(|_| SignalingError::InvalidField {
            field: "from",
            reason: "not a valid node_id".to_string(),
        })?;
    let to: NodeId = raw.to.parse().map_err(|_| SignalingError::InvalidField {
        field: "to",
        reason: "not a valid node_id".to_string(),
    })?;

    let envelope = Envelope {
        call_id: raw.call_id,
        from,
        to,
        timestamp: raw.timestamp,
    };

    let msg_type = raw.type_.as_str();

    let require_codec = |msg_type: &'static str| -> Result<CodecPref, SignalingError> {
        let codec_type_str = raw
            .codec_type
            .as_deref()
            .ok_or(SignalingError::MissingField {
                msg_type,
                field: "codec_type",
            })?;
        let codec_type =
            CodecType::from_wire_str(codec_type_str).ok_or_else(|| SignalingError::InvalidField {
                field: "codec_type",
                reason: format!("unrecognized codec {codec_type_str:?}"),
            })?;
        let bitrate = raw.codec_bitrate.ok_or(SignalingError::MissingField {
            msg_type,
            field: "codec_bitrate",
        })?;
        Ok(CodecPref { codec_type, bitrate })
    };

    let require_call_dest = |msg_type: &'static str| -> Result<[u8; 32], SignalingError> {
        let s = raw.call_dest.as_deref().ok_or(SignalingError::MissingField {
            msg_type,
            field: "call_dest",
        })?;
        parse_call_dest(s)
    };

    match msg_type {
        "CALL_INVITE" => Ok(CallMessage::Invite {
            call_dest: require_call_dest("CALL_INVITE")?,
            codec: require_codec("CALL_INVITE")?,
            display_name: raw.display_name.clone(),
            envelope,
        }),
        "CALL_RINGING" => Ok(CallMessage::Ringing { envelope }),
        "CALL_ACCEPT" => Ok(CallMessage::Accept {
            call_dest: require_call_dest("CALL_ACCEPT")?,
            codec: require_codec("CALL_ACCEPT")?,
            envelope,
        }),
        "CALL_REJECT" => Ok(CallMessage::Reject { envelope }),
        "CALL_END" => Ok(CallMessage::End { envelope }),
        "PRESENCE_ANNOUNCE" => Ok(CallMessage::PresenceAnnounce { envelope }),
        other => Err(SignalingError::UnknownType(Some(other.to_string()))),
    }
}

/// Encode a message to its canonical JSON wire form, enforcing the MTU
/// budget. Building a message that would exceed [`MAX_JSON_BYTES`] is a
/// construction-time error (spec.md §8 scenario 6) — no oversize packet is
/// ever handed to the transport.
pub fn encode(msg: &CallMessage) -> Result<Vec<u8>, SignalingError> {
    let envelope = msg.envelope();
    let wire = WireRepr {
        type_: msg.type_tag().to_string(),
        call_id: envelope.call_id,
        from: envelope.from.to_string(),
        to: envelope.to.to_string(),
        display_name: match msg {
            CallMessage::Invite { display_name, .. } => display_name.clone(),
            _ => None,
        },
        call_dest: match msg {
            CallMessage::Invite { call_dest, .. } | CallMessage::Accept { call_dest, .. } => {
                Some(hex::encode(call_dest))
            }
            _ => None,
        },
        codec_type: match msg {
            CallMessage::Invite { codec, .. } | CallMessage::Accept { codec, .. } => {
                Some(codec.codec_type.as_wire_str().to_string())
            }
            _ => None,
        },
        codec_bitrate: match msg {
            CallMessage::Invite { codec, .. } | CallMessage::Accept { codec, .. } => {
                Some(codec.bitrate)
            }
            _ => None,
        },
        timestamp: envelope.timestamp,
    };

    let bytes = serde_json::to_vec(&wire).expect("WireRepr always serializes");
    if bytes.len() > MAX_JSON_BYTES {
        return Err(SignalingError::MessageTooLarge {
            size: bytes.len(),
            limit: MAX_JSON_BYTES,
        });
    }
    Ok(bytes)
}
