//! Typed constructors for each outbound message type.
//!
//! Every constructor validates the MTU budget before returning, by encoding
//! the candidate message and checking its size — a caller never ends up
//! holding a `CallMessage` the transport can't carry (spec.md §8 scenario 6:
//! an oversize `display_name` fails construction, no packet is sent).

use rphone_identity::NodeId;
use uuid::Uuid;

use crate::codec::encode;
use crate::error::SignalingError;
use crate::message::{CallMessage, CodecPref, Envelope};

fn validated(msg: CallMessage) -> Result<CallMessage, SignalingError> {
    encode(&msg)?;
    Ok(msg)
}

#[allow(clippy::too_many_arguments)]
pub fn build_invite(
    from: NodeId,
    to: NodeId,
    call_id: Uuid,
    call_dest: [u8; 32],
    codec: CodecPref,
    display_name: Option<String>,
    now: Option<u64>,
) -> Result<CallMessage, SignalingError> {
    validated(CallMessage::Invite {
        envelope: Envelope {
            call_id,
            from,
            to,
            timestamp: now,
        },
        call_dest,
        codec,
        display_name,
    })
}

/// `codec` here is the *negotiated* pair this side settled on, not the
/// callee's bare preference — spec.md §4.1 is explicit that `CALL_ACCEPT`
/// carries the negotiated values.
pub fn build_accept(
    from: NodeId,
    to: NodeId,
    call_id: Uuid,
    call_dest: [u8; 32],
    codec: CodecPref,
    now: Option<u64>,
) -> Result<CallMessage, SignalingError> {
    validated(CallMessage::Accept {
        envelope: Envelope {
            call_id,
            from,
            to,
            timestamp: now,
        },
        call_dest,
        codec,
    })
}

pub fn build_ringing(
    from: NodeId,
    to: NodeId,
    call_id: Uuid,
    now: Option<u64>,
) -> Result<CallMessage, SignalingError> {
    validated(CallMessage::Ringing {
        envelope: Envelope {
            call_id,
            from,
            to,
            timestamp: now,
        },
    })
}

pub fn build_reject(
    from: NodeId,
    to: NodeId,
    call_id: Uuid,
    now: Option<u64>,
) -> Result<CallMessage, SignalingError> {
    validated(CallMessage::Reject {
        envelope: Envelope {
            call_id,
            from,
            to,
            timestamp: now,
        },
    })
}

pub fn build_end(
    from: NodeId,
    to: NodeId,
    call_id: Uuid,
    now: Option<u64>,
) -> Result<CallMessage, SignalingError> {
    validated(CallMessage::End {
        envelope: Envelope {
            call_id,
            from,
            to,
            timestamp: now,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::CodecType;

    fn node(byte: u8) -> NodeId {
        NodeId::from_bytes([byte; 32])
    }

    #[test]
    fn build_invite_rejects_oversize_display_name() {
        let err = build_invite(
            node(1),
            node(2),
            Uuid::nil(),
            [0u8; 32],
            CodecPref {
                codec_type: CodecType::Opus,
                bitrate: 24000,
            },
            Some("x".repeat(400)),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, SignalingError::MessageTooLarge { .. }));
    }

    #[test]
    fn build_ringing_succeeds_with_minimal_fields() {
        assert!(build_ringing(node(1), node(2), Uuid::nil(), None).is_ok());
    }
}
