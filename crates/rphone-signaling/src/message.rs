//! Call-control message schema.
//!
//! `CallMessage` is deliberately an enum with one variant per wire `type`,
//! each variant holding exactly the fields that type requires — there is no
//! representable state where e.g. an `INVITE` is missing `codec_type`. The
//! wire encoding (a flat JSON object with every field optional except
//! `type`/`call_id`/`from`/`to`) lives in [`crate::codec`]; this module only
//! knows the typed shape.

use rphone_identity::NodeId;
use uuid::Uuid;

/// The two codecs this system negotiates between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecType {
    Opus,
    Codec2,
}

impl CodecType {
    pub fn as_wire_str(self) -> &'static str {
        match self {
            CodecType::Opus => "opus",
            CodecType::Codec2 => "codec2",
        }
    }

    pub fn from_wire_str(s: &str) -> Option<Self> {
        match s {
            "opus" => Some(CodecType::Opus),
            "codec2" => Some(CodecType::Codec2),
            _ => None,
        }
    }
}

/// Common envelope fields carried by every message type.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    pub call_id: Uuid,
    pub from: NodeId,
    pub to: NodeId,
    /// Sender's wall-clock time, seconds since the Unix epoch. Set by the
    /// builder from a `Clock` the caller supplies — this crate performs no
    /// I/O of its own.
    pub timestamp: Option<u64>,
}

/// A codec preference: type plus bitrate (Opus bits/second) or Codec2 mode
/// (which numerically equals its bits/second, per the glossary).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecPref {
    pub codec_type: CodecType,
    pub bitrate: u32,
}

/// A typed call-control message. Variant names mirror the wire `type`
/// strings (`CALL_INVITE`, `CALL_RINGING`, ...).
#[derive(Debug, Clone, PartialEq)]
pub enum CallMessage {
    Invite {
        envelope: Envelope,
        call_dest: [u8; 32],
        codec: CodecPref,
        display_name: Option<String>,
    },
    Ringing {
        envelope: Envelope,
    },
    Accept {
        envelope: Envelope,
        call_dest: [u8; 32],
        codec: CodecPref,
    },
    Reject {
        envelope: Envelope,
    },
    End {
        envelope: Envelope,
    },
    /// Accepted on parse for forward compatibility with the wire protocol;
    /// this core never constructs one (presence is carried by announces,
    /// see `rphone-peers`, not by this channel).
    PresenceAnnounce {
        envelope: Envelope,
    },
}

impl CallMessage {
    pub fn envelope(&self) -> &Envelope {
        match self {
            CallMessage::Invite { envelope, .. }
            | CallMessage::Ringing { envelope }
            | CallMessage::Accept { envelope, .. }
            | CallMessage::Reject { envelope }
            | CallMessage::End { envelope }
            | CallMessage::PresenceAnnounce { envelope } => envelope,
        }
    }

    pub fn call_id(&self) -> Uuid {
        self.envelope().call_id
    }

    pub fn type_tag(&self) -> &'static str {
        match self {
            CallMessage::Invite { .. } => "CALL_INVITE",
            CallMessage::Ringing { .. } => "CALL_RINGING",
            CallMessage::Accept { .. } => "CALL_ACCEPT",
            CallMessage::Reject { .. } => "CALL_REJECT",
            CallMessage::End { .. } => "CALL_END",
            CallMessage::PresenceAnnounce { .. } => "PRESENCE_ANNOUNCE",
        }
    }
}
