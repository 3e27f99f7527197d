use rphone_identity::NodeId;
use rphone_signaling::CodecPref;
use uuid::Uuid;

/// Every event the machine can legally or illegally receive. Variant names
/// match spec.md §4.4's transition table.
#[derive(Debug, Clone, PartialEq)]
pub enum CallEvent {
    StartOutgoing {
        call_id: Uuid,
        remote_id: NodeId,
    },
    RemoteRinging {
        call_id: Uuid,
    },
    RemoteAccepted {
        call_id: Uuid,
        remote_call_dest: [u8; 32],
        codec: CodecPref,
    },
    RemoteRejected {
        call_id: Uuid,
    },
    IncomingInvite {
        call_id: Uuid,
        remote_id: NodeId,
        display_name: Option<String>,
        remote_call_dest: [u8; 32],
    },
    AcceptLocal {
        negotiated_codec: CodecPref,
    },
    RejectLocal,
    LocalHangup,
    RemoteEnded,
    LinkFailed,
    CodecFailed,
    Finalize,
}

impl CallEvent {
    /// The call_id this event targets, where applicable. Only events that
    /// act on an *already-existing* `current_call` are subject to spec.md
    /// §4.4's call_id-mismatch check. `StartOutgoing` and `IncomingInvite`
    /// allocate a fresh call_id while `current_call` is still `None` (the
    /// machine is in `Idle`), so there is nothing yet to mismatch against —
    /// they return `None` here, same as `AcceptLocal`, `RejectLocal`,
    /// `LocalHangup`, `RemoteEnded`, `LinkFailed`, `CodecFailed`, and
    /// `Finalize`, which all operate on the sole active call without
    /// carrying a call_id of their own.
    pub fn call_id(&self) -> Option<Uuid> {
        match self {
            CallEvent::RemoteRinging { call_id }
            | CallEvent::RemoteAccepted { call_id, .. }
            | CallEvent::RemoteRejected { call_id } => Some(*call_id),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CallEvent::StartOutgoing { .. } => "start_outgoing",
            CallEvent::RemoteRinging { .. } => "remote_ringing",
            CallEvent::RemoteAccepted { .. } => "remote_accepted",
            CallEvent::RemoteRejected { .. } => "remote_rejected",
            CallEvent::IncomingInvite { .. } => "incoming_invite",
            CallEvent::AcceptLocal { .. } => "accept_local",
            CallEvent::RejectLocal => "reject_local",
            CallEvent::LocalHangup => "local_hangup",
            CallEvent::RemoteEnded => "remote_ended",
            CallEvent::LinkFailed => "link_failed",
            CallEvent::CodecFailed => "codec_failed",
            CallEvent::Finalize => "finalize",
        }
    }
}
