//! The six call phases and the runtime call record.

use rphone_identity::{NodeId, PublicKey};
use rphone_signaling::CodecPref;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallPhase {
    Idle,
    OutgoingCall,
    Ringing,
    IncomingCall,
    InCall,
    Ended,
}

/// Why a call ended. Carried in the persisted history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Completed,
    Rejected,
    Missed,
    LinkFailed,
    CodecError,
}

impl CallOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            CallOutcome::Completed => "completed",
            CallOutcome::Rejected => "rejected",
            CallOutcome::Missed => "missed",
            CallOutcome::LinkFailed => "link_failed",
            CallOutcome::CodecError => "codec_error",
        }
    }
}

/// The single in-flight (or just-ended) call. `current_call.is_some() <=>
/// phase != Idle` is an invariant enforced by [`crate::machine::CallStateMachine`],
/// never by this struct alone.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub call_id: Uuid,
    pub local_id: NodeId,
    pub remote_id: NodeId,
    pub display_name: Option<String>,
    pub initiated_by_local: bool,
    /// The remote party's per-call media destination, once known (carried
    /// by the INVITE if we're the callee, by the ACCEPT if we're the
    /// caller).
    pub remote_call_dest: Option<[u8; 32]>,
    pub remote_public_key: Option<PublicKey>,
    pub negotiated_codec: Option<CodecPref>,
    pub start_ts: u64,
    pub end_ts: Option<u64>,
    pub outcome: Option<CallOutcome>,
}
