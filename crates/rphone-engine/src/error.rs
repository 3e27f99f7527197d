//! The engine-level error taxonomy: spec.md §7's categories made concrete
//! as one enum so `rphone-cli` (and any other host) has a single type to
//! match on at the process boundary.

use rphone_identity::NodeId;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("malformed signaling message: {0}")]
    Parse(#[from] rphone_signaling::SignalingError),

    #[error("peer {0} has not announced; cannot address them")]
    UnknownPeer(NodeId),

    #[error("call rejected: {0:?}")]
    AdmissionReject(rphone_admission::AdmissionDecision),

    #[error("invalid call-state transition: {0}")]
    InvalidTransition(#[from] rphone_call_state::InvalidTransition),

    #[error("transport send to {to} failed: {reason}")]
    TransportSend { to: NodeId, reason: String },

    #[error("media link failed: {0}")]
    LinkFailure(String),

    #[error("codec failure: {0}")]
    CodecFailure(#[from] rphone_media::CodecError),

    #[error("persistence error: {0}")]
    Persistence(String),
}
