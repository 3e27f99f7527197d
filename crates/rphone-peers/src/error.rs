#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    #[error("peer {0} not found in directory")]
    NotFound(rphone_identity::NodeId),

    #[error("call_dest_hash does not match the hash derived from public_key")]
    DestinationMismatch,

    #[error("persistence error: {0}")]
    Persistence(String),
}
