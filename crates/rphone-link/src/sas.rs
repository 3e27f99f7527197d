//! Short Authentication String derivation: a 4-digit code humans compare
//! out-of-band to detect a man-in-the-middle.

use rphone_identity::NodeId;
use sha2::{Digest, Sha256};

/// `decimal(SHA256(key_material)[0..4] as u32 BE mod 10000)`, rendered
/// zero-padded to 4 digits.
pub fn sas(key_material: &[u8]) -> String {
    let digest = Sha256::digest(key_material);
    let code = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % 10_000;
    format!("{code:04}")
}

/// The fallback key material when a link id isn't available: both
/// node_ids sorted lexicographically and concatenated, so either side
/// derives the identical input.
pub fn fallback_key_material(a: NodeId, b: NodeId) -> Vec<u8> {
    let (first, second) = if a.as_bytes() <= b.as_bytes() {
        (a, b)
    } else {
        (b, a)
    };
    let mut out = Vec::with_capacity(64);
    out.extend_from_slice(first.as_bytes());
    out.extend_from_slice(second.as_bytes());
    out
}
