//! The persisted and in-memory shape of a peer.

use chrono::{DateTime, Utc};
use rphone_identity::{NodeId, PublicKey};
use serde::{Deserialize, Serialize};

/// `node_id -> (dest_hash, public_key, display_name, verified, blocked)`,
/// plus bookkeeping. Primary key is `node_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeerRecord {
    pub node_id: NodeId,
    #[serde(default)]
    pub display_name: String,
    #[serde(rename = "call_dest")]
    pub call_dest_hash: CallDestHash,
    pub public_key: PublicKey,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    #[serde(default)]
    pub announce_count: u64,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub blocked: bool,
}

/// Newtype over the 32-byte call-aspect destination hash, hex-encoded on
/// the wire.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CallDestHash(pub [u8; 32]);

impl std::fmt::Debug for CallDestHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CallDestHash({})", hex::encode(self.0))
    }
}

impl std::fmt::Display for CallDestHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl TryFrom<String> for CallDestHash {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let bytes = hex::decode(&value).map_err(|_| format!("invalid hex: {value}"))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| "expected 32 bytes".to_string())?;
        Ok(CallDestHash(arr))
    }
}

impl From<CallDestHash> for String {
    fn from(value: CallDestHash) -> Self {
        value.to_string()
    }
}
