//! `node_id` and public-key newtypes.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// The SHA-256 hash of a participant's public key, rendered as 64 lowercase
/// hex characters on the wire. Used in place of a phone number.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId([u8; 32]);

impl NodeId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", hex::encode(self.0))
    }
}

/// Error returned when a 64-hex `node_id` string fails to parse.
#[derive(Debug, thiserror::Error)]
#[error("invalid node_id: expected 64 hex characters, got {0:?}")]
pub struct NodeIdParseError(String);

impl FromStr for NodeId {
    type Err = NodeIdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|_| NodeIdParseError(s.to_string()))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| NodeIdParseError(s.to_string()))?;
        Ok(Self(arr))
    }
}

impl TryFrom<String> for NodeId {
    type Error = NodeIdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(value: NodeId) -> Self {
        value.to_string()
    }
}

/// A raw Ed25519-family public key, carried base64-encoded in announces
/// (never in signaling messages, to stay inside the MTU budget).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PublicKey(Vec<u8>);

impl PublicKey {
    pub fn from_raw(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// `node_id` is always the SHA-256 hash of the raw public key.
    pub fn node_id(&self) -> NodeId {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(&self.0);
        NodeId(digest.into())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", STANDARD.encode(&self.0))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", STANDARD.encode(&self.0))
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid public key: not valid base64")]
pub struct PublicKeyParseError;

impl FromStr for PublicKey {
    type Err = PublicKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STANDARD
            .decode(s)
            .map(Self)
            .map_err(|_| PublicKeyParseError)
    }
}

impl TryFrom<String> for PublicKey {
    type Error = PublicKeyParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PublicKey> for String {
    fn from(value: PublicKey) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_round_trips_through_hex() {
        let id = NodeId([7u8; 32]);
        let s = id.to_string();
        let back: NodeId = s.parse().unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn public_key_determines_node_id_deterministically() {
        let key = PublicKey::from_raw(vec![1, 2, 3, 4]);
        let a = key.node_id();
        let b = key.node_id();
        assert_eq!(a, b);
    }

    #[test]
    fn public_key_round_trips_through_base64() {
        let key = PublicKey::from_raw(vec![9, 8, 7, 255, 0, 1]);
        let s = key.to_string();
        let back: PublicKey = s.parse().unwrap();
        assert_eq!(key, back);
    }
}
