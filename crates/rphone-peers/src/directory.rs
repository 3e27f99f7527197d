//! The peer directory: ingests announces, stores peer records, and answers
//! the `resolve` lookup the signaling layer needs to reach a peer without
//! carrying its public key on the wire.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rphone_identity::{destination_hash, NodeId, PublicKey, ASPECT_CALL, DESTINATION_APP_NAME};
use serde::Deserialize;

use crate::error::PeerError;
use crate::record::{CallDestHash, PeerRecord};

/// What happened when an announce was fed to [`PeerDirectory::ingest_announce`].
/// Everything but `Accepted` is a silent drop per spec.md §4.2/§9 — no error
/// propagates, but callers can still log the reason at the appropriate
/// level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnounceOutcome {
    Accepted,
    /// `app_data.app != "lxst_phone"` — not our application, dropped
    /// silently.
    DroppedWrongApp,
    /// The announcer is this process's own identity.
    DroppedSelf,
    /// `destination_hash` did not match the hash derivable from the
    /// announced public key. Logged at `WARN` for diagnosis (spec.md §9
    /// open question) but otherwise dropped.
    DroppedHashMismatch,
    /// `app_data` was not valid JSON at all.
    DroppedMalformed,
}

#[derive(Deserialize)]
struct AppData {
    app: String,
    #[serde(default)]
    display_name: String,
}

/// `node_id -> PeerRecord`. Backed by `DashMap` so transport callbacks for
/// different peers can update the directory from different threads without
/// a single coarse lock serializing unrelated announces.
#[derive(Default)]
pub struct PeerDirectory {
    peers: DashMap<NodeId, PeerRecord>,
}

impl PeerDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one observed announce:
    /// `(destination_hash, announced_public_key, app_data_bytes)`.
    pub fn ingest_announce(
        &self,
        destination_hash_observed: [u8; 32],
        announced_public_key: Vec<u8>,
        app_data: &[u8],
        local_node_id: NodeId,
        now: DateTime<Utc>,
    ) -> AnnounceOutcome {
        let parsed: AppData = match serde_json::from_slice(app_data) {
            Ok(v) => v,
            Err(_) => return AnnounceOutcome::DroppedMalformed,
        };
        if parsed.app != DESTINATION_APP_NAME {
            return AnnounceOutcome::DroppedWrongApp;
        }

        let public_key = PublicKey::from_raw(announced_public_key);
        let node_id = public_key.node_id();
        if node_id == local_node_id {
            return AnnounceOutcome::DroppedSelf;
        }

        let expected = destination_hash(node_id.as_bytes(), ASPECT_CALL);
        if expected != destination_hash_observed {
            return AnnounceOutcome::DroppedHashMismatch;
        }

        self.peers
            .entry(node_id)
            .and_modify(|rec| {
                rec.display_name = parsed.display_name.clone();
                rec.last_seen = now;
                rec.announce_count += 1;
                // verified/blocked are preserved across updates.
            })
            .or_insert_with(|| PeerRecord {
                node_id,
                display_name: parsed.display_name,
                call_dest_hash: CallDestHash(destination_hash_observed),
                public_key,
                first_seen: now,
                last_seen: now,
                announce_count: 1,
                verified: false,
                blocked: false,
            });

        AnnounceOutcome::Accepted
    }

    /// Insert or replace a record directly (used when loading from
    /// persistence). Rejects a record whose `call_dest_hash` doesn't match
    /// what `public_key` derives to, per the invariant in spec.md §3.
    pub fn insert_validated(&self, record: PeerRecord) -> Result<(), PeerError> {
        let expected = destination_hash(record.public_key.node_id().as_bytes(), ASPECT_CALL);
        if expected != record.call_dest_hash.0 {
            return Err(PeerError::DestinationMismatch);
        }
        self.peers.insert(record.node_id, record);
        Ok(())
    }

    /// `resolve(node_id) -> (dest_hash, public_key) | NotFound`, exposed to
    /// the signaling layer so outbound messages never need to carry a
    /// public key.
    pub fn resolve(&self, node_id: NodeId) -> Result<(CallDestHash, PublicKey), PeerError> {
        self.peers
            .get(&node_id)
            .map(|r| (r.call_dest_hash, r.public_key.clone()))
            .ok_or(PeerError::NotFound(node_id))
    }

    pub fn get(&self, node_id: NodeId) -> Option<PeerRecord> {
        self.peers.get(&node_id).map(|r| r.clone())
    }

    pub fn is_blocked(&self, node_id: NodeId) -> bool {
        self.peers.get(&node_id).map(|r| r.blocked).unwrap_or(false)
    }

    pub fn set_blocked(&self, node_id: NodeId, blocked: bool) -> Result<(), PeerError> {
        let mut rec = self.peers.get_mut(&node_id).ok_or(PeerError::NotFound(node_id))?;
        rec.blocked = blocked;
        Ok(())
    }

    /// Set by the host after the user acknowledges a matching SAS code. A
    /// mismatch acknowledgement must never call this (spec.md §4.10).
    pub fn set_verified(&self, node_id: NodeId, verified: bool) -> Result<(), PeerError> {
        let mut rec = self.peers.get_mut(&node_id).ok_or(PeerError::NotFound(node_id))?;
        rec.verified = verified;
        Ok(())
    }

    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.peers.iter().map(|r| r.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local() -> NodeId {
        NodeId::from_bytes([0xAA; 32])
    }

    fn app_data(name: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({"app": "lxst_phone", "display_name": name}))
            .unwrap()
    }

    #[test]
    fn accepts_a_well_formed_announce_and_bumps_count() {
        let dir = PeerDirectory::new();
        let key = PublicKey::from_raw(vec![1, 2, 3]);
        let dest = destination_hash(key.node_id().as_bytes(), ASPECT_CALL);

        let outcome = dir.ingest_announce(dest, key.as_bytes().to_vec(), &app_data("Alice"), local(), Utc::now());
        assert_eq!(outcome, AnnounceOutcome::Accepted);
        let outcome2 = dir.ingest_announce(dest, key.as_bytes().to_vec(), &app_data("Alice"), local(), Utc::now());
        assert_eq!(outcome2, AnnounceOutcome::Accepted);

        let rec = dir.get(key.node_id()).unwrap();
        assert_eq!(rec.announce_count, 2);
    }

    #[test]
    fn drops_announce_for_a_different_app() {
        let dir = PeerDirectory::new();
        let key = PublicKey::from_raw(vec![4, 5, 6]);
        let dest = destination_hash(key.node_id().as_bytes(), ASPECT_CALL);
        let bad_app = serde_json::to_vec(&serde_json::json!({"app": "other_app"})).unwrap();

        let outcome = dir.ingest_announce(dest, key.as_bytes().to_vec(), &bad_app, local(), Utc::now());
        assert_eq!(outcome, AnnounceOutcome::DroppedWrongApp);
        assert!(dir.is_empty());
    }

    #[test]
    fn drops_self_announce() {
        let dir = PeerDirectory::new();
        let key = PublicKey::from_raw(vec![7, 8, 9]);
        let dest = destination_hash(key.node_id().as_bytes(), ASPECT_CALL);

        let outcome = dir.ingest_announce(dest, key.as_bytes().to_vec(), &app_data("Me"), key.node_id(), Utc::now());
        assert_eq!(outcome, AnnounceOutcome::DroppedSelf);
    }

    #[test]
    fn drops_announce_with_mismatched_destination_hash() {
        let dir = PeerDirectory::new();
        let key = PublicKey::from_raw(vec![10, 11, 12]);
        let wrong_dest = [0xFFu8; 32];

        let outcome = dir.ingest_announce(wrong_dest, key.as_bytes().to_vec(), &app_data("Eve"), local(), Utc::now());
        assert_eq!(outcome, AnnounceOutcome::DroppedHashMismatch);
        assert!(dir.is_empty());
    }

    #[test]
    fn preserves_verified_and_blocked_across_updates() {
        let dir = PeerDirectory::new();
        let key = PublicKey::from_raw(vec![13, 14]);
        let dest = destination_hash(key.node_id().as_bytes(), ASPECT_CALL);
        dir.ingest_announce(dest, key.as_bytes().to_vec(), &app_data("Bob"), local(), Utc::now());
        dir.set_verified(key.node_id(), true).unwrap();
        dir.set_blocked(key.node_id(), true).unwrap();

        dir.ingest_announce(dest, key.as_bytes().to_vec(), &app_data("Bob"), local(), Utc::now());
        let rec = dir.get(key.node_id()).unwrap();
        assert!(rec.verified);
        assert!(rec.blocked);
    }

    #[test]
    fn resolve_returns_not_found_for_unknown_peer() {
        let dir = PeerDirectory::new();
        let result = dir.resolve(NodeId::from_bytes([1u8; 32]));
        assert!(matches!(result, Err(PeerError::NotFound(_))));
    }
}
