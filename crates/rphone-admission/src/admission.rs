//! Inbound-invite admission: the five-check sequence from spec.md §4.5
//! expressed as one pure function over borrowed state.

use std::time::Duration;

use rphone_call_state::CallPhase;
use rphone_identity::NodeId;
use rphone_peers::PeerDirectory;

use crate::rate_limiter::RateLimiter;

/// Outcome of running the admission checks against one inbound invite.
/// Exactly one variant is produced per invite; `Allow` is the only one that
/// proceeds to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Allow,
    /// `from` is not in the peer directory: cannot encrypt a reply.
    RejectUnknown,
    /// The peer's `blocked` flag is set. Rejected silently, no UI notice.
    RejectBlocked,
    RejectRateLimited,
    /// Current phase is not IDLE or ENDED.
    RejectBusy,
}

impl AdmissionDecision {
    pub fn is_allow(self) -> bool {
        matches!(self, AdmissionDecision::Allow)
    }
}

/// Runs the five checks from spec.md §4.5 in order, stopping at the first
/// failure. `now` is the monotonic timestamp passed straight through to the
/// rate limiter.
pub fn decide(
    from: NodeId,
    directory: &PeerDirectory,
    rate_limiter: &RateLimiter,
    current_phase: CallPhase,
    now: Duration,
) -> AdmissionDecision {
    let Some(peer) = directory.get(from) else {
        tracing::warn!(%from, "invite from unannounced peer, dropping");
        return AdmissionDecision::RejectUnknown;
    };

    if peer.blocked {
        tracing::debug!(%from, "invite from blocked peer, silently rejecting");
        return AdmissionDecision::RejectBlocked;
    }

    if !rate_limiter.is_allowed(from, now) {
        tracing::warn!(%from, "invite rejected by rate limiter");
        return AdmissionDecision::RejectRateLimited;
    }

    if !matches!(current_phase, CallPhase::Idle | CallPhase::Ended) {
        tracing::debug!(%from, ?current_phase, "invite rejected, already in a call");
        return AdmissionDecision::RejectBusy;
    }

    AdmissionDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rate_limiter::RateLimiterConfig;
    use rphone_identity::{destination_hash, PublicKey, ASPECT_CALL};
    use rphone_peers::{CallDestHash, PeerRecord};

    fn directory_with(seed: u8, blocked: bool) -> (PeerDirectory, NodeId) {
        let dir = PeerDirectory::new();
        let public_key = PublicKey::from_raw(vec![seed; 32]);
        let node_id = public_key.node_id();
        let call_dest = destination_hash(node_id.as_bytes(), ASPECT_CALL);
        let now = chrono::Utc::now();
        dir.insert_validated(PeerRecord {
            node_id,
            display_name: String::new(),
            call_dest_hash: CallDestHash(call_dest),
            public_key,
            first_seen: now,
            last_seen: now,
            announce_count: 1,
            verified: false,
            blocked,
        })
        .unwrap();
        (dir, node_id)
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(RateLimiterConfig::default())
    }

    #[test]
    fn unknown_peer_is_rejected_first() {
        let dir = PeerDirectory::new();
        let decision = decide(
            NodeId::from_bytes([1u8; 32]),
            &dir,
            &limiter(),
            CallPhase::Idle,
            Duration::ZERO,
        );
        assert_eq!(decision, AdmissionDecision::RejectUnknown);
    }

    #[test]
    fn blocked_peer_is_rejected_before_rate_limiting() {
        let (dir, node_id) = directory_with(2, true);
        let decision = decide(node_id, &dir, &limiter(), CallPhase::Idle, Duration::ZERO);
        assert_eq!(decision, AdmissionDecision::RejectBlocked);
    }

    #[test]
    fn rate_limited_peer_is_rejected_before_busy_check() {
        let (dir, node_id) = directory_with(3, false);
        let rl = RateLimiter::new(RateLimiterConfig {
            max_per_minute: 1,
            max_per_hour: 100,
        });
        assert_eq!(
            decide(node_id, &dir, &rl, CallPhase::Idle, Duration::from_secs(0)),
            AdmissionDecision::Allow
        );
        // second invite within the same minute is rate limited even though
        // phase is back to Idle
        assert_eq!(
            decide(node_id, &dir, &rl, CallPhase::Idle, Duration::from_secs(1)),
            AdmissionDecision::RejectRateLimited
        );
    }

    #[test]
    fn busy_phase_rejects_an_otherwise_allowed_invite() {
        let (dir, node_id) = directory_with(4, false);
        let decision = decide(
            node_id,
            &dir,
            &limiter(),
            CallPhase::InCall,
            Duration::ZERO,
        );
        assert_eq!(decision, AdmissionDecision::RejectBusy);
    }

    #[test]
    fn ended_phase_is_treated_as_available_like_idle() {
        let (dir, node_id) = directory_with(5, false);
        let decision = decide(
            node_id,
            &dir,
            &limiter(),
            CallPhase::Ended,
            Duration::ZERO,
        );
        assert_eq!(decision, AdmissionDecision::Allow);
    }

    #[test]
    fn known_unblocked_unthrottled_idle_peer_is_allowed() {
        let (dir, node_id) = directory_with(6, false);
        let decision = decide(node_id, &dir, &limiter(), CallPhase::Idle, Duration::ZERO);
        assert_eq!(decision, AdmissionDecision::Allow);
    }
}
