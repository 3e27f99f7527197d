//! End-to-end scenarios from spec.md §8, driven against two (or three)
//! wired `CallEngine`s sharing a `MockNetwork`. Each engine here stands in
//! for a whole process: its own directory, rate limiter, and state
//! machine, talking to the others only through the mock transport, exactly
//! as two real rphone processes would talk through the real mesh.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use rphone_admission::RateLimiterConfig;
use rphone_call_state::CallPhase;
use rphone_engine::{CallEngine, EngineConfig, EngineEvent};
use rphone_identity::transport::MockNetwork;
use rphone_identity::{destination_hash, MockClock, MockTransport, PublicKey, ASPECT_CALL};
use rphone_peers::{CallDestHash, PeerDirectory, PeerRecord};
use rphone_signaling::CodecType;

/// Give already-spawned tokio tasks (packet handling, link acceptance) a
/// chance to run. Everything in this workspace's mock transport completes
/// without real I/O, so a couple of scheduler passes is always enough.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
}

struct Node {
    engine: CallEngine,
    events: mpsc::Receiver<EngineEvent>,
    // Keeps the directory/history tempdir alive for the node's lifetime.
    _tmp: tempfile::TempDir,
}

fn keypair(seed: u8) -> PublicKey {
    PublicKey::from_raw(vec![seed; 32])
}

/// Build one node's `PeerDirectory` already knowing about every peer in
/// `others` (as if a prior announce exchange had already happened) so the
/// admission layer's unknown-peer check never fires in these tests, which
/// are about the layers above it.
fn directory_knowing(peers: &[&PublicKey]) -> Arc<PeerDirectory> {
    let dir = Arc::new(PeerDirectory::new());
    let now = chrono::Utc::now();
    for key in peers {
        let node_id = key.node_id();
        let dest = destination_hash(node_id.as_bytes(), ASPECT_CALL);
        dir.insert_validated(PeerRecord {
            node_id,
            display_name: String::new(),
            call_dest_hash: CallDestHash(dest),
            public_key: (*key).clone(),
            first_seen: now,
            last_seen: now,
            announce_count: 1,
            verified: false,
            blocked: false,
        })
        .unwrap();
    }
    dir
}

fn make_node(
    key: &PublicKey,
    network: &MockNetwork,
    knows: &[&PublicKey],
    codec_type: CodecType,
    codec_bitrate: u32,
) -> Node {
    let local_id = key.node_id();
    let transport: Arc<dyn rphone_identity::Transport> =
        Arc::new(MockTransport::new(local_id, network.clone()));
    let directory = directory_knowing(knows);

    let mut config = EngineConfig::default();
    config.codec_type = codec_type.as_wire_str().to_string();
    config.codec_bitrate = codec_bitrate;

    let tmp = tempfile::tempdir().unwrap();
    let peers_path = tmp.path().join("peers.json");
    let history_path: PathBuf = tmp.path().join("call_history.json");

    let (engine, events) = CallEngine::new(
        local_id,
        key.clone(),
        transport,
        Arc::new(MockClock::new()),
        directory,
        RateLimiterConfig::default(),
        config,
        peers_path,
        history_path,
    );

    Node {
        engine,
        events,
        _tmp: tmp,
    }
}

/// Drain every event already queued without blocking.
fn drain(events: &mut mpsc::Receiver<EngineEvent>) -> Vec<EngineEvent> {
    let mut out = Vec::new();
    while let Ok(ev) = events.try_recv() {
        out.push(ev);
    }
    out
}

// ---------------------------------------------------------------------
// Scenario 1: outgoing happy path
// ---------------------------------------------------------------------

#[tokio::test]
async fn outgoing_happy_path_completes_and_writes_history() {
    let network = MockNetwork::new();
    let alice_key = keypair(1);
    let bob_key = keypair(2);

    let mut alice = make_node(&alice_key, &network, &[&bob_key], CodecType::Opus, 24_000);
    let mut bob = make_node(&bob_key, &network, &[&alice_key], CodecType::Opus, 16_000);

    let call_id = alice
        .engine
        .start_outgoing(bob_key.node_id(), Some("Alice".to_string()))
        .await
        .unwrap();
    assert_eq!(alice.engine.phase().await, CallPhase::OutgoingCall);

    settle().await;
    // Bob's admission layer allowed the invite and the state machine moved
    // to INCOMING_CALL; an IncomingCall event should have been queued.
    assert_eq!(bob.engine.phase().await, CallPhase::IncomingCall);
    let bob_events = drain(&mut bob.events);
    assert!(bob_events
        .iter()
        .any(|e| matches!(e, EngineEvent::IncomingCall { call_id: id, .. } if *id == call_id)));

    bob.engine.accept_incoming().await.unwrap();
    settle().await;

    assert_eq!(alice.engine.phase().await, CallPhase::InCall);
    assert_eq!(bob.engine.phase().await, CallPhase::InCall);

    let alice_call = alice.engine.current_call().await.unwrap();
    assert_eq!(alice_call.negotiated_codec.unwrap().bitrate, 16_000);
    assert_eq!(
        alice_call.negotiated_codec.unwrap().codec_type,
        CodecType::Opus
    );

    // A SAS code should have been derived once the media link came up.
    let alice_events = drain(&mut alice.events);
    assert!(alice_events.iter().any(|e| matches!(e, EngineEvent::SasReady { .. })));

    alice.engine.hangup().await.unwrap();
    settle().await;

    assert_eq!(alice.engine.phase().await, CallPhase::Idle);
    assert_eq!(bob.engine.phase().await, CallPhase::Idle);

    let alice_history = rphone_engine::persist::load_history(&alice._tmp.path().join("call_history.json")).unwrap();
    assert_eq!(alice_history.len(), 1);
    assert_eq!(alice_history[0].outcome, "completed");

    let bob_history = rphone_engine::persist::load_history(&bob._tmp.path().join("call_history.json")).unwrap();
    assert_eq!(bob_history.len(), 1);
    assert_eq!(bob_history[0].outcome, "completed");
}

// ---------------------------------------------------------------------
// Scenario 2: codec2 wins
// ---------------------------------------------------------------------

#[tokio::test]
async fn codec2_wins_over_opus_on_both_sides() {
    let network = MockNetwork::new();
    let alice_key = keypair(3); // callee, prefers opus
    let bob_key = keypair(4); // caller, prefers codec2

    let mut alice = make_node(&alice_key, &network, &[&bob_key], CodecType::Opus, 48_000);
    let bob = make_node(&bob_key, &network, &[&alice_key], CodecType::Codec2, 1_600);

    bob.engine
        .start_outgoing(alice_key.node_id(), None)
        .await
        .unwrap();
    settle().await;

    alice.engine.accept_incoming().await.unwrap();
    settle().await;

    let alice_call = alice.engine.current_call().await.unwrap();
    let negotiated = alice_call.negotiated_codec.unwrap();
    assert_eq!(negotiated.codec_type, CodecType::Codec2);
    assert_eq!(negotiated.bitrate, 1_600);

    let bob_call = bob.engine.current_call().await.unwrap();
    let bob_negotiated = bob_call.negotiated_codec.unwrap();
    assert_eq!(bob_negotiated.codec_type, CodecType::Codec2);
    assert_eq!(bob_negotiated.bitrate, 1_600);
}

// ---------------------------------------------------------------------
// Scenario 3: block overrides all
// ---------------------------------------------------------------------

#[tokio::test]
async fn blocked_peer_is_auto_rejected_silently() {
    let network = MockNetwork::new();
    let alice_key = keypair(5);
    let eve_key = keypair(6);

    let mut alice = make_node(&alice_key, &network, &[&eve_key], CodecType::Opus, 24_000);
    alice.engine.directory().set_blocked(eve_key.node_id(), true).unwrap();

    let eve = make_node(&eve_key, &network, &[&alice_key], CodecType::Opus, 24_000);

    eve.engine.start_outgoing(alice_key.node_id(), None).await.unwrap();
    settle().await;

    // No UI notification, no ringing: alice's phase never leaves IDLE.
    assert_eq!(alice.engine.phase().await, CallPhase::Idle);
    let alice_events = drain(&mut alice.events);
    assert!(!alice_events
        .iter()
        .any(|e| matches!(e, EngineEvent::IncomingCall { .. })));

    // Eve's own state machine ends the call it started, since the REJECT
    // comes straight back, and finalizes right back to idle.
    assert_eq!(eve.engine.phase().await, CallPhase::Idle);
}

// ---------------------------------------------------------------------
// Scenario 4: rate limit
// ---------------------------------------------------------------------

#[tokio::test]
async fn sixth_invite_within_a_minute_is_auto_rejected() {
    let network = MockNetwork::new();
    let alice_key = keypair(7);
    let peer_key = keypair(8);

    let mut alice = make_node(&alice_key, &network, &[&peer_key], CodecType::Opus, 24_000);

    for i in 0..5 {
        let peer = make_node(&peer_key, &network, &[&alice_key], CodecType::Opus, 24_000);
        peer.engine.start_outgoing(alice_key.node_id(), None).await.unwrap();
        settle().await;
        assert_eq!(
            alice.engine.phase().await,
            CallPhase::IncomingCall,
            "invite {i} should have been allowed through to the state machine"
        );
        alice.engine.reject_incoming().await.unwrap();
        settle().await;
        // finalize back to idle before the next attempt
        assert_eq!(alice.engine.phase().await, CallPhase::Idle);
    }

    let sixth = make_node(&peer_key, &network, &[&alice_key], CodecType::Opus, 24_000);
    sixth.engine.start_outgoing(alice_key.node_id(), None).await.unwrap();
    settle().await;

    // The admission layer's rate limiter rejected this one before it ever
    // reached the state machine: alice never even saw INCOMING_CALL.
    assert_eq!(alice.engine.phase().await, CallPhase::Idle);
}

// ---------------------------------------------------------------------
// Scenario 5: busy
// ---------------------------------------------------------------------

#[tokio::test]
async fn busy_peer_rejects_a_second_invite_without_disturbing_the_first_call() {
    let network = MockNetwork::new();
    let alice_key = keypair(9);
    let bob_key = keypair(10);
    let charlie_key = keypair(11);

    let mut alice = make_node(
        &alice_key,
        &network,
        &[&bob_key, &charlie_key],
        CodecType::Opus,
        24_000,
    );
    let bob = make_node(&bob_key, &network, &[&alice_key], CodecType::Opus, 24_000);
    let charlie = make_node(&charlie_key, &network, &[&alice_key], CodecType::Opus, 24_000);

    bob.engine.start_outgoing(alice_key.node_id(), None).await.unwrap();
    settle().await;
    alice.engine.accept_incoming().await.unwrap();
    settle().await;
    assert_eq!(alice.engine.phase().await, CallPhase::InCall);
    let call_with_bob = alice.engine.current_call().await.unwrap().call_id;

    charlie.engine.start_outgoing(alice_key.node_id(), None).await.unwrap();
    settle().await;

    // Alice's call with Bob is untouched; Charlie never reached ringing.
    assert_eq!(alice.engine.phase().await, CallPhase::InCall);
    assert_eq!(alice.engine.current_call().await.unwrap().call_id, call_with_bob);
    assert_eq!(charlie.engine.phase().await, CallPhase::Idle);

    drain(&mut alice.events);
}
