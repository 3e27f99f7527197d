//! `CallEngine`: the single owned (never-global) object that wires every
//! other crate together per spec.md §9's "singleton media manager becomes
//! an owned `CallEngine`" design note.
//!
//! Concurrency shape follows spec.md §5 exactly: inbound transport
//! callbacks are synchronous and must never block, so each one just clones
//! the shared `Arc<EngineInner>` and `tokio::spawn`s the actual handling;
//! all of that handling funnels through `state`, a `tokio::sync::Mutex`
//! guarding the one `CallStateMachine`, which is the per-call serialized
//! handler the spec requires. `on_state_changed` pushes onto `event_tx`
//! rather than calling UI code directly, realizing the "cross-thread UI
//! notification becomes a message-passing channel" design note.

use std::path::PathBuf;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

use rphone_admission::{decide, AdmissionDecision, RateLimiter, RateLimiterConfig};
use rphone_call_state::{ApplyOutcome, CallEvent, CallOutcome, CallPhase, CallRecord, CallStateMachine};
use rphone_identity::{
    destination_hash, Clock, LinkHandle, NodeId, PublicKey, Transport, ASPECT_CALL,
};
use rphone_link::{sas, CloseReason, LinkLifecycle};
use rphone_media::{
    Codec2Codec, CodecConfig, CodecError, CodecFamily, Decoder, Encoder, IncomingOutcome,
    JitterConfig, MediaSession, OpusCodec,
};
use rphone_peers::PeerDirectory;
use rphone_signaling::{
    build_accept, build_end, build_invite, build_reject, build_ringing, negotiate, parse,
    CallMessage, CodecPref, CodecType,
};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::history::{self, Direction, HistoryEntry};

/// The 30 s invite timeout from spec.md §5: if the caller sees no
/// ACCEPT/REJECT/RINGING in this window, the machine auto-ends the call and
/// notifies the callee.
const INVITE_TIMEOUT: Duration = Duration::from_secs(30);

/// The 10 s link-establishment timeout from spec.md §4.9/§5.
const LINK_ESTABLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// A ping is emitted every 2 s while a session is active (spec.md §4.8).
const PING_INTERVAL: Duration = Duration::from_secs(2);

const DEFAULT_JITTER_TARGET_MS: u32 = 100;

/// Messages the engine pushes to whatever UI (or `rphone-cli`) is
/// listening. The engine never calls UI code directly.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    IncomingCall {
        call_id: Uuid,
        remote_id: NodeId,
        display_name: Option<String>,
    },
    StateChanged {
        phase: CallPhase,
    },
    SasReady {
        code: String,
    },
    CallEnded {
        call_id: Uuid,
        outcome: CallOutcome,
    },
    /// Out-of-call failures the UI should toast, per spec.md §7's
    /// Transport-Send-Failure category.
    Toast(String),
}

struct ActiveSession {
    lifecycle: LinkLifecycle,
    link: Arc<dyn LinkHandle>,
    session: Arc<Mutex<MediaSession>>,
}

struct EngineInner {
    local_id: NodeId,
    local_public_key: PublicKey,
    transport: Arc<dyn Transport>,
    clock: Arc<dyn Clock>,
    start_instant: Instant,
    directory: Arc<PeerDirectory>,
    rate_limiter: RateLimiter,
    state: Mutex<CallStateMachine>,
    active_session: Mutex<Option<ActiveSession>>,
    /// The inbound INVITE's codec preference, held here until
    /// `accept_incoming` negotiates it — `CallRecord::negotiated_codec`
    /// only gets a value once that negotiation settles.
    pending_remote_codec: Mutex<Option<(Uuid, CodecPref)>>,
    config: Mutex<EngineConfig>,
    peers_path: PathBuf,
    history_path: PathBuf,
    event_tx: mpsc::Sender<EngineEvent>,
    /// Lets any `&self` method hand an owned `Arc<Self>` to `tokio::spawn`
    /// without a `self: Arc<Self>` receiver, which isn't a legal method
    /// receiver outside `Self`/`&Self`/`&mut Self`/the blessed smart
    /// pointers. Set once at construction via `Arc::new_cyclic`.
    self_ref: Weak<EngineInner>,
}

impl EngineInner {
    /// An owned handle to this same instance, for moving into `tokio::spawn`.
    /// Only ever dangles if called during teardown of the last `CallEngine`
    /// clone, which cannot happen while a method is running on `&self`.
    fn arc_self(&self) -> Arc<EngineInner> {
        self.self_ref.upgrade().expect("engine inner dropped while in use")
    }

    fn now_since_start(&self) -> Duration {
        self.clock
            .monotonic_now()
            .saturating_duration_since(self.start_instant)
    }

    fn wall_now_secs(&self) -> u64 {
        self.clock
            .wall_now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    async fn notify(&self, event: EngineEvent) {
        let _ = self.event_tx.send(event).await;
    }

    async fn fire_state_changed(&self) {
        let phase = self.state.lock().await.phase();
        self.notify(EngineEvent::StateChanged { phase }).await;
    }

    async fn send_message(&self, to: NodeId, msg: &CallMessage) {
        let bytes = match rphone_signaling::encode(msg) {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "refusing to send an unencodable message");
                return;
            }
        };
        if let Err(e) = self.transport.send_packet(to, bytes).await {
            tracing::warn!(%to, error = %e, "transport send failed");
            self.notify(EngineEvent::Toast(format!("failed to reach {to}: {e}")))
                .await;
        }
    }

    fn local_codec_pref(&self, config: &EngineConfig) -> CodecPref {
        CodecPref {
            codec_type: config.codec_type(),
            bitrate: config.codec_bitrate,
        }
    }

    /// Reconstruct the addressable call destination for `to`, required
    /// before any outbound signaling can be sent to them.
    fn resolve_call_dest(&self, to: NodeId) -> Result<[u8; 32], EngineError> {
        self.directory
            .resolve(to)
            .map(|(dest, _key)| dest.0)
            .map_err(|_| EngineError::UnknownPeer(to))
    }

    // ------------------------------------------------------------------
    // Outbound: local-originated actions
    // ------------------------------------------------------------------

    async fn start_outgoing(
        &self,
        remote_id: NodeId,
        display_name: Option<String>,
    ) -> Result<Uuid, EngineError> {
        // Fails fast with a user-facing error rather than silently
        // queuing, per spec.md §7's Unknown-Peer category for outbound
        // operations.
        self.resolve_call_dest(remote_id)?;

        let call_id = Uuid::new_v4();
        {
            let mut sm = self.state.lock().await;
            sm.apply(
                CallEvent::StartOutgoing {
                    call_id,
                    remote_id,
                },
                self.wall_now_secs(),
            )?;
        }
        self.fire_state_changed().await;

        let config = self.config.lock().await.clone();
        let codec = self.local_codec_pref(&config);

        // The call_dest carried on OUR invite is where the *remote* should
        // reach us; it is derived from our own public key, not theirs.
        let our_call_dest = destination_hash(self.local_id.as_bytes(), ASPECT_CALL);

        match build_invite(
            self.local_id,
            remote_id,
            call_id,
            our_call_dest,
            codec,
            display_name,
            Some(self.wall_now_secs()),
        ) {
            Ok(msg) => self.send_message(remote_id, &msg).await,
            Err(e) => return Err(EngineError::Parse(e)),
        }

        let inner = self.arc_self();
        tokio::spawn(async move {
            tokio::time::sleep(INVITE_TIMEOUT).await;
            inner.on_invite_timeout(call_id).await;
        });

        Ok(call_id)
    }

    async fn on_invite_timeout(&self, call_id: Uuid) {
        let remote = {
            let sm = self.state.lock().await;
            match sm.current_call() {
                Some(call) if call.call_id == call_id && sm.phase() != CallPhase::InCall => {
                    Some(call.remote_id)
                }
                _ => None,
            }
        };
        let Some(remote) = remote else { return };

        tracing::info!(%call_id, "invite timed out with no answer, ending call");
        self.force_end(call_id, CallOutcome::Missed).await;
        if let Ok(msg) = build_end(self.local_id, remote, call_id, Some(self.wall_now_secs())) {
            self.send_message(remote, &msg).await;
        }
    }

    async fn accept_incoming(&self) -> Result<(), EngineError> {
        let (call_id, remote_id) = {
            let sm = self.state.lock().await;
            let call = sm.current_call().ok_or(EngineError::InvalidTransition(
                rphone_call_state::InvalidTransition {
                    phase: sm.phase(),
                    event: "accept_local",
                },
            ))?;
            (call.call_id, call.remote_id)
        };

        let remote_codec = {
            let mut pending = self.pending_remote_codec.lock().await;
            match pending.take() {
                Some((id, codec)) if id == call_id => Some(codec),
                other => {
                    *pending = other;
                    None
                }
            }
        };

        let config = self.config.lock().await.clone();
        let local_pref = self.local_codec_pref(&config);
        let negotiated = negotiate(local_pref, remote_codec);

        {
            let mut sm = self.state.lock().await;
            sm.apply(
                CallEvent::AcceptLocal {
                    negotiated_codec: negotiated,
                },
                self.wall_now_secs(),
            )?;
        }
        self.fire_state_changed().await;

        let our_call_dest = destination_hash(self.local_id.as_bytes(), ASPECT_CALL);
        if let Ok(msg) = build_accept(
            self.local_id,
            remote_id,
            call_id,
            our_call_dest,
            negotiated,
            Some(self.wall_now_secs()),
        ) {
            self.send_message(remote_id, &msg).await;
        }

        // We are the callee: the initiator opens the link to us, we only
        // need our `accept_link` handler (registered at construction) to
        // already be in place — nothing further to do here but wait.
        Ok(())
    }

    async fn reject_incoming(&self) -> Result<(), EngineError> {
        let (call_id, remote_id) = {
            let sm = self.state.lock().await;
            let call = sm.current_call().ok_or(EngineError::InvalidTransition(
                rphone_call_state::InvalidTransition {
                    phase: sm.phase(),
                    event: "reject_local",
                },
            ))?;
            (call.call_id, call.remote_id)
        };

        {
            let mut sm = self.state.lock().await;
            sm.apply(CallEvent::RejectLocal, self.wall_now_secs())?;
        }
        self.fire_state_changed().await;
        self.append_history_if_ended(call_id).await;

        if let Ok(msg) = build_reject(self.local_id, remote_id, call_id, Some(self.wall_now_secs())) {
            self.send_message(remote_id, &msg).await;
        }
        Ok(())
    }

    async fn hangup(&self) -> Result<(), EngineError> {
        let (call_id, remote_id) = {
            let sm = self.state.lock().await;
            let call = sm.current_call().ok_or(EngineError::InvalidTransition(
                rphone_call_state::InvalidTransition {
                    phase: sm.phase(),
                    event: "local_hangup",
                },
            ))?;
            (call.call_id, call.remote_id)
        };

        self.teardown_session(CloseReason::LocalHangup).await;

        {
            let mut sm = self.state.lock().await;
            sm.apply(CallEvent::LocalHangup, self.wall_now_secs())?;
        }
        self.fire_state_changed().await;
        self.append_history_if_ended(call_id).await;

        if let Ok(msg) = build_end(self.local_id, remote_id, call_id, Some(self.wall_now_secs())) {
            self.send_message(remote_id, &msg).await;
        }
        Ok(())
    }

    /// Force the current call straight to `ENDED` with `outcome`, used by
    /// the invite timeout and link-failure paths where there is no local
    /// user action driving the transition.
    async fn force_end(&self, call_id: Uuid, outcome: CallOutcome) {
        self.teardown_session(match outcome {
            CallOutcome::LinkFailed => CloseReason::TransportFailure,
            _ => CloseReason::RemoteClosed,
        })
        .await;

        let event = match outcome {
            CallOutcome::LinkFailed => CallEvent::LinkFailed,
            CallOutcome::CodecError => CallEvent::CodecFailed,
            _ => CallEvent::RemoteEnded,
        };

        let applied = {
            let mut sm = self.state.lock().await;
            match sm.current_call() {
                Some(call) if call.call_id == call_id => {
                    sm.apply(event, self.wall_now_secs()).is_ok()
                }
                _ => false,
            }
        };
        if applied {
            self.fire_state_changed().await;
            self.append_history_if_ended(call_id).await;
        }
    }

    // ------------------------------------------------------------------
    // Inbound: transport packet callback
    // ------------------------------------------------------------------

    async fn handle_packet(&self, from: NodeId, payload: Vec<u8>) {
        let msg = match parse(&payload) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(%from, error = %e, "dropping malformed signaling packet");
                return;
            }
        };

        if msg.envelope().from != from {
            tracing::warn!(%from, "from field does not match transport sender, dropping");
            return;
        }

        match msg {
            CallMessage::Invite {
                envelope,
                call_dest,
                codec,
                display_name,
            } => {
                self.handle_invite(from, envelope.call_id, call_dest, codec, display_name)
                    .await
            }
            CallMessage::Ringing { envelope } => {
                self.apply_if_current(
                    envelope.call_id,
                    CallEvent::RemoteRinging {
                        call_id: envelope.call_id,
                    },
                )
                .await
            }
            CallMessage::Accept {
                envelope,
                call_dest,
                codec,
            } => self.handle_accept(envelope.call_id, call_dest, codec).await,
            CallMessage::Reject { envelope } => {
                let call_id = envelope.call_id;
                self.apply_if_current(call_id, CallEvent::RemoteRejected { call_id })
                    .await;
                self.append_history_if_ended(call_id).await;
            }
            CallMessage::End { envelope } => self.handle_remote_end(envelope.call_id).await,
            CallMessage::PresenceAnnounce { .. } => {
                // Presence is carried by announces (`rphone-peers`), not
                // this channel; accepted for forward compatibility but
                // never acted on here.
            }
        }
    }

    async fn apply_if_current(&self, call_id: Uuid, event: CallEvent) {
        let outcome = {
            let mut sm = self.state.lock().await;
            match sm.current_call() {
                Some(call) if call.call_id == call_id => sm.apply(event, self.wall_now_secs()),
                _ => return,
            }
        };
        match outcome {
            Ok(ApplyOutcome::Applied) => self.fire_state_changed().await,
            Ok(ApplyOutcome::IgnoredCallIdMismatch) => {}
            Err(e) => tracing::info!(%call_id, error = %e, "invalid transition, ignored"),
        }
    }

    async fn handle_invite(
        &self,
        from: NodeId,
        call_id: Uuid,
        call_dest: [u8; 32],
        codec: CodecPref,
        display_name: Option<String>,
    ) {
        let phase = self.state.lock().await.phase();
        let decision = decide(from, &self.directory, &self.rate_limiter, phase, self.now_since_start());

        match decision {
            AdmissionDecision::Allow => {
                let applied = {
                    let mut sm = self.state.lock().await;
                    sm.apply(
                        CallEvent::IncomingInvite {
                            call_id,
                            remote_id: from,
                            display_name: display_name.clone(),
                            remote_call_dest: call_dest,
                        },
                        self.wall_now_secs(),
                    )
                };
                match applied {
                    Ok(ApplyOutcome::Applied) => {
                        // Stash the invite's codec preference as the
                        // "remote" side of the negotiation performed at
                        // accept time (spec.md §4.1 rule set).
                        self.stash_remote_invite_codec(call_id, codec).await;
                        self.fire_state_changed().await;
                        if let Ok(msg) = build_ringing(self.local_id, from, call_id, Some(self.wall_now_secs())) {
                            self.send_message(from, &msg).await;
                        }
                        self.notify(EngineEvent::IncomingCall {
                            call_id,
                            remote_id: from,
                            display_name,
                        })
                        .await;
                    }
                    _ => {
                        self.auto_reject(from, call_id).await;
                    }
                }
            }
            AdmissionDecision::RejectUnknown
            | AdmissionDecision::RejectBlocked
            | AdmissionDecision::RejectRateLimited
            | AdmissionDecision::RejectBusy => {
                self.auto_reject(from, call_id).await;
            }
        }
    }

    /// The state machine's `CallRecord` has no field for the *other* side's
    /// raw codec preference (only the negotiated result once settled), so
    /// the engine holds it here until `accept_incoming` negotiates. Keyed
    /// by call_id so a stale value can never leak into the next call.
    async fn stash_remote_invite_codec(&self, call_id: Uuid, codec: CodecPref) {
        *self.pending_remote_codec.lock().await = Some((call_id, codec));
    }

    async fn auto_reject(&self, from: NodeId, call_id: Uuid) {
        if let Ok(msg) = build_reject(self.local_id, from, call_id, Some(self.wall_now_secs())) {
            self.send_message(from, &msg).await;
        }
    }

    async fn handle_accept(&self, call_id: Uuid, call_dest: [u8; 32], codec: CodecPref) {
        let (remote_id, applies) = {
            let sm = self.state.lock().await;
            match sm.current_call() {
                Some(call) if call.call_id == call_id => (Some(call.remote_id), true),
                _ => (None, false),
            }
        };
        if !applies {
            return;
        }

        let outcome = {
            let mut sm = self.state.lock().await;
            sm.apply(
                CallEvent::RemoteAccepted {
                    call_id,
                    remote_call_dest: call_dest,
                    codec,
                },
                self.wall_now_secs(),
            )
        };

        match outcome {
            Ok(ApplyOutcome::Applied) => {
                self.fire_state_changed().await;
                if let Some(remote_id) = remote_id {
                    self.establish_link_as_caller(call_id, remote_id, codec).await;
                }
            }
            Ok(ApplyOutcome::IgnoredCallIdMismatch) => {}
            Err(e) => tracing::info!(%call_id, error = %e, "accept arrived in an invalid phase"),
        }
    }

    async fn handle_remote_end(&self, call_id: Uuid) {
        let applies = {
            let sm = self.state.lock().await;
            matches!(sm.current_call(), Some(call) if call.call_id == call_id)
        };
        if !applies {
            return;
        }
        self.teardown_session(CloseReason::RemoteClosed).await;
        self.apply_if_current(call_id, CallEvent::RemoteEnded).await;
        self.append_history_if_ended(call_id).await;
    }

    // ------------------------------------------------------------------
    // Media link lifecycle
    // ------------------------------------------------------------------

    async fn establish_link_as_caller(&self, call_id: Uuid, remote_id: NodeId, codec: CodecPref) {
        let open = tokio::time::timeout(LINK_ESTABLISH_TIMEOUT, self.transport.open_link(remote_id)).await;
        match open {
            Ok(Ok(link)) => self.on_link_established(call_id, remote_id, link, codec).await,
            Ok(Err(e)) => {
                tracing::warn!(%remote_id, error = %e, "link establishment failed");
                self.force_end(call_id, CallOutcome::LinkFailed).await;
            }
            Err(_) => {
                tracing::warn!(%remote_id, "link establishment timed out after 10s");
                self.force_end(call_id, CallOutcome::LinkFailed).await;
            }
        }
    }

    /// Invoked both when we opened the link (caller) and when the
    /// transport hands us an inbound link via `accept_link` (callee).
    async fn on_link_established(
        &self,
        call_id: Uuid,
        remote_id: NodeId,
        link: Arc<dyn LinkHandle>,
        codec: CodecPref,
    ) {
        let mut lifecycle = LinkLifecycle::new();
        if lifecycle.mark_established(link.link_id()).is_err() {
            return;
        }

        let (encoder, decoder) = match make_codec_pair(codec) {
            Ok(pair) => pair,
            Err(e) => {
                tracing::warn!(error = %e, "codec initialization failed, ending session");
                self.force_end(call_id, CallOutcome::CodecError).await;
                return;
            }
        };
        let frame_ms = encoder.config().frame_ms;
        let session = Arc::new(Mutex::new(MediaSession::new(
            encoder,
            decoder,
            JitterConfig {
                target_delay_ms: DEFAULT_JITTER_TARGET_MS,
                frame_ms,
            },
        )));

        let sas_code = sas(&link.link_id().0);

        {
            let mut active = self.active_session.lock().await;
            *active = Some(ActiveSession {
                lifecycle,
                link: link.clone(),
                session: session.clone(),
            });
        }

        self.notify(EngineEvent::SasReady { code: sas_code }).await;

        let recv_session = session.clone();
        let recv_link = link.clone();
        let inner = self.arc_self();
        link.register_receive_callback(Arc::new(move |bytes| {
            let session = recv_session.clone();
            let link = recv_link.clone();
            let inner = inner.clone();
            tokio::spawn(async move {
                inner.on_link_frame(session, link, bytes.into()).await;
            });
        }));

        let ping_inner = self.arc_self();
        let ping_link = link.clone();
        let ping_session = session.clone();
        tokio::spawn(async move {
            ping_inner.run_ping_loop(ping_link, ping_session).await;
        });

        let _ = remote_id;
    }

    async fn on_link_frame(
        &self,
        session: Arc<Mutex<MediaSession>>,
        link: Arc<dyn LinkHandle>,
        bytes: bytes::Bytes,
    ) {
        let now_ms = self.now_since_start().as_millis() as u64;
        let outcome = {
            let mut session = session.lock().await;
            session.on_incoming(bytes, now_ms)
        };
        if let IncomingOutcome::ReplyWithPong(pong) = outcome {
            let _ = link.send(pong.to_vec());
        }
    }

    async fn run_ping_loop(&self, link: Arc<dyn LinkHandle>, session: Arc<Mutex<MediaSession>>) {
        let mut interval = tokio::time::interval(PING_INTERVAL);
        loop {
            interval.tick().await;
            if !link.is_established() {
                break;
            }
            let now_ms = self.now_since_start().as_millis() as u64;
            let ping = {
                let mut session = session.lock().await;
                session.build_ping(now_ms)
            };
            if link.send(ping.to_vec()).is_err() {
                break;
            }
        }
    }

    async fn teardown_session(&self, reason: CloseReason) {
        let active = self.active_session.lock().await.take();
        if let Some(mut active) = active {
            let _ = active.lifecycle.close(reason);
            active.link.close();
        }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    async fn append_history_if_ended(&self, call_id: Uuid) {
        let record = {
            let sm = self.state.lock().await;
            sm.current_call().cloned()
        };
        let Some(record) = record else { return };
        if record.call_id != call_id {
            return;
        }
        let Some(outcome) = record.outcome else { return };

        let duration_s = match record.end_ts {
            Some(end) => end.saturating_sub(record.start_ts),
            None => 0,
        };
        let entry = HistoryEntry {
            call_id: record.call_id,
            remote_id: record.remote_id,
            display_name: record.display_name.clone(),
            direction: if record.initiated_by_local {
                Direction::Outgoing
            } else {
                Direction::Incoming
            },
            outcome: outcome.as_str().to_string(),
            duration_s,
            start_ts: record.start_ts,
        };

        let path = self.history_path.clone();
        if let Err(e) = tokio::task::spawn_blocking(move || history::append(&path, entry))
            .await
            .unwrap_or_else(|e| Err(EngineError::Persistence(e.to_string())))
        {
            tracing::error!(error = %e, "failed to append call history");
        }

        self.notify(EngineEvent::CallEnded { call_id, outcome }).await;

        {
            let mut sm = self.state.lock().await;
            if matches!(sm.current_call(), Some(c) if c.call_id == call_id) {
                let _ = sm.apply(CallEvent::Finalize, self.wall_now_secs());
            }
        }
        self.fire_state_changed().await;
    }

    async fn persist_directory(&self) {
        let snapshot = self.directory.snapshot();
        let path = self.peers_path.clone();
        if let Err(e) =
            tokio::task::spawn_blocking(move || rphone_peers::persist::save(&path, snapshot))
                .await
                .unwrap_or_else(|e| Err(rphone_peers::PeerError::Persistence(e.to_string())))
        {
            tracing::error!(error = %e, "failed to persist peer directory");
        }
    }
}

fn make_codec_pair(pref: CodecPref) -> Result<(Box<dyn Encoder>, Box<dyn Decoder>), CodecError> {
    match pref.codec_type {
        CodecType::Opus => {
            let config = CodecConfig {
                family: CodecFamily::Opus,
                sample_rate_hz: 48_000,
                channels: 1,
                frame_ms: 20,
                bitrate_or_mode: pref.bitrate.clamp(8_000, 64_000),
            };
            Ok((
                Box::new(OpusCodec::new(config)?),
                Box::new(OpusCodec::new(config)?),
            ))
        }
        CodecType::Codec2 => {
            let config = CodecConfig {
                family: CodecFamily::Codec2,
                sample_rate_hz: 8_000,
                channels: 1,
                frame_ms: 40,
                bitrate_or_mode: pref.bitrate.clamp(700, 3200),
            };
            Ok((
                Box::new(Codec2Codec::new(config)?),
                Box::new(Codec2Codec::new(config)?),
            ))
        }
    }
}

/// The one instance per process, held by the host application and never a
/// hidden global (spec.md §9).
#[derive(Clone)]
pub struct CallEngine {
    inner: Arc<EngineInner>,
}

impl CallEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        local_id: NodeId,
        local_public_key: PublicKey,
        transport: Arc<dyn Transport>,
        clock: Arc<dyn Clock>,
        directory: Arc<PeerDirectory>,
        rate_limiter_config: RateLimiterConfig,
        config: EngineConfig,
        peers_path: PathBuf,
        history_path: PathBuf,
    ) -> (Self, mpsc::Receiver<EngineEvent>) {
        let (event_tx, event_rx) = mpsc::channel(64);
        let start_instant = clock.monotonic_now();

        let inner = Arc::new_cyclic(|weak| EngineInner {
            local_id,
            local_public_key,
            transport: transport.clone(),
            clock,
            start_instant,
            directory,
            rate_limiter: RateLimiter::new(rate_limiter_config),
            state: Mutex::new(CallStateMachine::new(local_id)),
            active_session: Mutex::new(None),
            pending_remote_codec: Mutex::new(None),
            config: Mutex::new(config),
            peers_path,
            history_path,
            event_tx,
            self_ref: weak.clone(),
        });

        let packet_inner = inner.clone();
        transport.register_packet_callback(Arc::new(move |from, payload| {
            let inner = packet_inner.clone();
            tokio::spawn(async move {
                inner.handle_packet(from, payload).await;
            });
        }));

        let announce_inner = inner.clone();
        transport.register_announce_handler(Arc::new(move |dest_hash, public_key, app_data| {
            let inner = announce_inner.clone();
            tokio::spawn(async move {
                let now = chrono::Utc::now();
                let outcome = inner
                    .directory
                    .ingest_announce(dest_hash, public_key, &app_data, inner.local_id, now);
                if outcome == rphone_peers::AnnounceOutcome::Accepted {
                    inner.persist_directory().await;
                }
            });
        }));

        let accept_inner = inner.clone();
        transport.accept_link(Arc::new(move |link| {
            let inner = accept_inner.clone();
            tokio::spawn(async move {
                let (call_id, remote_id, codec) = {
                    let sm = inner.state.lock().await;
                    match sm.current_call() {
                        Some(call) if sm.phase() == CallPhase::InCall => {
                            (call.call_id, call.remote_id, call.negotiated_codec)
                        }
                        _ => return,
                    }
                };
                let Some(codec) = codec else { return };
                inner.on_link_established(call_id, remote_id, link, codec).await;
            });
        }));

        (Self { inner }, event_rx)
    }

    pub fn local_id(&self) -> NodeId {
        self.inner.local_id
    }

    pub fn local_public_key(&self) -> &PublicKey {
        &self.inner.local_public_key
    }

    pub fn directory(&self) -> Arc<PeerDirectory> {
        self.inner.directory.clone()
    }

    pub async fn phase(&self) -> CallPhase {
        self.inner.state.lock().await.phase()
    }

    pub async fn current_call(&self) -> Option<CallRecord> {
        self.inner.state.lock().await.current_call().cloned()
    }

    pub async fn start_outgoing(&self, remote_id: NodeId, display_name: Option<String>) -> Result<Uuid, EngineError> {
        self.inner.start_outgoing(remote_id, display_name).await
    }

    pub async fn accept_incoming(&self) -> Result<(), EngineError> {
        self.inner.accept_incoming().await
    }

    pub async fn reject_incoming(&self) -> Result<(), EngineError> {
        self.inner.reject_incoming().await
    }

    pub async fn hangup(&self) -> Result<(), EngineError> {
        self.inner.hangup().await
    }

    /// The user confirmed the SAS code matches out-of-band. Marks the
    /// current call's remote peer verified and persists it. A mismatch
    /// acknowledgement must call neither this nor any mutator (spec.md
    /// §4.10) — the host just offers termination instead.
    pub async fn acknowledge_sas_match(&self) -> Result<(), EngineError> {
        let remote_id = {
            let sm = self.inner.state.lock().await;
            sm.current_call().map(|c| c.remote_id)
        };
        let Some(remote_id) = remote_id else {
            return Ok(());
        };
        self.inner
            .directory
            .set_verified(remote_id, true)
            .map_err(|e| EngineError::Persistence(e.to_string()))?;
        self.inner.persist_directory().await;
        Ok(())
    }

    pub async fn update_config(&self, config: EngineConfig) {
        *self.inner.config.lock().await = config;
    }

    pub async fn config(&self) -> EngineConfig {
        self.inner.config.lock().await.clone()
    }
}
