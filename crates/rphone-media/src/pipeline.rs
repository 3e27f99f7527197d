//! The audio pipeline: capture -> encode -> frame -> link send, and
//! link receive -> frame -> decode -> jitter -> playback. Owns one
//! encoder, one decoder, one jitter buffer, and the running counters a UI
//! status line would show.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use rphone_identity::LinkHandle;

use crate::codec::{CodecError, Decoder, Encoder};
use crate::framer::{self, Frame, FrameType, FramerError, SequenceCounter};
use crate::jitter::{JitterBuffer, JitterConfig, JitterStats};
use crate::rtt::RttTracker;

/// Running counters for one media session, cheap to snapshot for a UI
/// status line.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineStats {
    pub frames_captured: u64,
    pub encode_failures: u64,
    pub decode_failures: u64,
    pub pings_sent: u64,
    pub pongs_received: u64,
    pub malformed_frames_dropped: u64,
}

/// What happened to one inbound link frame, returned by
/// [`MediaSession::on_incoming`] so the caller knows whether a reply frame
/// needs sending.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingOutcome {
    /// An audio frame was decoded and handed to the jitter buffer.
    AudioBuffered,
    /// An audio frame failed to decode; counted and skipped.
    DecodeFailed,
    /// A ping arrived; the caller should send this pong frame.
    ReplyWithPong(Bytes),
    /// A pong arrived; RTT was updated to this millisecond value.
    RttMeasured(f64),
    /// A pong arrived whose payload wasn't a valid 8-byte timestamp.
    PongMalformed,
    /// Control frame; accepted but not acted on.
    ControlIgnored,
    /// Frame failed to parse at all.
    Malformed(FramerError),
}

/// Pure core of one call's media session: no transport, no clock, no
/// audio-device handle. The capture/playback tasks in this module are the
/// only place those are touched, and they take `now`/PCM data as explicit
/// inputs so this struct stays unit-testable.
pub struct MediaSession {
    encoder: Box<dyn Encoder>,
    decoder: Box<dyn Decoder>,
    jitter: JitterBuffer,
    seq: SequenceCounter,
    rtt: RttTracker,
    stats: PipelineStats,
}

impl MediaSession {
    pub fn new(encoder: Box<dyn Encoder>, decoder: Box<dyn Decoder>, jitter_config: JitterConfig) -> Self {
        Self {
            encoder,
            decoder,
            jitter: JitterBuffer::new(jitter_config),
            seq: SequenceCounter::new(),
            rtt: RttTracker::new(),
            stats: PipelineStats::default(),
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    pub fn jitter_stats(&self) -> JitterStats {
        self.jitter.stats()
    }

    pub fn rtt_ms(&self) -> Option<f64> {
        self.rtt.estimate_ms()
    }

    /// Encode and frame one captured PCM window for sending over the
    /// link. Returns `None` (and bumps a counter) if the encoder rejects
    /// the window; the pipeline does not abort on an encode failure.
    pub fn on_capture(&mut self, pcm_window: &[i16]) -> Option<Bytes> {
        self.stats.frames_captured += 1;
        match self.encoder.encode(pcm_window) {
            Ok(bytes) => Some(framer::encode_audio(self.seq.next(), bytes)),
            Err(_) => {
                self.stats.encode_failures += 1;
                None
            }
        }
    }

    /// Build the next outbound ping frame. The 8-byte monotonic timestamp
    /// the caller supplies becomes the frame's payload so the peer's pong
    /// can echo it back for RTT computation.
    pub fn build_ping(&mut self, now_ms: u64) -> Bytes {
        self.stats.pings_sent += 1;
        let payload = Bytes::copy_from_slice(&now_ms.to_be_bytes());
        framer::encode_ping_with_payload(self.seq.next(), payload)
    }

    /// Feed one frame received over the link. `now_ms` is used only to
    /// compute RTT on a pong.
    pub fn on_incoming(&mut self, bytes: Bytes, now_ms: u64) -> IncomingOutcome {
        let frame: Frame = match framer::decode(bytes) {
            Ok(f) => f,
            Err(e) => {
                self.stats.malformed_frames_dropped += 1;
                return IncomingOutcome::Malformed(e);
            }
        };

        match frame.frame_type {
            FrameType::Audio => {
                let frame_size = self.decoder.config().sample_rate_hz as usize
                    * self.decoder.config().frame_ms as usize
                    / 1000;
                match self.decoder.decode(&frame.payload, frame_size) {
                    Ok(pcm) => {
                        let reencoded = Bytes::from(
                            pcm.iter().flat_map(|s| s.to_le_bytes()).collect::<Vec<u8>>(),
                        );
                        self.jitter.insert(frame.seq, reencoded);
                        IncomingOutcome::AudioBuffered
                    }
                    Err(_) => {
                        self.stats.decode_failures += 1;
                        IncomingOutcome::DecodeFailed
                    }
                }
            }
            FrameType::Ping => {
                let pong = framer::encode_pong(self.seq.next(), frame.payload);
                IncomingOutcome::ReplyWithPong(pong)
            }
            FrameType::Pong => {
                if frame.payload.len() != 8 {
                    return IncomingOutcome::PongMalformed;
                }
                let sent_ms = u64::from_be_bytes(frame.payload[..8].try_into().unwrap());
                let rtt_ms = now_ms.saturating_sub(sent_ms) as f64;
                self.rtt.observe(rtt_ms);
                self.stats.pongs_received += 1;
                IncomingOutcome::RttMeasured(rtt_ms)
            }
            FrameType::Control => IncomingOutcome::ControlIgnored,
        }
    }

    /// One playback tick: pops the next ready frame from the jitter
    /// buffer, or `None` if silence should be emitted instead.
    pub fn tick_playback(&mut self) -> Option<Bytes> {
        self.jitter.tick().map(|(_seq, payload)| payload)
    }
}

/// Capture task: pulls PCM windows from the audio-device adapter's channel,
/// encodes and frames them, and sends over the link. Stops when the
/// capture channel closes or the link reports a send failure.
pub async fn run_capture_task(
    mut pcm_rx: mpsc::Receiver<Vec<i16>>,
    session: Arc<tokio::sync::Mutex<MediaSession>>,
    link: Arc<dyn LinkHandle>,
) {
    while let Some(pcm) = pcm_rx.recv().await {
        let framed = {
            let mut session = session.lock().await;
            session.on_capture(&pcm)
        };
        if let Some(bytes) = framed {
            if link.send(bytes.to_vec()).is_err() {
                tracing::warn!("link send failed during capture, stopping capture task");
                break;
            }
        }
    }
}

/// Playback task: ticks the jitter buffer every `frame_ms` and forwards
/// whatever it releases (or silence) to the audio-device adapter's sink.
/// Never blocks on the sink beyond one bounded channel send.
pub async fn run_playback_task(
    session: Arc<tokio::sync::Mutex<MediaSession>>,
    pcm_tx: mpsc::Sender<Option<Bytes>>,
    frame_ms: u64,
) {
    let mut interval = tokio::time::interval(Duration::from_millis(frame_ms));
    loop {
        interval.tick().await;
        let released = {
            let mut session = session.lock().await;
            session.tick_playback()
        };
        if pcm_tx.send(released).await.is_err() {
            break;
        }
    }
}
