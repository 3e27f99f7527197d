pub mod codec;
pub mod framer;
pub mod jitter;
pub mod pipeline;
pub mod rtt;

pub use codec::{CodecConfig, CodecError, CodecFamily, Codec2Codec, Decoder, Encoder, OpusCodec};
pub use framer::{decode as decode_frame, Frame, FrameType, FramerError, SequenceCounter};
pub use jitter::{JitterBuffer, JitterConfig, JitterStats};
pub use pipeline::{run_capture_task, run_playback_task, IncomingOutcome, MediaSession, PipelineStats};
pub use rtt::RttTracker;

#[cfg(test)]
mod proptests {
    use super::*;
    use bytes::Bytes;
    use proptest::prelude::*;

    // Jitter-buffer ordering: the released sequence is non-decreasing,
    // i.e. a subsequence of the input sorted by seq (drops aside), staying
    // inside a seq range small enough that wraparound never enters in.
    proptest! {
        #[test]
        fn released_frames_come_out_in_non_decreasing_sequence_order(
            seqs in prop::collection::vec(0u32..1000, 1..40)
        ) {
            let mut jb = JitterBuffer::new(JitterConfig { target_delay_ms: 100, frame_ms: 20 });
            for seq in &seqs {
                jb.insert(*seq, Bytes::from_static(b"x"));
            }

            let mut released = Vec::new();
            for _ in 0..seqs.len() + 40 {
                if let Some((seq, _payload)) = jb.tick() {
                    released.push(seq);
                }
            }

            for pair in released.windows(2) {
                prop_assert!(pair[0] <= pair[1]);
            }
            prop_assert!(released.len() as u64 <= seqs.len() as u64);
        }
    }

    // MTU/frame-size compliance: every encoded frame is at least 5 bytes
    // (the header) and never panics regardless of payload length.
    proptest! {
        #[test]
        fn encoded_audio_frames_always_carry_the_five_byte_header(
            seq in any::<u32>(), payload in prop::collection::vec(any::<u8>(), 0..200)
        ) {
            let bytes = Bytes::from(payload.clone());
            let framed = framer::encode_audio(seq, bytes);
            prop_assert_eq!(framed.len(), 5 + payload.len());
            let decoded = framer::decode(framed).unwrap();
            prop_assert_eq!(decoded.seq, seq);
            prop_assert_eq!(decoded.payload.to_vec(), payload);
        }
    }
}
