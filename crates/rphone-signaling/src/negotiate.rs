//! Codec negotiation: a pure function of the two sides' codec preferences.
//!
//! Rules (spec.md §4.1), in order:
//!
//! 1. No remote codec info at all → the local preference wins outright.
//! 2. Exactly one side prefers Codec2 → that side's `(codec2, mode)` wins,
//!    unconditionally — Codec2 always beats Opus to conserve bandwidth on
//!    constrained links.
//! 3. Same codec family on both sides → the lower bitrate wins; equal
//!    bitrates favor the local side.
//!
//! A Codec2 mode value is numerically its bits-per-second, so no separate
//! normalization step is needed before comparing bitrates across families.

use crate::message::{CodecPref, CodecType};

/// Negotiate a codec preference. `remote` is `None` when the other side
/// supplied no codec info at all (spec.md rule 1).
pub fn negotiate(local: CodecPref, remote: Option<CodecPref>) -> CodecPref {
    let Some(remote) = remote else {
        return local;
    };

    let local_is_codec2 = local.codec_type == CodecType::Codec2;
    let remote_is_codec2 = remote.codec_type == CodecType::Codec2;

    if local_is_codec2 != remote_is_codec2 {
        return if local_is_codec2 { local } else { remote };
    }

    if local.bitrate <= remote.bitrate {
        local
    } else {
        remote
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn pref(codec_type: CodecType, bitrate: u32) -> CodecPref {
        CodecPref { codec_type, bitrate }
    }

    #[test]
    fn no_remote_info_keeps_local() {
        let local = pref(CodecType::Opus, 24000);
        assert_eq!(negotiate(local, None), local);
    }

    #[test]
    fn codec2_always_wins_over_opus() {
        let local = pref(CodecType::Opus, 48000);
        let remote = pref(CodecType::Codec2, 1600);
        assert_eq!(negotiate(local, Some(remote)), remote);

        let local = pref(CodecType::Codec2, 1600);
        let remote = pref(CodecType::Opus, 48000);
        assert_eq!(negotiate(local, Some(remote)), local);
    }

    #[test]
    fn same_family_picks_lower_bitrate_local_wins_ties() {
        let local = pref(CodecType::Opus, 24000);
        let remote = pref(CodecType::Opus, 16000);
        assert_eq!(negotiate(local, Some(remote)), remote);

        let remote_equal = pref(CodecType::Opus, 24000);
        assert_eq!(negotiate(local, Some(remote_equal)), local);
    }

    fn arb_pref() -> impl Strategy<Value = CodecPref> {
        (prop_oneof![Just(CodecType::Opus), Just(CodecType::Codec2)], 0u32..4_000_000)
            .prop_map(|(codec_type, bitrate)| CodecPref { codec_type, bitrate })
    }

    proptest! {
        #[test]
        fn negotiation_symmetry(a in arb_pref(), b in arb_pref()) {
            prop_assert_eq!(negotiate(a, Some(b)), negotiate(b, Some(a)));
        }

        #[test]
        fn negotiation_idempotence(a in arb_pref(), b in arb_pref()) {
            let first = negotiate(a, Some(b));
            let second = negotiate(first, Some(b));
            prop_assert_eq!(first, second);
        }

        #[test]
        fn codec2_dominance(a in arb_pref(), b in arb_pref()) {
            if a.codec_type == CodecType::Codec2 || b.codec_type == CodecType::Codec2 {
                prop_assert_eq!(negotiate(a, Some(b)).codec_type, CodecType::Codec2);
            }
        }
    }
}
