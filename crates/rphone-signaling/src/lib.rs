//! Signaling protocol: message schema, JSON wire codec, MTU discipline, and
//! codec negotiation.
//!
//! This crate has no I/O and no mutable state: it is pure data-in,
//! data/error-out, which is what makes the universal invariants in
//! spec.md §8 (round-trip, MTU compliance, negotiation symmetry/idempotence/
//! Codec2 dominance) testable as straightforward property tests.

pub mod builders;
pub mod codec;
pub mod error;
pub mod message;
pub mod negotiate;

pub use builders::{build_accept, build_end, build_invite, build_reject, build_ringing};
pub use codec::{encode, parse, MAX_JSON_BYTES};
pub use error::SignalingError;
pub use message::{CallMessage, CodecPref, CodecType, Envelope};
pub use negotiate::negotiate;
