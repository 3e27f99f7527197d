//! Media-link lifecycle and SAS short-code derivation.
//!
//! This crate owns the small piece of state spec.md §4.9 describes: a link
//! starts `PENDING`, becomes `ESTABLISHED` once the transport's handshake
//! completes, and is `CLOSED` (terminal) from then on. Neither this crate
//! nor [`state::LinkLifecycle`] touches the transport or a clock directly —
//! `rphone-engine` owns the 10 s establishment timeout and calls
//! [`state::LinkLifecycle::mark_establish_timeout`] when it elapses, the
//! same separation `rphone-call-state` keeps between pure logic and I/O.

pub mod sas;
pub mod state;

pub use sas::{fallback_key_material, sas};
pub use state::{CloseReason, InvalidLinkTransition, LinkLifecycle, LinkState};
