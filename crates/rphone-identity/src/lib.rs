//! Identity and destination primitives, and the capability seams the call
//! engine uses to talk to the outside world.
//!
//! This crate owns nothing transport-specific. It defines:
//!
//! - [`NodeId`] / [`PublicKey`] — the stable identifiers carried in peer
//!   records and signaling messages.
//! - [`destination_hash`] — deterministic reconstruction of a destination
//!   from a public key and an aspect string, so any party that has observed
//!   an announce can address the identity that sent it without a directory
//!   lookup round-trip over the network.
//! - [`Transport`] and [`Clock`] — the two capability traits the rest of the
//!   workspace is generic over, so tests can run against in-memory fakes
//!   instead of a real mesh radio or wall clock.

pub mod clock;
pub mod destination;
pub mod ids;
pub mod transport;

pub use clock::{Clock, MockClock, SystemClock};
pub use destination::{destination_hash, ASPECT_CALL, DESTINATION_APP_NAME};
pub use ids::{NodeId, PublicKey};
pub use transport::{
    AnnounceHandler, LinkHandle, LinkId, MockTransport, PacketHandler, Transport, TransportError,
};
