//! Peer directory: announce ingestion, `resolve()` for the signaling layer,
//! and durable persistence of verification/block state across restarts.

pub mod directory;
pub mod error;
pub mod persist;
pub mod record;

pub use directory::{AnnounceOutcome, PeerDirectory};
pub use error::PeerError;
pub use record::{CallDestHash, PeerRecord};
