//! The call engine: wires identity, signaling, peers, admission, call-state,
//! media, and link lifecycle into one runnable object plus its on-disk
//! state (`config.json`, `call_history.json`). `rphone-cli` (or any other
//! host) only ever talks to [`CallEngine`] and the plain data types below.

mod config;
mod engine;
mod error;
mod history;

pub use config::EngineConfig;
pub use engine::{CallEngine, EngineEvent};
pub use error::EngineError;
pub use history::{Direction, HistoryEntry};

pub mod persist {
    //! Re-exported so a host application only needs `rphone_engine::persist`
    //! for both of the engine's JSON stores, alongside `rphone_peers::persist`
    //! for `peers.json`.
    pub use crate::config::{load as load_config, save as save_config};
    pub use crate::history::{append as append_history, load as load_history};
}
