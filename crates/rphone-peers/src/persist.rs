//! Durable storage of the peer directory to `peers.json`.
//!
//! Writes go to a temporary file in the same directory followed by a
//! rename, so a crash mid-write can never leave a torn `peers.json` behind
//! (spec.md §4.2).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PeerError;
use crate::record::PeerRecord;

const SCHEMA_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct PersistedDirectory {
    version: u32,
    peers: Vec<PeerRecord>,
}

/// Write the full directory, replacing any existing file atomically.
pub fn save(path: &Path, peers: Vec<PeerRecord>) -> Result<(), PeerError> {
    let doc = PersistedDirectory {
        version: SCHEMA_VERSION,
        peers,
    };
    let json = serde_json::to_vec_pretty(&doc)
        .map_err(|e| PeerError::Persistence(format!("serialize: {e}")))?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(format!(
        ".{}.tmp",
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "peers.json".to_string())
    ));

    fs::write(&tmp_path, &json).map_err(|e| PeerError::Persistence(format!("write temp: {e}")))?;
    fs::rename(&tmp_path, path).map_err(|e| PeerError::Persistence(format!("rename: {e}")))?;
    Ok(())
}

/// Load the directory from disk. A missing file is treated as an empty
/// directory rather than an error, matching first-run behavior.
pub fn load(path: &Path) -> Result<Vec<PeerRecord>, PeerError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path).map_err(|e| PeerError::Persistence(format!("read: {e}")))?;
    let doc: PersistedDirectory = serde_json::from_slice(&bytes)
        .map_err(|e| PeerError::Persistence(format!("deserialize: {e}")))?;
    Ok(doc.peers)
}
