//! `call_history.json`: an append-only (in effect — this core compacts the
//! whole file on each write, per spec.md's deferred compaction note) log of
//! completed calls, written with the same temp-file + rename discipline as
//! `rphone-peers::persist`.

use std::fs;
use std::path::Path;

use rphone_identity::NodeId;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// Exactly the fields spec.md §6 lists for `call_history.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub call_id: uuid::Uuid,
    pub remote_id: NodeId,
    pub display_name: Option<String>,
    pub direction: Direction,
    pub outcome: String,
    pub duration_s: u64,
    pub start_ts: u64,
}

/// Append one entry, rewriting the whole file atomically. Small enough in
/// this core's scope that a full rewrite per call is not a concern; a
/// future revision could switch to a true append-only on-disk log if
/// history size ever grows unbounded.
pub fn append(path: &Path, entry: HistoryEntry) -> Result<(), EngineError> {
    let mut entries = load(path)?;
    entries.push(entry);
    save(path, &entries)
}

/// `call_history.json` is a bare top-level JSON array per spec.md §6, with
/// no wrapper object (unlike `peers.json`'s `{"version":1,"peers":[...]}`).
pub fn load(path: &Path) -> Result<Vec<HistoryEntry>, EngineError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path).map_err(|e| EngineError::Persistence(format!("read history: {e}")))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| EngineError::Persistence(format!("parse history: {e}")))
}

fn save(path: &Path, entries: &[HistoryEntry]) -> Result<(), EngineError> {
    let json = serde_json::to_vec_pretty(entries)
        .map_err(|e| EngineError::Persistence(format!("serialize history: {e}")))?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(".call_history.json.tmp");

    fs::write(&tmp_path, &json)
        .map_err(|e| EngineError::Persistence(format!("write temp history: {e}")))?;
    fs::rename(&tmp_path, path)
        .map_err(|e| EngineError::Persistence(format!("rename history: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(remote_seed: u8) -> HistoryEntry {
        HistoryEntry {
            call_id: uuid::Uuid::nil(),
            remote_id: NodeId::from_bytes([remote_seed; 32]),
            display_name: Some("Alice".to_string()),
            direction: Direction::Outgoing,
            outcome: "completed".to_string(),
            duration_s: 42,
            start_ts: 1_700_000_000,
        }
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call_history.json");
        assert!(load(&path).unwrap().is_empty());
    }

    #[test]
    fn appends_accumulate_across_calls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call_history.json");

        append(&path, entry(1)).unwrap();
        append(&path, entry(2)).unwrap();

        let entries = load(&path).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].remote_id, NodeId::from_bytes([1u8; 32]));
        assert_eq!(entries[1].remote_id, NodeId::from_bytes([2u8; 32]));
    }

    #[test]
    fn no_temp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("call_history.json");
        append(&path, entry(1)).unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("call_history.json")]);
    }
}
