//! `config.json`: the user-preference schema spec.md §6 lists, mirrored by
//! the `rphone-cli` flags in spec.md §6's CLI surface table.
//!
//! Every field is `#[serde(default)]` so a config file missing brand-new
//! keys still loads; unknown top-level keys are captured into `extra` and
//! re-serialized verbatim, so a newer host's additions survive a round
//! trip through an older core rewriting the file (spec.md §6: "schema is
//! stable; unknown keys preserved on rewrite").

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use rphone_signaling::CodecType;

use crate::error::EngineError;

fn default_codec_type() -> String {
    "opus".to_string()
}

fn default_codec_bitrate() -> u32 {
    24_000
}

fn default_announce_period_min() -> u32 {
    5
}

fn default_max_per_minute() -> u32 {
    5
}

fn default_max_per_hour() -> u32 {
    20
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub audio_input_device: Option<u32>,
    #[serde(default)]
    pub audio_output_device: Option<u32>,
    #[serde(default = "default_codec_type")]
    pub codec_type: String,
    #[serde(default = "default_codec_bitrate")]
    pub codec_bitrate: u32,
    #[serde(default)]
    pub no_announce: bool,
    #[serde(default = "default_announce_period_min")]
    pub announce_period_min: u32,
    #[serde(default)]
    pub display_name: String,
    #[serde(default = "default_max_per_minute")]
    pub rate_limit_max_per_minute: u32,
    #[serde(default = "default_max_per_hour")]
    pub rate_limit_max_per_hour: u32,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_file: Option<String>,

    /// Any top-level key this version of the schema doesn't know about,
    /// preserved verbatim through load/save.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            audio_input_device: None,
            audio_output_device: None,
            codec_type: default_codec_type(),
            codec_bitrate: default_codec_bitrate(),
            no_announce: false,
            announce_period_min: default_announce_period_min(),
            display_name: String::new(),
            rate_limit_max_per_minute: default_max_per_minute(),
            rate_limit_max_per_hour: default_max_per_hour(),
            log_level: default_log_level(),
            log_file: None,
            extra: Map::new(),
        }
    }
}

impl EngineConfig {
    pub fn codec_type(&self) -> CodecType {
        CodecType::from_wire_str(&self.codec_type).unwrap_or(CodecType::Opus)
    }
}

/// Load `config.json`. A missing file loads as the default config, matching
/// the peer directory's first-run behavior in `rphone-peers::persist`.
pub fn load(path: &Path) -> Result<EngineConfig, EngineError> {
    if !path.exists() {
        return Ok(EngineConfig::default());
    }
    let bytes = fs::read(path).map_err(|e| EngineError::Persistence(format!("read config: {e}")))?;
    serde_json::from_slice(&bytes).map_err(|e| EngineError::Persistence(format!("parse config: {e}")))
}

/// Write `config.json` via write-to-temp + rename, the same crash-safety
/// discipline `rphone-peers::persist` uses for `peers.json`.
pub fn save(path: &Path, config: &EngineConfig) -> Result<(), EngineError> {
    let json = serde_json::to_vec_pretty(config)
        .map_err(|e| EngineError::Persistence(format!("serialize config: {e}")))?;

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let tmp_path = dir.join(".config.json.tmp");

    fs::write(&tmp_path, &json)
        .map_err(|e| EngineError::Persistence(format!("write temp config: {e}")))?;
    fs::rename(&tmp_path, path)
        .map_err(|e| EngineError::Persistence(format!("rename config: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let cfg = load(&path).unwrap();
        assert_eq!(cfg, EngineConfig::default());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut cfg = EngineConfig::default();
        cfg.display_name = "Alice".to_string();
        cfg.codec_bitrate = 16_000;

        save(&path, &cfg).unwrap();
        let loaded = load(&path).unwrap();
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn unknown_top_level_keys_survive_a_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            serde_json::json!({
                "display_name": "Bob",
                "a_future_field_this_version_does_not_know": {"nested": true},
            })
            .to_string(),
        )
        .unwrap();

        let cfg = load(&path).unwrap();
        assert_eq!(cfg.display_name, "Bob");
        assert!(cfg.extra.contains_key("a_future_field_this_version_does_not_know"));

        save(&path, &cfg).unwrap();
        let reloaded: Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(reloaded
            .get("a_future_field_this_version_does_not_know")
            .is_some());
    }

    #[test]
    fn missing_keys_in_an_old_file_use_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{}").unwrap();
        let cfg = load(&path).unwrap();
        assert_eq!(cfg.codec_bitrate, default_codec_bitrate());
        assert_eq!(cfg.rate_limit_max_per_minute, default_max_per_minute());
    }
}
