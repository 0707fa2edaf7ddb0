// Author: Dustin Pilgrim
// License: MIT
//
// A3: `settings.json` under the app-data directory. Grounded on
// original_source/simkl_mps/config_manager.py (load_settings/save_settings,
// threshold validation/defaulting) and the teacher's fallback-chain loading
// shape (config/mod.rs::load_from_path/resolve_default_config_path),
// rebuilt on serde_json in place of the teacher's `rune_cfg` DSL per
// DESIGN.md's dependency audit.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::cache::atomic_write_json;
use crate::core::error::{Error, Result};

pub const DEFAULT_THRESHOLD: u32 = 80;
const DEFAULT_POLL_INTERVAL_SECONDS: u64 = 10;
const DEFAULT_SYNC_INTERVAL_SECONDS: u64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub watch_completion_threshold: u32,
    pub poll_interval_seconds: u64,
    pub sync_interval_seconds: u64,
    pub simkl_client_id: Option<String>,
    pub simkl_access_token: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            watch_completion_threshold: DEFAULT_THRESHOLD,
            poll_interval_seconds: DEFAULT_POLL_INTERVAL_SECONDS,
            sync_interval_seconds: DEFAULT_SYNC_INTERVAL_SECONDS,
            simkl_client_id: None,
            simkl_access_token: None,
        }
    }
}

impl Settings {
    /// Clamps an out-of-range or non-numeric threshold back to the default,
    /// matching config_manager.py's validate-on-load behavior.
    fn normalize(mut self) -> Self {
        if self.watch_completion_threshold == 0 || self.watch_completion_threshold > 100 {
            tracing::warn!(
                invalid = self.watch_completion_threshold,
                "settings: watch_completion_threshold out of range, resetting to default"
            );
            self.watch_completion_threshold = DEFAULT_THRESHOLD;
        }
        if self.poll_interval_seconds == 0 {
            self.poll_interval_seconds = DEFAULT_POLL_INTERVAL_SECONDS;
        }
        if self.sync_interval_seconds == 0 {
            self.sync_interval_seconds = DEFAULT_SYNC_INTERVAL_SECONDS;
        }
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.simkl_client_id.as_deref().is_some_and(|s| !s.is_empty())
            && self.simkl_access_token.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        atomic_write_json(path, self)
    }
}

/// Loaded settings plus the concrete path that was used, mirroring the
/// teacher's `LoadedConfig` shape.
#[derive(Debug, Clone)]
pub struct LoadedSettings {
    pub path: PathBuf,
    pub settings: Settings,
}

pub fn default_app_data_dir() -> PathBuf {
    dirs::data_dir().unwrap_or_else(std::env::temp_dir).join("simkl-scrobbler")
}

pub fn default_settings_path() -> PathBuf {
    default_app_data_dir().join("settings.json")
}

/// Loads from `path` if given, else the default app-data path. A missing
/// file yields in-memory defaults (and is written out so the next run finds
/// something to hand-edit); a malformed file is a hard error, since that
/// usually means the user's hand edit broke the JSON.
pub fn load_from_path(path: Option<&Path>) -> Result<LoadedSettings> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_settings_path);

    let settings = match fs::read(&path) {
        Ok(bytes) => serde_json::from_slice::<Settings>(&bytes)
            .map_err(|e| Error::Configuration(format!("{}: {e}", path.display())))?
            .normalize(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            let defaults = Settings::default();
            defaults.save(&path)?;
            defaults
        }
        Err(e) => return Err(Error::Persistence { what: "settings".into(), source: e }),
    };

    Ok(LoadedSettings { path, settings })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults_and_writes_them() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let loaded = load_from_path(Some(&path)).unwrap();
        assert_eq!(loaded.settings.watch_completion_threshold, DEFAULT_THRESHOLD);
        assert!(path.exists());
    }

    #[test]
    fn out_of_range_threshold_is_normalized_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, br#"{"watch_completion_threshold": 150}"#).unwrap();

        let loaded = load_from_path(Some(&path)).unwrap();
        assert_eq!(loaded.settings.watch_completion_threshold, DEFAULT_THRESHOLD);
    }

    #[test]
    fn partial_file_fills_in_defaults_for_missing_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, br#"{"simkl_client_id": "abc123"}"#).unwrap();

        let loaded = load_from_path(Some(&path)).unwrap();
        assert_eq!(loaded.settings.simkl_client_id.as_deref(), Some("abc123"));
        assert_eq!(loaded.settings.poll_interval_seconds, DEFAULT_POLL_INTERVAL_SECONDS);
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let mut settings = Settings::default();
        settings.simkl_access_token = Some("tok".into());
        settings.save(&path).unwrap();

        let loaded = load_from_path(Some(&path)).unwrap();
        assert_eq!(loaded.settings.simkl_access_token.as_deref(), Some("tok"));
    }
}
