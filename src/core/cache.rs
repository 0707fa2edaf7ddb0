// Author: Dustin Pilgrim
// License: MIT
//
// C1: persistent filename/title -> MediaIdentity map. Grounded on
// original_source/simkl_mps/media_cache.py (MediaCache.get/set/update/remove).

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::model::{CacheEntry, Kind, MediaIdentity};

#[derive(Debug, Default, Serialize, Deserialize)]
struct CacheFile {
    #[serde(flatten)]
    entries: HashMap<String, CacheEntry>,
}

pub struct MediaCache {
    path: PathBuf,
    entries: HashMap<String, CacheEntry>,
}

fn normalize(key: &str) -> String {
    key.trim().to_lowercase()
}

impl MediaCache {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice::<CacheFile>(&bytes)
                .map(|f| f.entries)
                .unwrap_or_default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(Error::Persistence { what: "media cache".into(), source: e }),
        };

        let cache = Self { path, entries };
        cache.save()?;
        Ok(cache)
    }

    pub fn get(&self, key: &str) -> Option<&CacheEntry> {
        self.entries.get(&normalize(key))
    }

    pub fn set(&mut self, key: &str, entry: CacheEntry) -> Result<()> {
        self.entries.insert(normalize(key), entry);
        self.save()
    }

    /// Shallow merge: missing (`None`) fields in `patch` keep the existing
    /// value. Inserts `patch` verbatim if `key` was absent.
    pub fn update(&mut self, key: &str, patch: CacheEntry) -> Result<()> {
        let norm = normalize(key);

        let merged = match self.entries.remove(&norm) {
            Some(existing) => merge_entry(existing, patch),
            None => patch,
        };

        self.entries.insert(norm, merged);
        self.save()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(&normalize(key));
        self.save()
    }

    pub fn find_by_simkl_id(&self, id: i64) -> Option<(&str, &CacheEntry)> {
        self.entries
            .iter()
            .find(|(_, e)| e.identity.id.as_simkl() == Some(id))
            .map(|(k, v)| (k.as_str(), v))
    }

    pub fn entries_of_kind(&self, kind: Kind) -> Vec<(&str, &CacheEntry)> {
        self.entries
            .iter()
            .filter(|(_, e)| e.identity.kind == kind)
            .map(|(k, v)| (k.as_str(), v))
            .collect()
    }

    fn save(&self) -> Result<()> {
        atomic_write_json(&self.path, &self.entries)
    }
}

/// Overlays `patch` onto `existing`: a `Some` in `patch` wins, a `None`
/// keeps whatever `existing` already had. `id`, `kind`, and `display_title`
/// are not optional, so `patch` always supplies them.
fn merge_entry(existing: CacheEntry, patch: CacheEntry) -> CacheEntry {
    CacheEntry {
        identity: MediaIdentity {
            id: patch.identity.id,
            kind: patch.identity.kind,
            display_title: patch.identity.display_title,
            year: patch.identity.year.or(existing.identity.year),
            season: patch.identity.season.or(existing.identity.season),
            episode: patch.identity.episode.or(existing.identity.episode),
            runtime_seconds: patch.identity.runtime_seconds.or(existing.identity.runtime_seconds),
            source_tag: patch.identity.source_tag,
            original_filepath: patch.identity.original_filepath.or(existing.identity.original_filepath),
        },
        poster_url: patch.poster_url.or(existing.poster_url),
        duration_seconds: patch.duration_seconds.or(existing.duration_seconds),
    }
}

/// Shared atomic write-then-rename helper used by cache/backlog/watch-history.
pub(crate) fn atomic_write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::Persistence {
            what: path.display().to_string(),
            source: e,
        })?;
    }

    let tmp = path.with_extension("json.tmp");
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(&tmp, bytes).map_err(|e| Error::Persistence {
        what: path.display().to_string(),
        source: e,
    })?;
    fs::rename(&tmp, path).map_err(|e| Error::Persistence {
        what: path.display().to_string(),
        source: e,
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{CatalogId, MediaIdentity, SourceTag};

    fn movie(title: &str) -> CacheEntry {
        CacheEntry {
            identity: MediaIdentity {
                id: CatalogId::Simkl(42),
                kind: Kind::Movie,
                display_title: title.to_string(),
                year: Some(2010),
                season: None,
                episode: None,
                runtime_seconds: Some(5400.0),
                source_tag: SourceTag::SimklTitleSearch,
                original_filepath: None,
            },
            poster_url: None,
            duration_seconds: Some(5400.0),
        }
    }

    #[test]
    fn keys_are_normalized_at_get_and_set() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = MediaCache::load(dir.path().join("media_cache.json")).unwrap();

        cache.set("Inception (2010)", movie("Inception")).unwrap();

        assert!(cache.get("inception (2010)").is_some());
        assert!(cache.get("INCEPTION (2010)").is_some());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("media_cache.json");

        {
            let mut cache = MediaCache::load(&path).unwrap();
            cache.set("inception (2010)", movie("Inception")).unwrap();
        }

        let reloaded = MediaCache::load(&path).unwrap();
        assert!(reloaded.get("inception (2010)").is_some());
    }

    #[test]
    fn find_by_simkl_id_matches_inserted_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = MediaCache::load(dir.path().join("media_cache.json")).unwrap();
        cache.set("inception (2010)", movie("Inception")).unwrap();

        let found = cache.find_by_simkl_id(42);
        assert_eq!(found.unwrap().0, "inception (2010)");
    }

    #[test]
    fn update_merges_instead_of_clobbering() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = MediaCache::load(dir.path().join("media_cache.json")).unwrap();

        let mut entry = movie("Inception");
        entry.poster_url = Some("https://example/poster.jpg".into());
        cache.set("inception (2010)", entry).unwrap();

        let mut patch = movie("Inception");
        patch.poster_url = None;
        patch.duration_seconds = Some(8880.0);
        cache.update("inception (2010)", patch).unwrap();

        let merged = cache.get("inception (2010)").unwrap();
        assert_eq!(merged.poster_url.as_deref(), Some("https://example/poster.jpg"));
        assert_eq!(merged.duration_seconds, Some(8880.0));
    }

    #[test]
    fn update_inserts_when_key_absent() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = MediaCache::load(dir.path().join("media_cache.json")).unwrap();

        cache.update("inception (2010)", movie("Inception")).unwrap();

        assert!(cache.get("inception (2010)").is_some());
    }
}
