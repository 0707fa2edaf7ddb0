// Author: Dustin Pilgrim
// License: MIT
//
// C2: durable map of completed-but-unsynced views. Grounded on
// original_source/simkl_mps/backlog_cleaner.py (BacklogCleaner add/get_pending/
// remove/clear), including its list->dict migration for older backlog files.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use serde::Deserialize;

use crate::core::cache::atomic_write_json;
use crate::core::error::{Error, Result};
use crate::core::model::BacklogEntry;

/// Accepts either the canonical map form or the legacy list form on load,
/// per the REDESIGN FLAGS decision in SPEC_FULL.md §9.
#[derive(Deserialize)]
#[serde(untagged)]
enum OnDiskBacklog {
    Map(HashMap<String, BacklogEntry>),
    List(Vec<BacklogEntry>),
}

pub struct BacklogStore {
    path: PathBuf,
    entries: HashMap<String, BacklogEntry>,
}

impl BacklogStore {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<OnDiskBacklog>(&bytes) {
                Ok(OnDiskBacklog::Map(m)) => m,
                Ok(OnDiskBacklog::List(list)) => {
                    tracing::info!("backlog: migrating legacy list-form file to map form");
                    list.into_iter().map(|e| (e.key.clone(), e)).collect()
                }
                Err(_) => HashMap::new(),
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(Error::Persistence { what: "backlog".into(), source: e }),
        };

        let store = Self { path, entries };
        store.save()?;
        Ok(store)
    }

    /// Upsert keyed by `entry.key`; preserves the earliest `enqueued_at` seen
    /// for this key, matching the original's "don't bump the queue date on a
    /// repeat enqueue" behavior.
    pub fn add(&mut self, mut entry: BacklogEntry) -> Result<()> {
        if let Some(existing) = self.entries.get(&entry.key) {
            entry.enqueued_at = existing.enqueued_at;
        }
        self.entries.insert(entry.key.clone(), entry);
        self.save()
    }

    pub fn get_all(&self) -> impl Iterator<Item = &BacklogEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        self.save()
    }

    /// Replace `old_key` with a re-resolved entry under its real identifier,
    /// used by the sync worker when a temporary id is resolved (SPEC_FULL.md §4.7).
    pub fn replace_key(&mut self, old_key: &str, new_entry: BacklogEntry) -> Result<()> {
        self.entries.remove(old_key);
        self.entries.insert(new_entry.key.clone(), new_entry);
        self.save()
    }

    pub fn clear(&mut self) -> Result<()> {
        self.entries.clear();
        self.save()
    }

    fn save(&self) -> Result<()> {
        atomic_write_json(&self.path, &self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{CatalogId, Kind};
    use chrono::Utc;

    fn entry(key: &str) -> BacklogEntry {
        BacklogEntry {
            key: key.to_string(),
            id: CatalogId::Simkl(42),
            display_title: "Inception".into(),
            kind: Kind::Movie,
            season: None,
            episode: None,
            original_filepath: None,
            enqueued_at: Utc::now(),
        }
    }

    #[test]
    fn dedups_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BacklogStore::load(dir.path().join("backlog.json")).unwrap();

        store.add(entry("42")).unwrap();
        store.add(entry("42")).unwrap();

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn repeat_add_keeps_earliest_enqueued_at() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BacklogStore::load(dir.path().join("backlog.json")).unwrap();

        store.add(entry("42")).unwrap();
        let first_ts = store.get_all().next().unwrap().enqueued_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        store.add(entry("42")).unwrap();
        let second_ts = store.get_all().next().unwrap().enqueued_at;

        assert_eq!(first_ts, second_ts);
    }

    #[test]
    fn migrates_legacy_list_form() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backlog.json");

        let legacy = vec![entry("42"), entry("43")];
        fs::write(&path, serde_json::to_vec(&legacy).unwrap()).unwrap();

        let store = BacklogStore::load(&path).unwrap();
        assert_eq!(store.len(), 2);

        let reloaded = fs::read_to_string(&path).unwrap();
        assert!(reloaded.trim_start().starts_with('{'));
    }

    #[test]
    fn clear_empties_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = BacklogStore::load(dir.path().join("backlog.json")).unwrap();
        store.add(entry("42")).unwrap();
        store.clear().unwrap();
        assert!(store.is_empty());
    }
}
