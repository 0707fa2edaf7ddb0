// Author: Dustin Pilgrim
// License: MIT
//
// A2: bounded local audit trail of successful syncs. Never consulted for
// scrobble decisions; distinct from the backlog (SPEC_FULL.md §A.5).

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;

use crate::core::cache::atomic_write_json;
use crate::core::error::{Error, Result};
use crate::core::model::WatchHistoryEntry;

const MAX_ENTRIES: usize = 500;

pub struct WatchHistory {
    path: PathBuf,
    entries: VecDeque<WatchHistoryEntry>,
}

impl WatchHistory {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries: VecDeque<WatchHistoryEntry> = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => VecDeque::new(),
            Err(e) => return Err(Error::Persistence { what: "watch history".into(), source: e }),
        };

        Ok(Self { path, entries })
    }

    pub fn record(&mut self, entry: WatchHistoryEntry) -> Result<()> {
        self.entries.push_back(entry);
        while self.entries.len() > MAX_ENTRIES {
            self.entries.pop_front();
        }
        self.save()
    }

    pub fn entries(&self) -> impl Iterator<Item = &WatchHistoryEntry> {
        self.entries.iter()
    }

    fn save(&self) -> Result<()> {
        let as_vec: Vec<&WatchHistoryEntry> = self.entries.iter().collect();
        atomic_write_json(&self.path, &as_vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::Kind;
    use chrono::Utc;

    fn entry(id: i64) -> WatchHistoryEntry {
        WatchHistoryEntry {
            simkl_id: id,
            display_title: "Inception".into(),
            kind: Kind::Movie,
            season: None,
            episode: None,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn caps_at_max_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut history = WatchHistory::load(dir.path().join("watch_history.json")).unwrap();

        for i in 0..(MAX_ENTRIES + 10) {
            history.record(entry(i as i64)).unwrap();
        }

        assert_eq!(history.entries().count(), MAX_ENTRIES);
        assert_eq!(history.entries().next().unwrap().simkl_id, 10);
    }
}
