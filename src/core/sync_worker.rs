// Author: Dustin Pilgrim
// License: MIT
//
// C7: periodically drains the Backlog Store when online. Grounded on
// original_source/simkl_mps/backlog_cleaner.py::process_backlog (resolve
// temporary ids, then sync, only removing an entry on success).

use crate::core::backlog::BacklogStore;
use crate::core::connectivity::ConnectivityProbe;
use crate::core::model::{BacklogEntry, CatalogId, Kind};
use crate::simkl::SimklApi;

pub struct SyncWorker<'a> {
    pub backlog: &'a mut BacklogStore,
    pub api: &'a dyn SimklApi,
    pub connectivity: &'a dyn ConnectivityProbe,
}

impl<'a> SyncWorker<'a> {
    /// Drains every syncable entry in the backlog. Returns the number of
    /// entries successfully synced. A failed resolution or sync leaves the
    /// entry in place for the next pass (SPEC_FULL.md §4.7).
    pub async fn drain(&mut self) -> usize {
        if !self.connectivity.is_online().await {
            tracing::debug!("sync worker: offline, skipping drain");
            return 0;
        }

        let keys: Vec<String> = self.backlog.get_all().map(|e| e.key.clone()).collect();
        let mut synced = 0;

        for key in keys {
            if self.drain_one(&key).await {
                synced += 1;
            }
        }

        synced
    }

    async fn drain_one(&mut self, key: &str) -> bool {
        let Some(entry) = self.backlog.get_all().find(|e| e.key == key).cloned() else {
            return false;
        };

        let resolved = if entry.id.is_resolved() {
            entry
        } else {
            match self.resolve_temp(entry.clone()).await {
                Some(resolved) => {
                    let _ = self.backlog.replace_key(key, resolved.clone());
                    resolved
                }
                None => return false,
            }
        };

        let Some(simkl_id) = resolved.id.as_simkl() else { return false };

        if !has_required_episode_info(&resolved) {
            tracing::debug!(key = %resolved.key, "sync worker: missing episode info, leaving in backlog");
            return false;
        }

        let result = match resolved.kind {
            Kind::Movie => self.api.add_movie_to_history(simkl_id).await,
            Kind::Show | Kind::Anime => {
                self.api
                    .add_episode_to_history(simkl_id, resolved.kind, resolved.season, resolved.episode.unwrap_or(1))
                    .await
            }
        };

        match result {
            Ok(()) => {
                let _ = self.backlog.remove(&resolved.key);
                tracing::info!(simkl_id, title = %resolved.display_title, "sync worker: synced backlog entry");
                true
            }
            Err(e) => {
                tracing::debug!(key = %resolved.key, error = %e, "sync worker: sync failed, retrying later");
                false
            }
        }
    }

    /// Prefers `POST /search/file` on `original_filepath` when present, else
    /// falls back to `GET /search/movie` on the stored title, per
    /// SPEC_FULL.md §4.7 step 1.
    async fn resolve_temp(&self, entry: BacklogEntry) -> Option<BacklogEntry> {
        if let Some(path) = &entry.original_filepath {
            if let Ok(result) = self.api.search_file(path).await {
                if let Some(movie) = &result.movie {
                    return Some(BacklogEntry {
                        id: CatalogId::Simkl(movie.ids.simkl),
                        kind: Kind::Movie,
                        display_title: movie.title.clone(),
                        season: None,
                        episode: None,
                        key: movie.ids.simkl.to_string(),
                        ..entry
                    });
                }

                if let Some(show) = &result.show {
                    let episode = result.episode.as_ref();
                    return Some(BacklogEntry {
                        id: CatalogId::Simkl(show.ids.simkl),
                        kind: result.show_kind(),
                        display_title: show.title.clone(),
                        season: episode.and_then(|e| e.season),
                        episode: episode.and_then(|e| e.episode),
                        key: show.ids.simkl.to_string(),
                        ..entry
                    });
                }
            }
        }

        if let Ok(results) = self.api.search_movie(&entry.display_title).await {
            if let Some(first) = results.into_iter().next() {
                return Some(BacklogEntry {
                    id: CatalogId::Simkl(first.ids.simkl),
                    kind: Kind::Movie,
                    display_title: first.title,
                    season: None,
                    episode: None,
                    key: first.ids.simkl.to_string(),
                    ..entry
                });
            }
        }

        None
    }
}

fn has_required_episode_info(entry: &BacklogEntry) -> bool {
    match entry.kind {
        Kind::Movie => true,
        Kind::Show => entry.season.is_some() && entry.episode.is_some(),
        Kind::Anime => entry.episode.is_some(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connectivity::FakeConnectivityProbe;
    use crate::simkl::fake::FakeSimklApi;
    use crate::simkl::{MovieSearchResult, SimklIds};

    fn temp_entry(path: Option<&str>) -> BacklogEntry {
        BacklogEntry {
            key: "temp:abc".into(),
            id: CatalogId::new_temp(),
            display_title: "Unknown Film".into(),
            kind: Kind::Movie,
            season: None,
            episode: None,
            original_filepath: path.map(str::to_string),
            enqueued_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn offline_drain_is_a_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut backlog = BacklogStore::load(dir.path().join("backlog.json")).unwrap();
        backlog.add(temp_entry(None)).unwrap();

        let api = FakeSimklApi::default();
        let connectivity = FakeConnectivityProbe::new(false);

        let mut worker = SyncWorker { backlog: &mut backlog, api: &api, connectivity: &connectivity };
        let synced = worker.drain().await;

        assert_eq!(synced, 0);
        assert_eq!(backlog.len(), 1);
    }

    #[tokio::test]
    async fn resolves_temp_key_via_title_search_then_syncs() {
        let dir = tempfile::tempdir().unwrap();
        let mut backlog = BacklogStore::load(dir.path().join("backlog.json")).unwrap();
        backlog.add(temp_entry(None)).unwrap();

        let api = FakeSimklApi::default();
        *api.movie_results.lock().unwrap() =
            vec![MovieSearchResult { title: "Unknown Film".into(), year: Some(2024), runtime: Some(5400.0), ids: SimklIds { simkl: 42, imdb: None } }];
        let connectivity = FakeConnectivityProbe::new(true);

        let mut worker = SyncWorker { backlog: &mut backlog, api: &api, connectivity: &connectivity };
        let synced = worker.drain().await;

        assert_eq!(synced, 1);
        assert!(backlog.is_empty());
        assert_eq!(api.recorded_history.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn leaves_entry_when_resolution_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut backlog = BacklogStore::load(dir.path().join("backlog.json")).unwrap();
        backlog.add(temp_entry(None)).unwrap();

        let api = FakeSimklApi::default();
        let connectivity = FakeConnectivityProbe::new(true);

        let mut worker = SyncWorker { backlog: &mut backlog, api: &api, connectivity: &connectivity };
        let synced = worker.drain().await;

        assert_eq!(synced, 0);
        assert_eq!(backlog.len(), 1);
    }
}
