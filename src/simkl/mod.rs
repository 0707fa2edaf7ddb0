// Author: Dustin Pilgrim
// License: MIT
//
// A1 / §6.1: the Simkl REST client. Grounded on
// original_source/simkl_scrobbler/simkl_api.py (search_movie,
// _fallback_search_movie, mark_as_watched, get_movie_details,
// get_device_code/poll_for_token/authenticate).

pub mod auth;

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::error::{Error, Result};
use crate::core::model::Kind;

const API_BASE: &str = "https://api.simkl.com";

#[derive(Debug, Clone, Deserialize)]
pub struct SimklIds {
    pub simkl: i64,
    pub imdb: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovieSearchResult {
    pub title: String,
    pub year: Option<i32>,
    pub runtime: Option<f64>,
    pub ids: SimklIds,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeInfo {
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub runtime: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShowInfo {
    pub title: String,
    #[serde(rename = "type")]
    pub show_type: Option<String>,
    pub ids: SimklIds,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileSearchResult {
    pub movie: Option<MovieSearchResult>,
    pub show: Option<ShowInfo>,
    pub episode: Option<EpisodeInfo>,
}

impl FileSearchResult {
    /// The show's declared type distinguishes `show` from `anime`
    /// (SPEC_FULL.md §3/§6.1).
    pub fn show_kind(&self) -> Kind {
        match self.show.as_ref().and_then(|s| s.show_type.as_deref()) {
            Some("anime") => Kind::Anime,
            _ => Kind::Show,
        }
    }
}

/// Narrow seam so the core can be exercised without real network calls
/// (SPEC_FULL.md §6.1), mirroring the `EventSink`-style DI the teacher uses.
#[async_trait::async_trait]
pub trait SimklApi: Send + Sync + 'static {
    async fn search_movie(&self, query: &str) -> Result<Vec<MovieSearchResult>>;
    async fn search_file(&self, absolute_path: &str) -> Result<FileSearchResult>;
    async fn add_movie_to_history(&self, simkl_id: i64) -> Result<()>;
    async fn add_episode_to_history(&self, simkl_id: i64, kind: Kind, season: Option<u32>, episode: u32) -> Result<()>;
}

pub struct SimklClient {
    client: reqwest::Client,
    client_id: String,
    access_token: String,
}

impl SimklClient {
    pub fn new(client_id: String, access_token: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .expect("failed to build simkl http client"),
            client_id,
            access_token,
        }
    }

    fn auth_headers(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("simkl-api-key", &self.client_id)
            .header("Authorization", format!("Bearer {}", self.access_token))
    }
}

#[derive(Serialize)]
struct SyncHistoryMovies {
    movies: Vec<MovieRef>,
}

#[derive(Serialize)]
struct MovieRef {
    ids: IdsRef,
}

#[derive(Serialize)]
struct IdsRef {
    simkl: i64,
}

#[derive(Serialize)]
struct SyncHistoryShowsSeasons {
    shows: Vec<ShowWithSeasons>,
}

#[derive(Serialize)]
struct ShowWithSeasons {
    ids: IdsRef,
    seasons: Vec<SeasonRef>,
}

#[derive(Serialize)]
struct SeasonRef {
    number: u32,
    episodes: Vec<EpisodeRef>,
}

#[derive(Serialize)]
struct SyncHistoryShowsEpisodes {
    shows: Vec<ShowWithEpisodes>,
}

#[derive(Serialize)]
struct ShowWithEpisodes {
    ids: IdsRef,
    episodes: Vec<EpisodeRef>,
}

#[derive(Serialize)]
struct EpisodeRef {
    number: u32,
}

#[async_trait::async_trait]
impl SimklApi for SimklClient {
    async fn search_movie(&self, query: &str) -> Result<Vec<MovieSearchResult>> {
        let url = format!("{API_BASE}/search/movie");
        let req = self.client.get(&url).query(&[("q", query), ("extended", "full")]);
        let resp = self.auth_headers(req).send().await?;

        if !resp.status().is_success() {
            return Err(Error::ApiFailure { endpoint: "/search/movie".into(), detail: resp.status().to_string() });
        }

        Ok(resp.json().await?)
    }

    async fn search_file(&self, absolute_path: &str) -> Result<FileSearchResult> {
        let url = format!("{API_BASE}/search/file");
        let body = serde_json::json!({ "file": absolute_path });
        let req = self.client.post(&url).json(&body);
        let resp = self.auth_headers(req).send().await?;

        if !resp.status().is_success() {
            return Err(Error::ApiFailure { endpoint: "/search/file".into(), detail: resp.status().to_string() });
        }

        Ok(resp.json().await?)
    }

    async fn add_movie_to_history(&self, simkl_id: i64) -> Result<()> {
        let url = format!("{API_BASE}/sync/history");
        let body = SyncHistoryMovies { movies: vec![MovieRef { ids: IdsRef { simkl: simkl_id } }] };
        let req = self.client.post(&url).json(&body);
        let resp = self.auth_headers(req).send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::ApiFailure { endpoint: "/sync/history".into(), detail: resp.status().to_string() })
        }
    }

    async fn add_episode_to_history(&self, simkl_id: i64, kind: Kind, season: Option<u32>, episode: u32) -> Result<()> {
        let url = format!("{API_BASE}/sync/history");

        let req = match kind {
            Kind::Show => {
                let season = season.unwrap_or(1);
                let body = SyncHistoryShowsSeasons {
                    shows: vec![ShowWithSeasons {
                        ids: IdsRef { simkl: simkl_id },
                        seasons: vec![SeasonRef { number: season, episodes: vec![EpisodeRef { number: episode }] }],
                    }],
                };
                self.client.post(&url).json(&body)
            }
            Kind::Anime => {
                let body = SyncHistoryShowsEpisodes {
                    shows: vec![ShowWithEpisodes {
                        ids: IdsRef { simkl: simkl_id },
                        episodes: vec![EpisodeRef { number: episode }],
                    }],
                };
                self.client.post(&url).json(&body)
            }
            Kind::Movie => return self.add_movie_to_history(simkl_id).await,
        };

        let resp = self.auth_headers(req).send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Error::ApiFailure { endpoint: "/sync/history".into(), detail: resp.status().to_string() })
        }
    }
}

#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeSimklApi {
        pub movie_results: Mutex<Vec<MovieSearchResult>>,
        pub file_results: Mutex<Option<FileSearchResult>>,
        pub recorded_history: Mutex<Vec<(i64, Kind, Option<u32>, Option<u32>)>>,
    }

    #[async_trait::async_trait]
    impl SimklApi for FakeSimklApi {
        async fn search_movie(&self, _query: &str) -> Result<Vec<MovieSearchResult>> {
            Ok(self.movie_results.lock().unwrap().clone())
        }

        async fn search_file(&self, _absolute_path: &str) -> Result<FileSearchResult> {
            self.file_results
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| Error::ApiFailure { endpoint: "/search/file".into(), detail: "no fixture".into() })
        }

        async fn add_movie_to_history(&self, simkl_id: i64) -> Result<()> {
            self.recorded_history.lock().unwrap().push((simkl_id, Kind::Movie, None, None));
            Ok(())
        }

        async fn add_episode_to_history(&self, simkl_id: i64, kind: Kind, season: Option<u32>, episode: u32) -> Result<()> {
            self.recorded_history.lock().unwrap().push((simkl_id, kind, season, Some(episode)));
            Ok(())
        }
    }
}
