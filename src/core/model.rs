// Author: Dustin Pilgrim
// License: MIT

use serde::{Deserialize, Serialize};
use std::fmt;

/// Catalog kind, mirroring the three shapes Simkl's `/sync/history` accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kind {
    Movie,
    Show,
    Anime,
}

/// Where a `MediaIdentity` came from, kept for diagnostics and so the sync
/// worker knows whether a `simkl_id` is real or a placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    SimklFileSearch,
    SimklTitleSearch,
    GuessitFallback,
    UserCache,
}

/// A catalog identifier: either Simkl's real numeric id, or a temporary
/// opaque tag used while the item is still unresolved (SPEC_FULL.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogId {
    Simkl(i64),
    Temp(String),
}

impl CatalogId {
    pub fn new_temp() -> Self {
        CatalogId::Temp(format!("temp:{}", uuid::Uuid::new_v4()))
    }

    pub fn guessit(hash: u64) -> Self {
        CatalogId::Temp(format!("guessit:{hash:x}"))
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, CatalogId::Simkl(_))
    }

    pub fn as_simkl(&self) -> Option<i64> {
        match self {
            CatalogId::Simkl(id) => Some(*id),
            CatalogId::Temp(_) => None,
        }
    }
}

impl fmt::Display for CatalogId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogId::Simkl(id) => write!(f, "{id}"),
            CatalogId::Temp(tag) => write!(f, "{tag}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaIdentity {
    pub id: CatalogId,
    pub kind: Kind,
    pub display_title: String,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub runtime_seconds: Option<f64>,
    pub source_tag: SourceTag,
    pub original_filepath: Option<String>,
}

impl MediaIdentity {
    /// Per SPEC_FULL.md §3: a show needs season+episode, anime needs only
    /// episode, a movie needs neither.
    pub fn has_required_episode_info(&self) -> bool {
        match self.kind {
            Kind::Movie => true,
            Kind::Show => self.season.is_some() && self.episode.is_some(),
            Kind::Anime => self.episode.is_some(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub identity: MediaIdentity,
    pub poster_url: Option<String>,
    pub duration_seconds: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacklogEntry {
    pub key: String,
    pub id: CatalogId,
    pub display_title: String,
    pub kind: Kind,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub original_filepath: Option<String>,
    pub enqueued_at: chrono::DateTime<chrono::Utc>,
}

impl BacklogEntry {
    pub fn from_identity(identity: &MediaIdentity, enqueued_at: chrono::DateTime<chrono::Utc>) -> Self {
        Self {
            key: identity.id.to_string(),
            id: identity.id.clone(),
            display_title: identity.display_title.clone(),
            kind: identity.kind,
            season: identity.season,
            episode: identity.episode,
            original_filepath: identity.original_filepath.clone(),
            enqueued_at,
        }
    }
}

/// Playback state as seen by the tracker (SPEC_FULL.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Working state for the one playback currently being tracked. Mutated only
/// by the poll loop; see SPEC_FULL.md §5 for the ownership rule.
#[derive(Debug, Clone)]
pub struct PlaybackSession {
    pub raw_title: String,
    pub identity: Option<MediaIdentity>,
    pub filepath: Option<String>,
    pub started_at: std::time::Instant,
    pub last_tick_at: std::time::Instant,
    pub accumulated_play_seconds: f64,
    pub position_seconds: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub state: PlaybackState,
    pub completion_flag: bool,
    pub last_completion_check_at: std::time::Instant,
}

impl PlaybackSession {
    pub fn new(raw_title: String, now: std::time::Instant) -> Self {
        Self {
            raw_title,
            identity: None,
            filepath: None,
            started_at: now,
            last_tick_at: now,
            accumulated_play_seconds: 0.0,
            position_seconds: None,
            duration_seconds: None,
            state: PlaybackState::Stopped,
            completion_flag: false,
            last_completion_check_at: now,
        }
    }

    /// Position-preferred percentage, falling back to accumulated time.
    /// Returns `None` when no duration is known (SPEC_FULL.md §4.6).
    pub fn completion_percent(&self) -> Option<f64> {
        let duration = self.duration_seconds?;
        if duration <= 0.0 {
            return None;
        }

        let numerator = self.position_seconds.unwrap_or(self.accumulated_play_seconds);
        Some((numerator / duration) * 100.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchHistoryEntry {
    pub simkl_id: i64,
    pub display_title: String,
    pub kind: Kind,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    pub recorded_at: chrono::DateTime<chrono::Utc>,
}
