// Author: Dustin Pilgrim
// License: MIT
//
// C5: assigns a MediaIdentity to the current playback. Resolution order
// (cache -> remote file search -> remote title search -> guessit-style
// fallback) is grounded on
// original_source/simkl_mps/media_scrobbler.py and
// original_source/simkl_scrobbler/simkl_api.py's search_movie/_fallback_search_movie.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::cache::MediaCache;
use crate::core::connectivity::ConnectivityProbe;
use crate::core::model::{CacheEntry, CatalogId, Kind, MediaIdentity, SourceTag};
use crate::simkl::SimklApi;

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedFilename {
    pub kind: Kind,
    pub title: String,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ParsedFilename {
    pub fn display(&self) -> String {
        match self.year {
            Some(y) => format!("{} ({})", self.title, y),
            None => self.title.clone(),
        }
    }
}

static SXXEXX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)s(\d{1,2})e(\d{1,3})").unwrap());
static NXNN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})x(\d{1,3})\b").unwrap());
static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());
static QUALITY_TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(1080p|720p|2160p|4k|bluray|web[- ]?dl|hdtv|x264|x265|h264|h265)\b").unwrap()
});

/// Parses a filename/subject into `{kind, title, year?, season?, episode?}`
/// using guessit-style rules: `S<dd>E<dd>` or `<d>x<dd>` implies an episode;
/// otherwise a movie; dots/underscores/hyphens are separators; a 4-digit
/// token is the year (SPEC_FULL.md §4.5).
pub fn guessit_parse(raw: &str) -> Option<ParsedFilename> {
    let normalized: String = raw
        .chars()
        .map(|c| if c == '.' || c == '_' { ' ' } else { c })
        .collect();

    if let Some(caps) = SXXEXX_RE.captures(&normalized) {
        let season = caps.get(1)?.as_str().parse().ok()?;
        let episode = caps.get(2)?.as_str().parse().ok()?;
        let title = normalized[..caps.get(0)?.start()].trim_matches(['-', ' ']).to_string();
        return Some(ParsedFilename {
            kind: Kind::Show,
            title: clean_title(&title),
            year: None,
            season: Some(season),
            episode: Some(episode),
        });
    }

    if let Some(caps) = NXNN_RE.captures(&normalized) {
        let season = caps.get(1)?.as_str().parse().ok()?;
        let episode = caps.get(2)?.as_str().parse().ok()?;
        let title = normalized[..caps.get(0)?.start()].trim_matches(['-', ' ']).to_string();
        return Some(ParsedFilename {
            kind: Kind::Show,
            title: clean_title(&title),
            year: None,
            season: Some(season),
            episode: Some(episode),
        });
    }

    let year = YEAR_RE.captures(&normalized).and_then(|c| c.get(1)?.as_str().parse().ok());
    let title_end = YEAR_RE
        .find(&normalized)
        .map(|m| m.start())
        .unwrap_or(QUALITY_TAG_RE.find(&normalized).map(|m| m.start()).unwrap_or(normalized.len()));

    let title = clean_title(&normalized[..title_end]);
    if title.is_empty() {
        return None;
    }

    Some(ParsedFilename { kind: Kind::Movie, title, year, season: None, episode: None })
}

fn hash_source(s: &str) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

fn clean_title(s: &str) -> String {
    QUALITY_TAG_RE
        .replace_all(s.trim(), "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

pub struct Resolver<'a> {
    pub cache: &'a mut MediaCache,
    pub api: &'a dyn SimklApi,
    pub connectivity: &'a dyn ConnectivityProbe,
}

impl<'a> Resolver<'a> {
    /// Resolves an identity for the current playback subject. `filepath`
    /// takes priority when known; `subject` is the window-title-derived
    /// fallback. Returns `None` only when the subject itself is unusable.
    pub async fn resolve(&mut self, subject: &str, filepath: Option<&str>) -> Option<MediaIdentity> {
        let cache_key = filepath
            .map(|p| crate::core::window::parse_subject_from_filepath(p))
            .unwrap_or_else(|| subject.to_string());

        if let Some(entry) = self.cache.get(&cache_key) {
            return Some(entry.identity.clone());
        }

        let online = self.connectivity.is_online().await;

        if online {
            if let Some(path) = filepath {
                if let Ok(result) = self.api.search_file(path).await {
                    if let Some(identity) = identity_from_file_search(&result, path) {
                        let _ = self.cache.set(
                            &cache_key,
                            CacheEntry {
                                identity: identity.clone(),
                                poster_url: None,
                                duration_seconds: identity.runtime_seconds,
                            },
                        );
                        return Some(identity);
                    }
                }
            }

            if let Ok(results) = self.api.search_movie(subject).await {
                if let Some(first) = results.into_iter().next() {
                    let identity = MediaIdentity {
                        id: CatalogId::Simkl(first.ids.simkl),
                        kind: Kind::Movie,
                        display_title: first.title,
                        year: first.year,
                        season: None,
                        episode: None,
                        runtime_seconds: first.runtime,
                        source_tag: SourceTag::SimklTitleSearch,
                        original_filepath: filepath.map(str::to_string),
                    };
                    let _ = self.cache.set(
                        &cache_key,
                        CacheEntry { identity: identity.clone(), poster_url: None, duration_seconds: identity.runtime_seconds },
                    );
                    return Some(identity);
                }
            }
        }

        // Offline, or every API call missed: guessit-style fallback. Reuse
        // `cache_key` (already the basename, separators normalized) rather
        // than the raw path — a directory component would otherwise leak
        // into the parsed title.
        let parsed = guessit_parse(&cache_key)?;

        let identity = MediaIdentity {
            id: CatalogId::guessit(hash_source(&cache_key)),
            kind: parsed.kind,
            display_title: parsed.title,
            year: parsed.year,
            season: parsed.season,
            episode: parsed.episode,
            runtime_seconds: None,
            source_tag: SourceTag::GuessitFallback,
            original_filepath: filepath.map(str::to_string),
        };

        let _ = self.cache.set(&cache_key, CacheEntry { identity: identity.clone(), poster_url: None, duration_seconds: None });
        Some(identity)
    }
}

fn identity_from_file_search(result: &crate::simkl::FileSearchResult, filepath: &str) -> Option<MediaIdentity> {
    if let Some(movie) = &result.movie {
        return Some(MediaIdentity {
            id: CatalogId::Simkl(movie.ids.simkl),
            kind: Kind::Movie,
            display_title: movie.title.clone(),
            year: movie.year,
            season: None,
            episode: None,
            runtime_seconds: movie.runtime,
            source_tag: SourceTag::SimklFileSearch,
            original_filepath: Some(filepath.to_string()),
        });
    }

    let show = result.show.as_ref()?;
    let episode = result.episode.as_ref();

    Some(MediaIdentity {
        id: CatalogId::Simkl(show.ids.simkl),
        kind: result.show_kind(),
        display_title: show.title.clone(),
        year: None,
        season: episode.and_then(|e| e.season),
        episode: episode.and_then(|e| e.episode),
        runtime_seconds: episode.and_then(|e| e.runtime),
        source_tag: SourceTag::SimklFileSearch,
        original_filepath: Some(filepath.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_season_episode_pattern() {
        let parsed = guessit_parse("Show.S02E05.mkv").unwrap();
        assert_eq!(parsed.kind, Kind::Show);
        assert_eq!(parsed.season, Some(2));
        assert_eq!(parsed.episode, Some(5));
        assert_eq!(parsed.title, "Show");
    }

    #[test]
    fn parses_nxnn_pattern() {
        let parsed = guessit_parse("Show.2x05.mkv").unwrap();
        assert_eq!(parsed.season, Some(2));
        assert_eq!(parsed.episode, Some(5));
    }

    #[test]
    fn parses_movie_with_year_and_quality_tags() {
        let parsed = guessit_parse("Some.Movie.2023.1080p.BluRay.x264-GROUP.mkv").unwrap();
        assert_eq!(parsed.kind, Kind::Movie);
        assert_eq!(parsed.year, Some(2023));
        assert_eq!(parsed.display(), "Some Movie (2023)");
    }

    #[tokio::test]
    async fn offline_fallback_parses_the_basename_not_the_full_path() {
        use crate::core::cache::MediaCache;
        use crate::core::connectivity::FakeConnectivityProbe;
        use crate::simkl::fake::FakeSimklApi;

        let dir = tempfile::tempdir().unwrap();
        let mut cache = MediaCache::load(dir.path().join("media_cache.json")).unwrap();
        let api = FakeSimklApi::default();
        let connectivity = FakeConnectivityProbe::new(false);

        let mut resolver = Resolver { cache: &mut cache, api: &api, connectivity: &connectivity };
        let identity = resolver.resolve("Unknown Film 2024", Some("/m/Unknown.Film.2024.mkv")).await.unwrap();

        assert_eq!(identity.display_title, "Unknown Film");
        assert_eq!(identity.year, Some(2024));
        assert_eq!(identity.source_tag, SourceTag::GuessitFallback);
    }
}
