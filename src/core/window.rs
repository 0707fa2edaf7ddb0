// Author: Dustin Pilgrim
// License: MIT
//
// C4: enumerates player windows and turns a title/filepath into a human
// subject. Expected parse behavior is grounded on
// original_source/tests/test_window_detection.py (parse_movie_title,
// is_video_player, VIDEO_PLAYER_EXECUTABLES). The default enumerator is a
// best-effort Linux/procfs implementation, matching SPEC_FULL.md's
// Non-goal that a platform-native (Win32/X11/Wayland) enumerator is a
// swappable production concern, not part of this core.

use once_cell::sync::Lazy;
use regex::Regex;

/// Executable substrings recognized as video players. Checked against the
/// process name only — a title-only match is forbidden (false positives
/// from browsers/editors), per SPEC_FULL.md §4.4.
const VIDEO_PLAYER_EXECUTABLES: [&str; 7] =
    ["vlc", "mpc-hc", "mpc-be", "mpc64", "mpv", "celluloid", "smplayer"];

#[derive(Debug, Clone)]
pub struct Window {
    pub title: String,
    pub process_name: String,
    pub app_name: Option<String>,
}

pub trait WindowEnumerator: Send + Sync + 'static {
    fn enumerate(&self) -> Vec<Window>;
}

pub fn is_video_player(process_name: &str) -> bool {
    let p = process_name.to_lowercase();
    VIDEO_PLAYER_EXECUTABLES.iter().any(|exe| p.contains(exe))
}

// Player title suffixes this module knows to strip, ordered longest-first so
// "- VLC media player" doesn't get partially eaten by a shorter pattern.
const TITLE_SUFFIXES: [&str; 6] = [
    " - VLC media player",
    " - MPC-HC",
    " - MPC-BE",
    " - mpv",
    " - Celluloid",
    " - SMPlayer",
];

const GENERIC_RESIDUES: [&str; 4] = ["", "audio", "no file", "-"];

/// Strips known player chrome from a window title, returning `None` when
/// the remainder is empty or generic (test_window_detection.py rejects
/// browser/editor/bare-player titles the same way).
pub fn parse_subject_from_title(title: &str) -> Option<String> {
    let mut residue = title.trim();

    for suffix in TITLE_SUFFIXES {
        if let Some(stripped) = residue.strip_suffix(suffix) {
            residue = stripped.trim();
            break;
        }
    }

    if GENERIC_RESIDUES.contains(&residue.to_lowercase().as_str()) {
        return None;
    }

    // If what's left still looks like a raw release-group filename
    // (dots/underscores, quality tags), normalize it through the
    // guessit-style tokenizer rather than showing the raw residue.
    if looks_like_filename(residue) {
        if let Some(parsed) = crate::core::resolver::guessit_parse(residue) {
            return Some(parsed.display());
        }
    }

    Some(residue.to_string())
}

fn looks_like_filename(s: &str) -> bool {
    let dot_separated = s.matches('.').count() >= 2 && !s.contains(' ');
    let underscore_separated = s.contains('_') && !s.contains(' ');
    dot_separated || underscore_separated
}

/// Extracts a display subject from a filepath: basename, extension
/// stripped, separators normalized to spaces.
pub fn parse_subject_from_filepath(path: &str) -> String {
    let basename = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = basename.rsplitn(2, '.').nth(1).unwrap_or(basename);
    normalize_separators(stem)
}

fn normalize_separators(s: &str) -> String {
    s.chars()
        .map(|c| if c == '.' || c == '_' || c == '-' { ' ' } else { c })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Filename-derived subject is authoritative when a filepath is known
/// (probes are the source of truth for paths), per SPEC_FULL.md §4.4.
pub fn best_subject(window: &Window, filepath: Option<&str>) -> Option<String> {
    if let Some(path) = filepath {
        return Some(parse_subject_from_filepath(path));
    }
    parse_subject_from_title(&window.title)
}

/// Best-effort Linux enumerator: scans `/proc` for processes whose
/// executable matches a known player, using the first cmdline argument that
/// looks like a media file as a stand-in "title" when no real window system
/// is available. A production deployment is expected to substitute a
/// platform-native enumerator behind this same trait.
pub struct ProcfsWindowEnumerator;

impl ProcfsWindowEnumerator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ProcfsWindowEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

static MEDIA_EXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(mkv|mp4|avi|mov|m4v|webm|ts)$").unwrap());

impl WindowEnumerator for ProcfsWindowEnumerator {
    fn enumerate(&self) -> Vec<Window> {
        let Ok(procs) = procfs::process::all_processes() else { return Vec::new() };

        let mut windows = Vec::new();
        for proc in procs.flatten() {
            let Ok(stat) = proc.stat() else { continue };
            let process_name = stat.comm;

            if !is_video_player(&process_name) {
                continue;
            }

            let title = proc
                .cmdline()
                .ok()
                .into_iter()
                .flatten()
                .find(|arg| MEDIA_EXT_RE.is_match(arg))
                .unwrap_or_else(|| process_name.clone());

            windows.push(Window { title, process_name, app_name: None });
        }

        windows
    }
}

#[cfg(test)]
pub struct FakeWindowEnumerator {
    pub windows: Vec<Window>,
}

#[cfg(test)]
impl WindowEnumerator for FakeWindowEnumerator {
    fn enumerate(&self) -> Vec<Window> {
        self.windows.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_vlc_suffix() {
        assert_eq!(
            parse_subject_from_title("The Matrix (1999) - VLC media player"),
            Some("The Matrix (1999)".to_string())
        );
    }

    #[test]
    fn rejects_generic_residue() {
        assert_eq!(parse_subject_from_title("Audio - VLC media player"), None);
        assert_eq!(parse_subject_from_title("No file - VLC media player"), None);
    }

    #[test]
    fn normalizes_release_group_filename_title() {
        let parsed = parse_subject_from_title("Some.Movie.2023.1080p.BluRay.x264-GROUP.mkv - mpv");
        assert_eq!(parsed, Some("Some Movie (2023)".to_string()));
    }

    #[test]
    fn filepath_subject_normalizes_separators() {
        assert_eq!(parse_subject_from_filepath("/m/Some_Show.S02E05.mkv"), "Some Show S02E05");
    }

    #[test]
    fn is_video_player_matches_known_executables_only() {
        assert!(is_video_player("vlc"));
        assert!(is_video_player("mpv"));
        assert!(!is_video_player("firefox"));
        assert!(!is_video_player("code"));
    }

    #[test]
    fn best_subject_prefers_filepath_over_title() {
        let window = Window {
            title: "Totally Different Title".into(),
            process_name: "vlc".into(),
            app_name: None,
        };
        assert_eq!(best_subject(&window, Some("/m/Inception.2010.mkv")), Some("Inception 2010".into()));
    }
}
