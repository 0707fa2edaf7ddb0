// Author: Dustin Pilgrim
// License: MIT
//
// A1/A4: rotated JSON-lines sink for playback events (start_tracking,
// state_change, seek, progress_update, completion_threshold_reached,
// added_to_history_*, added_to_backlog_*, stop_tracking), distinct from the
// human tracing output. Rotation logic adapted nearly verbatim from the
// teacher's stasis_log.rs.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::Serialize;

const DEFAULT_MAX_BYTES: u64 = 5 * 1024 * 1024;
const DEFAULT_KEEP_BACKUPS: u32 = 3;

#[derive(Debug, Clone, Copy)]
pub struct LogPolicy {
    pub max_bytes: u64,
    pub keep_backups: u32,
}

impl Default for LogPolicy {
    fn default() -> Self {
        Self { max_bytes: DEFAULT_MAX_BYTES, keep_backups: DEFAULT_KEEP_BACKUPS }
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent<'a> {
    StartTracking { subject: &'a str },
    StateChange { subject: &'a str, from: &'a str, to: &'a str },
    Seek { subject: &'a str, position_seconds: f64, expected_seconds: f64 },
    ProgressUpdate { subject: &'a str, percent: f64 },
    CompletionThresholdReached { subject: &'a str, percent: f64 },
    AddedToHistorySuccess { subject: &'a str, simkl_id: i64 },
    AddedToBacklog { subject: &'a str, key: &'a str },
    StopTracking { subject: &'a str, accumulated_seconds: f64, final_percent: Option<f64> },
}

pub trait PlaybackEventSink: Send + Sync + 'static {
    fn record(&self, event: &PlaybackEvent);
}

pub struct PlaybackLog {
    path: PathBuf,
    // Guards the rotate-then-append sequence, not a handle to write through:
    // the file is reopened by path on every write (see write_raw_line below),
    // so a rotation never leaves us appending to a renamed inode.
    write_lock: Mutex<()>,
    policy: LogPolicy,
}

impl PlaybackLog {
    pub fn open(path: impl Into<PathBuf>, policy: LogPolicy) -> std::io::Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        rotate_if_needed(&path, &policy)?;
        Ok(Self { path, write_lock: Mutex::new(()), policy })
    }
}

impl PlaybackEventSink for PlaybackLog {
    fn record(&self, event: &PlaybackEvent) {
        let Ok(line) = serde_json::to_string(event) else { return };

        let Ok(_guard) = self.write_lock.lock() else { return };

        let _ = rotate_if_needed(&self.path, &self.policy);
        let _ = write_raw_line(&self.path, &line);
    }
}

fn write_raw_line(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")
}

fn rotate_if_needed(path: &Path, policy: &LogPolicy) -> std::io::Result<()> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if meta.len() < policy.max_bytes {
        return Ok(());
    }

    if policy.keep_backups == 0 {
        let _ = fs::remove_file(path);
        return Ok(());
    }

    for i in (1..policy.keep_backups).rev() {
        let from = rotated_name(path, i);
        let to = rotated_name(path, i + 1);
        if from.exists() {
            let _ = fs::rename(from, to);
        }
    }

    let first = rotated_name(path, 1);
    fs::rename(path, first)
}

fn rotated_name(base: &Path, n: u32) -> PathBuf {
    PathBuf::from(format!("{}.{n}", base.display()))
}

#[cfg(test)]
pub struct NullPlaybackLog;

#[cfg(test)]
impl PlaybackEventSink for NullPlaybackLog {
    fn record(&self, _event: &PlaybackEvent) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotates_when_over_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playback_log.jsonl");
        fs::write(&path, vec![0u8; 16]).unwrap();

        rotate_if_needed(&path, &LogPolicy { max_bytes: 8, keep_backups: 2 }).unwrap();

        assert!(!path.exists());
        assert!(rotated_name(&path, 1).exists());
    }

    #[test]
    fn record_rotates_repeatedly_across_many_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("playback_log.jsonl");
        let policy = LogPolicy { max_bytes: 64, keep_backups: 2 };
        let log = PlaybackLog::open(&path, policy).unwrap();

        for _ in 0..50 {
            log.record(&PlaybackEvent::StartTracking { subject: "Some Long Enough Subject Title" });
        }

        // The base file must still exist and still be the one being
        // appended to — not a stale handle to a long-since-renamed inode.
        assert!(path.exists());
        assert!(fs::metadata(&path).unwrap().len() < policy.max_bytes * 2);
        assert!(rotated_name(&path, 1).exists());
    }
}
