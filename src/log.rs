// Author: Dustin Pilgrim
// License: MIT
//
// A1: the human-readable sink. `tracing` + `tracing-subscriber` with an
// `EnvFilter` (RUST_LOG, default info), writing to stdout when attached to a
// terminal and always to a rotated log file otherwise. Verbosity is bumped
// by `--verbose`. Rotation is the teacher's stasis_log.rs scheme (5 MiB,
// keep 3 backups), ported here since the structured playback sink
// (`playback_log.rs`) needed its own copy of the same policy anyway.

use std::fs::{self, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const MAX_LOG_BYTES: u64 = 5 * 1024 * 1024;
const KEEP_BACKUPS: u32 = 3;

pub fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("simkl-scrobbler")
        .join("simkl-scrobbler.log")
}

/// Initializes the global tracing subscriber. `verbose` forces debug level
/// regardless of `RUST_LOG`. Safe to call once at process start.
pub fn init(verbose: bool) {
    let default_directive = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let path = default_log_path();
    let file = match open_rotated(&path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("simkl-scrobbler: failed to open log file {}: {e}", path.display());
            None
        }
    };

    let registry = tracing_subscriber::registry().with(env_filter);

    match file {
        Some(file) if io::stdout().is_terminal() => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(io::stdout))
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(move || file.try_clone().expect("clone log file handle")))
                .init();
        }
        Some(file) => {
            registry
                .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(move || file.try_clone().expect("clone log file handle")))
                .init();
        }
        None => {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
    }

    tracing::info!(path = %path.display(), "logging initialized");
}

fn open_rotated(path: &Path) -> io::Result<std::fs::File> {
    rotate_if_needed(path)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    OpenOptions::new().create(true).append(true).open(path)
}

fn rotate_if_needed(path: &Path) -> io::Result<()> {
    let meta = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };

    if meta.len() < MAX_LOG_BYTES {
        return Ok(());
    }

    for i in (1..KEEP_BACKUPS).rev() {
        let from = rotated_name(path, i);
        let to = rotated_name(path, i + 1);
        if from.exists() {
            let _ = fs::rename(from, to);
        }
    }

    fs::rename(path, rotated_name(path, 1))
}

fn rotated_name(base: &Path, n: u32) -> PathBuf {
    PathBuf::from(format!("{}.{n}", base.display()))
}
