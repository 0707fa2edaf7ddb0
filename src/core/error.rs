// Author: Dustin Pilgrim
// License: MIT

use thiserror::Error;

/// Ambient error type for the scrobbler core.
///
/// Call sites that need to branch on *kind* (transient vs. fatal, per
/// SPEC_FULL.md §7) should match on the variant rather than inspect the
/// rendered message.
#[derive(Debug, Error)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network/API call failed in a way that should be retried later
    /// (offline, timeout, 5xx, DNS failure). Never fatal to the engine.
    #[error("transient failure: {0}")]
    OfflineTransient(String),

    /// A known Simkl endpoint responded with a non-2xx status that is not
    /// a plain connectivity problem (e.g. malformed request).
    #[error("api call to {endpoint} failed: {detail}")]
    ApiFailure { endpoint: String, detail: String },

    #[error("could not identify media: {0}")]
    Identification(String),

    #[error("player probe failed: {0}")]
    Probe(String),

    #[error("failed to persist {what}: {source}")]
    Persistence {
        what: String,
        #[source]
        source: std::io::Error,
    },

    #[error("fatal startup error: {0}")]
    Fatal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// True for failures where the correct response is "queue it and retry
    /// later", per the completion-path rules in SPEC_FULL.md §4.6.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Error::OfflineTransient(_) | Error::ApiFailure { .. } | Error::Http(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
