// Author: Dustin Pilgrim
// License: MIT
//
// C3: one probe per player family. Grounded on
// original_source/simkl_mps/movie_scrobbler.py::get_player_position_duration,
// which dispatches to VLC/MPC-HC/PotPlayer integrations by substring-matching
// the player's process name. Here each probe declares its own `matches`.

pub mod mpc;
pub mod mpv;
pub mod vlc;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    Playing,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Default)]
pub struct ProbeResult {
    pub position_seconds: Option<f64>,
    pub duration_seconds: Option<f64>,
    pub play_state: Option<PlayState>,
    pub filepath: Option<String>,
}

#[async_trait::async_trait]
pub trait PlayerProbe: Send + Sync + 'static {
    fn matches(&self, process_name: &str) -> bool;
    async fn probe(&self, process_name: &str) -> Option<ProbeResult>;
}

/// Per-process connection-failure throttling (SPEC_FULL.md §A.5): probes log
/// connection failures at most once per minute per process rather than on
/// every poll tick.
pub(crate) struct FailureThrottle {
    last_logged: Mutex<HashMap<String, Instant>>,
}

impl FailureThrottle {
    const WINDOW: Duration = Duration::from_secs(60);

    pub fn new() -> Self {
        Self { last_logged: Mutex::new(HashMap::new()) }
    }

    /// Returns true the first time this process fails within the window,
    /// false on subsequent failures until the window elapses.
    pub fn should_log(&self, process_name: &str) -> bool {
        let mut map = self.last_logged.lock().unwrap();
        let now = Instant::now();
        match map.get(process_name) {
            Some(last) if now.duration_since(*last) < Self::WINDOW => false,
            _ => {
                map.insert(process_name.to_string(), now);
                true
            }
        }
    }
}

pub fn default_probes() -> Vec<Box<dyn PlayerProbe>> {
    vec![
        Box::new(vlc::VlcProbe::new()),
        Box::new(mpc::MpcProbe::new()),
        Box::new(mpv::MpvProbe::new()),
    ]
}
