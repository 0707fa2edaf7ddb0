// Author: Dustin Pilgrim
// License: MIT
//
// VLC's web interface (`--extraintf http`) serves `status.json` with time
// and length in seconds. Grounded on SPEC_FULL.md §6.2 / the `status.json`
// shape referenced throughout original_source/simkl_mps.

use std::time::Duration;

use serde::Deserialize;

use super::{FailureThrottle, PlayState, PlayerProbe, ProbeResult};

const PORTS: [u16; 1] = [8080];

pub struct VlcProbe {
    client: reqwest::Client,
    throttle: FailureThrottle,
}

impl VlcProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(800))
                .build()
                .expect("failed to build vlc probe http client"),
            throttle: FailureThrottle::new(),
        }
    }
}

#[derive(Deserialize)]
struct VlcStatus {
    time: Option<f64>,
    length: Option<f64>,
    state: Option<String>,
    information: Option<VlcInformation>,
}

#[derive(Deserialize)]
struct VlcInformation {
    category: VlcCategory,
}

#[derive(Deserialize)]
struct VlcCategory {
    meta: VlcMeta,
}

#[derive(Deserialize)]
struct VlcMeta {
    filename: Option<String>,
}

#[async_trait::async_trait]
impl PlayerProbe for VlcProbe {
    fn matches(&self, process_name: &str) -> bool {
        process_name.to_lowercase().contains("vlc")
    }

    async fn probe(&self, process_name: &str) -> Option<ProbeResult> {
        for port in PORTS {
            let url = format!("http://localhost:{port}/requests/status.json");

            let resp = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(_) => {
                    if self.throttle.should_log(process_name) {
                        tracing::debug!(process_name, port, "vlc probe: connection failed");
                    }
                    continue;
                }
            };

            let Ok(status) = resp.json::<VlcStatus>().await else { continue };

            let play_state = status.state.as_deref().map(|s| match s {
                "playing" => PlayState::Playing,
                "paused" => PlayState::Paused,
                _ => PlayState::Stopped,
            });

            return Some(ProbeResult {
                position_seconds: status.time,
                duration_seconds: status.length,
                play_state,
                filepath: status.information.and_then(|i| i.category.meta.filename),
            });
        }

        None
    }
}
