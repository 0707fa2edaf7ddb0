// Author: Dustin Pilgrim
// License: MIT
//
// MPC-HC/MPC-BE's web interface serves `variables.html`, with position and
// duration in milliseconds. Grounded on
// original_source/simkl_mps/movie_scrobbler.py, which tries ports
// [13579, 13580, 13581, 13582] in order and extracts
// `<p id="position">`/`<p id="duration">` via regex.

use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;

use super::{FailureThrottle, PlayState, PlayerProbe, ProbeResult};

const PORTS: [u16; 4] = [13579, 13580, 13581, 13582];

static POSITION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<p id="position">(\d+)</p>"#).unwrap());
static DURATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<p id="duration">(\d+)</p>"#).unwrap());
static FILE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<p id="file">(.*?)</p>"#).unwrap());
static STATE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"<p id="state">(\d+)</p>"#).unwrap());

pub struct MpcProbe {
    client: reqwest::Client,
    throttle: FailureThrottle,
}

impl MpcProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_millis(800))
                .build()
                .expect("failed to build mpc probe http client"),
            throttle: FailureThrottle::new(),
        }
    }

    fn parse_ms(re: &Regex, body: &str) -> Option<f64> {
        re.captures(body)?.get(1)?.as_str().parse::<f64>().ok().map(|ms| ms / 1000.0)
    }
}

#[async_trait::async_trait]
impl PlayerProbe for MpcProbe {
    fn matches(&self, process_name: &str) -> bool {
        let p = process_name.to_lowercase();
        p.contains("mpc-hc") || p.contains("mpc-be") || p.contains("mpc64") || p == "mpc.exe"
    }

    async fn probe(&self, process_name: &str) -> Option<ProbeResult> {
        for port in PORTS {
            let url = format!("http://localhost:{port}/variables.html");

            let resp = match self.client.get(&url).send().await {
                Ok(r) => r,
                Err(_) => {
                    if self.throttle.should_log(process_name) {
                        tracing::debug!(process_name, port, "mpc probe: connection failed");
                    }
                    continue;
                }
            };

            let Ok(body) = resp.text().await else { continue };

            // 0=stopped, 1=paused, 2=playing, per MPC's variables.html contract.
            let play_state = STATE_RE
                .captures(&body)
                .and_then(|c| c.get(1)?.as_str().parse::<u8>().ok())
                .map(|s| match s {
                    2 => PlayState::Playing,
                    1 => PlayState::Paused,
                    _ => PlayState::Stopped,
                });

            return Some(ProbeResult {
                position_seconds: Self::parse_ms(&POSITION_RE, &body),
                duration_seconds: Self::parse_ms(&DURATION_RE, &body),
                play_state,
                filepath: FILE_RE.captures(&body).and_then(|c| c.get(1)).map(|m| m.as_str().to_string()),
            });
        }

        None
    }
}
