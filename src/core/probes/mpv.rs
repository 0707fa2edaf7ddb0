// Author: Dustin Pilgrim
// License: MIT
//
// MPV and its protocol-compatible wrappers (Celluloid, MPV.net, SMPlayer)
// speak line-delimited JSON over a local IPC socket:
// `{"command":["get_property","time-pos"]}\n` -> `{"data":123.4,...}\n`.
// Grounded on SPEC_FULL.md §6.2/§4.3 (the "wrapper table" requirement).

use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::time::timeout;

use super::{FailureThrottle, PlayState, PlayerProbe, ProbeResult};

/// Process names known to speak the MPV IPC protocol.
const WRAPPER_TABLE: [&str; 4] = ["mpv", "celluloid", "mpv.net", "smplayer"];

pub struct MpvProbe {
    throttle: FailureThrottle,
}

impl MpvProbe {
    pub fn new() -> Self {
        Self { throttle: FailureThrottle::new() }
    }

    fn socket_path() -> PathBuf {
        std::env::var_os("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("mpvsocket")
    }

    async fn get_property(stream: &mut UnixStream, name: &str) -> Option<serde_json::Value> {
        let req = json!({"command": ["get_property", name]});
        let mut line = serde_json::to_vec(&req).ok()?;
        line.push(b'\n');
        stream.write_all(&line).await.ok()?;

        let mut reader = BufReader::new(stream);
        let mut buf = String::new();

        // MPV may emit event notifications before the reply; skip those.
        for _ in 0..8 {
            buf.clear();
            let read = timeout(Duration::from_millis(500), reader.read_line(&mut buf)).await.ok()?.ok()?;
            if read == 0 {
                return None;
            }
            let parsed: serde_json::Value = serde_json::from_str(buf.trim()).ok()?;
            if parsed.get("error").is_some() && parsed.get("data").is_some() {
                return parsed.get("data").cloned();
            }
        }
        None
    }
}

#[async_trait::async_trait]
impl PlayerProbe for MpvProbe {
    fn matches(&self, process_name: &str) -> bool {
        let p = process_name.to_lowercase();
        WRAPPER_TABLE.iter().any(|w| p.contains(w))
    }

    async fn probe(&self, process_name: &str) -> Option<ProbeResult> {
        let path = Self::socket_path();

        let mut stream = match timeout(Duration::from_millis(500), UnixStream::connect(&path)).await {
            Ok(Ok(s)) => s,
            _ => {
                if self.throttle.should_log(process_name) {
                    tracing::debug!(process_name, path = %path.display(), "mpv probe: socket unreachable");
                }
                return None;
            }
        };

        let position = Self::get_property(&mut stream, "time-pos").await.and_then(|v| v.as_f64());
        let duration = Self::get_property(&mut stream, "duration").await.and_then(|v| v.as_f64());
        let paused = Self::get_property(&mut stream, "pause").await.and_then(|v| v.as_bool());
        let filepath = Self::get_property(&mut stream, "path").await.and_then(|v| v.as_str().map(str::to_string));

        let play_state = paused.map(|p| if p { PlayState::Paused } else { PlayState::Playing });

        Some(ProbeResult { position_seconds: position, duration_seconds: duration, play_state, filepath })
    }
}
