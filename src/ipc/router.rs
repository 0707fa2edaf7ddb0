// Author: Dustin Pilgrim
// License: MIT
//
// Translates a raw IPC command line into an `EngineMsg`, awaits the
// oneshot reply, and renders it to text. Only `status`/`status --json` and
// `stop` exist (SPEC_FULL.md §4.9) — everything else is a routing error.

use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};

use crate::core::manager_msg::EngineMsg;

const IPC_REPLY_TIMEOUT: Duration = Duration::from_secs(2);

pub async fn route_command(cmd: &str, tx: &mpsc::Sender<EngineMsg>) -> String {
    let cmd = cmd.trim();
    if cmd.is_empty() {
        return "ERROR: empty command".to_string();
    }

    if cmd == "status" || cmd.starts_with("status ") {
        let as_json = cmd.split_whitespace().any(|t| t == "--json");

        let (reply_tx, reply_rx) = oneshot::channel();
        if tx.send(EngineMsg::GetStatus { reply: reply_tx }).await.is_err() {
            return not_running(as_json);
        }

        return match timeout(IPC_REPLY_TIMEOUT, reply_rx).await {
            Ok(Ok(snapshot)) => {
                if as_json {
                    serde_json::to_string(&snapshot).unwrap_or_else(|_| "ERROR: failed to encode status".to_string())
                } else {
                    snapshot.pretty_text()
                }
            }
            Ok(Err(_)) => not_running(as_json),
            Err(_) => "ERROR: timed out waiting for daemon".to_string(),
        };
    }

    if cmd == "stop" {
        let (reply_tx, reply_rx) = oneshot::channel();
        if tx.send(EngineMsg::Stop { reply: reply_tx }).await.is_err() {
            return "daemon not running".to_string();
        }

        return match timeout(IPC_REPLY_TIMEOUT, reply_rx).await {
            Ok(Ok(())) => "stopping".to_string(),
            Ok(Err(_)) => "ERROR: no response from daemon".to_string(),
            Err(_) => "ERROR: timed out waiting for daemon".to_string(),
        };
    }

    "ERROR: unknown command".to_string()
}

fn not_running(as_json: bool) -> String {
    if as_json {
        r#"{"error":"not_running"}"#.to_string()
    } else {
        "simkl-scrobbler is not running".to_string()
    }
}
