// Author: Dustin Pilgrim
// License: MIT

use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::UnixListener,
    sync::mpsc,
};

use crate::core::manager_msg::EngineMsg;

pub async fn spawn_ipc_server(tx: mpsc::Sender<EngineMsg>) -> Result<(), String> {
    let path = crate::ipc::socket_path()?;

    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let _ = std::fs::remove_file(&path);

    let listener = UnixListener::bind(&path)
        .map_err(|e| format!("failed to bind ipc socket {}: {e}", path.display()))?;

    tracing::info!(path = %path.display(), "ipc: listening");

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(x) => x,
                Err(e) => {
                    tracing::error!(error = %e, "ipc: accept failed");
                    continue;
                }
            };

            let tx = tx.clone();
            tokio::spawn(async move {
                let mut buf = Vec::new();
                if let Err(e) = stream.read_to_end(&mut buf).await {
                    tracing::warn!(error = %e, "ipc: read failed");
                    return;
                }

                let cmd = String::from_utf8_lossy(&buf).trim().to_string();
                if cmd.is_empty() {
                    let _ = stream.write_all(b"ERROR: empty command").await;
                    let _ = stream.shutdown().await;
                    return;
                }

                tracing::debug!(command = %cmd, "ipc: received command");
                let response = crate::ipc::router::route_command(&cmd, &tx).await;

                if let Err(e) = stream.write_all(response.as_bytes()).await {
                    tracing::warn!(error = %e, "ipc: write failed");
                    return;
                }

                let _ = stream.shutdown().await;
            });
        }
    });

    Ok(())
}
