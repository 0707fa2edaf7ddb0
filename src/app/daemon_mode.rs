// Author: Dustin Pilgrim
// License: MIT
//
// Daemon bootstrap: single-instance lock, logging, settings, wiring of the
// concrete collaborators (probes, window enumerator, Simkl client,
// connectivity probe, notifier, playback log) into a `ScrobbleEngine`, then
// the IPC server and control task alongside the engine's own run loop.
// Shaped after the teacher's `app/daemon_mode.rs::run`.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::Args;
use crate::config::{self, Settings};
use crate::core::backlog::BacklogStore;
use crate::core::cache::MediaCache;
use crate::core::connectivity::HttpConnectivityProbe;
use crate::core::engine::{EngineConfig, ScrobbleEngine};
use crate::core::notify::LogNotifier;
use crate::core::probes::default_probes;
use crate::core::watch_history::WatchHistory;
use crate::core::window::ProcfsWindowEnumerator;
use crate::playback_log::{LogPolicy, PlaybackLog};
use crate::simkl::SimklClient;

type AnyError = Box<dyn std::error::Error + Send + Sync>;

pub async fn run(args: Args, tray: bool) -> Result<(), AnyError> {
    let _instance_lock = crate::app::platform::acquire_single_instance_lock().map_err(|e| {
        eprintln!("simkl-scrobbler: {e}");
        io::Error::new(io::ErrorKind::AlreadyExists, e)
    })?;

    crate::log::init(args.verbose);

    if tray {
        tracing::info!("starting in tray mode (presentation-only; same engine as --start)");
    }

    let loaded = config::load_from_path(args.config.as_deref())?;
    let Settings { watch_completion_threshold, poll_interval_seconds, sync_interval_seconds, simkl_client_id, simkl_access_token } =
        loaded.settings.clone();

    if !loaded.settings.has_credentials() {
        let msg = format!(
            "no Simkl credentials in {} — run `simkl-scrobbler init` first",
            loaded.path.display()
        );
        tracing::error!("{msg}");
        return Err(Box::new(crate::core::error::Error::Configuration(msg)));
    }

    let data_dir = config::default_app_data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let cache = MediaCache::load(data_dir.join("media_cache.json"))?;
    let backlog = BacklogStore::load(data_dir.join("backlog.json"))?;
    let watch_history = WatchHistory::load(data_dir.join("watch_history.json"))?;

    let client_id = simkl_client_id.expect("checked by has_credentials");
    let access_token = simkl_access_token.expect("checked by has_credentials");
    let api = Arc::new(SimklClient::new(client_id, access_token));
    let connectivity = Arc::new(HttpConnectivityProbe::new());
    let notifier = Arc::new(LogNotifier::new());
    let playback_log = Arc::new(PlaybackLog::open(data_dir.join("playback_log.jsonl"), LogPolicy::default())?);

    let engine_config = EngineConfig {
        poll_interval: Duration::from_secs(poll_interval_seconds),
        sync_interval: Duration::from_secs(sync_interval_seconds),
        threshold_percent: watch_completion_threshold as f64,
    };

    let engine = Arc::new(ScrobbleEngine::new(
        cache,
        backlog,
        watch_history,
        Box::new(ProcfsWindowEnumerator::new()),
        default_probes(),
        api,
        connectivity,
        notifier,
        playback_log,
        engine_config,
    ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let (msg_tx, msg_rx) = tokio::sync::mpsc::channel(32);

    crate::ipc::server::spawn_ipc_server(msg_tx).await.map_err(|e| {
        tracing::error!("{e}");
        crate::core::error::Error::Fatal(e)
    })?;

    let control_task = tokio::spawn({
        let engine = Arc::clone(&engine);
        let shutdown_tx = shutdown_tx.clone();
        async move { engine.run_control_task(msg_rx, shutdown_tx).await }
    });

    let mut run_task = tokio::spawn({
        let engine = Arc::clone(&engine);
        async move { engine.run(shutdown_rx).await }
    });

    tokio::select! {
        res = &mut run_task => {
            let _ = control_task.abort();
            res.map_err(|e| Box::new(e) as AnyError)?;
            Ok(())
        }

        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received Ctrl+C, shutting down");
            let _ = shutdown_tx.send(true);
            let res = run_task.await;
            let _ = control_task.abort();
            res.map_err(|e| Box::new(e) as AnyError)
        }
    }
}
