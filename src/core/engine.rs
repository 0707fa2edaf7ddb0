// Author: Dustin Pilgrim
// License: MIT
//
// C8: the Scrobble Engine. Owns the poll loop and the sync loop as two
// long-lived tasks sharing the cache/backlog/watch-history/tracker behind
// async mutexes (SPEC_FULL.md §5), and wires together the Window Source,
// Player Probes, Resolver (via the tracker), and Sync Worker. Shaped after
// the teacher's `daemon/run.rs` `tokio::select!`-over-shutdown loop, but
// with two independently-paced tasks instead of one event channel.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{watch, Mutex};
use tokio::time::MissedTickBehavior;

use crate::core::backlog::BacklogStore;
use crate::core::cache::MediaCache;
use crate::core::connectivity::ConnectivityProbe;
use crate::core::notify::Notifier;
use crate::core::probes::PlayerProbe;
use crate::core::sync_worker::SyncWorker;
use crate::core::tracker::{TickContext, Tracker};
use crate::core::watch_history::WatchHistory;
use crate::core::window::{is_video_player, WindowEnumerator};
use crate::playback_log::PlaybackEventSink;
use crate::simkl::SimklApi;

pub struct EngineConfig {
    pub poll_interval: Duration,
    pub sync_interval: Duration,
    pub threshold_percent: f64,
}

struct Shared {
    cache: Mutex<MediaCache>,
    backlog: Mutex<BacklogStore>,
    watch_history: Mutex<WatchHistory>,
    tracker: Mutex<Tracker>,
}

/// Status snapshot served over IPC (`status` command, SPEC_FULL.md §4.9).
#[derive(Debug, Clone, serde::Serialize)]
pub struct StatusSnapshot {
    pub online: bool,
    pub tracking: Option<TrackingSnapshot>,
    pub backlog_depth: usize,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackingSnapshot {
    pub subject: String,
    pub display_title: Option<String>,
    pub state: &'static str,
    pub percent: Option<f64>,
}

impl StatusSnapshot {
    pub fn pretty_text(&self) -> String {
        match &self.tracking {
            Some(t) => format!(
                "{} ({}) — {} [{}]",
                t.display_title.as_deref().unwrap_or(&t.subject),
                t.state,
                t.percent.map(|p| format!("{p:.1}%")).unwrap_or_else(|| "?%".into()),
                if self.online { "online" } else { "offline" },
            ),
            None => format!(
                "idle — backlog: {} — {}",
                self.backlog_depth,
                if self.online { "online" } else { "offline" },
            ),
        }
    }
}

pub struct ScrobbleEngine {
    shared: Arc<Shared>,
    window_enumerator: Box<dyn WindowEnumerator>,
    probes: Vec<Box<dyn PlayerProbe>>,
    api: Arc<dyn SimklApi>,
    connectivity: Arc<dyn ConnectivityProbe>,
    notifier: Arc<dyn Notifier>,
    playback_log: Arc<dyn PlaybackEventSink>,
    config: EngineConfig,
}

impl ScrobbleEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: MediaCache,
        backlog: BacklogStore,
        watch_history: WatchHistory,
        window_enumerator: Box<dyn WindowEnumerator>,
        probes: Vec<Box<dyn PlayerProbe>>,
        api: Arc<dyn SimklApi>,
        connectivity: Arc<dyn ConnectivityProbe>,
        notifier: Arc<dyn Notifier>,
        playback_log: Arc<dyn PlaybackEventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                cache: Mutex::new(cache),
                backlog: Mutex::new(backlog),
                watch_history: Mutex::new(watch_history),
                tracker: Mutex::new(Tracker::new()),
            }),
            window_enumerator,
            probes,
            api,
            connectivity,
            notifier,
            playback_log,
            config,
        }
    }

    pub async fn status(&self) -> StatusSnapshot {
        let online = self.connectivity.is_online().await;
        let backlog_depth = self.shared.backlog.lock().await.len();

        let tracking = {
            let tracker = self.shared.tracker.lock().await;
            tracker.session().map(|s| TrackingSnapshot {
                subject: s.raw_title.clone(),
                display_title: s.identity.as_ref().map(|i| i.display_title.clone()),
                state: match s.state {
                    crate::core::model::PlaybackState::Stopped => "stopped",
                    crate::core::model::PlaybackState::Playing => "playing",
                    crate::core::model::PlaybackState::Paused => "paused",
                },
                percent: s.completion_percent(),
            })
        };

        StatusSnapshot { online, tracking, backlog_depth }
    }

    /// Spawns the poll task and sync task as two independent tokio tasks
    /// (SPEC_FULL.md §5) and waits for both to observe shutdown. On the way
    /// out, tears down any active session so the owned stores have already
    /// flushed every mutation to disk (SPEC_FULL.md §4.8).
    pub async fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) {
        let poll_engine = Arc::clone(&self);
        let poll_shutdown = shutdown.clone();
        let poll_task = tokio::spawn(async move { poll_engine.run_poll_task(poll_shutdown).await });

        let sync_engine = Arc::clone(&self);
        let sync_shutdown = shutdown.clone();
        let sync_task = tokio::spawn(async move { sync_engine.run_sync_task(sync_shutdown).await });

        let _ = tokio::join!(poll_task, sync_task);

        self.teardown().await;
    }

    async fn teardown(&self) {
        let mut tracker = self.shared.tracker.lock().await;
        let mut cache = self.shared.cache.lock().await;
        let mut backlog = self.shared.backlog.lock().await;
        let mut watch_history = self.shared.watch_history.lock().await;

        let mut ctx = TickContext {
            cache: &mut cache,
            backlog: &mut backlog,
            watch_history: &mut watch_history,
            api: self.api.as_ref(),
            connectivity: self.connectivity.as_ref(),
            notifier: self.notifier.as_ref(),
            playback_log: self.playback_log.as_ref(),
            threshold_percent: self.config.threshold_percent,
        };

        tracker.tick(None, &mut ctx, Instant::now()).await;
        tracing::info!("engine: shutdown complete, caches flushed");
    }

    async fn run_poll_task(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => { if *shutdown.borrow() { return; } }
            }
            if *shutdown.borrow() {
                return;
            }

            self.poll_once().await;
        }
    }

    async fn poll_once(&self) {
        let windows = self.window_enumerator.enumerate();
        let window = windows.into_iter().find(|w| is_video_player(&w.process_name));

        let observation = match window {
            Some(window) => {
                let probe_result = match self.probes.iter().find(|p| p.matches(&window.process_name)) {
                    Some(probe) => probe.probe(&window.process_name).await,
                    None => None,
                };
                Some((window, probe_result))
            }
            None => None,
        };

        let mut tracker = self.shared.tracker.lock().await;
        let mut cache = self.shared.cache.lock().await;
        let mut backlog = self.shared.backlog.lock().await;
        let mut watch_history = self.shared.watch_history.lock().await;

        let mut ctx = TickContext {
            cache: &mut cache,
            backlog: &mut backlog,
            watch_history: &mut watch_history,
            api: self.api.as_ref(),
            connectivity: self.connectivity.as_ref(),
            notifier: self.notifier.as_ref(),
            playback_log: self.playback_log.as_ref(),
            threshold_percent: self.config.threshold_percent,
        };

        tracker.tick(observation, &mut ctx, Instant::now()).await;
    }

    async fn run_sync_task(&self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.sync_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => { if *shutdown.borrow() { return; } }
            }
            if *shutdown.borrow() {
                return;
            }

            let mut backlog = self.shared.backlog.lock().await;
            let mut worker = SyncWorker {
                backlog: &mut backlog,
                api: self.api.as_ref(),
                connectivity: self.connectivity.as_ref(),
            };
            let synced = worker.drain().await;
            if synced > 0 {
                tracing::info!(synced, "sync worker: drained backlog entries");
            }
        }
    }

    /// Serves IPC requests (SPEC_FULL.md §4.9): `status` replies with a
    /// snapshot, `stop` flips the shared shutdown flag and acknowledges.
    /// Runs until the message channel closes (the IPC server shut down) or
    /// a `Stop` request is served.
    pub async fn run_control_task(
        self: Arc<Self>,
        mut rx: tokio::sync::mpsc::Receiver<crate::core::manager_msg::EngineMsg>,
        shutdown_tx: watch::Sender<bool>,
    ) {
        use crate::core::manager_msg::EngineMsg;

        while let Some(msg) = rx.recv().await {
            match msg {
                EngineMsg::GetStatus { reply } => {
                    let _ = reply.send(self.status().await);
                }
                EngineMsg::Stop { reply } => {
                    let _ = shutdown_tx.send(true);
                    let _ = reply.send(());
                    break;
                }
            }
        }
    }
}
