// Author: Dustin Pilgrim
// License: MIT
//
// C6: the playback state machine. Elapsed-time accumulation, seek
// detection, pause detection, and the completion check are grounded on
// original_source/simkl_mps/media_scrobbler.py
// (_update_tracking/_calculate_percentage/_detect_pause/stop_tracking).

use std::time::Instant;

use crate::core::backlog::BacklogStore;
use crate::core::cache::MediaCache;
use crate::core::connectivity::ConnectivityProbe;
use crate::core::model::{BacklogEntry, Kind, PlaybackSession, PlaybackState, WatchHistoryEntry};
use crate::core::notify::{NotificationKind, Notifier};
use crate::core::probes::{PlayState, ProbeResult};
use crate::core::resolver::Resolver;
use crate::core::watch_history::WatchHistory;
use crate::core::window::{best_subject, Window};
use crate::playback_log::{PlaybackEvent, PlaybackEventSink};
use crate::simkl::SimklApi;

/// Everything a single `tick` needs but that doesn't belong on the session
/// itself: the shared collaborators the engine owns.
pub struct TickContext<'a> {
    pub cache: &'a mut MediaCache,
    pub backlog: &'a mut BacklogStore,
    pub watch_history: &'a mut WatchHistory,
    pub api: &'a dyn SimklApi,
    pub connectivity: &'a dyn ConnectivityProbe,
    pub notifier: &'a dyn Notifier,
    pub playback_log: &'a dyn PlaybackEventSink,
    pub threshold_percent: f64,
}

const COMPLETION_CHECK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);
const SEEK_TOLERANCE_SECONDS: f64 = 2.0;
const MAX_ACCUMULATION_STEP_SECONDS: f64 = 60.0;
const COOLDOWN: chrono::Duration = chrono::Duration::minutes(5);

pub struct Tracker {
    session: Option<PlaybackSession>,
    pending_probe_state: Option<PlayState>,
}

impl Tracker {
    pub fn new() -> Self {
        Self { session: None, pending_probe_state: None }
    }

    pub fn session(&self) -> Option<&PlaybackSession> {
        self.session.as_ref()
    }

    pub async fn tick(
        &mut self,
        observation: Option<(Window, Option<ProbeResult>)>,
        ctx: &mut TickContext<'_>,
        now: Instant,
    ) {
        let Some((window, probe)) = observation else {
            self.teardown(ctx);
            return;
        };

        let filepath = probe.as_ref().and_then(|p| p.filepath.clone());
        let Some(subject) = best_subject(&window, filepath.as_deref()) else {
            self.teardown(ctx);
            return;
        };

        if let Some(session) = &self.session {
            if session.raw_title != subject {
                self.teardown(ctx);
            }
        }

        if self.session.is_none() {
            self.start(subject.clone(), now, ctx).await;
        }

        self.apply_probe(&subject, probe, now, ctx);
        self.advance_state(&window, &subject, now, ctx);
        self.accumulate(now);
        self.resolve_identity_if_needed(&subject, ctx).await;
        self.maybe_check_completion(&subject, now, ctx).await;
    }

    async fn start(&mut self, subject: String, now: Instant, ctx: &mut TickContext<'_>) {
        ctx.playback_log.record(&PlaybackEvent::StartTracking { subject: &subject });

        if !ctx.connectivity.is_online().await {
            ctx.notifier.notify(NotificationKind::TrackingStarted, "Tracking Started", &subject);
        }

        self.session = Some(PlaybackSession::new(subject, now));
    }

    fn apply_probe(&mut self, subject: &str, probe: Option<ProbeResult>, now: Instant, ctx: &mut TickContext<'_>) {
        let Some(session) = self.session.as_mut() else { return };
        let Some(probe) = probe else { return };

        if let Some(duration) = probe.duration_seconds {
            if session.duration_seconds.map(|old| (old - duration).abs() > 1.0).unwrap_or(true) {
                session.duration_seconds = Some(duration);
            }
        }

        if session.state == PlaybackState::Playing {
            if let (Some(new_pos), Some(old_pos)) = (probe.position_seconds, session.position_seconds) {
                let wall_elapsed = now.duration_since(session.last_tick_at).as_secs_f64();
                let expected = old_pos + wall_elapsed;
                if (new_pos - expected).abs() > SEEK_TOLERANCE_SECONDS {
                    ctx.playback_log.record(&PlaybackEvent::Seek {
                        subject,
                        position_seconds: new_pos,
                        expected_seconds: expected,
                    });
                }
            }
        }

        if probe.position_seconds.is_some() {
            session.position_seconds = probe.position_seconds;
        }
        if probe.filepath.is_some() {
            session.filepath = probe.filepath;
        }

        self.pending_probe_state = probe.play_state;
    }

    fn advance_state(&mut self, window: &Window, subject: &str, _now: Instant, ctx: &mut TickContext<'_>) {
        let Some(session) = self.session.as_mut() else { return };

        // An authoritative play_state from the probe wins over the title
        // heuristic, per the REDESIGN FLAGS decision in SPEC_FULL.md §9.
        let new_state = match self.pending_probe_state.take() {
            Some(PlayState::Playing) => PlaybackState::Playing,
            Some(PlayState::Paused) => PlaybackState::Paused,
            Some(PlayState::Stopped) => PlaybackState::Stopped,
            None => {
                if window.title.to_lowercase().contains("paused") {
                    PlaybackState::Paused
                } else {
                    PlaybackState::Playing
                }
            }
        };

        if new_state != session.state {
            ctx.playback_log.record(&PlaybackEvent::StateChange {
                subject,
                from: state_name(session.state),
                to: state_name(new_state),
            });
            session.state = new_state;
        }
    }

    fn accumulate(&mut self, now: Instant) {
        let Some(session) = self.session.as_mut() else { return };

        let elapsed = now.duration_since(session.last_tick_at).as_secs_f64().clamp(0.0, MAX_ACCUMULATION_STEP_SECONDS);
        if session.state == PlaybackState::Playing {
            session.accumulated_play_seconds += elapsed;
        }
        session.last_tick_at = now;
    }

    async fn resolve_identity_if_needed(&mut self, subject: &str, ctx: &mut TickContext<'_>) {
        let needs_resolution = self.session.as_ref().map(|s| s.identity.is_none()).unwrap_or(false);
        if !needs_resolution {
            return;
        }

        let filepath = self.session.as_ref().and_then(|s| s.filepath.clone());

        let mut resolver = Resolver { cache: ctx.cache, api: ctx.api, connectivity: ctx.connectivity };
        let identity = resolver.resolve(subject, filepath.as_deref()).await;

        let Some(session) = self.session.as_mut() else { return };

        if let Some(identity) = identity {
            if session.duration_seconds.is_none() {
                session.duration_seconds = identity.runtime_seconds;
            }

            use crate::core::model::SourceTag;
            if identity.source_tag != SourceTag::GuessitFallback {
                ctx.notifier.notify(NotificationKind::MediaIdentified, "Media Identified", &identity.display_title);
            }

            session.identity = Some(identity);
        }
    }

    async fn maybe_check_completion(&mut self, subject: &str, now: Instant, ctx: &mut TickContext<'_>) {
        let due = self
            .session
            .as_ref()
            .map(|s| now.duration_since(s.last_completion_check_at) >= COMPLETION_CHECK_INTERVAL)
            .unwrap_or(false);
        if !due {
            return;
        }

        if let Some(session) = self.session.as_mut() {
            session.last_completion_check_at = now;
        }

        let percent = match self.session.as_ref().and_then(|s| s.completion_percent()) {
            Some(p) => p,
            None => return,
        };

        ctx.playback_log.record(&PlaybackEvent::ProgressUpdate { subject, percent });

        if percent >= ctx.threshold_percent {
            self.handle_completion(subject, ctx).await;
        }
    }

    /// Single-shot completion path (SPEC_FULL.md §4.6). Never fires twice
    /// for the same session; a resolved identity still within the
    /// per-key cooldown is a no-op, matching invariant 1 in SPEC_FULL.md §8.
    async fn handle_completion(&mut self, subject: &str, ctx: &mut TickContext<'_>) {
        let Some(session) = self.session.as_mut() else { return };
        if session.completion_flag {
            return;
        }

        let online = ctx.connectivity.is_online().await;

        if !online {
            ctx.playback_log.record(&PlaybackEvent::CompletionThresholdReached {
                subject,
                percent: session.completion_percent().unwrap_or(0.0),
            });
            ctx.notifier.notify(NotificationKind::CompletionThresholdReached, "Completion Threshold Reached", subject);
        }

        let Some(identity) = session.identity.clone() else {
            session.completion_flag = true;
            return;
        };

        let key = identity.id.to_string();
        if let Some(existing) = ctx.backlog.get_all().find(|e| e.key == key) {
            if chrono::Utc::now() - existing.enqueued_at < COOLDOWN {
                session.completion_flag = true;
                return;
            }
        }

        if online && identity.id.is_resolved() && identity.has_required_episode_info() {
            let simkl_id = identity.id.as_simkl().expect("checked is_resolved above");

            let result = match identity.kind {
                Kind::Movie => ctx.api.add_movie_to_history(simkl_id).await,
                Kind::Show | Kind::Anime => {
                    ctx.api
                        .add_episode_to_history(simkl_id, identity.kind, identity.season, identity.episode.unwrap_or(1))
                        .await
                }
            };

            if result.is_ok() {
                session.completion_flag = true;
                ctx.playback_log.record(&PlaybackEvent::AddedToHistorySuccess { subject, simkl_id });
                ctx.notifier.notify(NotificationKind::SyncedToHistory, "Synced to History", &identity.display_title);

                let _ = ctx.watch_history.record(WatchHistoryEntry {
                    simkl_id,
                    display_title: identity.display_title.clone(),
                    kind: identity.kind,
                    season: identity.season,
                    episode: identity.episode,
                    recorded_at: chrono::Utc::now(),
                });
                return;
            }
        }

        let entry = BacklogEntry::from_identity(&identity, chrono::Utc::now());
        let _ = ctx.backlog.add(entry.clone());
        session.completion_flag = true;
        ctx.playback_log.record(&PlaybackEvent::AddedToBacklog { subject, key: &entry.key });
        ctx.notifier.notify(NotificationKind::AddedToBacklog, "Added to Backlog", &identity.display_title);
    }

    fn teardown(&mut self, ctx: &mut TickContext<'_>) {
        if let Some(session) = self.session.take() {
            ctx.playback_log.record(&PlaybackEvent::StopTracking {
                subject: &session.raw_title,
                accumulated_seconds: session.accumulated_play_seconds,
                final_percent: session.completion_percent(),
            });
        }
    }
}

fn state_name(state: PlaybackState) -> &'static str {
    match state {
        PlaybackState::Stopped => "stopped",
        PlaybackState::Playing => "playing",
        PlaybackState::Paused => "paused",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::connectivity::FakeConnectivityProbe;
    use crate::core::notify::RecordingNotifier;
    use crate::core::window::Window;
    use crate::playback_log::NullPlaybackLog;
    use crate::simkl::fake::FakeSimklApi;
    use crate::simkl::{EpisodeInfo, FileSearchResult, MovieSearchResult, ShowInfo, SimklIds};

    struct Harness {
        cache: MediaCache,
        backlog: BacklogStore,
        watch_history: WatchHistory,
        api: FakeSimklApi,
        connectivity: FakeConnectivityProbe,
        notifier: RecordingNotifier,
        playback_log: NullPlaybackLog,
        _dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(online: bool) -> Self {
            let dir = tempfile::tempdir().unwrap();
            Self {
                cache: MediaCache::load(dir.path().join("media_cache.json")).unwrap(),
                backlog: BacklogStore::load(dir.path().join("backlog.json")).unwrap(),
                watch_history: WatchHistory::load(dir.path().join("watch_history.json")).unwrap(),
                api: FakeSimklApi::default(),
                connectivity: FakeConnectivityProbe::new(online),
                notifier: RecordingNotifier::new(),
                playback_log: NullPlaybackLog,
                _dir: dir,
            }
        }

        fn ctx(&mut self) -> TickContext<'_> {
            TickContext {
                cache: &mut self.cache,
                backlog: &mut self.backlog,
                watch_history: &mut self.watch_history,
                api: &self.api,
                connectivity: &self.connectivity,
                notifier: &self.notifier,
                playback_log: &self.playback_log,
                threshold_percent: 80.0,
            }
        }
    }

    fn vlc_window(title: &str) -> Window {
        Window { title: title.to_string(), process_name: "vlc".to_string(), app_name: None }
    }

    fn mpv_window() -> Window {
        Window { title: "mpv".to_string(), process_name: "mpv".to_string(), app_name: None }
    }

    fn probe(position: f64, duration: f64, filepath: Option<&str>) -> ProbeResult {
        ProbeResult {
            position_seconds: Some(position),
            duration_seconds: Some(duration),
            play_state: Some(PlayState::Playing),
            filepath: filepath.map(str::to_string),
        }
    }

    fn movie_search_hit(simkl_id: i64, title: &str, year: i32, runtime: f64) -> MovieSearchResult {
        MovieSearchResult { title: title.to_string(), year: Some(year), runtime: Some(runtime), ids: SimklIds { simkl: simkl_id, imdb: None } }
    }

    // S1: VLC movie, online, resolves via title search; completion at the
    // next 5-second check fires exactly one sync call and leaves no backlog
    // entry (SPEC_FULL.md §4.6, §8 invariant 1).
    #[tokio::test]
    async fn single_shot_completion_movie_online() {
        let mut h = Harness::new(true);
        *h.api.movie_results.lock().unwrap() = vec![movie_search_hit(635, "Inception", 2010, 8880.0)];

        let mut tracker = Tracker::new();
        let t0 = Instant::now();

        tracker.tick(Some((vlc_window("Inception (2010) - VLC media player"), Some(probe(7200.0, 8880.0, None)))), &mut h.ctx(), t0).await;

        let t1 = t0 + std::time::Duration::from_secs(6);
        tracker.tick(Some((vlc_window("Inception (2010) - VLC media player"), Some(probe(7206.0, 8880.0, None)))), &mut h.ctx(), t1).await;

        assert_eq!(h.api.recorded_history.lock().unwrap().as_slice(), &[(635, Kind::Movie, None, None)]);
        assert!(h.backlog.is_empty());

        // A further tick past threshold must not fire a second sync call.
        let t2 = t1 + std::time::Duration::from_secs(6);
        tracker.tick(Some((vlc_window("Inception (2010) - VLC media player"), Some(probe(7212.0, 8880.0, None)))), &mut h.ctx(), t2).await;
        assert_eq!(h.api.recorded_history.lock().unwrap().len(), 1);
    }

    // S2: MPV episode via file search; completion posts the show payload
    // with season/episode once resolved.
    #[tokio::test]
    async fn episode_completion_via_file_search() {
        let mut h = Harness::new(true);
        *h.api.file_results.lock().unwrap() = Some(FileSearchResult {
            movie: None,
            show: Some(ShowInfo { title: "Show".into(), show_type: Some("show".into()), ids: SimklIds { simkl: 999, imdb: None } }),
            episode: Some(EpisodeInfo { season: Some(2), episode: Some(5), runtime: None }),
        });

        let mut tracker = Tracker::new();
        let t0 = Instant::now();
        let path = "/m/Show.S02E05.mkv";

        tracker.tick(Some((mpv_window(), Some(probe(1320.0, 1500.0, Some(path))))), &mut h.ctx(), t0).await;

        let t1 = t0 + std::time::Duration::from_secs(6);
        tracker.tick(Some((mpv_window(), Some(probe(1326.0, 1500.0, Some(path))))), &mut h.ctx(), t1).await;

        assert_eq!(h.api.recorded_history.lock().unwrap().as_slice(), &[(999, Kind::Show, Some(2), Some(5))]);
        assert!(h.backlog.is_empty());
    }

    // S3 / §8 invariant 7: offline completion never calls the remote API
    // and leaves exactly one backlog entry immediately afterward.
    #[tokio::test]
    async fn offline_completion_enqueues_backlog_without_api_calls() {
        let mut h = Harness::new(false);

        let mut tracker = Tracker::new();
        let t0 = Instant::now();

        tracker.tick(Some((vlc_window("Inception (2010) - VLC media player"), Some(probe(7200.0, 8880.0, None)))), &mut h.ctx(), t0).await;

        let t1 = t0 + std::time::Duration::from_secs(6);
        tracker.tick(Some((vlc_window("Inception (2010) - VLC media player"), Some(probe(7206.0, 8880.0, None)))), &mut h.ctx(), t1).await;

        assert!(h.api.recorded_history.lock().unwrap().is_empty());
        assert_eq!(h.backlog.len(), 1);
    }

    // S4: fully offline, unknown film — guessit fallback caches a temporary
    // identity and the completion path enqueues it under a `temp:` key.
    #[tokio::test]
    async fn offline_unknown_film_enqueues_temp_key() {
        let mut h = Harness::new(false);

        let mut tracker = Tracker::new();
        let t0 = Instant::now();
        let path = "/m/Unknown.Film.2024.mkv";

        tracker.tick(Some((mpv_window(), Some(probe(100.0, 120.0, Some(path))))), &mut h.ctx(), t0).await;
        let t1 = t0 + std::time::Duration::from_secs(6);
        tracker.tick(Some((mpv_window(), Some(probe(110.0, 120.0, Some(path))))), &mut h.ctx(), t1).await;

        assert_eq!(h.backlog.len(), 1);
        let entry = h.backlog.get_all().next().unwrap();
        assert!(entry.key.starts_with("temp:") || entry.key.starts_with("guessit:"));
        assert_eq!(entry.original_filepath.as_deref(), Some(path));
        assert_eq!(entry.display_title, "Unknown Film");
    }

    // S6 / completion cooldown: a second session for the same (cached)
    // identity within five minutes of an unsynced backlog enqueue must not
    // write a second backlog entry or call the remote API.
    #[tokio::test]
    async fn cooldown_suppresses_repeat_backlog_writes_across_sessions() {
        let mut h = Harness::new(false);
        let mut tracker = Tracker::new();
        let title = "Inception (2010) - VLC media player";

        let t0 = Instant::now();
        tracker.tick(Some((vlc_window(title), Some(probe(7200.0, 8880.0, None)))), &mut h.ctx(), t0).await;
        let t1 = t0 + std::time::Duration::from_secs(6);
        tracker.tick(Some((vlc_window(title), Some(probe(7206.0, 8880.0, None)))), &mut h.ctx(), t1).await;
        assert_eq!(h.backlog.len(), 1);

        // Player window disappears, then reappears as a fresh session.
        tracker.tick(None, &mut h.ctx(), t1).await;

        let t2 = t1 + std::time::Duration::from_secs(1);
        tracker.tick(Some((vlc_window(title), Some(probe(7200.0, 8880.0, None)))), &mut h.ctx(), t2).await;
        let t3 = t2 + std::time::Duration::from_secs(6);
        tracker.tick(Some((vlc_window(title), Some(probe(7206.0, 8880.0, None)))), &mut h.ctx(), t3).await;

        assert_eq!(h.backlog.len(), 1, "cooldown must not add a second backlog entry");
        assert!(h.api.recorded_history.lock().unwrap().is_empty());
    }

    // §8 invariant 4: accumulator clipping.
    #[test]
    fn accumulator_clips_to_sixty_seconds_per_tick() {
        let mut tracker = Tracker::new();
        let t0 = Instant::now();
        tracker.session = Some(PlaybackSession::new("Subject".into(), t0));
        tracker.session.as_mut().unwrap().state = PlaybackState::Playing;

        let t1 = t0 + std::time::Duration::from_secs(500);
        tracker.accumulate(t1);
        assert_eq!(tracker.session.as_ref().unwrap().accumulated_play_seconds, 60.0);

        let t2 = t1 + std::time::Duration::from_secs(30);
        tracker.accumulate(t2);
        assert_eq!(tracker.session.as_ref().unwrap().accumulated_play_seconds, 90.0);
    }

    // §8 invariant 3: percentage monotonicity in the no-seek, PLAYING-only
    // case.
    #[test]
    fn percentage_is_monotonic_without_seeks() {
        let mut session = PlaybackSession::new("Subject".into(), Instant::now());
        session.duration_seconds = Some(1000.0);

        let mut last = 0.0;
        for position in [100.0, 250.0, 400.0, 999.0] {
            session.position_seconds = Some(position);
            let percent = session.completion_percent().unwrap();
            assert!(percent >= last);
            last = percent;
        }
    }
}
