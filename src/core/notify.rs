// Author: Dustin Pilgrim
// License: MIT
//
// A6: tray-notification surface, abstracted so a failing/slow sink can
// never stall the poll loop (SPEC_FULL.md §7). Grounded in the same
// `Arc<dyn Trait>` injection shape as `ConnectivityProbe`.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    TrackingStarted,
    MediaIdentified,
    CompletionThresholdReached,
    SyncedToHistory,
    AddedToBacklog,
    AuthenticationError,
}

pub trait Notifier: Send + Sync + 'static {
    fn notify(&self, kind: NotificationKind, title: &str, body: &str);
}

/// Default implementation: logs at INFO through the human log sink. A real
/// tray notifier is out of scope (SPEC_FULL.md §4.10) and can be swapped in
/// behind this same trait.
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for LogNotifier {
    fn notify(&self, kind: NotificationKind, title: &str, body: &str) {
        tracing::info!(?kind, %title, %body, "notification");
    }
}

#[cfg(test)]
pub struct RecordingNotifier {
    pub sent: std::sync::Mutex<Vec<(NotificationKind, String, String)>>,
}

#[cfg(test)]
impl RecordingNotifier {
    pub fn new() -> Self {
        Self { sent: std::sync::Mutex::new(Vec::new()) }
    }
}

#[cfg(test)]
impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NotificationKind, title: &str, body: &str) {
        self.sent.lock().unwrap().push((kind, title.to_string(), body.to_string()));
    }
}
