// Author: Dustin Pilgrim
// License: MIT
//
// REDESIGN FLAGS (SPEC_FULL.md §9): the original implementation checked
// connectivity via a free function that tests monkey-patched at module
// scope. Replaced with a trait injected into the engine, the same
// dependency-injection shape the teacher uses for `EventSink`
// (services/dbus.rs) to decouple D-Bus listeners from their consumer.

use std::time::Duration;

#[async_trait::async_trait]
pub trait ConnectivityProbe: Send + Sync + 'static {
    async fn is_online(&self) -> bool;
}

/// `GET`s a handful of well-known hosts with a short timeout; any 2xx counts
/// as online. Mirrors `is_internet_connected()` in
/// original_source/simkl_scrobbler/simkl_api.py.
pub struct HttpConnectivityProbe {
    client: reqwest::Client,
}

impl HttpConnectivityProbe {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(3))
                .build()
                .expect("failed to build connectivity probe http client"),
        }
    }

    const PROBE_HOSTS: [&'static str; 3] =
        ["https://api.simkl.com", "https://www.google.com", "https://www.cloudflare.com"];
}

impl Default for HttpConnectivityProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ConnectivityProbe for HttpConnectivityProbe {
    async fn is_online(&self) -> bool {
        for host in Self::PROBE_HOSTS {
            if let Ok(resp) = self.client.get(host).send().await {
                if resp.status().is_success() || resp.status().is_redirection() {
                    return true;
                }
            }
        }
        false
    }
}

#[cfg(test)]
pub struct FakeConnectivityProbe {
    pub online: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl FakeConnectivityProbe {
    pub fn new(online: bool) -> Self {
        Self { online: std::sync::atomic::AtomicBool::new(online) }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl ConnectivityProbe for FakeConnectivityProbe {
    async fn is_online(&self) -> bool {
        self.online.load(std::sync::atomic::Ordering::SeqCst)
    }
}
