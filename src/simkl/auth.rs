// Author: Dustin Pilgrim
// License: MIT
//
// Device-code OAuth flow, grounded on
// original_source/simkl_scrobbler/simkl_api.py::get_device_code/poll_for_token.
// Used only by the `init` CLI subcommand (SPEC_FULL.md §6.4); never touched
// by the running daemon.

use std::time::Duration;

use serde::Deserialize;

use crate::core::error::{Error, Result};

const API_BASE: &str = "https://api.simkl.com";

#[derive(Debug, Deserialize)]
pub struct DeviceCode {
    pub user_code: String,
    pub verification_url: String,
    pub expires_in: u64,
    pub interval: u64,
    /// `device_code` in Simkl's response doubles as the poll key.
    pub device_code: String,
}

#[derive(Deserialize)]
struct PollResponse {
    access_token: Option<String>,
}

pub async fn request_device_code(client_id: &str) -> Result<DeviceCode> {
    let client = reqwest::Client::new();
    let url = format!("{API_BASE}/oauth/pin");

    let resp = client
        .get(&url)
        .query(&[("client_id", client_id)])
        .send()
        .await?;

    if !resp.status().is_success() {
        return Err(Error::ApiFailure { endpoint: "/oauth/pin".into(), detail: resp.status().to_string() });
    }

    Ok(resp.json().await?)
}

/// Polls `/oauth/pin/<user_code>` at the server-provided interval until the
/// user approves the request or `expires_in` elapses.
pub async fn poll_for_token(client_id: &str, device: &DeviceCode) -> Result<String> {
    let client = reqwest::Client::new();
    let url = format!("{API_BASE}/oauth/pin/{}", device.user_code);

    let deadline = std::time::Instant::now() + Duration::from_secs(device.expires_in);

    while std::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_secs(device.interval)).await;

        let resp = client.get(&url).query(&[("client_id", client_id)]).send().await?;

        if resp.status().is_success() {
            let parsed: PollResponse = resp.json().await?;
            if let Some(token) = parsed.access_token {
                return Ok(token);
            }
        }
    }

    Err(Error::Configuration("device code expired before authorization completed".into()))
}
