//! OAuth 2.0 device authorization flow (RFC 8628) against
//! `/-/oauth/device` and `/-/oauth/token`.
//!
//! The polling loop is bounded by the `expires_in` the server hands out, and
//! the sleep function is injected so tests can run without waiting.

use super::ApiClient;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const DEVICE_CODE_GRANT: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_INTERVAL_SECS: u64 = 5;
const DEFAULT_EXPIRES_IN_SECS: u64 = 900;
const SLOW_DOWN_STEP_SECS: u64 = 5;
const MIN_INTERVAL_SECS: u64 = 1;

/// Response from the device authorization endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

fn default_expires_in() -> u64 {
    DEFAULT_EXPIRES_IN_SECS
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

/// Start the flow: request a device code and user code.
///
/// # Errors
///
/// Returns [`Error::Login`] if the server refuses or answers with something
/// other than a device authorization.
pub fn request_device_code(client: &ApiClient, scope: Option<&str>) -> Result<DeviceAuthorization> {
    let form: Vec<(&str, &str)> = scope.map(|s| vec![("scope", s)]).unwrap_or_default();
    let response = client.post_form("/-/oauth/device", &form)?;

    if response.status != 200 {
        return Err(Error::Login(format!(
            "Failed to start login flow: {} from {}",
            response.status,
            client.url("/-/oauth/device")
        )));
    }

    serde_json::from_str(&response.body)
        .map_err(|e| Error::Login(format!("Unexpected device authorization response: {e}")))
}

/// Poll the token endpoint until the user approves, denies, or the code
/// expires.
///
/// `sleep` is called before every poll; `on_poll` after every pending answer.
/// The deadline counts whichever is larger: the time handed to `sleep` or
/// the wall-clock time since the first poll. Intervals below one second are
/// raised to one second.
///
/// # Errors
///
/// Returns [`Error::Login`] on denial, expiry, or any unexpected error code.
pub fn poll_for_token(
    client: &ApiClient,
    device: &DeviceAuthorization,
    mut sleep: impl FnMut(Duration),
    mut on_poll: impl FnMut(),
) -> Result<String> {
    let deadline = Duration::from_secs(device.expires_in);
    let mut interval = Duration::from_secs(device.interval.max(MIN_INTERVAL_SECS));
    let mut waited = Duration::ZERO;
    let started = Instant::now();

    loop {
        if waited.max(started.elapsed()) + interval > deadline {
            return Err(Error::Login("Device code expired. Run login again.".to_string()));
        }
        sleep(interval);
        waited += interval;

        let response = client.post_form(
            "/-/oauth/token",
            &[
                ("grant_type", DEVICE_CODE_GRANT),
                ("device_code", &device.device_code),
            ],
        )?;
        let token: TokenResponse = serde_json::from_str(&response.body)
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        if let Some(access_token) = token.access_token {
            info!("Device authorization approved");
            return Ok(access_token);
        }

        match token.error.as_deref() {
            Some("authorization_pending") => {}
            Some("slow_down") => {
                interval += Duration::from_secs(SLOW_DOWN_STEP_SECS);
                debug!(interval_secs = interval.as_secs(), "Server asked to slow down");
            }
            Some("access_denied") => return Err(Error::Login("Authorization denied.".to_string())),
            Some("expired_token") => {
                return Err(Error::Login("Device code expired. Run login again.".to_string()));
            }
            other => {
                return Err(Error::Login(format!(
                    "Unexpected error: {}",
                    other.unwrap_or("no access_token in response")
                )));
            }
        }
        on_poll();
    }
}
