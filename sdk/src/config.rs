//! SDK configuration with defaults and environment overrides.

use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_SIGNAL_SERVER_URL: &str = "http://localhost:5001";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Path of the signaling hub on the signal server.
pub const HUB_PATH: &str = "/signalhub";

/// Connection settings shared by the REST client and the chat example.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the REST backend, without trailing slash.
    pub api_base_url: String,
    /// Base URL of the signaling server, without trailing slash.
    pub signal_server_url: String,
    /// Timeout applied to every HTTP request.
    pub timeout: Duration,
    /// Raise request and lifecycle events from `debug` to `info`.
    pub enable_logs: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_owned(),
            signal_server_url: DEFAULT_SIGNAL_SERVER_URL.to_owned(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            enable_logs: false,
        }
    }
}

impl Config {
    /// Build config from environment variables, falling back to defaults.
    ///
    /// Optional:
    /// - `SMARTC_API_URL`: REST base URL
    /// - `SMARTC_SIGNAL_URL`: signal server base URL
    /// - `SMARTC_TIMEOUT_SECS`: request timeout, default 10
    /// - `SMARTC_ENABLE_LOGS`: `1`/`true`/`yes`/`on` to enable
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let url = |key: &str, default: String| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .map_or(default, |value| value.trim().trim_end_matches('/').to_owned())
        };

        Self {
            api_base_url: url("SMARTC_API_URL", defaults.api_base_url),
            signal_server_url: url("SMARTC_SIGNAL_URL", defaults.signal_server_url),
            timeout: lookup("SMARTC_TIMEOUT_SECS")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map_or(defaults.timeout, Duration::from_secs),
            enable_logs: lookup("SMARTC_ENABLE_LOGS").is_some_and(|v| parse_flag(&v)),
        }
    }

    /// Full URL of the signaling hub.
    #[must_use]
    pub fn hub_url(&self) -> String {
        format!("{}{HUB_PATH}", self.signal_server_url.trim_end_matches('/'))
    }
}

fn parse_flag(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
