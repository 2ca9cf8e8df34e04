//! Automator settings: wait timeouts, polling cadence, extraction limits.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Tunables shared by the automator and the page adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomatorSettings {
    /// Default `wait_for_login` budget. Long enough for a human to log in.
    #[serde(default = "default_login_timeout")]
    pub login_timeout_ms: u64,
    #[serde(default = "default_response_timeout")]
    pub response_timeout_ms: u64,
    /// Delay between probes while an adapter waits on a visibility state.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    #[serde(default = "default_max_depth")]
    pub max_extract_depth: usize,
}

fn default_login_timeout() -> u64 {
    300_000
}
fn default_response_timeout() -> u64 {
    60_000
}
fn default_poll_interval() -> u64 {
    100
}
fn default_max_depth() -> usize {
    32
}

impl Default for AutomatorSettings {
    fn default() -> Self {
        Self {
            login_timeout_ms: default_login_timeout(),
            response_timeout_ms: default_response_timeout(),
            poll_interval_ms: default_poll_interval(),
            max_extract_depth: default_max_depth(),
        }
    }
}

impl AutomatorSettings {
    /// Defaults overridden by `CHATSCOPE_*` environment variables.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(v) = env_number("CHATSCOPE_LOGIN_TIMEOUT_MS") {
            settings.login_timeout_ms = v;
        }
        if let Some(v) = env_number("CHATSCOPE_RESPONSE_TIMEOUT_MS") {
            settings.response_timeout_ms = v;
        }
        if let Some(v) = env_number("CHATSCOPE_POLL_INTERVAL_MS") {
            settings.poll_interval_ms = v;
        }
        if let Some(v) = env_number("CHATSCOPE_MAX_DEPTH") {
            settings.max_extract_depth = v as usize;
        }
        settings
    }

    /// Load settings from a JSON file, or return defaults. An absent file is
    /// silent; an unreadable or malformed one logs a warning.
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Cannot read {}, using defaults: {}", path.display(), e);
                return Self::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!("Malformed settings in {}, using defaults: {}", path.display(), e);
            Self::default()
        })
    }

    /// Save settings to disk.
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn login_timeout(&self) -> Duration {
        Duration::from_millis(self.login_timeout_ms)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

fn env_number(key: &str) -> Option<u64> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!("Ignoring {}: '{}' is not a number", key, raw);
            None
        }
    }
}
