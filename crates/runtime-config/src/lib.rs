//! Console configuration types.
//!
//! The `eaconsole` binary reads `console.toml` through these types. Locating
//! the file and applying command-line overrides lives in the binary.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Canonical config file name.
pub const CONFIG_FILE_NAME: &str = "console.toml";

/// Top-level configuration (persisted as `console.toml`).
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ConsoleConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub poll: PollSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerSettings {
    #[serde(default = "default_server_url")]
    pub url: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            url: default_server_url(),
        }
    }
}

/// Poll cadence and per-request deadlines, in milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PollSettings {
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Applies to `/alerts` and `/subjects`.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_bootstrap_timeout_ms")]
    pub bootstrap_timeout_ms: u64,
    #[serde(default = "default_mutation_timeout_ms")]
    pub mutation_timeout_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            bootstrap_timeout_ms: default_bootstrap_timeout_ms(),
            mutation_timeout_ms: default_mutation_timeout_ms(),
        }
    }
}

impl PollSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn bootstrap_timeout(&self) -> Duration {
        Duration::from_millis(self.bootstrap_timeout_ms)
    }

    pub fn mutation_timeout(&self) -> Duration {
        Duration::from_millis(self.mutation_timeout_ms)
    }
}

// ── Serde default functions ─────────────────────────────────────────────

fn default_server_url() -> String {
    "http://127.0.0.1:9876".to_string()
}
fn default_interval_ms() -> u64 {
    1000
}
fn default_request_timeout_ms() -> u64 {
    500
}
fn default_bootstrap_timeout_ms() -> u64 {
    1000
}
fn default_mutation_timeout_ms() -> u64 {
    1000
}

/// Replace values that would stall the console (zero intervals or timeouts,
/// an empty server URL) with defaults. Returns true when anything changed.
pub fn apply_fallbacks(config: &mut ConsoleConfig) -> bool {
    let mut changed = false;

    if config.server.url.trim().is_empty() {
        config.server.url = default_server_url();
        changed = true;
    }

    let defaults = PollSettings::default();
    for (value, fallback) in [
        (&mut config.poll.interval_ms, defaults.interval_ms),
        (&mut config.poll.request_timeout_ms, defaults.request_timeout_ms),
        (&mut config.poll.bootstrap_timeout_ms, defaults.bootstrap_timeout_ms),
        (&mut config.poll.mutation_timeout_ms, defaults.mutation_timeout_ms),
    ] {
        if *value == 0 {
            *value = fallback;
            changed = true;
        }
    }

    changed
}
