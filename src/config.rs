//! Bridge configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`), each with a default.
//!
//! | Variable                    | Default  |
//! |-----------------------------|----------|
//! | `COLLAB_PLATFORM_VERSION`   | `1`      |
//! | `COLLAB_WAIT_POOL_THREADS`  | `4`      |
//! | `COLLAB_DISPATCH_MODE`      | `direct` |
//! | `COLLAB_FAULT_BUS_CAPACITY` | `1024`   |
//! | `COLLAB_LOG_FORMAT`         | `text`   |
//! | `COLLAB_MONITOR_MILLIS`     | `500`    |
//! | `COLLAB_MONITOR_REPLAY`     | `true`   |

use std::str::FromStr;

use crate::error::CollabError;
use crate::native::PEER_COLLAB_VERSION;

/// How drained notifications are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatchMode {
    /// On the wait-pool thread that drained the slot.
    #[default]
    Direct,
    /// Posted onto a task queue drained by its own worker.
    Queued,
}

impl FromStr for DispatchMode {
    type Err = CollabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(Self::Direct),
            "queued" => Ok(Self::Queued),
            other => Err(CollabError::Config(format!(
                "COLLAB_DISPATCH_MODE must be `direct` or `queued`, got `{other}`"
            ))),
        }
    }
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = CollabError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(CollabError::Config(format!(
                "COLLAB_LOG_FORMAT must be `text` or `json`, got `{other}`"
            ))),
        }
    }
}

/// Top-level bridge configuration.
///
/// Loaded once at startup via [`BridgeConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    /// Collaboration API version requested at startup.
    pub platform_version: u16,

    /// Worker threads of the wait-callback pool.
    pub wait_pool_threads: usize,

    /// Notification delivery strategy.
    pub dispatch_mode: DispatchMode,

    /// Capacity of the FaultBus broadcast channel.
    pub fault_bus_capacity: usize,

    /// Log output format.
    pub log_format: LogFormat,

    /// How long the monitor keeps listening, in milliseconds.
    pub monitor_millis: u64,

    /// Whether the monitor replays its scripted events on startup.
    pub monitor_replay: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            platform_version: PEER_COLLAB_VERSION,
            wait_pool_threads: 4,
            dispatch_mode: DispatchMode::Direct,
            fault_bus_capacity: 1024,
            log_format: LogFormat::Text,
            monitor_millis: 500,
            monitor_replay: true,
        }
    }
}

impl BridgeConfig {
    /// Loads configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    /// Numeric values fall back to their default when missing or invalid.
    ///
    /// # Errors
    ///
    /// Returns [`CollabError::Config`] if `COLLAB_DISPATCH_MODE` or
    /// `COLLAB_LOG_FORMAT` is set to an unknown value.
    pub fn from_env() -> Result<Self, CollabError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`BridgeConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CollabError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let dispatch_mode = lookup("COLLAB_DISPATCH_MODE")
            .map(|v| v.parse::<DispatchMode>())
            .transpose()?
            .unwrap_or(defaults.dispatch_mode);
        let log_format = lookup("COLLAB_LOG_FORMAT")
            .map(|v| v.parse::<LogFormat>())
            .transpose()?
            .unwrap_or(defaults.log_format);

        Ok(Self {
            platform_version: parse_env(&lookup, "COLLAB_PLATFORM_VERSION", defaults.platform_version),
            wait_pool_threads: parse_env(&lookup, "COLLAB_WAIT_POOL_THREADS", defaults.wait_pool_threads)
                .max(1),
            dispatch_mode,
            fault_bus_capacity: parse_env(
                &lookup,
                "COLLAB_FAULT_BUS_CAPACITY",
                defaults.fault_bus_capacity,
            )
            .max(1),
            log_format,
            monitor_millis: parse_env(&lookup, "COLLAB_MONITOR_MILLIS", defaults.monitor_millis),
            monitor_replay: parse_env_bool(&lookup, "COLLAB_MONITOR_REPLAY", defaults.monitor_replay),
        })
    }
}

/// Parses a variable as `T`, returning `default` on missing or invalid
/// values.
fn parse_env<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Parses a variable as a boolean. Accepts `"true"`, `"1"`, `"false"`,
/// `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> bool {
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let Ok(config) = BridgeConfig::from_lookup(lookup(&[])) else {
            panic!("defaults must load");
        };
        assert_eq!(config, BridgeConfig::default());
        assert_eq!(config.platform_version, 1);
    }

    #[test]
    fn values_are_read() {
        let Ok(config) = BridgeConfig::from_lookup(lookup(&[
            ("COLLAB_WAIT_POOL_THREADS", "2"),
            ("COLLAB_DISPATCH_MODE", "Queued"),
            ("COLLAB_LOG_FORMAT", "json"),
            ("COLLAB_MONITOR_MILLIS", "50"),
            ("COLLAB_MONITOR_REPLAY", "0"),
        ])) else {
            panic!("config must load");
        };
        assert_eq!(config.wait_pool_threads, 2);
        assert_eq!(config.dispatch_mode, DispatchMode::Queued);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.monitor_millis, 50);
        assert!(!config.monitor_replay);
    }

    #[test]
    fn invalid_numbers_fall_back_to_defaults() {
        let Ok(config) = BridgeConfig::from_lookup(lookup(&[
            ("COLLAB_FAULT_BUS_CAPACITY", "lots"),
            ("COLLAB_WAIT_POOL_THREADS", "0"),
        ])) else {
            panic!("config must load");
        };
        assert_eq!(config.fault_bus_capacity, 1024);
        assert_eq!(config.wait_pool_threads, 1);
    }

    #[test]
    fn unknown_dispatch_mode_is_a_config_error() {
        let result = BridgeConfig::from_lookup(lookup(&[("COLLAB_DISPATCH_MODE", "inline")]));
        assert!(matches!(result, Err(CollabError::Config(_))));
    }
}
