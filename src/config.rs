//! Application-level configuration loading: board size and time allowance.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "EXAM_TIMER_BACK_CONFIG_PATH";
/// Slots available when the configuration does not say otherwise.
const DEFAULT_SLOT_COUNT: usize = 4;
/// Allowance in seconds granted to every session by default (one hour).
const DEFAULT_TIME_SECS: i64 = 3600;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Number of concurrent examination slots.
    pub slot_count: usize,
    /// Time allowance in seconds granted to every session.
    pub default_time_secs: i64,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// built-in defaults when the file is absent or unreadable.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        slot_count = app_config.slot_count,
                        default_time_secs = app_config.default_time_secs,
                        "loaded session configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            slot_count: DEFAULT_SLOT_COUNT,
            default_time_secs: DEFAULT_TIME_SECS,
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    slot_count: Option<usize>,
    default_time_secs: Option<i64>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let mut config = Self::default();
        match value.slot_count {
            Some(count) if count > 0 => config.slot_count = count,
            Some(count) => warn!(slot_count = count, "ignoring non-positive slot count"),
            None => {}
        }
        match value.default_time_secs {
            Some(secs) if secs > 0 => config.default_time_secs = secs,
            Some(secs) => warn!(default_time_secs = secs, "ignoring non-positive allowance"),
            None => {}
        }
        config
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}
