use std::path::PathBuf;
use std::time::Duration;

use crate::models::Timestamp;
use crate::undo::DEFAULT_UNDO_TTL_MS;

pub const ENV_DATA_DIR: &str = "TASKFLOW_DATA_DIR";
pub const ENV_UNDO_TTL_MS: &str = "TASKFLOW_UNDO_TTL_MS";
pub const ENV_TICK_SECS: &str = "TASKFLOW_TICK_SECS";

const APP_DIR_NAME: &str = "taskflow";
const DEFAULT_TICK_SECS: u64 = 1;

/// Process-level configuration. User-level preferences live in the persisted `Settings`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub undo_ttl_ms: Timestamp,
    pub tick: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            undo_ttl_ms: DEFAULT_UNDO_TTL_MS,
            tick: Duration::from_secs(DEFAULT_TICK_SECS),
        }
    }
}

/// The data dir alone, so logging can start before the rest of the config is
/// read and its fallback warnings are recorded.
pub fn data_dir_from_env() -> PathBuf {
    data_dir_from_lookup(|key| std::env::var(key).ok())
}

pub fn data_dir_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> PathBuf {
    non_blank(lookup(ENV_DATA_DIR))
        .map(PathBuf::from)
        .unwrap_or_else(default_data_dir)
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| non_blank(lookup(key));
        let data_dir = data_dir_from_lookup(&lookup);

        let undo_ttl_ms = match read(ENV_UNDO_TTL_MS).map(|raw| raw.parse::<Timestamp>()) {
            Some(Ok(ms)) if ms >= 0 => ms,
            Some(_) => {
                log::warn!("{ENV_UNDO_TTL_MS} is not a non-negative integer, using {DEFAULT_UNDO_TTL_MS}");
                DEFAULT_UNDO_TTL_MS
            }
            None => DEFAULT_UNDO_TTL_MS,
        };

        let tick_secs = match read(ENV_TICK_SECS).map(|raw| raw.parse::<u64>()) {
            Some(Ok(secs)) => secs.max(1),
            Some(Err(_)) => {
                log::warn!("{ENV_TICK_SECS} is not a positive integer, using {DEFAULT_TICK_SECS}");
                DEFAULT_TICK_SECS
            }
            None => DEFAULT_TICK_SECS,
        };

        Self {
            data_dir,
            undo_ttl_ms,
            tick: Duration::from_secs(tick_secs),
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(".").join(format!(".{APP_DIR_NAME}")))
}
