#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STORAGE_DIR: &str = ".topiary";
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

const ENV_STORAGE_DIR: &str = "TOPIARY_STORAGE_DIR";
const ENV_BUSY_TIMEOUT_MS: &str = "TOPIARY_BUSY_TIMEOUT_MS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    pub storage_dir: PathBuf,
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(DEFAULT_STORAGE_DIR),
            busy_timeout: Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS),
        }
    }
}

impl StoreConfig {
    pub fn at(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Blank directories and unparsable timeouts fall back to defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(dir) = lookup(ENV_STORAGE_DIR).filter(|dir| !dir.trim().is_empty()) {
            config.storage_dir = PathBuf::from(dir.trim());
        }
        if let Some(ms) = lookup(ENV_BUSY_TIMEOUT_MS).and_then(|raw| raw.trim().parse::<u64>().ok())
        {
            config.busy_timeout = Duration::from_millis(ms);
        }
        config
    }
}
