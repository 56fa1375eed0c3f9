#![forbid(unsafe_code)]

use crate::names::DEFAULT_MAX_NAME_LEN;
use std::time::Duration;

pub const DEFAULT_NOVELTY_POLL_SECS: u64 = 30;

const ENV_MAX_NAME_LEN: &str = "TOPIARY_MAX_NAME_LEN";
const ENV_NOVELTY_POLL_SECS: &str = "TOPIARY_NOVELTY_POLL_SECS";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub max_name_len: usize,
    pub novelty_poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_name_len: DEFAULT_MAX_NAME_LEN,
            novelty_poll_interval: Duration::from_secs(DEFAULT_NOVELTY_POLL_SECS),
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by `TOPIARY_MAX_NAME_LEN` and
    /// `TOPIARY_NOVELTY_POLL_SECS`. Unparsable or zero values are ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = positive(lookup(ENV_MAX_NAME_LEN)) {
            config.max_name_len = value as usize;
        }
        if let Some(value) = positive(lookup(ENV_NOVELTY_POLL_SECS)) {
            config.novelty_poll_interval = Duration::from_secs(value);
        }
        config
    }
}

fn positive(raw: Option<String>) -> Option<u64> {
    raw?.trim().parse::<u64>().ok().filter(|value| *value > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_overrides_defaults() {
        let config = EngineConfig::from_lookup(|key| match key {
            "TOPIARY_MAX_NAME_LEN" => Some("40".to_string()),
            "TOPIARY_NOVELTY_POLL_SECS" => Some("zero".to_string()),
            _ => None,
        });
        assert_eq!(config.max_name_len, 40);
        assert_eq!(config.novelty_poll_interval, Duration::from_secs(30));
    }
}
