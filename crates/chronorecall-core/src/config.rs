//! Engine tuning knobs.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

pub const ENV_CACHE_CAPACITY: &str = "CHRONORECALL_CACHE_CAPACITY";
pub const ENV_SUGGEST_THRESHOLD: &str = "CHRONORECALL_SUGGEST_THRESHOLD";
pub const ENV_SUGGEST_TOP_K: &str = "CHRONORECALL_SUGGEST_TOP_K";

/// Configuration for [`AnalysisEngine`](crate::engine::AnalysisEngine).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of cached query results.
    pub cache_capacity: usize,
    /// Minimum conditional frequency (exclusive) for a suggestion.
    pub suggest_threshold: f64,
    /// Maximum suggestions per selected source value.
    pub suggest_top_k: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 128,
            suggest_threshold: 0.4,
            suggest_top_k: 3,
        }
    }
}

impl EngineConfig {
    /// Defaults overridden by any `CHRONORECALL_*` variables that are set.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        if let Some(v) = read_env(ENV_CACHE_CAPACITY)? {
            config.cache_capacity = v;
        }
        if let Some(v) = read_env(ENV_SUGGEST_THRESHOLD)? {
            config.suggest_threshold = v;
        }
        if let Some(v) = read_env(ENV_SUGGEST_TOP_K)? {
            config.suggest_top_k = v;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(EngineError::Config(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.suggest_threshold) {
            return Err(EngineError::Config(format!(
                "suggest_threshold must be in [0, 1), got {}",
                self.suggest_threshold
            )));
        }
        if self.suggest_top_k == 0 {
            return Err(EngineError::Config(
                "suggest_top_k must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn read_env<T: std::str::FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EngineError::Config(format!("{key}: cannot parse {raw:?}"))),
        Err(_) => Ok(None),
    }
}
