//! Scheduler tuning, loaded with figment.
//!
//! Sources (highest wins):
//! 1. Environment variables (`AUTOQUEUE_*`, e.g. `AUTOQUEUE_SETTLE_DELAY_MS=500`)
//! 2. `autoqueue.toml` in the working directory, or the path given to [`SchedulerConfig::load_from`]
//! 3. Built-in defaults
//!
//! Per-project settings (`enabled`, `maxConcurrent`) are NOT here: they live in
//! the project store and are re-read on every decision.

use std::path::Path;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "autoqueue.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration error: {0}")]
    Figment(#[from] figment::Error),

    #[error("invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Wait after a task exit before counting capacity.
    pub settle_delay_ms: u64,

    /// Pause between consecutive starts in one `trigger_queue` pass.
    pub start_throttle_ms: u64,

    /// Cap on the per-project chain depth counter.
    pub max_chain_depth: usize,

    /// Chain entries untouched for longer than this are prune candidates.
    pub chain_ttl_secs: u64,

    pub prune_interval_secs: u64,

    /// Buffer of the broadcast channel behind `BroadcastEventSink`.
    pub status_channel_capacity: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: 2_000,
            start_throttle_ms: 500,
            max_chain_depth: 100,
            chain_ttl_secs: 300,
            prune_interval_secs: 60,
            status_channel_capacity: 64,
        }
    }
}

impl SchedulerConfig {
    /// Defaults ← `autoqueue.toml` (if present) ← env.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Path::new(DEFAULT_CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = Self::figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Provider chain, public so callers can merge extra providers on top.
    pub fn figment(path: &Path) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if path.exists() {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed("AUTOQUEUE_"))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_chain_depth == 0 {
            return Err(invalid("max_chain_depth", "must be at least 1"));
        }
        if self.chain_ttl_secs == 0 {
            return Err(invalid("chain_ttl_secs", "must be at least 1"));
        }
        if self.prune_interval_secs == 0 {
            return Err(invalid("prune_interval_secs", "must be at least 1"));
        }
        if self.status_channel_capacity == 0 {
            return Err(invalid("status_channel_capacity", "must be at least 1"));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn start_throttle(&self) -> Duration {
        Duration::from_millis(self.start_throttle_ms)
    }

    pub fn chain_ttl(&self) -> Duration {
        Duration::from_secs(self.chain_ttl_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs)
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}
