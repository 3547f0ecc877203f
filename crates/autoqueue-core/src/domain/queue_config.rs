//! Validated queue configuration and the derived queue status.

use serde::{Deserialize, Serialize};

use super::StoredQueueConfig;

/// Smallest allowed `max_concurrent`. Also the fallback for invalid values.
pub const MIN_CONCURRENT: u8 = 1;

/// Largest allowed `max_concurrent`.
pub const MAX_CONCURRENT: u8 = 3;

/// Queue configuration after validation.
///
/// Invariant: `MIN_CONCURRENT <= max_concurrent <= MAX_CONCURRENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueConfig {
    pub enabled: bool,
    pub max_concurrent: u8,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_concurrent: MIN_CONCURRENT,
        }
    }
}

/// Result of validating a stored config.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQueueConfig {
    pub config: QueueConfig,

    /// The stored `max_concurrent` when it had to be replaced by the minimum.
    pub rejected: Option<serde_json::Value>,
}

impl QueueConfig {
    /// Build a config from whatever the store holds.
    ///
    /// - no stored config: disabled, minimum concurrency
    /// - `max_concurrent` missing or null: minimum, not reported as rejected
    /// - non-integer or outside `[MIN_CONCURRENT, MAX_CONCURRENT]`: minimum, reported
    pub fn from_stored(stored: Option<&StoredQueueConfig>) -> ResolvedQueueConfig {
        let Some(stored) = stored else {
            return ResolvedQueueConfig {
                config: QueueConfig::default(),
                rejected: None,
            };
        };

        let (max_concurrent, rejected) = match &stored.max_concurrent {
            None | Some(serde_json::Value::Null) => (MIN_CONCURRENT, None),
            Some(raw) => match parse_max_concurrent(raw) {
                Some(value) => (value, None),
                None => (MIN_CONCURRENT, Some(raw.clone())),
            },
        };

        ResolvedQueueConfig {
            config: QueueConfig {
                enabled: stored.enabled,
                max_concurrent,
            },
            rejected,
        }
    }
}

/// Accepts JSON integers, and floats with no fractional part, inside the range.
fn parse_max_concurrent(raw: &serde_json::Value) -> Option<u8> {
    let number = raw.as_f64()?;
    if number.fract() != 0.0 {
        return None;
    }
    if number < f64::from(MIN_CONCURRENT) || number > f64::from(MAX_CONCURRENT) {
        return None;
    }
    Some(number as u8)
}

/// Snapshot of a project's queue, computed from the current task list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub enabled: bool,
    pub max_concurrent: u8,
    pub running_count: usize,
    pub backlog_count: usize,
}

impl QueueStatus {
    /// Enabled, below the cap, and something to start.
    pub fn has_capacity(&self) -> bool {
        self.enabled
            && self.running_count < usize::from(self.max_concurrent)
            && self.backlog_count > 0
    }
}
