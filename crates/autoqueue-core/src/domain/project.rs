use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::ProjectId;

/// Queue settings exactly as persisted by the host.
///
/// `max_concurrent` is kept as a raw JSON value: the settings file is edited
/// by other processes and may hold strings, floats or nothing at all.
/// Use [`crate::domain::QueueConfig::from_stored`] to get a validated view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredQueueConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub max_concurrent: Option<serde_json::Value>,
}

impl StoredQueueConfig {
    pub fn new(enabled: bool, max_concurrent: u64) -> Self {
        Self {
            enabled,
            max_concurrent: Some(max_concurrent.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    #[serde(default)]
    pub queue: Option<StoredQueueConfig>,

    /// Branch new task worktrees are cut from.
    #[serde(default)]
    pub main_branch: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub path: PathBuf,
    #[serde(default)]
    pub settings: ProjectSettings,
}

impl Project {
    pub fn new(id: ProjectId, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id,
            name: name.into(),
            path: path.into(),
            settings: ProjectSettings::default(),
        }
    }

    pub fn with_queue(mut self, queue: StoredQueueConfig) -> Self {
        self.settings.queue = Some(queue);
        self
    }
}
