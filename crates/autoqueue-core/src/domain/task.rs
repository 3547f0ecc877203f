use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ProjectId, SpecId, TaskId};

/// Task status as stored by the host application.
///
/// The scheduler only observes these values; transitions are made by the UI
/// and by the agent manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting to be picked up by the queue.
    Backlog,

    /// An agent is working on it.
    InProgress,

    AiReview,
    HumanReview,
    Done,
}

impl TaskStatus {
    /// Counts against the project's concurrency cap.
    pub fn is_running(self) -> bool {
        matches!(self, TaskStatus::InProgress)
    }

    /// Eligible for the queue.
    pub fn is_backlog(self) -> bool {
        matches!(self, TaskStatus::Backlog)
    }
}

/// Priority label attached to a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    /// Ordinal weight used for selection. Higher runs first.
    pub fn weight(self) -> u8 {
        match self {
            TaskPriority::Urgent => 4,
            TaskPriority::High => 3,
            TaskPriority::Medium => 2,
            TaskPriority::Low => 1,
        }
    }
}

/// Weight of an optional priority (unset = 0).
pub fn priority_weight(priority: Option<TaskPriority>) -> u8 {
    priority.map_or(0, TaskPriority::weight)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    #[serde(default)]
    pub priority: Option<TaskPriority>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// A task as read from the project store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub spec_id: SpecId,
    pub project_id: ProjectId,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub metadata: TaskMetadata,
}

impl Task {
    pub fn new(
        id: TaskId,
        spec_id: SpecId,
        project_id: ProjectId,
        title: impl Into<String>,
        status: TaskStatus,
    ) -> Self {
        Self {
            id,
            spec_id,
            project_id,
            title: title.into(),
            status,
            metadata: TaskMetadata::default(),
        }
    }

    pub fn with_priority(mut self, priority: TaskPriority) -> Self {
        self.metadata.priority = Some(priority);
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.metadata.created_at = Some(created_at);
        self
    }

    pub fn priority_weight(&self) -> u8 {
        priority_weight(self.metadata.priority)
    }
}
