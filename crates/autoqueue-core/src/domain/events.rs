//! Events - キューが受け取るイベントと発行するイベント
//!
//! - **TaskExit**: エージェントプロセスの終了通知（入力）
//! - **QueueEvent**: キュー状態の変化通知（出力、UI 向け）

use serde::{Deserialize, Serialize};

use super::{ProjectId, QueueStatus, TaskId};

/// An agent process for a task has exited.
///
/// `exit_code` is `None` when the process was killed by a signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExit {
    pub task_id: TaskId,
    pub exit_code: Option<i32>,
}

impl TaskExit {
    pub fn new(task_id: TaskId, exit_code: Option<i32>) -> Self {
        Self { task_id, exit_code }
    }
}

/// QueueEvent は EventSink に流れるイベント
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueEvent {
    /// Emitted after every scheduling decision, whether or not a task started.
    #[serde(rename_all = "camelCase")]
    StatusUpdated {
        project_id: ProjectId,
        status: QueueStatus,
    },
}

impl QueueEvent {
    pub fn project_id(&self) -> &ProjectId {
        match self {
            QueueEvent::StatusUpdated { project_id, .. } => project_id,
        }
    }
}
