//! Errors - エラー型と分類
//!
//! | 種類 | 発生源 | 扱い |
//! |------|--------|------|
//! | StoreError | ProjectStore / TaskLocator | trigger_queue は返す、exit handler はログのみ |
//! | AgentError | AgentManager | 常に trigger_next_task 内で吸収（false 扱い） |
//! | QueueError | TaskQueueManager | 呼び出し元に返す |

use thiserror::Error;

use super::{ProjectId, TaskId};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("project store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to start task {task_id}: {reason}")]
    StartFailed { task_id: TaskId, reason: String },

    #[error("task {0} is already running")]
    AlreadyRunning(TaskId),
}

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A chained operation panicked or was torn down with the runtime.
    #[error("queue operation for project {project_id} aborted: {reason}")]
    OperationAborted { project_id: ProjectId, reason: String },
}
