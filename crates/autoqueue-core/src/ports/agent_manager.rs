//! AgentManager port - タスク実行の開始と実行中判定
//!
//! 実体はエージェント CLI をサブプロセスとして起動する外部コンポーネントです。
//! 起動に成功すると、ストア上のタスクは `in_progress` に遷移します（副作用）。

use std::path::Path;

use async_trait::async_trait;

use crate::domain::{AgentError, SpecId, TaskId};

/// Options passed along with a queued start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub parallel: bool,
    pub workers: u32,
    pub base_branch: Option<String>,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            workers: 1,
            base_branch: None,
        }
    }
}

#[async_trait]
pub trait AgentManager: Send + Sync {
    /// Start executing a task's spec inside the project.
    async fn start_task_execution(
        &self,
        task_id: &TaskId,
        project_path: &Path,
        spec_id: &SpecId,
        options: &ExecutionOptions,
    ) -> Result<(), AgentError>;

    /// Whether an agent process for the task is alive right now.
    fn is_running(&self, task_id: &TaskId) -> bool;
}
