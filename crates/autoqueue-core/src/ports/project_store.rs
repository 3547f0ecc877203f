//! ProjectStore / TaskLocator port - ホスト側ストアの読み取り専用ビュー
//!
//! ストアが Task / Project / 設定の正本（source of truth）です。
//! スケジューラは書き込みを行わず、状態の変化は AgentManager の副作用として起こります。

use async_trait::async_trait;

use crate::domain::{Project, ProjectId, StoreError, Task, TaskId};

/// Read-only repository of projects and their tasks.
///
/// # 設計原則
/// - 毎回読み直す（キャッシュしない）。設定もタスク状態も外部から変わる
/// - `Ok(None)` は「存在しない」、`Err` はストア自体の障害
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn get_project(&self, project_id: &ProjectId) -> Result<Option<Project>, StoreError>;

    /// All tasks of a project. Unknown projects yield an empty list.
    async fn get_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>, StoreError>;
}

/// A task together with the project that owns it.
#[derive(Debug, Clone)]
pub struct TaskLocation {
    pub task: Task,
    pub project: Project,
}

/// Resolves which project a task belongs to.
///
/// Exit events only carry a task id, so this is the first lookup on that path.
#[async_trait]
pub trait TaskLocator: Send + Sync {
    async fn locate(&self, task_id: &TaskId) -> Result<Option<TaskLocation>, StoreError>;
}
