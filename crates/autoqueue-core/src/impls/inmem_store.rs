//! InMemoryProjectStore - 開発用・テスト用のプロジェクトストア
//!
//! # 学習ポイント
//! - tokio::sync::RwLock（読み取りが圧倒的に多い）
//! - 1 つの実体で複数の port（ProjectStore + TaskLocator）を実装
//!
//! ホスト側の書き込み（設定変更、エージェントによるステータス遷移）は
//! `insert_*` / `set_*` で模擬します。

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::{Project, ProjectId, StoreError, StoredQueueConfig, Task, TaskId, TaskStatus};
use crate::ports::{ProjectStore, TaskLocation, TaskLocator};

/// # 実装詳細
/// - projects: ProjectId → Project
/// - tasks: ProjectId → Vec<Task>（挿入順を保持。選択のタイブレークに使われる）
#[derive(Debug, Default)]
pub struct InMemoryProjectStore {
    inner: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    projects: HashMap<ProjectId, Project>,
    tasks: HashMap<ProjectId, Vec<Task>>,
}

impl InMemoryProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a project.
    pub async fn insert_project(&self, project: Project) {
        let mut state = self.inner.write().await;
        state.projects.insert(project.id.clone(), project);
    }

    /// Insert a task, replacing one with the same id in its project.
    pub async fn insert_task(&self, task: Task) {
        let mut state = self.inner.write().await;
        let tasks = state.tasks.entry(task.project_id.clone()).or_default();
        match tasks.iter_mut().find(|existing| existing.id == task.id) {
            Some(existing) => *existing = task,
            None => tasks.push(task),
        }
    }

    /// Returns `false` when no task has this id.
    pub async fn set_task_status(&self, task_id: &TaskId, status: TaskStatus) -> bool {
        let mut state = self.inner.write().await;
        let found = state
            .tasks
            .values_mut()
            .flat_map(|tasks| tasks.iter_mut())
            .find(|task| &task.id == task_id);
        match found {
            Some(task) => {
                task.status = status;
                true
            }
            None => false,
        }
    }

    /// Returns `false` when the project is unknown.
    pub async fn set_queue_config(&self, project_id: &ProjectId, queue: StoredQueueConfig) -> bool {
        let mut state = self.inner.write().await;
        match state.projects.get_mut(project_id) {
            Some(project) => {
                project.settings.queue = Some(queue);
                true
            }
            None => false,
        }
    }

    pub async fn remove_task(&self, task_id: &TaskId) -> Option<Task> {
        let mut state = self.inner.write().await;
        for tasks in state.tasks.values_mut() {
            if let Some(index) = tasks.iter().position(|task| &task.id == task_id) {
                return Some(tasks.remove(index));
            }
        }
        None
    }
}

#[async_trait]
impl ProjectStore for InMemoryProjectStore {
    async fn get_project(&self, project_id: &ProjectId) -> Result<Option<Project>, StoreError> {
        Ok(self.inner.read().await.projects.get(project_id).cloned())
    }

    async fn get_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .inner
            .read()
            .await
            .tasks
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl TaskLocator for InMemoryProjectStore {
    async fn locate(&self, task_id: &TaskId) -> Result<Option<TaskLocation>, StoreError> {
        let state = self.inner.read().await;
        let Some(task) = state
            .tasks
            .values()
            .flat_map(|tasks| tasks.iter())
            .find(|task| &task.id == task_id)
        else {
            return Ok(None);
        };

        match state.projects.get(&task.project_id) {
            Some(project) => Ok(Some(TaskLocation {
                task: task.clone(),
                project: project.clone(),
            })),
            // A task whose project is gone cannot be scheduled.
            None => Ok(None),
        }
    }
}
