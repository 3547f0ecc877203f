//! TaskQueueManager - バックログからの自動起動
//!
//! # トリガー
//! - **trigger_queue**: 手動の「今キューを回して」。空きがある限り起動し、エラーは呼び出し元へ
//! - **handle_task_exit**: タスク終了イベント。settle 待ちの後に 1 件だけ起動。エラーはログのみ
//!
//! どちらも「判断 + 起動」を ProjectChains に載せて直列化します。
//! 有効/無効・容量はチェーンの中で読み直します（待っている間に設定が変わりうるため）。

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use super::builder::TaskQueueManagerBuilder;
use super::chain::ProjectChains;
use super::listener::QueueListener;
use super::selection::select_next_task;
use crate::config::SchedulerConfig;
use crate::domain::{
    Project, ProjectId, QueueConfig, QueueError, QueueEvent, QueueStatus, Task, TaskExit,
};
use crate::ports::{
    AgentManager, EventSink, ExecutionOptions, ProjectStore, StatusSettle, TaskLocator,
};

/// Per-project scheduler promoting backlog tasks up to the concurrency cap.
///
/// Cheap to clone; clones share chains and collaborators.
#[derive(Clone)]
pub struct TaskQueueManager {
    inner: Arc<Inner>,
}

pub(crate) struct Inner {
    pub(crate) store: Arc<dyn ProjectStore>,
    pub(crate) locator: Arc<dyn TaskLocator>,
    pub(crate) agents: Arc<dyn AgentManager>,
    pub(crate) events: Arc<dyn EventSink>,
    pub(crate) settle: Arc<dyn StatusSettle>,
    pub(crate) chains: Arc<ProjectChains>,
    pub(crate) config: SchedulerConfig,
}

impl TaskQueueManager {
    pub fn builder(
        store: Arc<dyn ProjectStore>,
        locator: Arc<dyn TaskLocator>,
        agents: Arc<dyn AgentManager>,
    ) -> TaskQueueManagerBuilder {
        TaskQueueManagerBuilder::new(store, locator, agents)
    }

    pub(crate) fn from_inner(inner: Inner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Validated queue config of a project. Unknown projects are disabled.
    pub async fn queue_config(&self, project_id: &ProjectId) -> Result<QueueConfig, QueueError> {
        match self.inner.store.get_project(project_id).await? {
            Some(project) => Ok(resolve_config(&project)),
            None => {
                debug!(project_id = %project_id, "project not found; queue treated as disabled");
                Ok(QueueConfig::default())
            }
        }
    }

    /// Fresh running/backlog counts. Never cached.
    pub async fn queue_status(&self, project_id: &ProjectId) -> Result<QueueStatus, QueueError> {
        let config = self.queue_config(project_id).await?;
        let tasks = self.inner.store.get_tasks(project_id).await?;
        Ok(status_of(config, &tasks))
    }

    pub async fn can_start_more_tasks(&self, project_id: &ProjectId) -> Result<bool, QueueError> {
        Ok(self.queue_status(project_id).await?.has_capacity())
    }

    /// Start as many backlog tasks as capacity allows.
    ///
    /// Returns how many were started. A disabled queue is a no-op.
    pub async fn trigger_queue(&self, project_id: &ProjectId) -> Result<usize, QueueError> {
        if !self.queue_config(project_id).await?.enabled {
            debug!(project_id = %project_id, "queue disabled; trigger ignored");
            return Ok(0);
        }

        let manager = self.clone();
        let chained_project = project_id.clone();
        let outcome = self
            .inner
            .chains
            .enqueue(project_id, async move {
                let result = manager.fill_capacity(&chained_project).await;
                manager.emit_status(&chained_project).await;
                result
            })
            .await;

        match outcome {
            Ok(result) => result,
            Err(error) => {
                error!(project_id = %project_id, %error, "queue pass aborted");
                self.emit_status(project_id).await;
                Err(error)
            }
        }
    }

    async fn fill_capacity(&self, project_id: &ProjectId) -> Result<usize, QueueError> {
        if !self.queue_config(project_id).await?.enabled {
            debug!(project_id = %project_id, "queue disabled while waiting in chain");
            return Ok(0);
        }

        let mut started = 0;
        while self.can_start_more_tasks(project_id).await? {
            if started > 0 {
                tokio::time::sleep(self.inner.config.start_throttle()).await;
            }
            if !self.trigger_next_task(project_id).await? {
                break;
            }
            started += 1;
        }

        info!(project_id = %project_id, started, "queue pass finished");
        Ok(started)
    }

    /// Start the single best backlog task.
    ///
    /// `Ok(false)` when the project is gone, the cap is reached, the backlog
    /// is empty, the agent manager already runs the pick, or the start failed.
    pub(crate) async fn trigger_next_task(
        &self,
        project_id: &ProjectId,
    ) -> Result<bool, QueueError> {
        let Some(project) = self.inner.store.get_project(project_id).await? else {
            debug!(project_id = %project_id, "project not found; nothing to start");
            return Ok(false);
        };
        let config = resolve_config(&project);
        let tasks = self.inner.store.get_tasks(project_id).await?;

        // The caller's capacity check may be stale by now.
        let running = running_count(&tasks);
        if running >= usize::from(config.max_concurrent) {
            debug!(
                project_id = %project_id,
                running,
                max_concurrent = config.max_concurrent,
                "at capacity; nothing to start"
            );
            return Ok(false);
        }

        let Some(task) = select_next_task(&tasks) else {
            debug!(project_id = %project_id, "backlog empty");
            return Ok(false);
        };

        if self.inner.agents.is_running(&task.id) {
            debug!(
                project_id = %project_id,
                task_id = %task.id,
                "selected task already running; backlog count was stale"
            );
            return Ok(false);
        }

        let options = ExecutionOptions {
            base_branch: project.settings.main_branch.clone(),
            ..ExecutionOptions::default()
        };

        info!(
            project_id = %project_id,
            task_id = %task.id,
            spec_id = %task.spec_id,
            priority = ?task.metadata.priority,
            "starting queued task"
        );

        match self
            .inner
            .agents
            .start_task_execution(&task.id, &project.path, &task.spec_id, &options)
            .await
        {
            Ok(()) => Ok(true),
            Err(error) => {
                error!(
                    project_id = %project_id,
                    task_id = %task.id,
                    %error,
                    "failed to start queued task"
                );
                Ok(false)
            }
        }
    }

    /// React to a task exit. Never fails: everything is logged.
    pub(crate) async fn handle_task_exit(&self, exit: TaskExit) {
        let location = match self.inner.locator.locate(&exit.task_id).await {
            Ok(Some(location)) => location,
            Ok(None) => {
                debug!(task_id = %exit.task_id, "exited task not found; ignoring");
                return;
            }
            Err(error) => {
                warn!(task_id = %exit.task_id, %error, "could not resolve project of exited task");
                return;
            }
        };

        let project_id = location.project.id.clone();
        if !resolve_config(&location.project).enabled {
            debug!(
                project_id = %project_id,
                task_id = %exit.task_id,
                "queue disabled; exit ignored"
            );
            return;
        }

        debug!(
            project_id = %project_id,
            task_id = %exit.task_id,
            exit_code = ?exit.exit_code,
            "task exited; scheduling queue check"
        );

        let manager = self.clone();
        let chained_project = project_id.clone();
        let outcome = self
            .inner
            .chains
            .enqueue(&project_id, async move {
                if let Err(error) = manager.advance_after_exit(&chained_project, &exit).await {
                    error!(
                        project_id = %chained_project,
                        task_id = %exit.task_id,
                        %error,
                        "queue check after task exit failed"
                    );
                }
                manager.emit_status(&chained_project).await;
            })
            .await;

        if let Err(error) = outcome {
            error!(project_id = %project_id, %error, "queue check after task exit aborted");
            self.emit_status(&project_id).await;
        }
    }

    async fn advance_after_exit(
        &self,
        project_id: &ProjectId,
        exit: &TaskExit,
    ) -> Result<bool, QueueError> {
        if !self.queue_config(project_id).await?.enabled {
            debug!(project_id = %project_id, "queue disabled while waiting in chain");
            return Ok(false);
        }

        self.inner.settle.wait(exit).await;

        if !self.can_start_more_tasks(project_id).await? {
            debug!(project_id = %project_id, "no capacity or backlog after exit");
            return Ok(false);
        }
        self.trigger_next_task(project_id).await
    }

    async fn emit_status(&self, project_id: &ProjectId) {
        match self.queue_status(project_id).await {
            Ok(status) => self.inner.events.emit(QueueEvent::StatusUpdated {
                project_id: project_id.clone(),
                status,
            }),
            Err(error) => {
                warn!(project_id = %project_id, %error, "could not compute queue status update");
            }
        }
    }

    /// Listen for task exits and prune chains periodically.
    ///
    /// Stopping the returned listener detaches both loops; operations already
    /// queued on a chain still run to completion.
    pub fn start(&self, exits: broadcast::Receiver<TaskExit>) -> QueueListener {
        QueueListener::spawn(self.clone(), exits)
    }

    /// Remove settled chain entries. Returns how many were removed.
    pub fn prune_chains(&self) -> usize {
        self.inner.chains.prune()
    }

    pub fn chain_depth(&self, project_id: &ProjectId) -> Option<usize> {
        self.inner.chains.depth(project_id)
    }

    pub fn chain_count(&self) -> usize {
        self.inner.chains.len()
    }
}

fn resolve_config(project: &Project) -> QueueConfig {
    let resolved = QueueConfig::from_stored(project.settings.queue.as_ref());
    if let Some(rejected) = &resolved.rejected {
        warn!(
            project_id = %project.id,
            max_concurrent = %rejected,
            fallback = resolved.config.max_concurrent,
            "invalid maxConcurrent in project settings; using minimum"
        );
    }
    resolved.config
}

fn running_count(tasks: &[Task]) -> usize {
    tasks.iter().filter(|task| task.status.is_running()).count()
}

fn status_of(config: QueueConfig, tasks: &[Task]) -> QueueStatus {
    QueueStatus {
        enabled: config.enabled,
        max_concurrent: config.max_concurrent,
        running_count: running_count(tasks),
        backlog_count: tasks.iter().filter(|task| task.status.is_backlog()).count(),
    }
}
