//! autoqueue デモ
//!
//! In-memory のプロジェクトにバックログを積み、キューを有効にして流します。
//! エージェントは「少し待って終了する」だけの模擬実装です。
//!
//! ログ: `AUTOQUEUE_LOG=debug cargo run -p autoqueue-cli`
//! 設定: `autoqueue.toml` または `AUTOQUEUE_*` 環境変数

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use autoqueue_core::TaskQueueManager;
use autoqueue_core::config::SchedulerConfig;
use autoqueue_core::domain::{
    AgentError, Project, ProjectId, SpecId, StoredQueueConfig, Task, TaskExit, TaskId, TaskPriority,
    TaskStatus,
};
use autoqueue_core::impls::{BroadcastEventSink, InMemoryProjectStore};
use autoqueue_core::ports::{AgentManager, ExecutionOptions, ProjectStore};
use serde::Deserialize;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const SEED: &str = r#"[
  { "id": "task-docs",     "title": "Write docs",          "priority": "low",    "minutesAgo": 50, "runMs": 400 },
  { "id": "task-login",    "title": "Fix login redirect",  "priority": "urgent", "minutesAgo": 10, "runMs": 900 },
  { "id": "task-cache",    "title": "Add response cache",  "priority": "high",   "minutesAgo": 40, "runMs": 700 },
  { "id": "task-lint",     "title": "Tidy lint warnings",                        "minutesAgo": 60, "runMs": 300 },
  { "id": "task-metrics",  "title": "Export queue metrics", "priority": "medium", "minutesAgo": 30, "runMs": 500 }
]"#;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedTask {
    id: String,
    title: String,
    #[serde(default)]
    priority: Option<TaskPriority>,
    minutes_ago: i64,
    run_ms: u64,
}

/// Marks the task running, then finishes it after its run time and reports the exit.
struct SimulatedAgentManager {
    store: Arc<InMemoryProjectStore>,
    exits: broadcast::Sender<TaskExit>,
    run_times: std::collections::HashMap<TaskId, Duration>,
    running: Arc<std::sync::Mutex<std::collections::HashSet<TaskId>>>,
}

#[async_trait]
impl AgentManager for SimulatedAgentManager {
    async fn start_task_execution(
        &self,
        task_id: &TaskId,
        project_path: &Path,
        spec_id: &SpecId,
        options: &ExecutionOptions,
    ) -> Result<(), AgentError> {
        if self.is_running(task_id) {
            return Err(AgentError::AlreadyRunning(task_id.clone()));
        }
        if !self.store.set_task_status(task_id, TaskStatus::InProgress).await {
            return Err(AgentError::StartFailed {
                task_id: task_id.clone(),
                reason: "task vanished before start".to_string(),
            });
        }
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(task_id.clone());
        info!(
            task_id = %task_id,
            spec_id = %spec_id,
            path = %project_path.display(),
            base_branch = ?options.base_branch,
            "agent started"
        );

        let run_time = self
            .run_times
            .get(task_id)
            .copied()
            .unwrap_or(Duration::from_millis(500));
        let store = Arc::clone(&self.store);
        let exits = self.exits.clone();
        let running = Arc::clone(&self.running);
        let task_id = task_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(run_time).await;
            store.set_task_status(&task_id, TaskStatus::Done).await;
            running
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&task_id);
            info!(task_id = %task_id, "agent exited");
            if exits.send(TaskExit::new(task_id, Some(0))).is_err() {
                warn!("no listener for task exits");
            }
        });
        Ok(())
    }

    fn is_running(&self, task_id: &TaskId) -> bool {
        self.running
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(task_id)
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("AUTOQUEUE_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    // (A) 設定（defaults ← autoqueue.toml ← env）
    let config = SchedulerConfig::load().context("loading scheduler config")?;
    info!(?config, "scheduler config loaded");

    // (B) プロジェクトとバックログを用意
    let project_id = ProjectId::new("project-demo");
    let store = Arc::new(InMemoryProjectStore::new());
    let mut project = Project::new(project_id.clone(), "demo", std::env::temp_dir())
        .with_queue(StoredQueueConfig::new(true, 2));
    project.settings.main_branch = Some("main".to_string());
    store.insert_project(project).await;

    let seed: Vec<SeedTask> = serde_json::from_str(SEED).context("parsing seed tasks")?;
    let now = chrono::Utc::now();
    let mut run_times = std::collections::HashMap::new();
    for entry in seed {
        let task_id = TaskId::new(entry.id);
        let mut task = Task::new(
            task_id.clone(),
            SpecId::generate(),
            project_id.clone(),
            entry.title,
            TaskStatus::Backlog,
        )
        .with_created_at(now - chrono::Duration::minutes(entry.minutes_ago));
        if let Some(priority) = entry.priority {
            task = task.with_priority(priority);
        }
        run_times.insert(task_id, Duration::from_millis(entry.run_ms));
        store.insert_task(task).await;
    }

    // (C) ワイヤリング
    let (exits_tx, exits_rx) = broadcast::channel(32);
    let agents = Arc::new(SimulatedAgentManager {
        store: Arc::clone(&store),
        exits: exits_tx,
        run_times,
        running: Arc::default(),
    });
    let events = Arc::new(BroadcastEventSink::new(config.status_channel_capacity));
    let mut updates = events.subscribe();

    let manager = TaskQueueManager::builder(store.clone(), store.clone(), agents)
        .event_sink(events)
        .config(config)
        .build()?;

    tokio::spawn(async move {
        loop {
            match updates.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => println!("{json}"),
                    Err(error) => {
                        warn!(
                            project_id = %event.project_id(),
                            %error,
                            "could not encode queue event"
                        );
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "status printer lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    // (D) 起動して、バックログが捌けるまで待つ
    let listener = manager.start(exits_rx);
    let started = manager.trigger_queue(&project_id).await?;
    info!(started, "initial queue pass");

    loop {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let status = manager.queue_status(&project_id).await?;
        if status.backlog_count == 0 && status.running_count == 0 {
            break;
        }
    }

    listener.stop_and_join().await;

    let tasks = store.get_tasks(&project_id).await?;
    for task in tasks {
        info!(task_id = %task.id, status = ?task.status, "final");
    }
    Ok(())
}
