//! Test doubles shared by the unit tests.

use std::collections::HashSet;
use std::io;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::app::TaskQueueManager;
use crate::domain::{
    AgentError, Project, ProjectId, QueueEvent, SpecId, StoreError, StoredQueueConfig, Task,
    TaskId, TaskPriority, TaskStatus,
};
use crate::impls::InMemoryProjectStore;
use crate::ports::{
    AgentManager, EventSink, ExecutionOptions, NoSettle, ProjectStore, StatusSettle, TaskLocation,
    TaskLocator,
};

const PROJECT_PATH: &str = "/work/demo";

pub(crate) fn at(minutes: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap() + Duration::minutes(minutes)
}

/// Backlog task created `minutes` after a fixed origin. Its spec id is `{id}-spec`.
pub(crate) fn backlog_task(
    project_id: &ProjectId,
    id: &str,
    priority: Option<TaskPriority>,
    minutes: i64,
) -> Task {
    let task = Task::new(
        TaskId::new(id),
        SpecId::new(format!("{id}-spec")),
        project_id.clone(),
        id,
        TaskStatus::Backlog,
    )
    .with_created_at(at(minutes));
    match priority {
        Some(priority) => task.with_priority(priority),
        None => task,
    }
}

pub(crate) fn running_task(project_id: &ProjectId, id: &str) -> Task {
    Task::new(
        TaskId::new(id),
        SpecId::new(format!("{id}-spec")),
        project_id.clone(),
        id,
        TaskStatus::InProgress,
    )
}

#[derive(Debug, Clone)]
pub(crate) struct StartCall {
    pub task_id: TaskId,
    pub project_path: PathBuf,
    pub spec_id: SpecId,
    pub options: ExecutionOptions,
}

/// Flips started tasks to `in_progress` in the store, like the real agent manager.
pub(crate) struct RecordingAgentManager {
    store: Arc<InMemoryProjectStore>,
    calls: Mutex<Vec<StartCall>>,
    failing: Mutex<HashSet<TaskId>>,
    panicking: Mutex<HashSet<TaskId>>,
    reported_running: Mutex<HashSet<TaskId>>,
    peak_running: Mutex<usize>,
}

impl RecordingAgentManager {
    pub fn new(store: Arc<InMemoryProjectStore>) -> Self {
        Self {
            store,
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            panicking: Mutex::new(HashSet::new()),
            reported_running: Mutex::new(HashSet::new()),
            peak_running: Mutex::new(0),
        }
    }

    pub fn fail_on(&self, task_id: &TaskId) {
        self.failing.lock().unwrap().insert(task_id.clone());
    }

    /// Panic inside `start_task_execution`, tearing down the chained operation.
    pub fn panic_on(&self, task_id: &TaskId) {
        self.panicking.lock().unwrap().insert(task_id.clone());
    }

    /// Claim a process is alive even though the store still says backlog.
    pub fn report_running(&self, task_id: &TaskId) {
        self.reported_running.lock().unwrap().insert(task_id.clone());
    }

    pub fn started(&self) -> Vec<TaskId> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|call| call.task_id.clone())
            .collect()
    }

    pub fn last_call(&self) -> Option<StartCall> {
        self.calls.lock().unwrap().last().cloned()
    }

    /// Highest `in_progress` count seen right after a start.
    pub fn peak_running(&self) -> usize {
        *self.peak_running.lock().unwrap()
    }
}

#[async_trait]
impl AgentManager for RecordingAgentManager {
    async fn start_task_execution(
        &self,
        task_id: &TaskId,
        project_path: &Path,
        spec_id: &SpecId,
        options: &ExecutionOptions,
    ) -> Result<(), AgentError> {
        let panics = self.panicking.lock().unwrap().contains(task_id);
        if panics {
            panic!("agent crashed while starting {task_id}");
        }
        if self.failing.lock().unwrap().contains(task_id) {
            return Err(AgentError::StartFailed {
                task_id: task_id.clone(),
                reason: "spawn refused".to_string(),
            });
        }

        self.store.set_task_status(task_id, TaskStatus::InProgress).await;
        self.calls.lock().unwrap().push(StartCall {
            task_id: task_id.clone(),
            project_path: project_path.to_path_buf(),
            spec_id: spec_id.clone(),
            options: options.clone(),
        });

        if let Some(location) = self.store.locate(task_id).await.unwrap() {
            let running = self
                .store
                .get_tasks(&location.project.id)
                .await
                .unwrap()
                .iter()
                .filter(|task| task.status.is_running())
                .count();
            let mut peak = self.peak_running.lock().unwrap();
            *peak = (*peak).max(running);
        }
        Ok(())
    }

    fn is_running(&self, task_id: &TaskId) -> bool {
        self.reported_running.lock().unwrap().contains(task_id)
    }
}

#[derive(Default)]
pub(crate) struct RecordingEventSink {
    events: Mutex<Vec<QueueEvent>>,
}

impl RecordingEventSink {
    pub fn events(&self) -> Vec<QueueEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: QueueEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// In-memory store whose task reads can be switched to fail.
pub(crate) struct FlakyStore {
    inner: Arc<InMemoryProjectStore>,
    fail_tasks: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Arc<InMemoryProjectStore>) -> Self {
        Self {
            inner,
            fail_tasks: AtomicBool::new(false),
        }
    }

    pub fn fail_task_reads(&self, fail: bool) {
        self.fail_tasks.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_tasks.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("task index offline".to_string()));
        }
        Ok(())
    }
}

impl Deref for FlakyStore {
    type Target = InMemoryProjectStore;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[async_trait]
impl ProjectStore for FlakyStore {
    async fn get_project(&self, project_id: &ProjectId) -> Result<Option<Project>, StoreError> {
        self.inner.get_project(project_id).await
    }

    async fn get_tasks(&self, project_id: &ProjectId) -> Result<Vec<Task>, StoreError> {
        self.check()?;
        self.inner.get_tasks(project_id).await
    }
}

#[async_trait]
impl TaskLocator for FlakyStore {
    async fn locate(&self, task_id: &TaskId) -> Result<Option<TaskLocation>, StoreError> {
        self.inner.locate(task_id).await
    }
}

#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with a plain-text fmt subscriber and return what it logged.
pub(crate) fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, String) {
    let buffer = LogBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}

/// One project, wired to recording doubles. Settle defaults to [`NoSettle`].
pub(crate) struct Fixture {
    pub manager: TaskQueueManager,
    pub store: Arc<FlakyStore>,
    pub agents: Arc<RecordingAgentManager>,
    pub events: Arc<RecordingEventSink>,
    pub project_id: ProjectId,
}

impl Fixture {
    pub async fn new(queue: Option<StoredQueueConfig>) -> Self {
        Self::build(queue, None, Arc::new(NoSettle)).await
    }

    pub async fn with_main_branch(queue: StoredQueueConfig, branch: &str) -> Self {
        Self::build(Some(queue), Some(branch), Arc::new(NoSettle)).await
    }

    pub async fn with_settle(queue: StoredQueueConfig, settle: Arc<dyn StatusSettle>) -> Self {
        Self::build(Some(queue), None, settle).await
    }

    async fn build(
        queue: Option<StoredQueueConfig>,
        main_branch: Option<&str>,
        settle: Arc<dyn StatusSettle>,
    ) -> Self {
        let project_id = ProjectId::new("demo");
        let memory = Arc::new(InMemoryProjectStore::new());

        let mut project = Project::new(project_id.clone(), "demo", PROJECT_PATH);
        project.settings.queue = queue;
        project.settings.main_branch = main_branch.map(str::to_string);
        memory.insert_project(project).await;

        let store = Arc::new(FlakyStore::new(memory.clone()));
        let agents = Arc::new(RecordingAgentManager::new(memory));
        let events = Arc::new(RecordingEventSink::default());

        let manager = TaskQueueManager::builder(store.clone(), store.clone(), agents.clone())
            .event_sink(events.clone())
            .settle(settle)
            .build()
            .unwrap();

        Self {
            manager,
            store,
            agents,
            events,
            project_id,
        }
    }

    pub async fn add(&self, task: Task) {
        self.store.insert_task(task).await;
    }

    /// The agent for `task_id` finished; the store moves it out of `in_progress`.
    pub async fn finish(&self, task_id: &TaskId) {
        assert!(self.store.set_task_status(task_id, TaskStatus::Done).await);
    }

    pub fn project_path(&self) -> PathBuf {
        PathBuf::from(PROJECT_PATH)
    }
}
