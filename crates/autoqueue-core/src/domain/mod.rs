//! Domain model (IDs, tasks, projects, queue config/status, events, errors).
//!
//! Task / Project はホスト側ストアが所有するデータで、スケジューラは読むだけです。

pub mod errors;
pub mod events;
pub mod ids;
pub mod project;
pub mod queue_config;
pub mod task;

pub use errors::{AgentError, QueueError, StoreError};
pub use events::{QueueEvent, TaskExit};
pub use ids::{Id, IdMarker, ProjectId, SpecId, TaskId};
pub use project::{Project, ProjectSettings, StoredQueueConfig};
pub use queue_config::{
    MAX_CONCURRENT, MIN_CONCURRENT, QueueConfig, QueueStatus, ResolvedQueueConfig,
};
pub use task::{Task, TaskMetadata, TaskPriority, TaskStatus, priority_weight};
