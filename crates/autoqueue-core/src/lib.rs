//! autoqueue-core
//!
//! Per-project task queue: when a project's queue is enabled, backlog tasks
//! are started automatically up to a concurrency cap, highest priority first.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task, project, queue_config, events, errors）
//! - **ports**: 抽象化レイヤー（ProjectStore, TaskLocator, AgentManager, EventSink, Clock, StatusSettle）
//! - **app**: アプリケーションロジック（TaskQueueManager, ProjectChains, QueueListener, selection）
//! - **impls**: 実装（InMemoryProjectStore, BroadcastEventSink）
//! - **config**: スケジューラ設定（figment）

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod ports;

#[cfg(test)]
mod testkit;

pub use app::{BuildError, QueueListener, TaskQueueManager, TaskQueueManagerBuilder};
pub use config::{ConfigError, SchedulerConfig};
