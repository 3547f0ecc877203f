//! TaskQueueManagerBuilder - マネージャの構築とワイヤリング
//!
//! # 学習ポイント
//! - Builder パターン（必須の依存は `new`、任意の依存はメソッドで差し替え）
//! - 起動時検証（Fail-fast 設計）: 不正な SchedulerConfig は build() で弾く

use std::sync::Arc;

use super::chain::{ChainLimits, ProjectChains};
use super::manager::{Inner, TaskQueueManager};
use crate::config::{ConfigError, SchedulerConfig};
use crate::ports::{
    AgentManager, Clock, EventSink, FixedDelaySettle, NoopEventSink, ProjectStore, StatusSettle,
    SystemClock, TaskLocator,
};

/// # 使用例
/// ```ignore
/// let manager = TaskQueueManager::builder(store.clone(), store, agents)
///     .event_sink(sink)
///     .config(SchedulerConfig::load()?)
///     .build()?;
/// ```
///
/// # デフォルト
/// - event_sink: `NoopEventSink`
/// - settle: `FixedDelaySettle`（`config.settle_delay()`）
/// - clock: `SystemClock`
pub struct TaskQueueManagerBuilder {
    store: Arc<dyn ProjectStore>,
    locator: Arc<dyn TaskLocator>,
    agents: Arc<dyn AgentManager>,
    events: Option<Arc<dyn EventSink>>,
    settle: Option<Arc<dyn StatusSettle>>,
    clock: Option<Arc<dyn Clock>>,
    config: SchedulerConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid scheduler config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

impl TaskQueueManagerBuilder {
    pub fn new(
        store: Arc<dyn ProjectStore>,
        locator: Arc<dyn TaskLocator>,
        agents: Arc<dyn AgentManager>,
    ) -> Self {
        Self {
            store,
            locator,
            agents,
            events: None,
            settle: None,
            clock: None,
            config: SchedulerConfig::default(),
        }
    }

    pub fn event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    /// Replace the post-exit wait. Defaults to a fixed delay from the config.
    pub fn settle(mut self, settle: Arc<dyn StatusSettle>) -> Self {
        self.settle = Some(settle);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<TaskQueueManager, BuildError> {
        self.config.validate()?;

        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let settle = self
            .settle
            .unwrap_or_else(|| Arc::new(FixedDelaySettle::new(self.config.settle_delay())));
        let events = self.events.unwrap_or_else(|| Arc::new(NoopEventSink));
        let chains = ProjectChains::new(
            ChainLimits {
                max_depth: self.config.max_chain_depth,
                ttl: self.config.chain_ttl(),
            },
            clock,
        );

        Ok(TaskQueueManager::from_inner(Inner {
            store: self.store,
            locator: self.locator,
            agents: self.agents,
            events,
            settle,
            chains: Arc::new(chains),
            config: self.config,
        }))
    }
}
