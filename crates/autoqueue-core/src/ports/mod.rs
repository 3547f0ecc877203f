//! Ports - 抽象化レイヤー
//!
//! Hexagonal Architecture の「ポート」です。キューマネージャは外部システム
//! （タスクストア、エージェント実行、UI へのイベント配信）にこれらの trait 経由でのみ触れます。
//!
//! # 設計原則
//! - ストアが source of truth（正本）。スケジューラは読むだけ
//! - 時刻と settle 待ちは差し替え可能（テストでは FixedClock / NoSettle）

pub mod agent_manager;
pub mod clock;
pub mod event_sink;
pub mod project_store;
pub mod settle;

pub use self::agent_manager::{AgentManager, ExecutionOptions};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::project_store::{ProjectStore, TaskLocation, TaskLocator};
pub use self::settle::{FixedDelaySettle, NoSettle, StatusSettle};
