//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてキューの振る舞いを実装します。
//!
//! # 主要コンポーネント
//! - **TaskQueueManager**: 容量チェックとバックログからの起動
//! - **TaskQueueManagerBuilder**: 依存の差し込みと起動時検証
//! - **ProjectChains**: プロジェクト単位の直列実行
//! - **QueueListener**: タスク終了イベントの購読と定期 prune
//! - **selection**: 次に起動するタスクの選択（純粋関数）

pub mod builder;
pub mod chain;
pub mod listener;
pub mod manager;
pub mod selection;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, TaskQueueManagerBuilder};
pub use self::chain::{ChainLimits, ProjectChains};
pub use self::listener::QueueListener;
pub use self::manager::TaskQueueManager;
pub use self::selection::{queue_order, select_next_task};
