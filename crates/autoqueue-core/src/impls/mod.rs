//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryProjectStore**: 開発用の正本（ProjectStore + TaskLocator）
//! - **BroadcastEventSink**: tokio broadcast によるイベント配信
//!
//! # 本番用実装
//! ホストアプリ側のストア・エージェント実行は、ホスト側で ports を実装します。

pub mod broadcast_sink;
pub mod inmem_store;

// 主要な型を再エクスポート
pub use self::broadcast_sink::BroadcastEventSink;
pub use self::inmem_store::InMemoryProjectStore;
