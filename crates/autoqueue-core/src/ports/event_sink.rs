//! EventSink port - キューイベントの送出先
//!
//! # 実装
//! - NoopEventSink: 何もしない（デフォルト）
//! - BroadcastEventSink（impls）: tokio broadcast で UI 側へ配信

use crate::domain::QueueEvent;

/// EventSink receives queue events.
///
/// `emit` is synchronous and must not block: it is called from inside the
/// project chain.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: QueueEvent);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: QueueEvent) {}
}
