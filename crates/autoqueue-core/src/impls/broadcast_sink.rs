//! BroadcastEventSink - tokio broadcast でキューイベントを配信
//!
//! 購読者がいなくても、遅れていても emit はブロックしません。
//! 遅れた購読者は `RecvError::Lagged` を受け取り、最新の状態から再開します。

use tokio::sync::broadcast;

use crate::domain::QueueEvent;
use crate::ports::EventSink;

#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    tx: broadcast::Sender<QueueEvent>,
}

impl BroadcastEventSink {
    /// `capacity` must be at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: QueueEvent) {
        // no subscribers is fine
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ProjectId, QueueStatus};

    fn event(running: usize) -> QueueEvent {
        QueueEvent::StatusUpdated {
            project_id: ProjectId::new("p1"),
            status: QueueStatus {
                enabled: true,
                max_concurrent: 2,
                running_count: running,
                backlog_count: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let sink = BroadcastEventSink::new(8);
        let mut rx = sink.subscribe();
        assert_eq!(sink.subscriber_count(), 1);

        sink.emit(event(1));
        assert_eq!(rx.recv().await.unwrap(), event(1));
    }

    #[test]
    fn test_emit_without_subscribers_is_ignored() {
        let sink = BroadcastEventSink::new(1);
        sink.emit(event(0));
        sink.emit(event(1));
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let sink = BroadcastEventSink::new(1);
        let mut rx = sink.subscribe();
        sink.emit(event(0));
        sink.emit(event(1));

        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert_eq!(rx.recv().await.unwrap(), event(1));
    }
}
