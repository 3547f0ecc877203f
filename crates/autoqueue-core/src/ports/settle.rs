//! StatusSettle port - 終了イベント後の「状態書き込み待ち」
//!
//! プロセス終了イベントとストアの状態更新（`in_progress` からの離脱）は同期していません。
//! 終了直後に容量を数えると、まだ running のまま見えることがあります。
//!
//! 現状は固定ディレイ（FixedDelaySettle）で待ちます。既知の近似で、
//! 伝播が極端に遅いと起動機会を 1 回逃しますが、次の終了イベントか手動トリガーで回復します。
//! ストアが状態変更を通知できるようになったら、この trait の実装を差し替えるだけで済みます。

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::TaskExit;

#[async_trait]
pub trait StatusSettle: Send + Sync {
    /// Resolve once the store has (probably) recorded the exit.
    async fn wait(&self, exit: &TaskExit);
}

#[derive(Debug, Clone, Copy)]
pub struct FixedDelaySettle {
    delay: Duration,
}

impl FixedDelaySettle {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl StatusSettle for FixedDelaySettle {
    async fn wait(&self, _exit: &TaskExit) {
        tokio::time::sleep(self.delay).await;
    }
}

/// Does not wait. For stores that write status before emitting the exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSettle;

#[async_trait]
impl StatusSettle for NoSettle {
    async fn wait(&self, _exit: &TaskExit) {}
}
