//! QueueListener - タスク終了イベントの購読と定期 prune
//!
//! - exit ループ: `TaskExit` を受け取るたびに `handle_task_exit` を別タスクで起動
//!   （チェーンへの登録は handle 側で同期的に行われるので、順序はそこで決まる）
//! - prune ループ: `prune_interval` ごとにチェーンの掃除
//!
//! `stop()` はループを止めるだけ。すでにチェーンに載った操作は最後まで走ります。

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::manager::TaskQueueManager;
use crate::domain::TaskExit;

/// Handle to the background loops started by [`TaskQueueManager::start`].
/// Dropping it stops both loops.
pub struct QueueListener {
    shutdown_tx: watch::Sender<bool>,
    joins: Vec<JoinHandle<()>>,
}

impl QueueListener {
    pub(crate) fn spawn(manager: TaskQueueManager, exits: broadcast::Receiver<TaskExit>) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let exit_join = tokio::spawn(exit_loop(manager.clone(), exits, shutdown_rx.clone()));
        let prune_join = tokio::spawn(prune_loop(manager, shutdown_rx));

        info!("queue listener started");
        Self {
            shutdown_tx,
            joins: vec![exit_join, prune_join],
        }
    }

    /// Stop listening. Idempotent.
    pub fn stop(&self) {
        // ignore send error: loops may already be gone
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn stop_and_join(self) {
        self.stop();
        for join in self.joins {
            let _ = join.await;
        }
        info!("queue listener stopped");
    }
}

async fn exit_loop(
    manager: TaskQueueManager,
    mut exits: broadcast::Receiver<TaskExit>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        let received = tokio::select! {
            changed = shutdown_rx.changed() => {
                // sender gone counts as shutdown
                if changed.is_err() {
                    break;
                }
                continue;
            }
            received = exits.recv() => received,
        };

        match received {
            Ok(exit) => {
                let manager = manager.clone();
                tokio::spawn(async move {
                    manager.handle_task_exit(exit).await;
                });
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "task exit events dropped; listener lagged");
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("task exit channel closed");
                break;
            }
        }
    }
}

async fn prune_loop(manager: TaskQueueManager, mut shutdown_rx: watch::Receiver<bool>) {
    let mut ticker = tokio::time::interval(manager.config().prune_interval());
    // the first tick fires immediately
    ticker.tick().await;

    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                let removed = manager.prune_chains();
                if removed > 0 {
                    debug!(removed, remaining = manager.chain_count(), "pruned queue chains");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::{StoredQueueConfig, TaskExit, TaskId};
    use crate::testkit::{Fixture, backlog_task, running_task};
    use std::time::Duration;
    use tokio::sync::broadcast;

    #[tokio::test(start_paused = true)]
    async fn exit_events_start_backlog_tasks() {
        let fx = Fixture::new(Some(StoredQueueConfig::new(true, 1))).await;
        fx.add(running_task(&fx.project_id, "r1")).await;
        fx.add(backlog_task(&fx.project_id, "b1", None, 0)).await;

        let (exits_tx, exits_rx) = broadcast::channel(16);
        let listener = fx.manager.start(exits_rx);

        fx.finish(&TaskId::new("r1")).await;
        exits_tx
            .send(TaskExit::new(TaskId::new("r1"), Some(0)))
            .unwrap();

        for _ in 0..20 {
            if !fx.agents.started().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(fx.agents.started(), vec![TaskId::new("b1")]);

        listener.stop_and_join().await;
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_listener_ignores_exits() {
        let fx = Fixture::new(Some(StoredQueueConfig::new(true, 1))).await;
        fx.add(running_task(&fx.project_id, "r1")).await;
        fx.add(backlog_task(&fx.project_id, "b1", None, 0)).await;

        let (exits_tx, exits_rx) = broadcast::channel(16);
        let listener = fx.manager.start(exits_rx);
        listener.stop_and_join().await;

        fx.finish(&TaskId::new("r1")).await;
        // the receiver went away with the loop
        assert!(
            exits_tx
                .send(TaskExit::new(TaskId::new("r1"), Some(0)))
                .is_err()
        );
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(fx.agents.started().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn closed_exit_channel_ends_the_exit_loop() {
        let fx = Fixture::new(Some(StoredQueueConfig::new(true, 1))).await;
        let (exits_tx, exits_rx) = broadcast::channel::<TaskExit>(4);
        let listener = fx.manager.start(exits_rx);

        drop(exits_tx);
        // prune loop keeps running until stopped
        listener.stop_and_join().await;
    }
}
