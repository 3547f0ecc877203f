//! ProjectChains - プロジェクト単位の直列実行チェーン
//!
//! 同じプロジェクトに対する「容量チェック → タスク起動」は、必ず到着順に 1 つずつ実行します。
//! 2 つのトリガーが同時に「running 1 / 上限 2」を読んで両方が起動する、という競合を防ぐためです。
//!
//! # 仕組み
//! - エントリごとに「末尾の操作の完了シグナル」（oneshot::Receiver）を保持
//! - `enqueue` は同期的に末尾を差し替え、前の末尾の完了を待ってから自分の操作を実行する
//! - 完了時、エントリの generation が自分のものなら削除（より新しい操作が後ろにいれば残す）
//!
//! # 保証
//! - 同一プロジェクト: 到着順、重複なし
//! - 別プロジェクト: 互いにブロックしない
//! - メモリ: プロジェクトごとにエントリ 1 つ、depth は上限で頭打ち、定期 prune で掃除

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::oneshot::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::domain::{ProjectId, QueueError};
use crate::ports::Clock;

#[derive(Debug, Clone, Copy)]
pub struct ChainLimits {
    /// Upper bound of the depth counter. Must be at least 1.
    pub max_depth: usize,

    /// Entries not touched for longer than this are reported by `prune`.
    pub ttl: Duration,
}

struct ChainEntry {
    /// Completion signal of the newest operation. Closed once it settles.
    tail: oneshot::Receiver<()>,
    generation: u64,
    depth: usize,
    last_updated: DateTime<Utc>,
}

pub struct ProjectChains {
    entries: Mutex<HashMap<ProjectId, ChainEntry>>,
    next_generation: AtomicU64,
    limits: ChainLimits,
    clock: Arc<dyn Clock>,
}

impl ProjectChains {
    pub fn new(limits: ChainLimits, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_generation: AtomicU64::new(0),
            limits,
            clock,
        }
    }

    /// Append `op` to the project's chain.
    ///
    /// The operation is linked and spawned before this returns, so ordering is
    /// fixed at call time and the operation runs even if the returned future
    /// is dropped. Must be called inside a tokio runtime.
    pub fn enqueue<T, Fut>(
        self: &Arc<Self>,
        project_id: &ProjectId,
        op: Fut,
    ) -> impl Future<Output = Result<T, QueueError>> + Send + 'static
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let (done_tx, done_rx) = oneshot::channel();
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = self.link(project_id, done_rx, generation);

        let ticket = ChainTicket {
            chains: Arc::clone(self),
            project_id: project_id.clone(),
            generation,
            _done: done_tx,
        };

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                // Only ever closed, never sent: either way the predecessor is done.
                let _ = previous.await;
            }
            let output = op.await;
            drop(ticket);
            output
        });

        let project_id = project_id.clone();
        async move {
            handle.await.map_err(|error| QueueError::OperationAborted {
                project_id,
                reason: error.to_string(),
            })
        }
    }

    /// Install `tail` as the newest operation and hand back the previous one.
    fn link(
        &self,
        project_id: &ProjectId,
        tail: oneshot::Receiver<()>,
        generation: u64,
    ) -> Option<oneshot::Receiver<()>> {
        let now = self.clock.now();
        let mut entries = self.lock_entries();
        match entries.entry(project_id.clone()) {
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let previous = std::mem::replace(&mut entry.tail, tail);
                entry.generation = generation;
                entry.last_updated = now;
                if entry.depth >= self.limits.max_depth {
                    debug!(
                        project_id = %project_id,
                        max_depth = self.limits.max_depth,
                        "chain depth at cap"
                    );
                }
                entry.depth = (entry.depth + 1).min(self.limits.max_depth);
                Some(previous)
            }
            Entry::Vacant(vacant) => {
                vacant.insert(ChainEntry {
                    tail,
                    generation,
                    depth: 1,
                    last_updated: now,
                });
                None
            }
        }
    }

    /// Called when an operation settles (including panics).
    fn settle(&self, project_id: &ProjectId, generation: u64) {
        let mut entries = self.lock_entries();
        let superseded = match entries.get_mut(project_id) {
            None => return,
            Some(entry) if entry.generation != generation => {
                // A newer operation is still queued behind us.
                entry.depth = entry.depth.saturating_sub(1).max(1);
                true
            }
            Some(_) => false,
        };
        if !superseded {
            entries.remove(project_id);
        }
    }

    /// Drop entries whose newest operation has settled.
    ///
    /// TTL expiry or a capped depth alone never removes an entry: while the
    /// tail is pending the entry is kept (and logged), since removing it would
    /// let the next operation start without waiting for the pending ones.
    /// `settle` already removes an entry when its newest operation finishes,
    /// so this only sweeps entries whose ticket was lost. Returns the number
    /// of removed entries.
    pub fn prune(&self) -> usize {
        let now = self.clock.now();
        let ttl = TimeDelta::from_std(self.limits.ttl).unwrap_or(TimeDelta::MAX);
        let max_depth = self.limits.max_depth;

        let mut entries = self.lock_entries();
        let before = entries.len();
        entries.retain(|project_id, entry| match entry.tail.try_recv() {
            Err(TryRecvError::Empty) => {
                if now - entry.last_updated > ttl {
                    warn!(
                        project_id = %project_id,
                        depth = entry.depth,
                        "queue chain busy past ttl"
                    );
                } else if entry.depth >= max_depth {
                    debug!(
                        project_id = %project_id,
                        depth = entry.depth,
                        "queue chain busy at depth cap"
                    );
                }
                true
            }
            Ok(()) | Err(TryRecvError::Closed) => false,
        });
        before - entries.len()
    }

    pub fn depth(&self, project_id: &ProjectId) -> Option<usize> {
        self.lock_entries().get(project_id).map(|entry| entry.depth)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_entries().is_empty()
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<ProjectId, ChainEntry>> {
        // Entries stay consistent even if a holder panicked: every critical
        // section is a handful of field writes.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Held by a running operation. Dropping it settles the operation and
/// releases the successor.
struct ChainTicket {
    chains: Arc<ProjectChains>,
    project_id: ProjectId,
    generation: u64,
    _done: oneshot::Sender<()>,
}

impl Drop for ChainTicket {
    fn drop(&mut self) {
        self.chains.settle(&self.project_id, self.generation);
    }
}
