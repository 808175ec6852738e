//! Durable delay queue over one partition group.

use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::config::TaskConfig;
use crate::lifecycle::Shutdown;
use crate::migration::now_ms;
use crate::observability::metrics;
use crate::storage::PartitionGroup;
use crate::tasks::{ScheduledTask, ScheduledTaskProcessor};

const KEY_LEN: usize = 16;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("task queue '{0}' already started")]
    AlreadyStarted(String),

    #[error("task queue '{queue}' does not host shard {shard_index}")]
    UnknownShard { queue: String, shard_index: u32 },

    #[error("task storage error: {0}")]
    Storage(#[from] fjall::Error),

    #[error("task queue worker failed: {0}")]
    Worker(String),
}

/// Periodic executor of the tasks stored in one partition group.
pub struct ScheduledTaskQueue {
    name: String,
    group: Arc<PartitionGroup>,
    processor: Arc<dyn ScheduledTaskProcessor>,
    poll_interval: Duration,
    batch_size: usize,
    next_seq: AtomicU64,
    /// Per partition, the last key tried by a pass that filled its batch.
    cursors: Mutex<Vec<Option<Vec<u8>>>>,
    shutdown: Shutdown,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledTaskQueue {
    pub fn new(
        group: Arc<PartitionGroup>,
        processor: Arc<dyn ScheduledTaskProcessor>,
        config: &TaskConfig,
    ) -> Self {
        // Seeded from the clock so sequence numbers stay unique across restarts.
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        let partitions = group.len();
        Self {
            name: group.name().to_string(),
            group,
            processor,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            batch_size: config.batch_size,
            next_seq: AtomicU64::new(seed),
            cursors: Mutex::new(vec![None; partitions]),
            shutdown: Shutdown::new(),
            worker: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &Arc<PartitionGroup> {
        &self.group
    }

    /// Store a task for `shard_index`, due at `due_ms` (epoch milliseconds).
    pub fn enqueue(&self, shard_index: u32, due_ms: u64, payload: &[u8]) -> Result<ScheduledTask, TaskError> {
        let partition = self
            .group
            .partition_for_shard(shard_index)
            .ok_or_else(|| TaskError::UnknownShard {
                queue: self.name.clone(),
                shard_index,
            })?;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        partition.insert(task_key(due_ms, seq), payload)?;
        tracing::trace!(queue = %self.name, shard_index, due_ms, seq, "Task enqueued");
        Ok(ScheduledTask {
            shard_index,
            due_ms,
            seq,
            payload: payload.to_vec(),
        })
    }

    /// Spawn the polling worker.
    pub fn start(self: &Arc<Self>) -> Result<(), TaskError> {
        let mut worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner);
        if worker.is_some() || self.shutdown.is_triggered() {
            return Err(TaskError::AlreadyStarted(self.name.clone()));
        }
        let queue = Arc::clone(self);
        *worker = Some(tokio::spawn(async move { queue.run().await }));
        tracing::info!(
            queue = %self.name,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            "Task queue started"
        );
        Ok(())
    }

    /// Stop the worker and wait for the in-flight poll to finish.
    pub async fn destroy(&self) -> Result<(), TaskError> {
        self.shutdown.trigger();
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(worker) = worker {
            worker.await.map_err(|e| TaskError::Worker(e.to_string()))?;
        }
        tracing::info!(queue = %self.name, "Task queue destroyed");
        Ok(())
    }

    async fn run(&self) {
        let mut stop = self.shutdown.subscribe();
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = stop.recv() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.poll_once().await {
                        tracing::warn!(queue = %self.name, error = %e, "Task poll failed");
                    }
                }
            }
        }
    }

    /// Process every due task once. Returns the number processed successfully.
    pub async fn poll_once(&self) -> Result<usize, TaskError> {
        self.poll_at(now_ms().max(0) as u64).await
    }

    /// [`poll_once`](Self::poll_once) against an explicit clock reading.
    ///
    /// A pass takes at most `batch_size` due tasks per partition. When a
    /// partition fills its batch, the next pass resumes after the last task
    /// tried, so tasks that keep failing cannot hold back later ones.
    pub async fn poll_at(&self, now_ms: u64) -> Result<usize, TaskError> {
        let upper = task_key(now_ms.saturating_add(1), 0).to_vec();
        let mut backlog = 0;
        let mut processed = 0;

        for (local, (shard_index, partition_name, partition)) in self.group.iter().enumerate() {
            let cursor = self.cursor(local);
            let mut due = scan_due(partition, cursor.clone(), &upper, self.batch_size)?;
            if due.is_empty() && cursor.is_some() {
                // Reached the end: wrap around to the oldest due task.
                due = scan_due(partition, None, &upper, self.batch_size)?;
            }
            let next_cursor = match due.last() {
                Some((key, _)) if due.len() >= self.batch_size => Some(key.to_vec()),
                _ => None,
            };

            for (key, value) in due {
                let Some((due_ms, seq)) = decode_key(&key) else {
                    tracing::warn!(queue = %self.name, partition = %partition_name, "Dropping task with malformed key");
                    partition.remove(key)?;
                    continue;
                };
                let task = ScheduledTask {
                    shard_index,
                    due_ms,
                    seq,
                    payload: value.to_vec(),
                };
                match self.processor.process(&task).await {
                    Ok(()) => {
                        partition.remove(key)?;
                        processed += 1;
                        metrics::record_task(&self.name, true);
                    }
                    Err(e) => {
                        tracing::warn!(queue = %self.name, shard_index, seq, error = %e, "Task failed, will retry");
                        metrics::record_task(&self.name, false);
                    }
                }
            }

            self.set_cursor(local, next_cursor);
            backlog += partition.len()?;
        }

        metrics::record_queue_depth(&self.name, backlog);
        Ok(processed)
    }

    fn cursor(&self, local: usize) -> Option<Vec<u8>> {
        let cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        cursors.get(local).cloned().flatten()
    }

    fn set_cursor(&self, local: usize, cursor: Option<Vec<u8>>) {
        let mut cursors = self.cursors.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = cursors.get_mut(local) {
            *slot = cursor;
        }
    }
}

/// Up to `limit` tasks due before `upper`, starting after `after`.
fn scan_due(
    partition: &fjall::PartitionHandle,
    after: Option<Vec<u8>>,
    upper: &[u8],
    limit: usize,
) -> Result<Vec<(fjall::Slice, fjall::Slice)>, fjall::Error> {
    let lower = match after {
        Some(key) => Bound::Excluded(key),
        None => Bound::Unbounded,
    };
    partition
        .range((lower, Bound::Excluded(upper.to_vec())))
        .take(limit)
        .collect()
}

impl std::fmt::Debug for ScheduledTaskQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTaskQueue")
            .field("name", &self.name)
            .field("poll_interval", &self.poll_interval)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

fn task_key(due_ms: u64, seq: u64) -> [u8; KEY_LEN] {
    let mut key = [0u8; KEY_LEN];
    key[..8].copy_from_slice(&due_ms.to_be_bytes());
    key[8..].copy_from_slice(&seq.to_be_bytes());
    key
}

fn decode_key(key: &[u8]) -> Option<(u64, u64)> {
    let key: &[u8; KEY_LEN] = key.try_into().ok()?;
    let (due, seq) = key.split_at(8);
    Some((
        u64::from_be_bytes(due.try_into().ok()?),
        u64::from_be_bytes(seq.try_into().ok()?),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_sort_by_due_time_then_sequence() {
        let early = task_key(1_000, u64::MAX);
        let late = task_key(1_001, 0);
        assert!(early < late);
        assert!(task_key(5, 1) < task_key(5, 2));
        assert_eq!(decode_key(&task_key(7, 9)), Some((7, 9)));
        assert_eq!(decode_key(b"short"), None);
    }
}
