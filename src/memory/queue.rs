// src/memory/queue.rs — Background summary writer
//
// Execution never waits on persistence. Summaries go through a bounded
// channel to one worker task that retries each write with exponential
// backoff, then drops it with an error log.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::summary::{GoalSummary, SummaryStore};
use crate::infra::config::PersistenceConfig;

const QUEUE_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct QueuePolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl From<&PersistenceConfig> for QueuePolicy {
    fn from(c: &PersistenceConfig) -> Self {
        Self {
            max_retries: c.max_retries,
            initial_backoff: Duration::from_millis(c.initial_backoff_ms),
        }
    }
}

impl QueuePolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.initial_backoff.saturating_mul(factor)
    }
}

pub struct SummaryQueue {
    tx: Option<mpsc::Sender<GoalSummary>>,
    worker: Option<JoinHandle<()>>,
}

impl SummaryQueue {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn spawn(store: Arc<dyn SummaryStore>, policy: QueuePolicy) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let worker = tokio::spawn(run_worker(store, rx, policy));
        Self {
            tx: Some(tx),
            worker: Some(worker),
        }
    }

    /// A queue that accepts and discards everything.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            worker: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    /// Hand a summary to the worker without waiting. Returns false when the
    /// summary was dropped (queue disabled, full, or closed).
    pub fn enqueue(&self, summary: GoalSummary) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.try_send(summary) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(s)) => {
                tracing::warn!(goal_id = %s.goal_id, "Summary queue full, dropping summary");
                false
            }
            Err(mpsc::error::TrySendError::Closed(s)) => {
                tracing::warn!(goal_id = %s.goal_id, "Summary queue closed, dropping summary");
                false
            }
        }
    }

    /// Close the channel and wait for queued writes to finish.
    pub async fn shutdown(mut self) {
        self.tx.take();
        if let Some(worker) = self.worker.take() {
            if let Err(e) = worker.await {
                tracing::error!("Summary worker panicked: {}", e);
            }
        }
    }
}

async fn run_worker(
    store: Arc<dyn SummaryStore>,
    mut rx: mpsc::Receiver<GoalSummary>,
    policy: QueuePolicy,
) {
    while let Some(summary) = rx.recv().await {
        write_with_retry(store.as_ref(), &summary, policy).await;
    }
    tracing::debug!("Summary worker drained");
}

/// Returns whether the write eventually succeeded.
pub async fn write_with_retry(
    store: &dyn SummaryStore,
    summary: &GoalSummary,
    policy: QueuePolicy,
) -> bool {
    let mut retry = 0;
    loop {
        match store.write_goal_summary(summary).await {
            Ok(()) => {
                tracing::debug!(goal_id = %summary.goal_id, retries = retry, "Goal summary persisted");
                return true;
            }
            Err(e) if retry < policy.max_retries => {
                retry += 1;
                let delay = policy.backoff(retry);
                tracing::warn!(
                    goal_id = %summary.goal_id,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    "Summary write failed: {}",
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                tracing::error!(
                    goal_id = %summary.goal_id,
                    retries = retry,
                    "Giving up on goal summary: {}",
                    e
                );
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::graph::GraphStatus;
    use crate::core::types::GoalMode;
    use crate::infra::errors::GoalForgeError;
    use crate::memory::summary::MemorySummaryStore;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn summary(id: &str) -> GoalSummary {
        GoalSummary {
            goal_id: id.into(),
            goal_text: "ship it".into(),
            mode: GoalMode::Auto,
            status: GraphStatus::Partial,
            final_output: "half".into(),
            total_tasks: 2,
            done_tasks: 1,
            failed_tasks: 1,
            duration_ms: 5,
            providers_used: vec![],
            cost_usd: 0.0,
            credits_charged: 0,
            completed_at: Utc::now(),
        }
    }

    /// Fails the first `failures` writes.
    struct FlakyStore {
        failures: u32,
        calls: AtomicU32,
        inner: MemorySummaryStore,
    }

    #[async_trait]
    impl SummaryStore for FlakyStore {
        async fn write_goal_summary(&self, s: &GoalSummary) -> Result<(), GoalForgeError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                return Err(GoalForgeError::Persistence("disk full".into()));
            }
            self.inner.write_goal_summary(s).await
        }

        async fn recent(&self, limit: usize) -> Result<Vec<GoalSummary>, GoalForgeError> {
            self.inner.recent(limit).await
        }
    }

    fn fast_policy(max_retries: u32) -> QueuePolicy {
        QueuePolicy {
            max_retries,
            initial_backoff: Duration::from_millis(1),
        }
    }

    #[test]
    fn test_backoff_doubles() {
        let p = QueuePolicy {
            max_retries: 3,
            initial_backoff: Duration::from_millis(250),
        };
        assert_eq!(p.backoff(1), Duration::from_millis(250));
        assert_eq!(p.backoff(2), Duration::from_millis(500));
        assert_eq!(p.backoff(3), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_retry_then_success() {
        let store = FlakyStore {
            failures: 2,
            calls: AtomicU32::new(0),
            inner: MemorySummaryStore::new(),
        };
        assert!(write_with_retry(&store, &summary("g1"), fast_policy(3)).await);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.inner.all().len(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_retries() {
        let store = FlakyStore {
            failures: 10,
            calls: AtomicU32::new(0),
            inner: MemorySummaryStore::new(),
        };
        assert!(!write_with_retry(&store, &summary("g1"), fast_policy(2)).await);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_shutdown_flushes_queue() {
        let store = Arc::new(MemorySummaryStore::new());
        let queue = SummaryQueue::spawn(store.clone(), fast_policy(0));
        assert!(queue.enqueue(summary("a")));
        assert!(queue.enqueue(summary("b")));
        queue.shutdown().await;

        let ids: Vec<String> = store.all().into_iter().map(|s| s.goal_id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_disabled_queue_drops() {
        let queue = SummaryQueue::disabled();
        assert!(!queue.is_enabled());
        assert!(!queue.enqueue(summary("a")));
        queue.shutdown().await;
    }
}
