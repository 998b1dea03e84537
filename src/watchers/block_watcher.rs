use crate::error::{SourceError, StoreError};
use crate::notify::{FanoutReport, Notifier};
use crate::pool::{Block, BlockSource, ChangeDetector};
use crate::subscribers::SubscriberStore;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Polling,
}

/// What a single fetch-detect-notify cycle did.
#[derive(Debug)]
pub enum TickOutcome {
    FetchFailed(SourceError),
    Unchanged(Block),
    /// The block was acknowledged but the subscriber list could not be read;
    /// nobody is notified about it.
    ListFailed(Block, StoreError),
    Notified(Block, FanoutReport),
}

/// Polls the pool on a fixed interval and fans out new blocks to subscribers.
pub struct BlockWatcher {
    source: Arc<dyn BlockSource>,
    detector: ChangeDetector,
    store: Arc<SubscriberStore>,
    notifier: Notifier,
    interval: Duration,
    state: WatcherState,
}

impl BlockWatcher {
    pub fn new(
        source: Arc<dyn BlockSource>,
        store: Arc<SubscriberStore>,
        notifier: Notifier,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            detector: ChangeDetector::new(),
            store,
            notifier,
            interval,
            state: WatcherState::Idle,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    fn transition(&mut self, next: WatcherState) {
        tracing::debug!("Block watcher {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run one cycle: fetch, compare, and notify if the block is new.
    pub async fn tick(&mut self) -> TickOutcome {
        self.transition(WatcherState::Polling);
        let outcome = self.poll().await;
        self.transition(WatcherState::Idle);
        outcome
    }

    async fn poll(&mut self) -> TickOutcome {
        let block = match self.source.fetch_latest().await {
            Ok(block) => block,
            Err(e) => {
                if e.is_schema() {
                    tracing::error!("Pool API returned malformed data: {e}");
                } else {
                    tracing::warn!("Failed to fetch latest block: {e}");
                }
                return TickOutcome::FetchFailed(e);
            }
        };

        if !self.detector.is_new_event(&block) {
            tracing::debug!("No new block (latest height {})", block.height);
            return TickOutcome::Unchanged(block);
        }

        // Acknowledge before fanout so a failure below never re-announces this block.
        self.detector.acknowledge(block);
        tracing::info!(
            "New block found at height {} ({})",
            block.height,
            block.observed_at.to_rfc3339()
        );

        let subscribers = match self.store.list_all().await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::error!(
                    "Failed to read subscribers, skipping notification for block {}: {e}",
                    block.height
                );
                return TickOutcome::ListFailed(block, e);
            }
        };

        if subscribers.is_empty() {
            tracing::info!("No subscribers yet, skip");
        }

        let report = self.notifier.notify_all(&block, &subscribers).await;
        TickOutcome::Notified(block, report)
    }

    /// Poll until `cancel` fires. A cycle in progress is finished; no new one starts.
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("Block watcher started (interval {:?})", self.interval);

        while !cancel.is_cancelled() {
            self.tick().await;

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        tracing::info!("Block watcher stopped");
    }
}
