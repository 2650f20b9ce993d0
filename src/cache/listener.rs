//! Product change listener that keeps the response cache consistent.
//!
//! The listener runs on the writer's path and only records the change. A
//! background worker performs the eviction and acknowledges the queued events
//! afterwards, so a crash between the two leaves the events queued for the
//! next pass.

use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::application::events::{ProductChange, ProductChangeListener};

use super::events::EventQueue;
use super::response::{Eviction, ResponseCache};

const METRIC_INVALIDATION_EVENTS_TOTAL: &str = "vetrina_invalidation_events_total";
const METRIC_INVALIDATION_PASS_MS: &str = "vetrina_invalidation_pass_ms";

/// Summary of one eviction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidationPass {
    pub acknowledged: usize,
    pub eviction: Eviction,
}

pub struct CacheInvalidator {
    cache: Arc<ResponseCache>,
    queue: Arc<EventQueue>,
    wake: Notify,
}

impl CacheInvalidator {
    pub fn new(cache: Arc<ResponseCache>) -> Self {
        Self {
            cache,
            queue: Arc::new(EventQueue::new()),
            wake: Notify::new(),
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Run a single eviction pass if anything is queued.
    ///
    /// Events are acknowledged only after the eviction completed.
    #[instrument(skip(self))]
    pub async fn run_pass(&self) -> Option<InvalidationPass> {
        let pending = self.queue.len().min(self.cache.config().batch_limit());
        if pending == 0 {
            return None;
        }

        let started_at = Instant::now();
        let eviction = self.cache.evict_listings().await;
        let events = self.queue.drain(pending);
        if let Some(latest) = events.iter().map(|event| event.epoch).max() {
            self.cache.mark_settled(latest);
        }
        histogram!(METRIC_INVALIDATION_PASS_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);

        info!(
            acknowledged = events.len(),
            eviction = ?eviction,
            remaining = self.queue.len(),
            "Invalidation pass completed"
        );

        Some(InvalidationPass {
            acknowledged: events.len(),
            eviction,
        })
    }

    /// Run passes until the queue is empty; returns the number of events
    /// acknowledged.
    pub async fn flush(&self) -> usize {
        let mut acknowledged = 0;
        while let Some(pass) = self.run_pass().await {
            acknowledged += pass.acknowledged;
        }
        acknowledged
    }

    /// Spawn the background worker. It wakes on every change notification and
    /// on the configured interval, the latter retrying anything left queued.
    pub fn spawn_worker(self: &Arc<Self>) -> JoinHandle<()> {
        let invalidator = Arc::clone(self);
        let period = self.cache.config().invalidation_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = invalidator.wake.notified() => {}
                    _ = interval.tick() => {}
                }
                invalidator.flush().await;
            }
        })
    }
}

impl ProductChangeListener for CacheInvalidator {
    fn on_product_changed(&self, change: &ProductChange) {
        let epoch = self.cache.mark_stale();
        self.queue.push(*change, epoch);
        counter!(METRIC_INVALIDATION_EVENTS_TOTAL, "kind" => change.kind.as_str()).increment(1);
        self.wake.notify_one();
    }
}
