//! Pending invalidation events.
//!
//! Change notifications are queued here until an eviction pass has run; only
//! then are they acknowledged and removed.

use std::collections::VecDeque;
use std::sync::Mutex;

use metrics::gauge;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::application::events::ProductChange;

use super::lock::mutex_lock;

const SOURCE: &str = "cache::events";
const METRIC_INVALIDATION_QUEUE_LEN: &str = "vetrina_invalidation_queue_len";

/// Monotonic invalidation generation.
///
/// Every queued change carries the generation it raised; an eviction pass
/// settles the cache up to the highest generation it acknowledged.
pub type Epoch = u64;

#[derive(Debug, Clone)]
pub struct InvalidationEvent {
    /// Correlates enqueue and acknowledgement log lines.
    pub id: Uuid,
    pub epoch: Epoch,
    pub change: ProductChange,
    pub received_at: OffsetDateTime,
}

impl InvalidationEvent {
    pub fn new(change: ProductChange, epoch: Epoch) -> Self {
        Self {
            id: Uuid::new_v4(),
            epoch,
            change,
            received_at: OffsetDateTime::now_utc(),
        }
    }
}

/// FIFO of invalidation events awaiting an eviction pass.
#[derive(Default)]
pub struct EventQueue {
    queue: Mutex<VecDeque<InvalidationEvent>>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, change: ProductChange, epoch: Epoch) -> Uuid {
        let event = InvalidationEvent::new(change, epoch);
        let id = event.id;

        info!(
            event_id = %id,
            event_epoch = epoch,
            product_id = change.product_id,
            kind = change.kind.as_str(),
            "Invalidation event enqueued"
        );

        let mut queue = mutex_lock(&self.queue, SOURCE, "push");
        queue.push_back(event);
        gauge!(METRIC_INVALIDATION_QUEUE_LEN).set(queue.len() as f64);
        id
    }

    /// Remove up to `limit` events from the front, in FIFO order.
    pub fn drain(&self, limit: usize) -> Vec<InvalidationEvent> {
        let mut queue = mutex_lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let drained = queue.drain(..count).collect();
        gauge!(METRIC_INVALIDATION_QUEUE_LEN).set(queue.len() as f64);
        drained
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
