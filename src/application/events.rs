//! Product change notifications published by catalog stores.
//!
//! Stores publish after every committed product write; interested parties
//! register explicitly through [`ChangeFeed::subscribe`].

use std::sync::{Arc, RwLock};

use serde::Serialize;
use tracing::debug;

use crate::cache::lock::{rw_read, rw_write};
use crate::domain::entities::ProductId;

const SOURCE: &str = "application::events";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Updated => "updated",
            ChangeKind::Deleted => "deleted",
        }
    }

    /// Parse a database trigger operation (`INSERT`, `UPDATE`, `DELETE`).
    pub fn from_trigger_op(op: &str) -> Option<Self> {
        match op.trim().to_ascii_uppercase().as_str() {
            "INSERT" => Some(ChangeKind::Created),
            "UPDATE" => Some(ChangeKind::Updated),
            "DELETE" => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProductChange {
    pub product_id: ProductId,
    pub kind: ChangeKind,
}

impl ProductChange {
    pub fn new(product_id: ProductId, kind: ChangeKind) -> Self {
        Self { product_id, kind }
    }
}

/// Receiver of product change notifications.
///
/// Called on the writer's path, so implementations must return quickly and
/// defer any real work.
pub trait ProductChangeListener: Send + Sync {
    fn on_product_changed(&self, change: &ProductChange);
}

#[derive(Default)]
pub struct ChangeFeed {
    listeners: RwLock<Vec<Arc<dyn ProductChangeListener>>>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, listener: Arc<dyn ProductChangeListener>) {
        rw_write(&self.listeners, SOURCE, "subscribe").push(listener);
    }

    pub fn publish(&self, change: ProductChange) {
        let listeners = rw_read(&self.listeners, SOURCE, "publish").clone();
        debug!(
            product_id = change.product_id,
            kind = change.kind.as_str(),
            listeners = listeners.len(),
            "Publishing product change"
        );
        for listener in listeners {
            listener.on_product_changed(&change);
        }
    }

    pub fn listener_count(&self) -> usize {
        rw_read(&self.listeners, SOURCE, "listener_count").len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<ProductChange>>,
    }

    impl ProductChangeListener for Recorder {
        fn on_product_changed(&self, change: &ProductChange) {
            self.seen.lock().expect("recorder lock").push(*change);
        }
    }

    #[test]
    fn publish_reaches_every_subscriber() {
        let feed = ChangeFeed::new();
        let first = Arc::new(Recorder::default());
        let second = Arc::new(Recorder::default());
        feed.subscribe(first.clone());
        feed.subscribe(second.clone());

        feed.publish(ProductChange::new(4, ChangeKind::Updated));

        assert_eq!(feed.listener_count(), 2);
        for recorder in [first, second] {
            let seen = recorder.seen.lock().expect("recorder lock");
            assert_eq!(seen.as_slice(), &[ProductChange::new(4, ChangeKind::Updated)]);
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        ChangeFeed::new().publish(ProductChange::new(1, ChangeKind::Deleted));
    }

    #[test]
    fn trigger_operations_map_to_change_kinds() {
        assert_eq!(ChangeKind::from_trigger_op("INSERT"), Some(ChangeKind::Created));
        assert_eq!(ChangeKind::from_trigger_op("update"), Some(ChangeKind::Updated));
        assert_eq!(ChangeKind::from_trigger_op("DELETE"), Some(ChangeKind::Deleted));
        assert_eq!(ChangeKind::from_trigger_op("TRUNCATE"), None);
    }
}
