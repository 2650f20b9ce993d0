//! Bridge from Postgres `NOTIFY` to the in-process change feed.
//!
//! The `product_changed` trigger in the catalog migration sends
//! `{"op": "INSERT" | "UPDATE" | "DELETE", "id": <product id>}` for every row
//! change, so writes made by other processes invalidate this process's cache.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::{PgListener, PgPool};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::application::events::{ChangeFeed, ChangeKind, ProductChange};

pub const PRODUCT_CHANGED_CHANNEL: &str = "product_changed";

const RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct TriggerPayload {
    op: String,
    id: i64,
}

fn parse_payload(payload: &str) -> Option<ProductChange> {
    let parsed: TriggerPayload = serde_json::from_str(payload).ok()?;
    let kind = ChangeKind::from_trigger_op(&parsed.op)?;
    Some(ProductChange::new(parsed.id, kind))
}

/// Subscribe to product row notifications and forward them to `feed`.
///
/// Notifications sent while the connection is down are lost; after a
/// reconnect a synthetic update is published so the cache is evicted anyway.
pub async fn spawn_change_listener(
    pool: &PgPool,
    feed: Arc<ChangeFeed>,
) -> Result<JoinHandle<()>, sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(PRODUCT_CHANGED_CHANNEL).await?;
    info!(channel = PRODUCT_CHANGED_CHANNEL, "Listening for product changes");

    Ok(tokio::spawn(async move {
        loop {
            match listener.try_recv().await {
                Ok(Some(notification)) => match parse_payload(notification.payload()) {
                    Some(change) => feed.publish(change),
                    None => debug!(
                        payload = notification.payload(),
                        "Ignoring unrecognised product notification"
                    ),
                },
                Ok(None) => {
                    warn!(
                        channel = PRODUCT_CHANGED_CHANNEL,
                        "Product notification connection lost; invalidating conservatively"
                    );
                    feed.publish(ProductChange::new(0, ChangeKind::Updated));
                }
                Err(err) => {
                    warn!(error = %err, "Product notification receive failed; retrying");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_payloads_parse_into_changes() {
        assert_eq!(
            parse_payload(r#"{"op":"DELETE","id":12}"#),
            Some(ProductChange::new(12, ChangeKind::Deleted))
        );
        assert_eq!(parse_payload(r#"{"op":"TRUNCATE","id":1}"#), None);
        assert_eq!(parse_payload("not json"), None);
    }
}
