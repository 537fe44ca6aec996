//! Realtime change feed.
//!
//! DESIGN
//! ======
//! Postgres triggers on every CRM table call `pg_notify('crm_changes', ...)`
//! with `{"table": ..., "op": ...}`. One listener task per process bridges
//! those notifications into a `tokio::sync::broadcast` channel; each mounted
//! list view holds its own receiver. Writes from any client of the database
//! (this process, another instance, a SQL console) reach every open view.
//!
//! ERROR HANDLING
//! ==============
//! A dropped listener connection is logged and re-established after a fixed
//! delay. Notifications sent while disconnected are lost; open views catch up
//! on the next event they do see, since every event triggers a full refetch.

use std::time::Duration;

use serde::Deserialize;
use sqlx::PgPool;
use sqlx::postgres::PgListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{ChangeEvent, ChangeKind, Table};

pub const CHANGE_CHANNEL: &str = "crm_changes";
const FEED_CAPACITY: usize = 256;
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Fan-out of table change events to every subscribed view.
#[derive(Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeFeed {
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }

    /// Deliver an event to current subscribers. Returns how many received it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }

    #[cfg(test)]
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeFeed {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Deserialize)]
struct NotifyPayload {
    table: String,
    op: String,
}

/// Parse a trigger notification payload. Unknown tables and ops yield `None`.
#[must_use]
pub fn parse_notification(payload: &str) -> Option<ChangeEvent> {
    let parsed: NotifyPayload = serde_json::from_str(payload).ok()?;
    Some(ChangeEvent { table: Table::parse(&parsed.table)?, kind: ChangeKind::from_tg_op(&parsed.op)? })
}

/// Spawn the task that bridges Postgres notifications into `feed`.
pub fn spawn_pg_listener(pool: PgPool, feed: ChangeFeed) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = listen(&pool, &feed).await {
                error!(error = %e, "realtime: listener failed, reconnecting");
            }
            tokio::time::sleep(RECONNECT_DELAY).await;
        }
    })
}

async fn listen(pool: &PgPool, feed: &ChangeFeed) -> Result<(), sqlx::Error> {
    let mut listener = PgListener::connect_with(pool).await?;
    listener.listen(CHANGE_CHANNEL).await?;
    info!(channel = CHANGE_CHANNEL, "realtime: listening");

    loop {
        let notification = listener.recv().await?;
        match parse_notification(notification.payload()) {
            Some(event) => {
                let delivered = feed.publish(event);
                debug!(table = event.table.as_str(), kind = ?event.kind, delivered, "realtime: change");
            }
            None => warn!(payload = notification.payload(), "realtime: unrecognized notification"),
        }
    }
}

#[cfg(test)]
#[path = "realtime_test.rs"]
mod tests;
