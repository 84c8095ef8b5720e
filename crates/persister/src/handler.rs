//! Record handler: decode, insert with retry, dead-letter what cannot land.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};

use common::wire::WireMessage;
use kafka_client::{Publisher, Record, RecordHandler};
use storage::{MessageStore, NewMessage, StoreError};

/// First retry delay; doubles per attempt.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(250);
/// Retry delays never grow past this.
const RETRY_MAX_DELAY: Duration = Duration::from_secs(5);

/// Turns each `chat-in` record into an idempotent insert. Every record
/// reaches a terminal disposition (persisted or diverted to the DLQ) before
/// `handle` returns, so the consumer may commit its offset afterwards.
pub struct PersistHandler {
    store: Arc<dyn MessageStore>,
    dlq: Arc<dyn Publisher>,
    dlq_topic: String,
    max_retries: u32,
}

impl PersistHandler {
    pub fn new(
        store: Arc<dyn MessageStore>,
        dlq: Arc<dyn Publisher>,
        dlq_topic: impl Into<String>,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            dlq,
            dlq_topic: dlq_topic.into(),
            max_retries,
        }
    }

    /// Insert with bounded exponential backoff. Retries are in-memory only;
    /// they never re-enter the log. Returns an error only once the record
    /// needs dead-lettering.
    async fn save_with_retry(&self, message: &NewMessage) -> Result<(), StoreError> {
        let mut delay = RETRY_BASE_DELAY;
        let mut attempt = 0;
        loop {
            match self.store.save(message).await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    counter!("persister_retries_total").increment(1);
                    warn!(
                        "Transient store error for {} (attempt {}): {}; retrying in {:?}",
                        message.id, attempt, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(RETRY_MAX_DELAY);
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Divert a record's raw bytes to the DLQ, keeping the original key.
    async fn divert(&self, key: Option<&[u8]>, payload: &[u8]) {
        counter!("persister_dlq_total").increment(1);
        if let Err(e) = self
            .dlq
            .publish(&self.dlq_topic, key.unwrap_or(&[]), payload, None)
            .await
        {
            warn!("DLQ publish failed, record lost: {}", e);
        }
    }
}

#[async_trait]
impl RecordHandler for PersistHandler {
    async fn handle(&self, record: Record<'_>) {
        let message = match serde_json::from_slice::<WireMessage>(record.payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Poison record, diverting to {}: {}", self.dlq_topic, e);
                self.divert(record.key, record.payload).await;
                return;
            }
        };

        let row = NewMessage {
            id: message.id,
            room: message.room,
            author: message.author,
            body: message.body,
            created_at: message.created_at,
        };

        match self.save_with_retry(&row).await {
            Ok(()) => {
                counter!("persister_saved_total").increment(1);
                debug!("Persisted message {}", row.id);
            }
            Err(e) => {
                warn!("Giving up on message {}: {}", row.id, e);
                self.divert(record.key, record.payload).await;
            }
        }
    }
}
