//! Consumer loops: a grouped, committing consumer for durable work-sharing
//! and an uncommitted tail consumer for peer fan-out.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{BorrowedMessage, Headers, Message};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::Result;
use crate::{Record, RecordHandler, ORIGIN_HEADER};

fn base_config(brokers: &str, group_id: &str) -> ClientConfig {
    let mut cfg = ClientConfig::new();
    cfg.set("bootstrap.servers", brokers)
        .set("group.id", group_id)
        .set("enable.auto.commit", "false")
        .set("enable.partition.eof", "false")
        .set("session.timeout.ms", "6000");
    cfg
}

fn origin_of(msg: &BorrowedMessage<'_>) -> Option<String> {
    let headers = msg.headers()?;
    headers
        .iter()
        .find(|h| h.key == ORIGIN_HEADER)
        .and_then(|h| h.value)
        .map(|v| String::from_utf8_lossy(v).into_owned())
}

/// Consumer-group member delivering records in partition order. The offset of
/// a record is committed strictly after the handler returns, so at-least-once
/// delivery holds across crashes and rebalances.
pub struct GroupConsumer {
    inner: StreamConsumer,
}

impl GroupConsumer {
    pub fn connect(brokers: &str, group_id: &str, topic: &str) -> Result<Self> {
        info!(
            "Joining consumer group '{}' on '{}' at {}",
            group_id, topic, brokers
        );
        let inner: StreamConsumer = base_config(brokers, group_id)
            .set("auto.offset.reset", "latest")
            .create()?;
        inner.fetch_metadata(Some(topic), Duration::from_secs(10))?;
        inner.subscribe(&[topic])?;
        Ok(Self { inner })
    }

    pub async fn run(
        &self,
        handler: &dyn RecordHandler,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Group consumer received shutdown signal");
                    return Ok(());
                }

                msg = self.inner.recv() => {
                    match msg {
                        Ok(msg) => {
                            let origin = origin_of(&msg);
                            let record = Record::new(msg.key(), msg.payload().unwrap_or(&[]), origin);
                            handler.handle(record).await;
                            if let Err(e) = self.inner.commit_message(&msg, CommitMode::Async) {
                                warn!("Offset commit failed: {}", e);
                            }
                        }
                        // Transient broker errors (rebalance, reconnect) are
                        // the client library's to resolve.
                        Err(e) => warn!("Consumer error: {}", e),
                    }
                }
            }
        }
    }
}

/// Uncommitted consumer starting at the newest offset. Each instance joins a
/// throwaway group of its own so every gateway sees every record.
pub struct TailConsumer {
    inner: StreamConsumer,
}

impl TailConsumer {
    pub fn connect(brokers: &str, topic: &str, instance_id: &str) -> Result<Self> {
        let group_id = format!("gateway-fanout-{}", instance_id);
        info!("Tailing '{}' at {} as '{}'", topic, brokers, group_id);
        let inner: StreamConsumer = base_config(brokers, &group_id)
            .set("auto.offset.reset", "latest")
            .create()?;
        inner.fetch_metadata(Some(topic), Duration::from_secs(10))?;
        inner.subscribe(&[topic])?;
        Ok(Self { inner })
    }

    pub async fn run(
        &self,
        handler: &dyn RecordHandler,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        loop {
            tokio::select! {
                biased;

                _ = shutdown_rx.recv() => {
                    info!("Tail consumer received shutdown signal");
                    return Ok(());
                }

                msg = self.inner.recv() => {
                    match msg {
                        Ok(msg) => {
                            let origin = origin_of(&msg);
                            let record = Record::new(msg.key(), msg.payload().unwrap_or(&[]), origin);
                            handler.handle(record).await;
                        }
                        Err(e) => warn!("Consumer error: {}", e),
                    }
                }
            }
        }
    }
}
