//! rdkafka-backed publisher.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tracing::info;

use crate::error::{Error, Result};
use crate::{Publisher, ORIGIN_HEADER};

/// How long a send may wait for broker acknowledgment.
const ACK_TIMEOUT: Duration = Duration::from_secs(10);

/// Producer acknowledged by all in-sync replicas, with bounded internal
/// retries. One instance is shared by every read pump of a gateway.
#[derive(Clone)]
pub struct KafkaProducer {
    inner: FutureProducer,
}

impl KafkaProducer {
    /// Build the producer and verify the cluster is reachable.
    pub fn connect(brokers: &str) -> Result<Self> {
        info!("Connecting Kafka producer to {}", brokers);
        let inner: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("acks", "all")
            .set("message.send.max.retries", "3")
            .set("message.timeout.ms", "10000")
            .create()?;

        // librdkafka connects lazily; fetch metadata up front so an
        // unreachable cluster fails startup instead of the first send.
        inner
            .client()
            .fetch_metadata(None, Duration::from_secs(10))?;

        Ok(Self { inner })
    }
}

#[async_trait]
impl Publisher for KafkaProducer {
    async fn publish(
        &self,
        topic: &str,
        key: &[u8],
        payload: &[u8],
        origin: Option<&str>,
    ) -> Result<()> {
        let mut record = FutureRecord::to(topic).key(key).payload(payload);
        if let Some(origin) = origin {
            record = record.headers(OwnedHeaders::new().insert(Header {
                key: ORIGIN_HEADER,
                value: Some(origin.as_bytes()),
            }));
        }

        self.inner
            .send(record, ACK_TIMEOUT)
            .await
            .map(|_| ())
            .map_err(|(source, _lost)| Error::Publish {
                topic: topic.to_string(),
                source,
            })
    }
}
