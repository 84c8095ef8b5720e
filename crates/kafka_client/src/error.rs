//! Broker error types.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Kafka error: {0}")]
    Kafka(#[from] rdkafka::error::KafkaError),

    #[error("publish to '{topic}' failed: {source}")]
    Publish {
        topic: String,
        source: rdkafka::error::KafkaError,
    },
}
