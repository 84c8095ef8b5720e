//! Kafka client wrappers and the broker ports used by the other services.
//!
//! The gateway and persister never touch rdkafka directly: they publish
//! through the [`Publisher`] port and consume by handing a [`RecordHandler`]
//! to one of the consumer loops in [`consumer`]. Tests swap both ports for
//! in-memory fakes.

pub mod consumer;
pub mod error;
pub mod producer;

pub use consumer::{GroupConsumer, TailConsumer};
pub use error::{Error, Result};
pub use producer::KafkaProducer;

use async_trait::async_trait;

/// Record header carrying the producing gateway's instance id.
pub const ORIGIN_HEADER: &str = "origin";

/// Publisher port. Publishing is synchronous with respect to broker acks;
/// implementations are shared freely across tasks.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish one record. `origin`, when present, rides the `origin` record
    /// header so consumers can tell which instance produced the record.
    async fn publish(
        &self,
        topic: &str,
        key: &[u8],
        payload: &[u8],
        origin: Option<&str>,
    ) -> Result<()>;
}

/// A record as delivered by one of the consumer loops.
pub struct Record<'a> {
    pub key: Option<&'a [u8]>,
    pub payload: &'a [u8],
    origin: Option<String>,
}

impl<'a> Record<'a> {
    pub fn new(key: Option<&'a [u8]>, payload: &'a [u8], origin: Option<String>) -> Self {
        Self {
            key,
            payload,
            origin,
        }
    }

    /// Instance id of the gateway that produced this record, if tagged.
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }
}

/// Consumer-side port. Handlers own terminal disposition of every record
/// (persist, divert, or drop); the consumer loops commit only after `handle`
/// returns, so a handler must not return before the record is dealt with.
#[async_trait]
pub trait RecordHandler: Send + Sync {
    async fn handle(&self, record: Record<'_>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_exposes_its_origin() {
        let payload = b"{}";
        let tagged = Record::new(Some(b"general"), payload, Some("gw-1".to_string()));
        assert_eq!(tagged.origin(), Some("gw-1"));
        assert_eq!(tagged.key, Some(&b"general"[..]));

        let untagged = Record::new(None, payload, None);
        assert_eq!(untagged.origin(), None);
    }
}
