//! Log-driven fan-out: records produced by peer gateways are replayed into
//! the local hub.

use async_trait::async_trait;
use metrics::counter;
use tracing::debug;

use common::wire::WireMessage;
use kafka_client::{Record, RecordHandler};

use crate::hub::Hub;

/// Feeds peer-gateway records into the local hub. Records tagged with this
/// gateway's own instance id are dropped: those were already fanned out
/// locally at publish time, and replaying them would double-deliver.
pub struct FanoutHandler {
    hub: Hub,
    instance_id: String,
}

impl FanoutHandler {
    pub fn new(hub: Hub, instance_id: impl Into<String>) -> Self {
        Self {
            hub,
            instance_id: instance_id.into(),
        }
    }
}

#[async_trait]
impl RecordHandler for FanoutHandler {
    async fn handle(&self, record: Record<'_>) {
        if record.origin() == Some(self.instance_id.as_str()) {
            return;
        }
        match serde_json::from_slice::<WireMessage>(record.payload) {
            Ok(message) => {
                counter!("gateway_fanout_records_total").increment(1);
                self.hub.broadcast(message);
            }
            Err(e) => debug!("Skipping undecodable record on fan-out: {}", e),
        }
    }
}
