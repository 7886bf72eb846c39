use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use log::{debug, error, warn};
use serde_json::Value;

use crate::broker::types::{Broker, CONTENT_TYPE_JSON, PROTOCOL_QUEUES};
use crate::didcomm::message::MessageType;
use crate::didcomm::types::{Packer, CONTENT_TYPE_ENVELOPE};

use super::types::{Routed, RouterError, METHOD_POST};

/// validate_request checks an inbound HTTP request before its body is routed
pub fn validate_request(
    method: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> Result<(), RouterError> {
    if !method.eq_ignore_ascii_case(METHOD_POST) {
        return Err(RouterError::MethodNotAllowed(method.to_string()));
    }

    let media = content_type
        .and_then(|value| value.split(';').next())
        .map(str::trim)
        .unwrap_or_default();
    if !media.eq_ignore_ascii_case(CONTENT_TYPE_ENVELOPE) {
        return Err(RouterError::UnsupportedMediaType(media.to_string()));
    }

    if body.is_empty() {
        return Err(RouterError::MissingBody);
    }

    Ok(())
}

/// Router moves inbound envelopes to the work queue of their protocol
///
/// Only the `@type` of the unpacked plaintext is looked at, the envelope itself is published
/// untouched so workers unpack it again with their own keys
#[derive(Clone)]
pub struct Router {
    packer: Arc<dyn Packer>,
    broker: Arc<dyn Broker>,
    dropped: Arc<AtomicU64>,
}

impl Router {
    pub fn new(packer: Arc<dyn Packer>, broker: Arc<dyn Broker>) -> Self {
        Self {
            packer,
            broker,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// dropped is the number of envelopes discarded since startup
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// declare makes sure every protocol queue exists
    pub async fn declare(&self) -> Result<(), RouterError> {
        for queue in PROTOCOL_QUEUES {
            self.broker
                .declare(queue)
                .await
                .map_err(|err| RouterError::Publish(err.to_string()))?;
        }
        Ok(())
    }

    /// route never fails on a bad envelope, only on a broker that refused the publish
    pub async fn route(&self, envelope: &[u8]) -> Result<Routed, RouterError> {
        let queue = match self.protocol_of(envelope).await {
            Ok(queue) => queue,
            Err(reason) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!("envelope dropped: {}", reason);
                return Ok(Routed::Dropped(reason));
            }
        };

        self.broker
            .publish(&queue, envelope.to_vec(), CONTENT_TYPE_JSON)
            .await
            .map_err(|err| {
                error!("publish to {} failed: {}", queue, err);
                RouterError::Publish(err.to_string())
            })?;

        debug!("envelope routed to {}", queue);
        Ok(Routed::Queued(queue))
    }

    async fn protocol_of(&self, envelope: &[u8]) -> Result<String, String> {
        let unpacked = self
            .packer
            .unpack(envelope)
            .await
            .map_err(|err| err.to_string())?;

        let plaintext: Value =
            serde_json::from_slice(&unpacked.message).map_err(|err| err.to_string())?;
        let raw_type = plaintext
            .get("@type")
            .and_then(Value::as_str)
            .ok_or_else(|| "missing @type".to_string())?;

        let msg_type = MessageType::from_str(raw_type).map_err(|err| err.to_string())?;
        if !PROTOCOL_QUEUES.contains(&msg_type.protocol.as_str()) {
            return Err(format!("no queue for protocol {}", msg_type.protocol));
        }

        Ok(msg_type.protocol)
    }
}
