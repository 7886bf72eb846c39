use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::message::Message;
use super::types::{DIDCommError, Destination, EndpointResolver, Outbound, Packer, Transport};

/// Messenger is the default [`Outbound`], it resolves the peer endpoint, packs the plaintext and
/// hands the envelope to the transport
#[derive(Clone)]
pub struct Messenger {
    packer: Arc<dyn Packer>,
    resolver: Arc<dyn EndpointResolver>,
    transport: Arc<dyn Transport>,
}

impl Messenger {
    pub fn new(
        packer: Arc<dyn Packer>,
        resolver: Arc<dyn EndpointResolver>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            packer,
            resolver,
            transport,
        }
    }
}

#[async_trait]
impl Outbound for Messenger {
    async fn send(
        &self,
        message: &Message,
        destination: &Destination,
    ) -> Result<(), DIDCommError> {
        let endpoint = match &destination.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => self.resolver.service_endpoint(&destination.recipient).await?,
        };

        let plaintext = message.to_bytes()?;
        let envelope = self
            .packer
            .pack(&plaintext, &destination.my_did, &destination.recipient)
            .await?;

        debug!(
            "sending {} on thread {} to {}",
            message.msg_type,
            message.thread_id(),
            endpoint
        );

        self.transport.send(envelope, &endpoint).await
    }
}
