use std::sync::Arc;

use log::{debug, error, info, warn};
use tokio::sync::Semaphore;

use crate::broker::types::{Broker, Delivery};
use crate::common::types::HubError;
use crate::didcomm::message::Message;
use crate::didcomm::types::Packer;

use super::types::{Inbound, ProtocolHandler};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Worker consumes one protocol queue and hands every envelope to the first handler that
/// accepts its message type
///
/// Deliveries are acknowledged once handled, failed ones included, the broker never
/// redelivers. Retries happen at the protocol level when the peer resends
#[derive(Clone)]
pub struct Worker {
    queue: String,
    broker: Arc<dyn Broker>,
    packer: Arc<dyn Packer>,
    handlers: Vec<Arc<dyn ProtocolHandler>>,
    permits: Arc<Semaphore>,
}

impl Worker {
    pub fn new(queue: &str, broker: Arc<dyn Broker>, packer: Arc<dyn Packer>) -> Self {
        Self {
            queue: queue.to_string(),
            broker,
            packer,
            handlers: Vec::new(),
            permits: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn ProtocolHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.permits = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// run consumes until the subscription closes
    pub async fn run(&self) -> Result<(), HubError> {
        self.broker.declare(&self.queue).await?;
        let mut subscription = self.broker.consume(&self.queue).await?;
        info!("worker consuming {}", self.queue);

        while let Some(delivery) = subscription.next().await {
            let permit = self
                .permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| HubError::Internal(err.to_string()))?;

            let worker = self.clone();
            tokio::spawn(async move {
                worker.consume(delivery).await;
                drop(permit);
            });
        }

        info!("worker on {} stopped", self.queue);
        Ok(())
    }

    async fn consume(&self, delivery: Delivery) {
        if let Err(err) = self.process(delivery.body()).await {
            warn!("{}: envelope not handled: {}", self.queue, err);
        }

        if let Err(err) = delivery.ack().await {
            error!("{}: ack failed: {}", self.queue, err);
        }
    }

    /// process unpacks one envelope and dispatches it
    pub async fn process(&self, envelope: &[u8]) -> Result<(), HubError> {
        let unpacked = self.packer.unpack(envelope).await?;
        let message = Message::from_bytes(&unpacked.message)?;
        let msg_type = message.message_type()?;

        let handler = self
            .handlers
            .iter()
            .find(|handler| handler.accept(&msg_type))
            .ok_or_else(|| HubError::InvalidArgument(format!("no handler for {}", msg_type)))?;

        debug!(
            "{}: {} from {} on thread {}",
            self.queue,
            msg_type.name,
            unpacked.from_did,
            message.thread_id()
        );

        handler
            .handle(Inbound {
                message,
                msg_type,
                from_did: unpacked.from_did,
                to_did: unpacked.to_did,
            })
            .await
    }
}
