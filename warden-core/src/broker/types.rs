use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::common::types::HubError;

pub const QUEUE_DIDEXCHANGE: &str = "didexchange";
pub const QUEUE_ISSUE_CREDENTIAL: &str = "issue-credential";
pub const QUEUE_PRESENT_PROOF: &str = "present-proof";
pub const QUEUE_NOTIFICATION: &str = "notification";

/// PROTOCOL_QUEUES are the work queues fed by the router
pub const PROTOCOL_QUEUES: [&str; 3] = [
    QUEUE_DIDEXCHANGE,
    QUEUE_ISSUE_CREDENTIAL,
    QUEUE_PRESENT_PROOF,
];

pub const CONTENT_TYPE_JSON: &str = "application/json";

#[derive(Debug, PartialEq, Error, Clone)]
pub enum BrokerError {
    #[error("connection error: {0}")]
    ConnectionError(String),

    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    #[error("declare error: {0}")]
    DeclareError(String),

    #[error("publish error: {0}")]
    PublishError(String),

    #[error("consume error: {0}")]
    ConsumeError(String),

    #[error("ack error: {0}")]
    AckError(String),
}

impl From<BrokerError> for HubError {
    fn from(value: BrokerError) -> Self {
        HubError::Internal(value.to_string())
    }
}

/// Acker confirms a delivery back to the broker
#[async_trait]
pub trait Acker: Send + Sync {
    async fn ack(&self) -> Result<(), BrokerError>;
}

/// Delivery is a single message pulled from a queue
pub struct Delivery {
    body: Vec<u8>,
    acker: Option<Box<dyn Acker>>,
}

impl Delivery {
    pub fn new(body: Vec<u8>) -> Self {
        Self { body, acker: None }
    }

    pub fn with_acker(body: Vec<u8>, acker: Box<dyn Acker>) -> Self {
        Self {
            body,
            acker: Some(acker),
        }
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// ack is a no-op for deliveries consumed in auto-ack mode
    pub async fn ack(self) -> Result<(), BrokerError> {
        match self.acker {
            Some(acker) => acker.ack().await,
            None => Ok(()),
        }
    }
}

/// Subscription is the receiving half of a queue consumer
pub struct Subscription {
    rx: mpsc::Receiver<Delivery>,
}

impl Subscription {
    pub fn new(rx: mpsc::Receiver<Delivery>) -> Self {
        Self { rx }
    }

    /// next blocks until the next delivery, `None` means the consumer has been closed
    pub async fn next(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

/// `Broker` abstracts the work queue transport between the router and the workers
#[async_trait]
pub trait Broker: Send + Sync {
    /// declare creates the queue when missing, it must be idempotent
    async fn declare(&self, queue: &str) -> Result<(), BrokerError>;

    async fn publish(
        &self,
        queue: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BrokerError>;

    async fn consume(&self, queue: &str) -> Result<Subscription, BrokerError>;
}
