use async_trait::async_trait;

use crate::common::types::HubError;
use crate::didcomm::message::{Message, MessageType};

/// Inbound is a fully unpacked message handed to a protocol handler
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub message: Message,
    pub msg_type: MessageType,
    pub from_did: String,
    pub to_did: String,
}

impl Inbound {
    pub fn thread_id(&self) -> String {
        self.message.thread_id()
    }
}

/// `ProtocolHandler` is implemented by every component a worker can dispatch to
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    fn accept(&self, msg_type: &MessageType) -> bool;

    async fn handle(&self, inbound: Inbound) -> Result<(), HubError>;
}
