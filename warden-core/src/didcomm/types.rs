use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::types::HubError;

use super::message::Message;

pub const DIDCOMM_PREFIX: &str = "https://didcomm.org/";
pub const CONTENT_TYPE_ENVELOPE: &str = "application/didcomm-envelope-enc";

#[derive(Debug, PartialEq, Error, Clone, Serialize, Deserialize)]
pub enum DIDCommError {
    #[error("invalid message type: {0}")]
    InvalidMessageType(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("invalid attachment: {0}")]
    InvalidAttachment(String),

    #[error("unpack error: {0}")]
    UnpackError(String),

    #[error("pack error: {0}")]
    PackError(String),

    #[error("endpoint error: {0}")]
    EndpointError(String),

    #[error("transport error: {0}")]
    TransportError(String),
}

impl From<DIDCommError> for HubError {
    fn from(value: DIDCommError) -> Self {
        match value {
            DIDCommError::InvalidMessageType(_)
            | DIDCommError::InvalidMessage(_)
            | DIDCommError::InvalidAttachment(_) => HubError::InvalidArgument(value.to_string()),
            other => HubError::Internal(other.to_string()),
        }
    }
}

/// Unpacked is the output of [`Packer::unpack`]
#[derive(Debug, Clone, PartialEq)]
pub struct Unpacked {
    pub message: Vec<u8>,
    pub from_did: String,
    pub to_did: String,
}

/// Destination addresses an outbound message
///
/// `recipient` is the peer DID, or the raw recipient key when replying to an invitation that
/// did not carry a DID. When `endpoint` is empty it is resolved from the recipient
#[derive(Debug, Clone, PartialEq)]
pub struct Destination {
    pub my_did: String,
    pub recipient: String,
    pub endpoint: Option<String>,
}

impl Destination {
    pub fn new(my_did: &str, recipient: &str) -> Self {
        Self {
            my_did: my_did.to_string(),
            recipient: recipient.to_string(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.to_string());
        self
    }
}

/// `Packer` wraps and unwraps the wire envelope
///
/// The envelope cryptography lives outside this crate, only the input and output shapes are fixed
#[async_trait]
pub trait Packer: Send + Sync {
    async fn unpack(&self, envelope: &[u8]) -> Result<Unpacked, DIDCommError>;

    async fn pack(
        &self,
        plaintext: &[u8],
        from_did: &str,
        to_did: &str,
    ) -> Result<Vec<u8>, DIDCommError>;
}

/// `Transport` delivers an already packed envelope to a service endpoint
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, envelope: Vec<u8>, endpoint: &str) -> Result<(), DIDCommError>;
}

/// `EndpointResolver` finds the DIDComm service endpoint of a peer DID
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn service_endpoint(&self, did: &str) -> Result<String, DIDCommError>;
}

/// `Outbound` is what protocol handlers use to reply on the wire
#[async_trait]
pub trait Outbound: Send + Sync {
    async fn send(&self, message: &Message, destination: &Destination)
        -> Result<(), DIDCommError>;
}
