use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::types::HubError;
use crate::store::types::StoreError;

pub const DID_SOV_PREFIX: &str = "did:sov:";

#[derive(Debug, PartialEq, Error, Clone, Serialize, Deserialize)]
pub enum DIDError {
    #[error("invalid seed: {0}")]
    InvalidSeed(String),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("store error: {0}")]
    StoreError(String),
}

impl From<StoreError> for DIDError {
    fn from(value: StoreError) -> Self {
        DIDError::StoreError(value.to_string())
    }
}

impl From<DIDError> for HubError {
    fn from(value: DIDError) -> Self {
        match value {
            DIDError::InvalidSeed(_) | DIDError::InvalidKey(_) => {
                HubError::InvalidArgument(value.to_string())
            }
            DIDError::KeyNotFound(msg) => HubError::NotFound(msg),
            other => HubError::Internal(other.to_string()),
        }
    }
}
