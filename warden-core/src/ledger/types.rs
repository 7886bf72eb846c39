use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::types::HubError;

#[derive(Debug, PartialEq, Error, Clone, Serialize, Deserialize)]
pub enum LedgerError {
    #[error("nym not found: {0}")]
    NotFound(String),

    #[error("request error: {0}")]
    RequestError(String),

    #[error("response error: {0}")]
    ResponseError(String),
}

impl From<LedgerError> for HubError {
    fn from(value: LedgerError) -> Self {
        match value {
            LedgerError::NotFound(msg) => HubError::NotFound(msg),
            other => HubError::Internal(other.to_string()),
        }
    }
}

/// Nym is a DID as it is registered on the ledger
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Nym {
    pub did: String,
    pub verkey: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// `LedgerClient` is the read side of the distributed ledger
#[async_trait]
pub trait LedgerClient: Send + Sync {
    async fn get_nym(&self, did: &str) -> Result<Nym, LedgerError>;
}
