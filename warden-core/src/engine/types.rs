use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::common::types::HubError;
use crate::did::DID;
use crate::schema::Schema;

pub const FORMAT_HLINDY_ZKP: &str = "hlindy-zkp-v1.0";
pub const FORMAT_LD_PROOF: &str = "lds/ld-proof";

/// CredentialValues are the attribute values of a credential keyed by attribute name
pub type CredentialValues = BTreeMap<String, String>;

#[derive(Debug, PartialEq, Error, Clone, Serialize, Deserialize)]
pub enum EngineError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("offer error: {0}")]
    OfferError(String),

    #[error("issue error: {0}")]
    IssueError(String),

    #[error("verify error: {0}")]
    VerifyError(String),

    #[error("key error: {0}")]
    KeyError(String),

    #[error("store error: {0}")]
    StoreError(String),
}

impl From<EngineError> for HubError {
    fn from(value: EngineError) -> Self {
        match value {
            EngineError::UnsupportedFormat(_) | EngineError::InvalidInput(_) => {
                HubError::InvalidArgument(value.to_string())
            }
            other => HubError::Internal(other.to_string()),
        }
    }
}

/// Format is one of the attachment formats a credential or presentation can be expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "hlindy-zkp-v1.0")]
    HlindyZkp,

    #[serde(rename = "lds/ld-proof")]
    LdProof,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::HlindyZkp => FORMAT_HLINDY_ZKP,
            Format::LdProof => FORMAT_LD_PROOF,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = EngineError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            FORMAT_HLINDY_ZKP => Ok(Format::HlindyZkp),
            FORMAT_LD_PROOF => Ok(Format::LdProof),
            _ => Err(EngineError::UnsupportedFormat(value.to_string())),
        }
    }
}

/// CredentialOffer is what an engine returns for a new offer, `offer_id` is kept by the
/// issuer to match the holder's request later
#[derive(Debug, Clone, PartialEq)]
pub struct CredentialOffer {
    pub offer_id: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<String>,
}

/// PredicateInfo asks the prover to show `name <p_type> p_value` without revealing the value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredicateInfo {
    pub name: String,

    #[serde(rename = "p_type")]
    pub p_type: String,

    #[serde(rename = "p_value")]
    pub p_value: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restrictions: Option<String>,
}

/// `CredentialEngine` is the capability interface of a credential format backend
#[async_trait]
pub trait CredentialEngine: Send + Sync {
    fn accept(&self, format: &str) -> bool;

    fn format(&self) -> Format;

    /// register_schema returns the engine side identifier of the schema
    async fn register_schema(&self, registrant: &DID, schema: &Schema)
        -> Result<String, EngineError>;

    async fn create_credential_offer(
        &self,
        issuer: &DID,
        subject_did: &str,
        schema: &Schema,
        values: &CredentialValues,
    ) -> Result<CredentialOffer, EngineError>;

    /// create_credential_request is the holder side answer to an offer
    async fn create_credential_request(
        &self,
        holder: &DID,
        offer: &[u8],
    ) -> Result<Vec<u8>, EngineError>;

    async fn issue_credential(
        &self,
        issuer: &DID,
        schema: &Schema,
        offer_id: &str,
        request: &[u8],
        values: &CredentialValues,
    ) -> Result<Vec<u8>, EngineError>;
}

/// `PresentationEngine` is the capability interface of a proof format backend
#[async_trait]
pub trait PresentationEngine: Send + Sync {
    fn accept(&self, format: &str) -> bool;

    fn format(&self) -> Format;

    async fn request_presentation(
        &self,
        name: &str,
        version: &str,
        attributes: &BTreeMap<String, AttributeInfo>,
        predicates: &BTreeMap<String, PredicateInfo>,
    ) -> Result<Vec<u8>, EngineError>;

    /// create_presentation is the prover side, it answers `request` from held credentials
    async fn create_presentation(
        &self,
        holder: &DID,
        request: &[u8],
        credentials: &[Vec<u8>],
    ) -> Result<Vec<u8>, EngineError>;

    async fn verify(
        &self,
        presentation: &[u8],
        request: &[u8],
        their_did: &str,
        my_did: &str,
    ) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parse() {
        assert_eq!(Format::from_str("lds/ld-proof").unwrap(), Format::LdProof);
        assert_eq!(
            Format::from_str("hlindy-zkp-v1.0").unwrap(),
            Format::HlindyZkp
        );
        assert!(Format::from_str("dif/presentation-exchange").is_err());

        let json = serde_json::to_string(&Format::LdProof).unwrap();
        assert_eq!(json, "\"lds/ld-proof\"");
    }
}
