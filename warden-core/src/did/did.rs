use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::store::types::Document;

use super::types::{DIDError, DID_SOV_PREFIX};

/// derive_did builds a `did:sov` identifier from an ed25519 public key, the method specific id
/// is the base58 form of the first 16 bytes of the key
pub fn derive_did(public_key: &[u8]) -> Result<String, DIDError> {
    if public_key.len() != 32 {
        return Err(DIDError::InvalidKey(format!(
            "expected 32 bytes public key, got {}",
            public_key.len()
        )));
    }

    Ok(format!(
        "{}{}",
        DID_SOV_PREFIX,
        bs58::encode(&public_key[..16]).into_string()
    ))
}

/// did_from_verkey is [`derive_did`] for a base58 encoded verkey
pub fn did_from_verkey(verkey: &str) -> Result<String, DIDError> {
    let bytes = bs58::decode(verkey)
        .into_vec()
        .map_err(|err| DIDError::InvalidKey(err.to_string()))?;

    derive_did(&bytes)
}

/// expand_verkey turns an abbreviated ledger verkey (`~` followed by the last 16 bytes) back
/// into the full key, full verkeys are returned unchanged
pub fn expand_verkey(did: &str, verkey: &str) -> Result<String, DIDError> {
    let Some(suffix) = verkey.strip_prefix('~') else {
        return Ok(verkey.to_string());
    };

    let method_id = did.rsplit(':').next().unwrap_or(did);
    let mut bytes = bs58::decode(method_id)
        .into_vec()
        .map_err(|err| DIDError::InvalidKey(err.to_string()))?;
    let tail = bs58::decode(suffix)
        .into_vec()
        .map_err(|err| DIDError::InvalidKey(err.to_string()))?;
    bytes.extend(tail);

    if bytes.len() != 32 {
        return Err(DIDError::InvalidKey(format!("abbreviated verkey of {} is malformed", did)));
    }
    Ok(bs58::encode(bytes).into_string())
}

/// DID is a persisted identifier, either one of ours (with `key_id`) or a peer's
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DID {
    pub id: String,
    pub verkey: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub public: bool,

    pub created_at: DateTime<Utc>,
}

impl DID {
    pub fn new(id: &str, verkey: &str) -> Self {
        Self {
            id: id.to_string(),
            verkey: verkey.to_string(),
            key_id: None,
            endpoint: None,
            public: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_key(mut self, key_id: &str) -> Self {
        self.key_id = Some(key_id.to_string());
        self
    }

    pub fn with_endpoint(mut self, endpoint: Option<String>) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn is_owned(&self) -> bool {
        self.key_id.is_some()
    }
}

impl Document for DID {
    const COLLECTION: &'static str = "dids";

    fn key(&self) -> String {
        self.id.clone()
    }
}
