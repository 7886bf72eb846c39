use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::didcomm::protocol::issuecredential::PreviewAttribute;
use crate::didcomm::Message;
use crate::engine::types::CredentialValues;
use crate::store::types::Document;

use super::types::IssuanceState;

/// IssuedCredential is the issuer side record of one issue-credential conversation
///
/// It is keyed by its protocol id, the `~thread.thid` every message of the conversation carries
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssuedCredential {
    pub id: String,
    pub agent: String,

    #[serde(rename = "schemaID")]
    pub schema_id: String,

    #[serde(rename = "protocolID")]
    pub protocol_id: String,

    #[serde(rename = "offerID", default, skip_serializing_if = "Option::is_none")]
    pub offer_id: Option<String>,

    #[serde(rename = "externalID")]
    pub external_id: String,

    #[serde(default)]
    pub preview: Vec<PreviewAttribute>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(rename = "myDID")]
    pub my_did: String,

    /// issuer_did signs the credential, the agent's public DID when it has one
    #[serde(rename = "issuerDID")]
    pub issuer_did: String,

    #[serde(rename = "theirDID")]
    pub their_did: String,

    #[serde(rename = "systemState")]
    pub state: IssuanceState,

    #[serde(rename = "lastOutbound", default, skip_serializing_if = "Option::is_none")]
    pub last_outbound: Option<Message>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl IssuedCredential {
    pub fn new(
        protocol_id: &str,
        agent: &str,
        external_id: &str,
        schema_id: &str,
        my_did: &str,
        their_did: &str,
        state: IssuanceState,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: protocol_id.to_string(),
            agent: agent.to_string(),
            schema_id: schema_id.to_string(),
            protocol_id: protocol_id.to_string(),
            offer_id: None,
            external_id: external_id.to_string(),
            preview: Vec::new(),
            comment: None,
            my_did: my_did.to_string(),
            issuer_did: my_did.to_string(),
            their_did: their_did.to_string(),
            state,
            last_outbound: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_preview(mut self, preview: Vec<PreviewAttribute>) -> Self {
        self.preview = preview;
        self
    }

    pub fn with_issuer(mut self, issuer_did: &str) -> Self {
        self.issuer_did = issuer_did.to_string();
        self
    }

    pub fn with_comment(mut self, comment: Option<String>) -> Self {
        self.comment = comment;
        self
    }

    pub fn values(&self) -> CredentialValues {
        self.preview
            .iter()
            .map(|attr| (attr.name.clone(), attr.value.clone()))
            .collect()
    }

    /// summary is the payload of the credential notifications
    pub fn summary(&self) -> Value {
        json!({
            "agent_id": self.agent,
            "credential_id": self.id,
            "protocol_id": self.protocol_id,
            "external_id": self.external_id,
            "schema_id": self.schema_id,
            "state": self.state,
        })
    }
}

impl Document for IssuedCredential {
    const COLLECTION: &'static str = "issued-credentials";

    fn key(&self) -> String {
        self.protocol_id.clone()
    }
}
