use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::didcomm::Message;
use crate::engine::types::{AttributeInfo, PredicateInfo};
use crate::store::types::Document;

use super::types::PresentationState;

/// PresentationRequest is the verifier side record of one present-proof conversation, keyed by
/// its piid
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresentationRequest {
    pub id: String,
    pub agent: String,
    pub piid: String,

    #[serde(rename = "externalID")]
    pub external_id: String,

    pub name: String,
    pub version: String,
    pub format: String,

    #[serde(rename = "requestedAttributes", default)]
    pub requested_attributes: BTreeMap<String, AttributeInfo>,

    #[serde(rename = "requestedPredicates", default)]
    pub requested_predicates: BTreeMap<String, PredicateInfo>,

    /// data is the engine request payload the presentation is verified against
    #[serde(with = "crate::common::encoding::base64_bytes")]
    pub data: Vec<u8>,

    #[serde(rename = "myDID")]
    pub my_did: String,

    #[serde(rename = "theirDID")]
    pub their_did: String,

    #[serde(rename = "systemState")]
    pub state: PresentationState,

    #[serde(rename = "lastOutbound", default, skip_serializing_if = "Option::is_none")]
    pub last_outbound: Option<Message>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl PresentationRequest {
    pub fn summary(&self) -> Value {
        json!({
            "agent_id": self.agent,
            "presentation_request_id": self.id,
            "piid": self.piid,
            "external_id": self.external_id,
            "state": self.state,
        })
    }
}

impl Document for PresentationRequest {
    const COLLECTION: &'static str = "presentation-requests";

    fn key(&self) -> String {
        self.piid.clone()
    }
}
