use serde::{Deserialize, Serialize};

use crate::did::DidDoc;

pub const INVITATION: &str = "https://didcomm.org/didexchange/1.0/invitation";
pub const REQUEST: &str = "https://didcomm.org/didexchange/1.0/request";
pub const RESPONSE: &str = "https://didcomm.org/didexchange/1.0/response";
pub const COMPLETE: &str = "https://didcomm.org/didexchange/1.0/complete";
pub const ACK: &str = "https://didcomm.org/didexchange/1.0/ack";
pub const PROBLEM_REPORT: &str = "https://didcomm.org/didexchange/1.0/problem-report";

/// Invitation is the out of band connection invitation
///
/// An ephemeral invitation carries `recipientKeys` and a `serviceEndpoint`, a public one only
/// carries the inviter's `did`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Invitation {
    #[serde(rename = "@id")]
    pub id: String,

    #[serde(rename = "@type")]
    pub msg_type: String,

    pub label: String,

    #[serde(rename = "recipientKeys", default, skip_serializing_if = "Vec::is_empty")]
    pub recipient_keys: Vec<String>,

    #[serde(rename = "serviceEndpoint", default, skip_serializing_if = "Option::is_none")]
    pub service_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub did: Option<String>,
}

impl Invitation {
    pub fn ephemeral(id: &str, label: &str, recipient_key: &str, endpoint: &str) -> Self {
        Self {
            id: id.to_string(),
            msg_type: INVITATION.to_string(),
            label: label.to_string(),
            recipient_keys: vec![recipient_key.to_string()],
            service_endpoint: Some(endpoint.to_string()),
            did: None,
        }
    }

    pub fn public(id: &str, label: &str, did: &str) -> Self {
        Self {
            id: id.to_string(),
            msg_type: INVITATION.to_string(),
            label: label.to_string(),
            recipient_keys: Vec::new(),
            service_endpoint: None,
            did: Some(did.to_string()),
        }
    }

    /// recipient returns the DID, or the first recipient key, the request must be addressed to
    pub fn recipient(&self) -> Option<String> {
        self.did
            .clone()
            .or_else(|| self.recipient_keys.first().cloned())
    }
}

/// ConnectionInfo carries the sender's DID and DID document in requests and responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionInfo {
    #[serde(rename = "DID")]
    pub did: String,

    #[serde(rename = "DIDDoc")]
    pub did_doc: DidDoc,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Request {
    pub label: String,
    pub connection: ConnectionInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Response {
    pub connection: ConnectionInfo,
}
