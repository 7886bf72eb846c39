use async_trait::async_trait;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::types::HubError;
use crate::didcomm::protocol::issuecredential::PreviewAttribute;
use crate::store::types::{composite_key, Document};

pub const HEADER_CLOUD_AGENT_ID: &str = "x-canis-cloud-agent-id";
pub const HEADER_CLOUD_AGENT_SIGNATURE: &str = "x-canis-cloud-agent-signature";

/// CloudAgent is an edge wallet that delegates its DIDComm traffic to the hub
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudAgent {
    pub id: String,

    #[serde(rename = "externalID")]
    pub external_id: String,

    /// public_key is the raw ed25519 key every request is signed with
    #[serde(rename = "publicKey", with = "crate::common::encoding::base64_bytes")]
    pub public_key: Vec<u8>,

    #[serde(rename = "nextKey", with = "crate::common::encoding::base64_bytes")]
    pub next_key: Vec<u8>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
}

impl CloudAgent {
    pub fn new(external_id: &str, public_key: Vec<u8>, next_key: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            external_id: external_id.to_string(),
            public_key,
            next_key,
            created_at: Utc::now(),
        }
    }
}

impl Document for CloudAgent {
    const COLLECTION: &'static str = "cloud-agents";

    fn key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudConnectionStatus {
    Requested,
    Accepted,
}

pub fn cloud_connection_key(cloud_agent_id: &str, invitation_id: &str) -> String {
    composite_key(cloud_agent_id, invitation_id)
}

/// CloudAgentConnection is a connection the hub holds for a cloud agent
///
/// It is keyed by the invitation it was started from, the DIDs are only known once accepted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudAgentConnection {
    #[serde(rename = "cloudAgentID")]
    pub cloud_agent_id: String,

    #[serde(rename = "invitationID")]
    pub invitation_id: String,

    pub status: CloudConnectionStatus,

    #[serde(rename = "theirLabel", default)]
    pub their_label: String,

    #[serde(rename = "myDID", default, skip_serializing_if = "Option::is_none")]
    pub my_did: Option<String>,

    #[serde(rename = "theirDID", default, skip_serializing_if = "Option::is_none")]
    pub their_did: Option<String>,

    #[serde(rename = "connectionID", default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl CloudAgentConnection {
    pub fn requested(cloud_agent_id: &str, invitation_id: &str, their_label: &str) -> Self {
        Self {
            cloud_agent_id: cloud_agent_id.to_string(),
            invitation_id: invitation_id.to_string(),
            status: CloudConnectionStatus::Requested,
            their_label: their_label.to_string(),
            my_did: None,
            their_did: None,
            connection_id: None,
            updated_at: Utc::now(),
        }
    }

    pub fn joins(&self, my_did: &str, their_did: &str) -> bool {
        self.status == CloudConnectionStatus::Accepted
            && self.my_did.as_deref() == Some(my_did)
            && self.their_did.as_deref() == Some(their_did)
    }
}

impl Document for CloudAgentConnection {
    const COLLECTION: &'static str = "cloud-agent-connections";

    fn key(&self) -> String {
        cloud_connection_key(&self.cloud_agent_id, &self.invitation_id)
    }
}

#[derive(Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudCredentialState {
    #[display("offered")]
    Offered,
    #[display("accepted")]
    Accepted,
    #[display("issued")]
    Issued,
}

/// CloudAgentCredential is a credential offered to a cloud agent, keyed by its thread id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudAgentCredential {
    pub id: String,

    #[serde(rename = "cloudAgentID")]
    pub cloud_agent_id: String,

    #[serde(rename = "systemState")]
    pub state: CloudCredentialState,

    pub format: String,

    #[serde(rename = "myDID")]
    pub my_did: String,

    #[serde(rename = "theirDID")]
    pub their_did: String,

    #[serde(rename = "issuerConnectionID", default)]
    pub issuer_connection_id: String,

    #[serde(rename = "issuerLabel", default)]
    pub issuer_label: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default)]
    pub preview: Vec<PreviewAttribute>,

    #[serde(with = "crate::common::encoding::base64_bytes")]
    pub offer: Vec<u8>,

    /// credential is the issued credential, standard base64 encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Document for CloudAgentCredential {
    const COLLECTION: &'static str = "cloud-agent-credentials";

    fn key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProofState {
    Requested,
    Presented,
}

/// CloudAgentProofRequest is a proof request addressed to a cloud agent, keyed by its thread id
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CloudAgentProofRequest {
    pub id: String,

    #[serde(rename = "cloudAgentID")]
    pub cloud_agent_id: String,

    #[serde(rename = "systemState")]
    pub state: CloudProofState,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    pub format: String,

    #[serde(with = "crate::common::encoding::base64_bytes")]
    pub request: Vec<u8>,

    #[serde(rename = "myDID")]
    pub my_did: String,

    #[serde(rename = "theirDID")]
    pub their_did: String,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Document for CloudAgentProofRequest {
    const COLLECTION: &'static str = "cloud-agent-proof-requests";

    fn key(&self) -> String {
        self.id.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterCloudAgentRequest {
    #[serde(rename = "externalID")]
    pub external_id: String,

    #[serde(rename = "publicKey", with = "crate::common::encoding::base64_bytes")]
    pub public_key: Vec<u8>,

    #[serde(rename = "nextKey", with = "crate::common::encoding::base64_bytes")]
    pub next_key: Vec<u8>,

    pub secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegisterCloudAgentResponse {
    #[serde(rename = "cloudAgentID")]
    pub cloud_agent_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HandleInvitationRequest {
    /// invitation is the invitation JSON, raw or base64url encoded
    pub invitation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresentProofRequest {
    #[serde(rename = "credentialID")]
    pub credential_id: String,
}

/// `BridgeAPI` is what an authenticated edge wallet can ask of the hub
#[async_trait]
pub trait BridgeAPI: Send + Sync {
    async fn register(
        &self,
        req: RegisterCloudAgentRequest,
    ) -> Result<RegisterCloudAgentResponse, HubError>;

    /// authenticate checks the signature headers of a request against the registered key
    async fn authenticate(
        &self,
        cloud_agent_id: &str,
        signature: &str,
        signed: &[u8],
    ) -> Result<CloudAgent, HubError>;

    async fn handle_invitation(
        &self,
        agent: &CloudAgent,
        req: HandleInvitationRequest,
    ) -> Result<(), HubError>;

    async fn list_connections(
        &self,
        agent: &CloudAgent,
    ) -> Result<Vec<CloudAgentConnection>, HubError>;

    async fn list_credentials(
        &self,
        agent: &CloudAgent,
    ) -> Result<Vec<CloudAgentCredential>, HubError>;

    async fn accept_credential(
        &self,
        agent: &CloudAgent,
        credential_id: &str,
    ) -> Result<CloudAgentCredential, HubError>;

    async fn list_proof_requests(
        &self,
        agent: &CloudAgent,
    ) -> Result<Vec<CloudAgentProofRequest>, HubError>;

    async fn present_proof(
        &self,
        agent: &CloudAgent,
        proof_request_id: &str,
        req: PresentProofRequest,
    ) -> Result<CloudAgentProofRequest, HubError>;
}
