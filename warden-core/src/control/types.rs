use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::agent::Agent;
use crate::common::types::{HubError, PaginationParams};
use crate::connection::AgentConnection;
use crate::did::DID;
use crate::didcomm::protocol::issuecredential::PreviewAttribute;
use crate::issuance::IssuedCredential;
use crate::notifier::Webhook;
use crate::presentation::{Presentation, PresentationRequest, ProofRequest};
use crate::schema::{Schema, SchemaAttribute};

use super::watcher::AgentWatch;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CreateAgentRequest {
    pub name: String,

    #[serde(rename = "endorsableSchemas", default)]
    pub endorsable_schemas: Vec<String>,

    /// public_did asks for a fresh DID the agent issues under
    #[serde(rename = "publicDID", default)]
    pub public_did: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateAgentResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ListRequest {
    #[serde(flatten)]
    pub page: PaginationParams,

    /// name keeps the records whose name contains it
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListAgentResponse {
    pub count: usize,
    pub agents: Vec<Agent>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct UpdateAgentRequest {
    pub name: String,

    #[serde(rename = "endorsableSchemas", default)]
    pub endorsable_schemas: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CreateSchemaRequest {
    #[serde(default)]
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub version: String,

    pub format: String,

    #[serde(rename = "type", default)]
    pub schema_type: String,

    #[serde(default)]
    pub context: Vec<String>,

    #[serde(default)]
    pub attributes: Vec<SchemaAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateSchemaResponse {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListSchemaResponse {
    pub count: usize,
    pub schemas: Vec<Schema>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CredentialParams {
    #[serde(rename = "schemaID")]
    pub schema_id: String,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub preview: Vec<PreviewAttribute>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueCredentialRequest {
    pub agent: String,

    #[serde(rename = "externalID")]
    pub external_id: String,

    pub credential: CredentialParams,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IssueCredentialResponse {
    #[serde(rename = "credentialID")]
    pub credential_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestPresentationRequest {
    pub agent: String,

    #[serde(rename = "externalID")]
    pub external_id: String,

    pub presentation: ProofRequest,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestPresentationResponse {
    #[serde(rename = "presentationID")]
    pub presentation_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct GetAgentInvitationRequest {
    pub agent: String,

    #[serde(rename = "externalID")]
    pub external_id: String,

    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvitationResponse {
    /// invitation is the JSON encoded invitation handed to the subject
    pub invitation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AcceptInvitationRequest {
    pub agent: String,

    #[serde(rename = "externalID")]
    pub external_id: String,

    #[serde(default)]
    pub name: String,

    pub invitation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PresentationRequestDetail {
    pub request: PresentationRequest,
    pub presentations: Vec<Presentation>,
}

/// `AdminAPI` is the operator surface of the hub
///
/// Every method fails with the [`HubError`] taxonomy, the RPC layer only translates it
#[async_trait]
pub trait AdminAPI: Send + Sync {
    async fn create_agent(&self, req: CreateAgentRequest) -> Result<CreateAgentResponse, HubError>;
    async fn list_agents(&self, req: ListRequest) -> Result<ListAgentResponse, HubError>;
    async fn get_agent(&self, name: String) -> Result<Agent, HubError>;
    async fn update_agent(&self, req: UpdateAgentRequest) -> Result<Agent, HubError>;
    async fn delete_agent(&self, name: String) -> Result<(), HubError>;

    async fn watch_agents(&self) -> Result<AgentWatch, HubError>;
    async fn unwatch_agents(&self, id: String) -> Result<(), HubError>;

    async fn create_schema(
        &self,
        req: CreateSchemaRequest,
    ) -> Result<CreateSchemaResponse, HubError>;
    async fn list_schemas(&self, req: ListRequest) -> Result<ListSchemaResponse, HubError>;
    async fn get_schema(&self, id: String) -> Result<Schema, HubError>;
    async fn update_schema(&self, req: CreateSchemaRequest) -> Result<Schema, HubError>;
    async fn delete_schema(&self, id: String) -> Result<(), HubError>;

    async fn issue_credential(
        &self,
        req: IssueCredentialRequest,
    ) -> Result<IssueCredentialResponse, HubError>;
    async fn request_presentation(
        &self,
        req: RequestPresentationRequest,
    ) -> Result<RequestPresentationResponse, HubError>;

    async fn get_agent_invitation(
        &self,
        req: GetAgentInvitationRequest,
    ) -> Result<InvitationResponse, HubError>;
    async fn accept_invitation(&self, req: AcceptInvitationRequest) -> Result<(), HubError>;

    async fn seed_public_did(&self, seed: String) -> Result<DID, HubError>;
    async fn list_dids(&self) -> Result<Vec<DID>, HubError>;

    async fn list_connections(&self, agent: String) -> Result<Vec<AgentConnection>, HubError>;
    async fn delete_connection(&self, agent: String, external_id: String)
        -> Result<(), HubError>;

    async fn list_credentials(
        &self,
        agent: Option<String>,
    ) -> Result<Vec<IssuedCredential>, HubError>;
    async fn get_credential(&self, id: String) -> Result<IssuedCredential, HubError>;
    async fn get_presentation_request(
        &self,
        id: String,
    ) -> Result<PresentationRequestDetail, HubError>;

    async fn add_webhook(&self, topic: String, url: String) -> Result<Webhook, HubError>;
    async fn list_webhooks(&self, topic: String) -> Result<Vec<Webhook>, HubError>;
    async fn delete_webhook(&self, topic: String) -> Result<usize, HubError>;
}
