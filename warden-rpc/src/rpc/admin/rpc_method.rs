use crate::common::types::CommonError;
use crate::rpc::shared::rpc::method::{RpcMethodBuilder, RPC_METHOD_PREFIX};
use crate::rpc::shared::rpc::types::RpcMethod;

const METHOD_CREATE_AGENT: &str = "admin.agent.create";
const METHOD_LIST_AGENTS: &str = "admin.agent.list";
const METHOD_GET_AGENT: &str = "admin.agent.get";
const METHOD_UPDATE_AGENT: &str = "admin.agent.update";
const METHOD_DELETE_AGENT: &str = "admin.agent.delete";
const METHOD_UNWATCH_AGENTS: &str = "admin.agent.unwatch";
const METHOD_GET_AGENT_INVITATION: &str = "admin.agent.get_invitation";
const METHOD_ACCEPT_INVITATION: &str = "admin.agent.accept_invitation";

const METHOD_CREATE_SCHEMA: &str = "admin.schema.create";
const METHOD_LIST_SCHEMAS: &str = "admin.schema.list";
const METHOD_GET_SCHEMA: &str = "admin.schema.get";
const METHOD_UPDATE_SCHEMA: &str = "admin.schema.update";
const METHOD_DELETE_SCHEMA: &str = "admin.schema.delete";

const METHOD_ISSUE_CREDENTIAL: &str = "admin.credential.issue";
const METHOD_LIST_CREDENTIALS: &str = "admin.credential.list";
const METHOD_GET_CREDENTIAL: &str = "admin.credential.get";

const METHOD_REQUEST_PRESENTATION: &str = "admin.presentation.request";
const METHOD_GET_PRESENTATION_REQUEST: &str = "admin.presentation.get_request";

const METHOD_SEED_PUBLIC_DID: &str = "admin.did.seed_public";
const METHOD_LIST_DIDS: &str = "admin.did.list";

const METHOD_LIST_CONNECTIONS: &str = "admin.connection.list";
const METHOD_DELETE_CONNECTION: &str = "admin.connection.delete";

const METHOD_ADD_WEBHOOK: &str = "admin.webhook.add";
const METHOD_LIST_WEBHOOKS: &str = "admin.webhook.list";
const METHOD_DELETE_WEBHOOK: &str = "admin.webhook.delete";

#[derive(Clone, Debug, PartialEq)]
pub enum Method {
    CreateAgent,
    ListAgents,
    GetAgent,
    UpdateAgent,
    DeleteAgent,
    UnwatchAgents,
    GetAgentInvitation,
    AcceptInvitation,
    CreateSchema,
    ListSchemas,
    GetSchema,
    UpdateSchema,
    DeleteSchema,
    IssueCredential,
    ListCredentials,
    GetCredential,
    RequestPresentation,
    GetPresentationRequest,
    SeedPublicDID,
    ListDIDs,
    ListConnections,
    DeleteConnection,
    AddWebhook,
    ListWebhooks,
    DeleteWebhook,
}

impl Method {
    pub fn all() -> Vec<Method> {
        vec![
            Method::CreateAgent,
            Method::ListAgents,
            Method::GetAgent,
            Method::UpdateAgent,
            Method::DeleteAgent,
            Method::UnwatchAgents,
            Method::GetAgentInvitation,
            Method::AcceptInvitation,
            Method::CreateSchema,
            Method::ListSchemas,
            Method::GetSchema,
            Method::UpdateSchema,
            Method::DeleteSchema,
            Method::IssueCredential,
            Method::ListCredentials,
            Method::GetCredential,
            Method::RequestPresentation,
            Method::GetPresentationRequest,
            Method::SeedPublicDID,
            Method::ListDIDs,
            Method::ListConnections,
            Method::DeleteConnection,
            Method::AddWebhook,
            Method::ListWebhooks,
            Method::DeleteWebhook,
        ]
    }
}

impl RpcMethodBuilder for Method {
    fn build_path(&self) -> &str {
        match self {
            Method::CreateAgent => METHOD_CREATE_AGENT,
            Method::ListAgents => METHOD_LIST_AGENTS,
            Method::GetAgent => METHOD_GET_AGENT,
            Method::UpdateAgent => METHOD_UPDATE_AGENT,
            Method::DeleteAgent => METHOD_DELETE_AGENT,
            Method::UnwatchAgents => METHOD_UNWATCH_AGENTS,
            Method::GetAgentInvitation => METHOD_GET_AGENT_INVITATION,
            Method::AcceptInvitation => METHOD_ACCEPT_INVITATION,
            Method::CreateSchema => METHOD_CREATE_SCHEMA,
            Method::ListSchemas => METHOD_LIST_SCHEMAS,
            Method::GetSchema => METHOD_GET_SCHEMA,
            Method::UpdateSchema => METHOD_UPDATE_SCHEMA,
            Method::DeleteSchema => METHOD_DELETE_SCHEMA,
            Method::IssueCredential => METHOD_ISSUE_CREDENTIAL,
            Method::ListCredentials => METHOD_LIST_CREDENTIALS,
            Method::GetCredential => METHOD_GET_CREDENTIAL,
            Method::RequestPresentation => METHOD_REQUEST_PRESENTATION,
            Method::GetPresentationRequest => METHOD_GET_PRESENTATION_REQUEST,
            Method::SeedPublicDID => METHOD_SEED_PUBLIC_DID,
            Method::ListDIDs => METHOD_LIST_DIDS,
            Method::ListConnections => METHOD_LIST_CONNECTIONS,
            Method::DeleteConnection => METHOD_DELETE_CONNECTION,
            Method::AddWebhook => METHOD_ADD_WEBHOOK,
            Method::ListWebhooks => METHOD_LIST_WEBHOOKS,
            Method::DeleteWebhook => METHOD_DELETE_WEBHOOK,
        }
    }
}

impl TryFrom<RpcMethod> for Method {
    type Error = CommonError;

    fn try_from(value: RpcMethod) -> Result<Self, Self::Error> {
        let given = value.to_string();
        let path = given
            .strip_prefix(RPC_METHOD_PREFIX)
            .and_then(|rest| rest.strip_prefix('.'))
            .ok_or_else(|| CommonError::MethodError(format!("unknown method: {}", given)))?;

        // names share prefixes (agent.get, agent.get_invitation), only exact paths match
        Method::all()
            .into_iter()
            .find(|method| method.build_path() == path)
            .ok_or_else(|| CommonError::MethodError(format!("unknown method: {}", given)))
    }
}
