use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use prople_warden_core::common::types::HubError;
use prople_warden_core::common::with_deadline;
use prople_warden_core::control::AdminAPI;

use crate::rpc::shared::rpc::processor::value_of;
use crate::rpc::shared::rpc::types::{RpcError, RpcHandler, RpcHandlerOutput, RpcMethod};

use super::rpc_method::Method;
use super::rpc_param::Param;

/// AdminHandler exposes an [`AdminAPI`] implementation as JSON-RPC methods
///
/// Every call is bounded by `deadline`, an expired call answers with the `DeadlineExceeded` code
#[derive(Clone)]
pub struct AdminHandler<TAdmin>
where
    TAdmin: AdminAPI,
{
    admin_api: TAdmin,
    deadline: Duration,
}

impl<TAdmin> AdminHandler<TAdmin>
where
    TAdmin: AdminAPI,
{
    pub fn new(admin_api: TAdmin, deadline: Duration) -> Self {
        Self {
            admin_api,
            deadline,
        }
    }

    async fn run<T, F>(&self, operation: F) -> RpcHandlerOutput
    where
        T: Serialize,
        F: Future<Output = Result<T, HubError>>,
    {
        let result = with_deadline(self.deadline, operation).await?;
        value_of(result)
    }

    async fn dispatch(&self, method: Method, param: Param) -> RpcHandlerOutput {
        let api = &self.admin_api;

        match (method, param) {
            (Method::CreateAgent, Param::CreateAgent(req)) => self.run(api.create_agent(req)).await,
            (Method::ListAgents, Param::ListAgents(req)) => self.run(api.list_agents(req)).await,
            (Method::GetAgent, Param::GetAgent { name }) => self.run(api.get_agent(name)).await,
            (Method::UpdateAgent, Param::UpdateAgent(req)) => {
                self.run(api.update_agent(req)).await
            }
            (Method::DeleteAgent, Param::DeleteAgent { name }) => {
                self.run(api.delete_agent(name)).await
            }
            (Method::UnwatchAgents, Param::UnwatchAgents { id }) => {
                self.run(api.unwatch_agents(id)).await
            }
            (Method::GetAgentInvitation, Param::GetAgentInvitation(req)) => {
                self.run(api.get_agent_invitation(req)).await
            }
            (Method::AcceptInvitation, Param::AcceptInvitation(req)) => {
                self.run(api.accept_invitation(req)).await
            }
            (Method::CreateSchema, Param::CreateSchema(req)) => {
                self.run(api.create_schema(req)).await
            }
            (Method::ListSchemas, Param::ListSchemas(req)) => self.run(api.list_schemas(req)).await,
            (Method::GetSchema, Param::GetSchema { id }) => self.run(api.get_schema(id)).await,
            (Method::UpdateSchema, Param::UpdateSchema(req)) => {
                self.run(api.update_schema(req)).await
            }
            (Method::DeleteSchema, Param::DeleteSchema { id }) => {
                self.run(api.delete_schema(id)).await
            }
            (Method::IssueCredential, Param::IssueCredential(req)) => {
                self.run(api.issue_credential(req)).await
            }
            (Method::ListCredentials, Param::ListCredentials { agent }) => {
                self.run(api.list_credentials(agent)).await
            }
            (Method::GetCredential, Param::GetCredential { id }) => {
                self.run(api.get_credential(id)).await
            }
            (Method::RequestPresentation, Param::RequestPresentation(req)) => {
                self.run(api.request_presentation(req)).await
            }
            (Method::GetPresentationRequest, Param::GetPresentationRequest { id }) => {
                self.run(api.get_presentation_request(id)).await
            }
            (Method::SeedPublicDID, Param::SeedPublicDID { seed }) => {
                self.run(api.seed_public_did(seed)).await
            }
            (Method::ListDIDs, Param::ListDIDs) => self.run(api.list_dids()).await,
            (Method::ListConnections, Param::ListConnections { agent }) => {
                self.run(api.list_connections(agent)).await
            }
            (Method::DeleteConnection, Param::DeleteConnection { agent, external_id }) => {
                self.run(api.delete_connection(agent, external_id)).await
            }
            (Method::AddWebhook, Param::AddWebhook { topic, url }) => {
                self.run(api.add_webhook(topic, url)).await
            }
            (Method::ListWebhooks, Param::ListWebhooks { topic }) => {
                self.run(api.list_webhooks(topic)).await
            }
            (Method::DeleteWebhook, Param::DeleteWebhook { topic }) => {
                self.run(api.delete_webhook(topic)).await
            }
            _ => Err(RpcError::InvalidParams),
        }
    }
}

#[async_trait]
impl<TAdmin> RpcHandler for AdminHandler<TAdmin>
where
    TAdmin: AdminAPI,
{
    async fn call(&self, method: RpcMethod, params: Option<Value>) -> RpcHandlerOutput {
        let rpc_method = Method::try_from(method).map_err(|_| RpcError::MethodNotFound)?;
        let rpc_param = match params {
            Some(value) => Param::try_from(value).map_err(|_| RpcError::InvalidParams)?,
            None if rpc_method == Method::ListDIDs => Param::ListDIDs,
            None => return Err(RpcError::InvalidParams),
        };

        self.dispatch(rpc_method, rpc_param).await
    }
}
