use serde::{Deserialize, Serialize};
use serde_json::Value;

use prople_warden_core::control::types::{
    AcceptInvitationRequest, CreateAgentRequest, CreateSchemaRequest, GetAgentInvitationRequest,
    IssueCredentialRequest, ListRequest, RequestPresentationRequest, UpdateAgentRequest,
};

use crate::common::types::CommonError;

/// Param is the `params` member of every admin call, e.g.
/// `{"param": "GetAgent", "payload": {"name": "alice"}}`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "param", content = "payload")]
pub enum Param {
    CreateAgent(CreateAgentRequest),
    ListAgents(ListRequest),
    GetAgent {
        name: String,
    },
    UpdateAgent(UpdateAgentRequest),
    DeleteAgent {
        name: String,
    },
    UnwatchAgents {
        id: String,
    },
    GetAgentInvitation(GetAgentInvitationRequest),
    AcceptInvitation(AcceptInvitationRequest),
    CreateSchema(CreateSchemaRequest),
    ListSchemas(ListRequest),
    GetSchema {
        id: String,
    },
    UpdateSchema(CreateSchemaRequest),
    DeleteSchema {
        id: String,
    },
    IssueCredential(IssueCredentialRequest),
    ListCredentials {
        #[serde(default)]
        agent: Option<String>,
    },
    GetCredential {
        id: String,
    },
    RequestPresentation(RequestPresentationRequest),
    GetPresentationRequest {
        id: String,
    },
    SeedPublicDID {
        seed: String,
    },
    ListDIDs,
    ListConnections {
        agent: String,
    },
    DeleteConnection {
        agent: String,

        #[serde(rename = "externalID")]
        external_id: String,
    },
    AddWebhook {
        topic: String,
        url: String,
    },
    ListWebhooks {
        topic: String,
    },
    DeleteWebhook {
        topic: String,
    },
}

impl TryFrom<Value> for Param {
    type Error = CommonError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        serde_json::from_value(value).map_err(|err| CommonError::JSONError(err.to_string()))
    }
}
