use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;

use prople_warden_core::bridge::types::{
    HandleInvitationRequest, PresentProofRequest, RegisterCloudAgentRequest,
    RegisterCloudAgentResponse,
};
use prople_warden_core::bridge::{
    signed_payload, BridgeAPI, CloudAgent, CloudAgentConnection, CloudAgentCredential,
    CloudAgentProofRequest, HEADER_CLOUD_AGENT_ID, HEADER_CLOUD_AGENT_SIGNATURE,
};
use prople_warden_core::common::types::HubError;

use super::server::{self, ApiError};

#[derive(Clone)]
pub struct BridgeState {
    bridge: Arc<dyn BridgeAPI>,
}

/// Signed is an inbound request whose signature headers still have to be checked
struct Signed<'a> {
    method: &'a Method,
    uri: &'a Uri,
    headers: &'a HeaderMap,
    body: &'a [u8],
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, HubError> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| HubError::Unauthenticated(format!("missing header {}", name)))
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, HubError> {
    serde_json::from_slice(body).map_err(|err| HubError::InvalidArgument(err.to_string()))
}

impl BridgeState {
    async fn authenticate(&self, request: Signed<'_>) -> Result<CloudAgent, HubError> {
        let cloud_agent_id = header(request.headers, HEADER_CLOUD_AGENT_ID)?;
        let signature = header(request.headers, HEADER_CLOUD_AGENT_SIGNATURE)?;
        let signed = signed_payload(request.method.as_str(), request.uri.path(), request.body);

        self.bridge
            .authenticate(cloud_agent_id, signature, signed)
            .await
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn register(
    State(state): State<BridgeState>,
    body: Bytes,
) -> Result<Json<RegisterCloudAgentResponse>, ApiError> {
    let req: RegisterCloudAgentRequest = parse_body(&body)?;
    Ok(Json(state.bridge.register(req).await?))
}

async fn handle_invitation(
    State(state): State<BridgeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<()>, ApiError> {
    let agent = state
        .authenticate(Signed {
            method: &method,
            uri: &uri,
            headers: &headers,
            body: &body,
        })
        .await?;

    let req: HandleInvitationRequest = parse_body(&body)?;
    state.bridge.handle_invitation(&agent, req).await?;
    Ok(Json(()))
}

async fn list_connections(
    State(state): State<BridgeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Vec<CloudAgentConnection>>, ApiError> {
    let agent = state
        .authenticate(Signed {
            method: &method,
            uri: &uri,
            headers: &headers,
            body: &[],
        })
        .await?;

    Ok(Json(state.bridge.list_connections(&agent).await?))
}

async fn list_credentials(
    State(state): State<BridgeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Vec<CloudAgentCredential>>, ApiError> {
    let agent = state
        .authenticate(Signed {
            method: &method,
            uri: &uri,
            headers: &headers,
            body: &[],
        })
        .await?;

    Ok(Json(state.bridge.list_credentials(&agent).await?))
}

async fn accept_credential(
    State(state): State<BridgeState>,
    Path(credential_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CloudAgentCredential>, ApiError> {
    let agent = state
        .authenticate(Signed {
            method: &method,
            uri: &uri,
            headers: &headers,
            body: &body,
        })
        .await?;

    Ok(Json(
        state
            .bridge
            .accept_credential(&agent, &credential_id)
            .await?,
    ))
}

async fn list_proofs(
    State(state): State<BridgeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Json<Vec<CloudAgentProofRequest>>, ApiError> {
    let agent = state
        .authenticate(Signed {
            method: &method,
            uri: &uri,
            headers: &headers,
            body: &[],
        })
        .await?;

    Ok(Json(state.bridge.list_proof_requests(&agent).await?))
}

async fn present_proof(
    State(state): State<BridgeState>,
    Path(proof_request_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CloudAgentProofRequest>, ApiError> {
    let agent = state
        .authenticate(Signed {
            method: &method,
            uri: &uri,
            headers: &headers,
            body: &body,
        })
        .await?;

    let req: PresentProofRequest = parse_body(&body)?;
    Ok(Json(
        state
            .bridge
            .present_proof(&agent, &proof_request_id, req)
            .await?,
    ))
}

pub fn routes<TBridge>(bridge: TBridge, timeout: Duration) -> Router
where
    TBridge: BridgeAPI + 'static,
{
    let state = BridgeState {
        bridge: Arc::new(bridge),
    };

    let app = Router::new()
        .route("/", get(health))
        .route("/cloudagents", post(register))
        .route("/invitations", post(handle_invitation))
        .route("/connections", get(list_connections))
        .route("/credentials", get(list_credentials))
        .route("/credentials/{id}/accept", post(accept_credential))
        .route("/proofs", get(list_proofs))
        .route("/proofs/{id}/present", post(present_proof));

    server::layered(app, timeout).with_state(state)
}
