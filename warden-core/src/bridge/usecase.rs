use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::Utc;
use log::{info, warn};

use crate::common::types::HubError;
use crate::connection::bouncer::{Bouncer, Connection, Notify};
use crate::did::DID;
use crate::didcomm::message::{AttachFormat, Attachment, Message};
use crate::didcomm::protocol::didexchange::Invitation;
use crate::didcomm::protocol::issuecredential::{RequestCredential, REQUEST_CREDENTIAL};
use crate::didcomm::protocol::presentproof::{Presentation, PRESENTATION};
use crate::didcomm::types::{Destination, Outbound};
use crate::engine::{CredentialRegistry, PresentationRegistry};
use crate::store::types::Transition;
use crate::store::Store;

use super::auth::verify_request;
use super::types::*;

const REQUEST_ATTACH_ID: &str = "request-0";
const PRESENTATION_ATTACH_ID: &str = "presentation-0";
const MIME_JSON: &str = "application/json";
const PUBLIC_KEY_LENGTH: usize = 32;

/// Bridge implements [`BridgeAPI`], it acts as the holder for every registered cloud agent
#[derive(Clone)]
pub struct Bridge {
    store: Store,
    bouncer: Bouncer,
    credentials: CredentialRegistry,
    presentations: PresentationRegistry,
    outbound: Arc<dyn Outbound>,
    secret: String,
}

impl Bridge {
    pub fn new(
        store: Store,
        bouncer: Bouncer,
        credentials: CredentialRegistry,
        presentations: PresentationRegistry,
        outbound: Arc<dyn Outbound>,
        secret: &str,
    ) -> Self {
        Self {
            store,
            bouncer,
            credentials,
            presentations,
            outbound,
            secret: secret.to_string(),
        }
    }

    fn parse_invitation(raw: &str) -> Result<Invitation, HubError> {
        let raw = raw.trim();
        if let Ok(invitation) = serde_json::from_str::<Invitation>(raw) {
            return Ok(invitation);
        }

        let decoded = URL_SAFE
            .decode(raw)
            .or_else(|_| URL_SAFE_NO_PAD.decode(raw))
            .map_err(|_| {
                HubError::InvalidArgument("invitation is neither JSON nor base64url".to_string())
            })?;

        serde_json::from_slice(&decoded)
            .map_err(|err| HubError::InvalidArgument(format!("invalid invitation: {}", err)))
    }

    async fn holder_did(&self, my_did: &str) -> Result<DID, HubError> {
        self.store
            .find::<DID>(my_did)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("DID {}", my_did)))
    }

    async fn owned_credential(
        &self,
        agent: &CloudAgent,
        id: &str,
    ) -> Result<CloudAgentCredential, HubError> {
        self.store
            .find::<CloudAgentCredential>(id)
            .await?
            .filter(|cred| cred.cloud_agent_id == agent.id)
            .ok_or_else(|| HubError::NotFound(format!("credential {}", id)))
    }

    fn accepted_notify(&self, cloud_agent_id: &str) -> Notify {
        let store = self.store.clone();
        let cloud_agent_id = cloud_agent_id.to_string();

        Notify::new(
            move |invitation_id: String, conn: Connection| async move {
                let key = cloud_connection_key(&cloud_agent_id, &invitation_id);
                let transition = store
                    .transition::<CloudAgentConnection, _, _>(
                        &key,
                        |current| current.status == CloudConnectionStatus::Requested,
                        |mut current| {
                            current.status = CloudConnectionStatus::Accepted;
                            current.my_did = Some(conn.my_did.clone());
                            current.their_did = Some(conn.their_did.clone());
                            current.their_label = conn.their_label.clone();
                            current.connection_id = Some(conn.id.clone());
                            current.updated_at = Utc::now();
                            current
                        },
                    )
                    .await?;

                if let Transition::Applied(_) = transition {
                    info!("cloud agent {} connected to {}", cloud_agent_id, conn.their_did);
                }
                Ok(())
            },
            |invitation_id: String, reason: String| async move {
                warn!("cloud agent invitation {} failed: {}", invitation_id, reason);
                Ok(())
            },
        )
    }
}

#[async_trait]
impl BridgeAPI for Bridge {
    async fn register(
        &self,
        req: RegisterCloudAgentRequest,
    ) -> Result<RegisterCloudAgentResponse, HubError> {
        if req.secret != self.secret {
            return Err(HubError::Unauthenticated("invalid cloud agent secret".to_string()));
        }

        if req.external_id.is_empty() {
            return Err(HubError::InvalidArgument("externalID is missing".to_string()));
        }

        if req.public_key.len() != PUBLIC_KEY_LENGTH {
            return Err(HubError::InvalidArgument(format!(
                "publicKey must be {} bytes",
                PUBLIC_KEY_LENGTH
            )));
        }

        let taken = self
            .store
            .first::<CloudAgent, _>(|agent| agent.external_id == req.external_id)
            .await?;
        if taken.is_some() {
            return Err(HubError::AlreadyExists(format!(
                "cloud agent {}",
                req.external_id
            )));
        }

        let agent = CloudAgent::new(&req.external_id, req.public_key, req.next_key);
        self.store.insert(&agent).await?;

        info!("cloud agent {} registered as {}", agent.external_id, agent.id);
        Ok(RegisterCloudAgentResponse {
            cloud_agent_id: agent.id,
        })
    }

    async fn authenticate(
        &self,
        cloud_agent_id: &str,
        signature: &str,
        signed: &[u8],
    ) -> Result<CloudAgent, HubError> {
        if cloud_agent_id.is_empty() || signature.is_empty() {
            return Err(HubError::Unauthenticated("missing cloud agent headers".to_string()));
        }

        let agent = self
            .store
            .find::<CloudAgent>(cloud_agent_id)
            .await?
            .ok_or_else(|| HubError::Unauthenticated(format!("unknown agent {}", cloud_agent_id)))?;

        verify_request(&agent, signed, signature)?;
        Ok(agent)
    }

    async fn handle_invitation(
        &self,
        agent: &CloudAgent,
        req: HandleInvitationRequest,
    ) -> Result<(), HubError> {
        let invitation = Self::parse_invitation(&req.invitation)?;

        let conn = CloudAgentConnection::requested(&agent.id, &invitation.id, &invitation.label);
        self.store.insert(&conn).await?;

        self.bouncer
            .establish_connection_notify(
                &invitation,
                &agent.external_id,
                self.accepted_notify(&agent.id),
            )
            .await?;
        Ok(())
    }

    async fn list_connections(
        &self,
        agent: &CloudAgent,
    ) -> Result<Vec<CloudAgentConnection>, HubError> {
        Ok(self
            .store
            .filter::<CloudAgentConnection, _>(|conn| conn.cloud_agent_id == agent.id)
            .await?)
    }

    async fn list_credentials(
        &self,
        agent: &CloudAgent,
    ) -> Result<Vec<CloudAgentCredential>, HubError> {
        Ok(self
            .store
            .filter::<CloudAgentCredential, _>(|cred| cred.cloud_agent_id == agent.id)
            .await?)
    }

    async fn accept_credential(
        &self,
        agent: &CloudAgent,
        credential_id: &str,
    ) -> Result<CloudAgentCredential, HubError> {
        let cred = self.owned_credential(agent, credential_id).await?;
        if cred.state != CloudCredentialState::Offered {
            return Err(HubError::FailedPrecondition(format!(
                "credential {} is already {}",
                cred.id, cred.state
            )));
        }

        let holder = self.holder_did(&cred.my_did).await?;
        let engine = self.credentials.resolve(&cred.format)?;
        let request = engine.create_credential_request(&holder, &cred.offer).await?;

        let message = Message::build(
            REQUEST_CREDENTIAL,
            &RequestCredential {
                comment: cred.comment.clone(),
                formats: vec![AttachFormat {
                    attach_id: REQUEST_ATTACH_ID.to_string(),
                    format: cred.format.clone(),
                }],
                requests_attach: vec![Attachment::base64(REQUEST_ATTACH_ID, MIME_JSON, &request)],
            },
        )?
        .with_thread(&cred.id);

        let accepted = match self
            .store
            .transition::<CloudAgentCredential, _, _>(
                &cred.id,
                |current| current.state == CloudCredentialState::Offered,
                |mut current| {
                    current.state = CloudCredentialState::Accepted;
                    current.updated_at = Utc::now();
                    current
                },
            )
            .await?
        {
            Transition::Applied(accepted) => accepted,
            Transition::Rejected(current) => {
                return Err(HubError::FailedPrecondition(format!(
                    "credential {} is already {}",
                    current.id, current.state
                )))
            }
        };

        self.outbound
            .send(&message, &Destination::new(&cred.my_did, &cred.their_did))
            .await?;

        info!("cloud agent {} accepted credential {}", agent.id, cred.id);
        Ok(accepted)
    }

    async fn list_proof_requests(
        &self,
        agent: &CloudAgent,
    ) -> Result<Vec<CloudAgentProofRequest>, HubError> {
        Ok(self
            .store
            .filter::<CloudAgentProofRequest, _>(|req| req.cloud_agent_id == agent.id)
            .await?)
    }

    async fn present_proof(
        &self,
        agent: &CloudAgent,
        proof_request_id: &str,
        req: PresentProofRequest,
    ) -> Result<CloudAgentProofRequest, HubError> {
        let proof_request = self
            .store
            .find::<CloudAgentProofRequest>(proof_request_id)
            .await?
            .filter(|pr| pr.cloud_agent_id == agent.id)
            .ok_or_else(|| HubError::NotFound(format!("proof request {}", proof_request_id)))?;

        if proof_request.state != CloudProofState::Requested {
            return Err(HubError::FailedPrecondition(format!(
                "proof request {} is already presented",
                proof_request.id
            )));
        }

        let cred = self.owned_credential(agent, &req.credential_id).await?;
        let issued = match (&cred.state, &cred.credential) {
            (CloudCredentialState::Issued, Some(encoded)) => STANDARD
                .decode(encoded)
                .map_err(|err| HubError::Internal(err.to_string()))?,
            _ => {
                return Err(HubError::FailedPrecondition(format!(
                    "credential {} is not issued",
                    cred.id
                )))
            }
        };

        let holder = self.holder_did(&proof_request.my_did).await?;
        let engine = self.presentations.resolve(&proof_request.format)?;
        let presentation = engine
            .create_presentation(&holder, &proof_request.request, &[issued])
            .await?;

        let message = Message::build(
            PRESENTATION,
            &Presentation {
                comment: None,
                formats: vec![AttachFormat {
                    attach_id: PRESENTATION_ATTACH_ID.to_string(),
                    format: proof_request.format.clone(),
                }],
                presentations_attach: vec![Attachment::base64(
                    PRESENTATION_ATTACH_ID,
                    MIME_JSON,
                    &presentation,
                )],
            },
        )?
        .with_thread(&proof_request.id);

        let presented = match self
            .store
            .transition::<CloudAgentProofRequest, _, _>(
                &proof_request.id,
                |current| current.state == CloudProofState::Requested,
                |mut current| {
                    current.state = CloudProofState::Presented;
                    current.updated_at = Utc::now();
                    current
                },
            )
            .await?
        {
            Transition::Applied(presented) => presented,
            Transition::Rejected(_) => {
                return Err(HubError::FailedPrecondition(format!(
                    "proof request {} is already presented",
                    proof_request.id
                )))
            }
        };

        self.outbound
            .send(
                &message,
                &Destination::new(&proof_request.my_did, &proof_request.their_did),
            )
            .await?;

        info!("cloud agent {} presented proof {}", agent.id, proof_request.id);
        Ok(presented)
    }
}
