use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use log::{debug, info, warn};

use crate::common::types::HubError;
use crate::didcomm::message::{pair_formats, MessageType};
use crate::didcomm::protocol::issuecredential::{
    IssueCredential, OfferCredential, ACK as CREDENTIAL_ACK, ISSUE_CREDENTIAL, OFFER_CREDENTIAL,
};
use crate::didcomm::protocol::presentproof::{RequestPresentation, REQUEST_PRESENTATION};
use crate::didcomm::protocol::Ack;
use crate::didcomm::types::{Destination, Outbound};
use crate::store::types::{StoreError, Transition};
use crate::store::Store;
use crate::worker::types::{Inbound, ProtocolHandler};

use super::types::*;

/// HolderHandler takes the holder side messages addressed to cloud agent connections
///
/// Offers and proof requests are parked until the edge wallet acts on them through the bridge,
/// issued credentials are stored and acknowledged right away
#[derive(Clone)]
pub struct HolderHandler {
    store: Store,
    outbound: Arc<dyn Outbound>,
}

impl HolderHandler {
    pub fn new(store: Store, outbound: Arc<dyn Outbound>) -> Self {
        Self { store, outbound }
    }

    async fn connection(&self, inbound: &Inbound) -> Result<Option<CloudAgentConnection>, HubError> {
        Ok(self
            .store
            .first::<CloudAgentConnection, _>(|conn| conn.joins(&inbound.to_did, &inbound.from_did))
            .await?)
    }

    async fn on_offer(&self, inbound: &Inbound) -> Result<(), HubError> {
        let Some(conn) = self.connection(inbound).await? else {
            debug!("offer from {} is not for a cloud agent", inbound.from_did);
            return Ok(());
        };

        let offer: OfferCredential = inbound.message.decode()?;
        let (format, attachment) = pair_formats(&offer.formats, &offer.offers_attach)
            .into_iter()
            .next()
            .ok_or_else(|| HubError::InvalidArgument("offer without attachment".to_string()))?;

        let cred = CloudAgentCredential {
            id: inbound.thread_id(),
            cloud_agent_id: conn.cloud_agent_id.clone(),
            state: CloudCredentialState::Offered,
            format: format.format.clone(),
            my_did: inbound.to_did.clone(),
            their_did: inbound.from_did.clone(),
            issuer_connection_id: conn.connection_id.clone().unwrap_or_default(),
            issuer_label: conn.their_label.clone(),
            comment: offer.comment.clone(),
            preview: offer.credential_preview.attributes.clone(),
            offer: attachment.fetch()?,
            credential: None,
            updated_at: Utc::now(),
        };

        match self.store.insert(&cred).await {
            Ok(()) => {
                info!("credential offer {} held for cloud agent {}", cred.id, cred.cloud_agent_id);
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!("duplicate offer {}", cred.id);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn on_issue(&self, inbound: &Inbound) -> Result<(), HubError> {
        let thid = inbound.thread_id();
        let belongs = |cred: &CloudAgentCredential| {
            cred.my_did == inbound.to_did && cred.their_did == inbound.from_did
        };

        let Some(cred) = self.store.find::<CloudAgentCredential>(&thid).await? else {
            debug!("credential {} is not held for a cloud agent", thid);
            return Ok(());
        };
        if !belongs(&cred) {
            warn!("credential {} arrived from an unexpected peer {}", thid, inbound.from_did);
            return Ok(());
        }

        let issued: IssueCredential = inbound.message.decode()?;
        let attachment = pair_formats(&issued.formats, &issued.credentials_attach)
            .into_iter()
            .next()
            .map(|(_, attachment)| attachment)
            .ok_or_else(|| HubError::InvalidArgument("credential without attachment".to_string()))?;
        let encoded = STANDARD.encode(attachment.fetch()?);

        let transition = self
            .store
            .transition::<CloudAgentCredential, _, _>(
                &thid,
                |current| current.state == CloudCredentialState::Accepted,
                |mut current| {
                    current.state = CloudCredentialState::Issued;
                    current.credential = Some(encoded.clone());
                    current.updated_at = Utc::now();
                    current
                },
            )
            .await?;

        match transition {
            Transition::Applied(_) => info!("credential {} issued to cloud agent", thid),
            Transition::Rejected(current) if current.state == CloudCredentialState::Issued => {
                debug!("duplicate credential {}, acknowledging again", thid)
            }
            Transition::Rejected(current) => {
                debug!("credential {} ignored in state {}", thid, current.state);
                return Ok(());
            }
        }

        let ack = Ack::ok().into_message(CREDENTIAL_ACK, &thid);
        self.outbound
            .send(&ack, &Destination::new(&inbound.to_did, &inbound.from_did))
            .await?;
        Ok(())
    }

    async fn on_request_presentation(&self, inbound: &Inbound) -> Result<(), HubError> {
        let Some(conn) = self.connection(inbound).await? else {
            debug!("proof request from {} is not for a cloud agent", inbound.from_did);
            return Ok(());
        };

        let request: RequestPresentation = inbound.message.decode()?;
        let (format, attachment) =
            pair_formats(&request.formats, &request.request_presentations_attach)
                .into_iter()
                .next()
                .ok_or_else(|| {
                    HubError::InvalidArgument("proof request without attachment".to_string())
                })?;

        let proof_request = CloudAgentProofRequest {
            id: inbound.thread_id(),
            cloud_agent_id: conn.cloud_agent_id,
            state: CloudProofState::Requested,
            comment: request.comment.clone(),
            format: format.format.clone(),
            request: attachment.fetch()?,
            my_did: inbound.to_did.clone(),
            their_did: inbound.from_did.clone(),
            updated_at: Utc::now(),
        };

        match self.store.insert(&proof_request).await {
            Ok(()) | Err(StoreError::AlreadyExists(_)) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl ProtocolHandler for HolderHandler {
    fn accept(&self, msg_type: &MessageType) -> bool {
        matches!(
            msg_type.to_string().as_str(),
            OFFER_CREDENTIAL | ISSUE_CREDENTIAL | REQUEST_PRESENTATION
        )
    }

    async fn handle(&self, inbound: Inbound) -> Result<(), HubError> {
        match inbound.message.msg_type.as_str() {
            OFFER_CREDENTIAL => self.on_offer(&inbound).await,
            ISSUE_CREDENTIAL => self.on_issue(&inbound).await,
            REQUEST_PRESENTATION => self.on_request_presentation(&inbound).await,
            other => {
                debug!("holder ignores {}", other);
                Ok(())
            }
        }
    }
}
