use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::agent::Agent;
use crate::common::types::HubError;
use crate::connection::{require_completed, AgentConnection};
use crate::did::DID;
use crate::didcomm::message::{pair_formats, Attachment, AttachFormat, Message, MessageType};
use crate::didcomm::protocol::issuecredential::{
    CredentialPreview, IssueCredential, OfferCredential, PreviewAttribute, ProposeCredential,
    RequestCredential, ACK, ISSUE_CREDENTIAL, OFFER_CREDENTIAL, PROBLEM_REPORT,
    PROPOSE_CREDENTIAL, REQUEST_CREDENTIAL,
};
use crate::didcomm::protocol::ProblemReport;
use crate::didcomm::types::{Destination, Outbound};
use crate::engine::types::CredentialValues;
use crate::engine::CredentialRegistry;
use crate::notifier::types::{
    EVENT_ABANDONED, EVENT_DONE, EVENT_ISSUED, EVENT_PROPOSED, TOPIC_CREDENTIALS,
};
use crate::notifier::{emit, Notifier};
use crate::schema::Schema;
use crate::store::types::{StoreError, Transition};
use crate::store::Store;
use crate::worker::types::{Inbound, ProtocolHandler};

use super::credential::IssuedCredential;
use super::types::{poll, IssuanceEvent, IssuanceState, Step};

pub const PROTOCOL: &str = "issue-credential";

const OFFER_ATTACH_ID: &str = "offer-0";
const CREDENTIAL_ATTACH_ID: &str = "credential-0";
const MIME_JSON: &str = "application/json";

/// IssuanceSupervisor drives the issuer side of issue-credential
///
/// Every state change is a guarded transition on the [`IssuedCredential`] document and is
/// written before the matching outbound message is sent
#[derive(Clone)]
pub struct IssuanceSupervisor {
    store: Store,
    engines: CredentialRegistry,
    outbound: Arc<dyn Outbound>,
    notifier: Arc<dyn Notifier>,
}

impl IssuanceSupervisor {
    pub fn new(
        store: Store,
        engines: CredentialRegistry,
        outbound: Arc<dyn Outbound>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            engines,
            outbound,
            notifier,
        }
    }

    /// offer starts an issuance from the control plane
    ///
    /// A pending proposal of the same subject and schema is answered on its own thread,
    /// otherwise a new thread is opened
    pub async fn offer(
        &self,
        agent_name: &str,
        external_id: &str,
        schema_id: &str,
        comment: Option<String>,
        preview: Vec<PreviewAttribute>,
    ) -> Result<IssuedCredential, HubError> {
        let agent = self
            .store
            .find::<Agent>(agent_name)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("agent {}", agent_name)))?;

        let conn = require_completed(&self.store, &agent.name, external_id).await?;
        let (my_did, their_did) = conn.dids().ok_or_else(|| {
            HubError::FailedPrecondition(format!("connection {} has no DIDs", external_id))
        })?;

        let schema = self
            .store
            .find::<Schema>(schema_id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("schema {}", schema_id)))?;

        if preview.is_empty() {
            return Err(HubError::InvalidArgument(
                "credential preview is empty".to_string(),
            ));
        }

        if let Some(unknown) = preview
            .iter()
            .find(|attr| !schema.attributes.is_empty() && !schema.has_attribute(&attr.name))
        {
            return Err(HubError::InvalidArgument(format!(
                "schema {} has no attribute {}",
                schema.id, unknown.name
            )));
        }

        let issuer_did = agent.public_did.clone().unwrap_or_else(|| my_did.clone());
        let issuer = self.store.get::<DID>(&issuer_did).await?;
        let engine = self.engines.resolve(schema.format.as_str())?;

        let values: CredentialValues = preview
            .iter()
            .map(|attr| (attr.name.clone(), attr.value.clone()))
            .collect();
        let offer = engine
            .create_credential_offer(&issuer, &their_did, &schema, &values)
            .await?;

        let proposal = self
            .store
            .first::<IssuedCredential, _>(|cred| {
                cred.agent == agent.name
                    && cred.external_id == external_id
                    && cred.schema_id == schema.id
                    && cred.state == IssuanceState::ProposalReceived
            })
            .await?;

        let protocol_id = proposal
            .as_ref()
            .map(|cred| cred.protocol_id.clone())
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let message = Message::build(
            OFFER_CREDENTIAL,
            &OfferCredential {
                comment: comment.clone(),
                credential_preview: CredentialPreview::new(preview.clone()),
                formats: vec![AttachFormat {
                    attach_id: OFFER_ATTACH_ID.to_string(),
                    format: schema.format.to_string(),
                }],
                offers_attach: vec![Attachment::base64(OFFER_ATTACH_ID, MIME_JSON, &offer.data)],
            },
        )?
        .with_thread(&protocol_id);

        let credential = match proposal {
            Some(proposal) => {
                let transition = self
                    .store
                    .transition::<IssuedCredential, _, _>(
                        &proposal.protocol_id,
                        |current| current.state == IssuanceState::ProposalReceived,
                        |mut current| {
                            current.state = IssuanceState::OfferSent;
                            current.offer_id = Some(offer.offer_id.clone());
                            current.issuer_did = issuer.id.clone();
                            current.preview = preview.clone();
                            current.comment = comment.clone();
                            current.last_outbound = Some(message.clone());
                            current.updated_at = Utc::now();
                            current
                        },
                    )
                    .await?;

                match transition {
                    Transition::Applied(cred) => cred,
                    Transition::Rejected(cred) => {
                        return Err(HubError::FailedPrecondition(format!(
                            "proposal {} moved to {}",
                            cred.protocol_id, cred.state
                        )))
                    }
                }
            }
            None => {
                let mut cred = IssuedCredential::new(
                    &protocol_id,
                    &agent.name,
                    external_id,
                    &schema.id,
                    &my_did,
                    &their_did,
                    IssuanceState::OfferSent,
                )
                .with_issuer(&issuer.id)
                .with_preview(preview)
                .with_comment(comment);

                cred.offer_id = Some(offer.offer_id.clone());
                cred.last_outbound = Some(message.clone());
                self.store.insert(&cred).await?;
                cred
            }
        };

        self.outbound
            .send(&message, &Destination::new(&my_did, &their_did))
            .await?;

        info!(
            "credential offer {} sent to {} for agent {}",
            credential.protocol_id, their_did, agent.name
        );
        Ok(credential)
    }

    /// advance applies `event` to the stored record, `None` means another writer got there first
    async fn advance(
        &self,
        cred: &IssuedCredential,
        event: IssuanceEvent,
        outbound: Option<Message>,
    ) -> Result<Option<IssuedCredential>, HubError> {
        let Step::Advance(next) = poll(cred.state, event) else {
            return Ok(None);
        };

        let expected = cred.state;
        let transition = self
            .store
            .transition::<IssuedCredential, _, _>(
                &cred.protocol_id,
                |current| current.state == expected,
                |mut current| {
                    current.state = next;
                    if let Some(message) = &outbound {
                        current.last_outbound = Some(message.clone());
                    }
                    current.updated_at = Utc::now();
                    current
                },
            )
            .await?;

        match transition {
            Transition::Applied(updated) => Ok(Some(updated)),
            Transition::Rejected(current) => {
                debug!(
                    "credential {} already moved to {}",
                    current.protocol_id, current.state
                );
                Ok(None)
            }
        }
    }

    async fn send(&self, cred: &IssuedCredential, message: &Message) -> Result<(), HubError> {
        self.outbound
            .send(message, &Destination::new(&cred.my_did, &cred.their_did))
            .await?;
        Ok(())
    }

    async fn re_emit(&self, cred: &IssuedCredential) -> Result<(), HubError> {
        match &cred.last_outbound {
            Some(message) => {
                debug!(
                    "re-sending {} for credential {}",
                    message.msg_type, cred.protocol_id
                );
                self.send(cred, message).await
            }
            None => Ok(()),
        }
    }

    async fn abandon(
        &self,
        cred: &IssuedCredential,
        code: &str,
        explain: &str,
    ) -> Result<(), HubError> {
        let report =
            ProblemReport::new(code, explain).into_message(PROBLEM_REPORT, &cred.protocol_id);

        if let Some(abandoned) = self
            .advance(cred, IssuanceEvent::Fail, Some(report.clone()))
            .await?
        {
            warn!("credential {} abandoned: {}", abandoned.protocol_id, explain);
            if let Err(err) = self.send(&abandoned, &report).await {
                warn!("unable to send problem report for {}: {}", abandoned.protocol_id, err);
            }

            emit(
                self.notifier.as_ref(),
                TOPIC_CREDENTIALS,
                EVENT_ABANDONED,
                abandoned.summary(),
            )
            .await;
        }

        Ok(())
    }

    /// lookup finds the record of the inbound thread, messages from anyone but the holder are
    /// dropped
    async fn lookup(&self, inbound: &Inbound) -> Result<Option<IssuedCredential>, HubError> {
        let thid = inbound.thread_id();
        match self.store.find::<IssuedCredential>(&thid).await? {
            Some(cred) if cred.their_did == inbound.from_did => Ok(Some(cred)),
            Some(_) => {
                warn!("{} on {} from an unexpected DID", inbound.msg_type, thid);
                Ok(None)
            }
            None => {
                warn!("{} on unknown thread {}", inbound.msg_type, thid);
                Ok(None)
            }
        }
    }

    async fn on_propose(&self, inbound: &Inbound) -> Result<(), HubError> {
        let proposal: ProposeCredential = inbound.message.decode()?;
        let thid = inbound.thread_id();

        if let Some(existing) = self.store.find::<IssuedCredential>(&thid).await? {
            debug!(
                "proposal {} seen before, record is {}",
                thid, existing.state
            );
            return Ok(());
        }

        let from = inbound.from_did.clone();
        let to = inbound.to_did.clone();
        let Some(conn) = self
            .store
            .first::<AgentConnection, _>(|conn| {
                conn.is_completed()
                    && conn.their_did.as_deref() == Some(from.as_str())
                    && conn.my_did.as_deref() == Some(to.as_str())
            })
            .await?
        else {
            warn!("credential proposal {} from {} has no connection", thid, from);
            return Ok(());
        };

        let agent = self.store.get::<Agent>(&conn.agent).await?;
        let Some(schema_id) = proposal.schema_id() else {
            warn!("credential proposal {} names no schema", thid);
            return Ok(());
        };

        if !agent.can_endorse(&schema_id) {
            info!("agent {} does not endorse schema {}", agent.name, schema_id);
            return Ok(());
        }

        let Step::Advance(state) = poll(IssuanceState::Idle, IssuanceEvent::Propose) else {
            return Ok(());
        };

        let preview = proposal
            .credential_preview
            .map(|preview| preview.attributes)
            .unwrap_or_default();
        let cred = IssuedCredential::new(
            &thid,
            &agent.name,
            &conn.external_id,
            &schema_id,
            &to,
            &from,
            state,
        )
        .with_preview(preview)
        .with_comment(proposal.comment);

        match self.store.insert(&cred).await {
            Ok(()) => {
                info!("credential proposal {} received for agent {}", thid, agent.name);
                emit(
                    self.notifier.as_ref(),
                    TOPIC_CREDENTIALS,
                    EVENT_PROPOSED,
                    cred.summary(),
                )
                .await;
                Ok(())
            }
            Err(StoreError::AlreadyExists(_)) => {
                debug!("proposal {} recorded concurrently", thid);
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn on_request(&self, inbound: &Inbound) -> Result<(), HubError> {
        let Some(cred) = self.lookup(inbound).await? else {
            return Ok(());
        };

        match poll(cred.state, IssuanceEvent::Request) {
            Step::Advance(_) => {
                let Some(claimed) = self.advance(&cred, IssuanceEvent::Request, None).await? else {
                    return Ok(());
                };

                let message = match self.issue(&claimed, inbound).await {
                    Ok(message) => message,
                    Err(err) => {
                        return self
                            .abandon(&claimed, "issuance-failed", &err.to_string())
                            .await
                    }
                };

                if let Some(issued) = self
                    .advance(&claimed, IssuanceEvent::Issue, Some(message.clone()))
                    .await?
                {
                    self.send(&issued, &message).await?;
                    info!("credential {} issued", issued.protocol_id);
                    emit(
                        self.notifier.as_ref(),
                        TOPIC_CREDENTIALS,
                        EVENT_ISSUED,
                        issued.summary(),
                    )
                    .await;
                }
                Ok(())
            }
            Step::Duplicate => self.re_emit(&cred).await,
            Step::Ignore => {
                debug!(
                    "ignoring credential request for {} in {}",
                    cred.protocol_id, cred.state
                );
                Ok(())
            }
        }
    }

    async fn issue(&self, cred: &IssuedCredential, inbound: &Inbound) -> Result<Message, HubError> {
        let request: RequestCredential = inbound.message.decode()?;
        let (format, attach) = pair_formats(&request.formats, &request.requests_attach)
            .into_iter()
            .next()
            .ok_or_else(|| HubError::InvalidArgument("no credential request attached".to_string()))?;

        let offer_id = cred
            .offer_id
            .as_deref()
            .ok_or_else(|| HubError::Internal(format!("credential {} has no offer", cred.id)))?;

        let engine = self.engines.resolve(&format.format)?;
        let schema = self.store.get::<Schema>(&cred.schema_id).await?;
        let issuer = self.store.get::<DID>(&cred.issuer_did).await?;

        let data = engine
            .issue_credential(&issuer, &schema, offer_id, &attach.fetch()?, &cred.values())
            .await?;

        let message = Message::build(
            ISSUE_CREDENTIAL,
            &IssueCredential {
                comment: cred.comment.clone(),
                formats: vec![AttachFormat {
                    attach_id: CREDENTIAL_ATTACH_ID.to_string(),
                    format: format.format.clone(),
                }],
                credentials_attach: vec![Attachment::base64(CREDENTIAL_ATTACH_ID, MIME_JSON, &data)],
            },
        )?
        .with_thread(&cred.protocol_id);

        Ok(message)
    }

    async fn on_ack(&self, inbound: &Inbound) -> Result<(), HubError> {
        let Some(cred) = self.lookup(inbound).await? else {
            return Ok(());
        };

        if let Some(done) = self.advance(&cred, IssuanceEvent::Ack, None).await? {
            info!("credential {} done", done.protocol_id);
            emit(
                self.notifier.as_ref(),
                TOPIC_CREDENTIALS,
                EVENT_DONE,
                done.summary(),
            )
            .await;
        }

        Ok(())
    }

    async fn on_problem_report(&self, inbound: &Inbound) -> Result<(), HubError> {
        let Some(cred) = self.lookup(inbound).await? else {
            return Ok(());
        };

        if let Some(abandoned) = self
            .advance(&cred, IssuanceEvent::ProblemReport, None)
            .await?
        {
            warn!("holder abandoned credential {}", abandoned.protocol_id);
            emit(
                self.notifier.as_ref(),
                TOPIC_CREDENTIALS,
                EVENT_ABANDONED,
                abandoned.summary(),
            )
            .await;
        }

        Ok(())
    }
}

#[async_trait]
impl ProtocolHandler for IssuanceSupervisor {
    fn accept(&self, msg_type: &MessageType) -> bool {
        msg_type.protocol == PROTOCOL
    }

    async fn handle(&self, inbound: Inbound) -> Result<(), HubError> {
        match inbound.message.msg_type.as_str() {
            PROPOSE_CREDENTIAL => self.on_propose(&inbound).await,
            REQUEST_CREDENTIAL => self.on_request(&inbound).await,
            ACK => self.on_ack(&inbound).await,
            PROBLEM_REPORT => self.on_problem_report(&inbound).await,
            other => {
                debug!("issuer ignores {}", other);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Mutex;

    use mockall::mock;
    use serde_json::json;

    use crate::connection::ConnectionState;
    use crate::didcomm::types::DIDCommError;
    use crate::engine::types::{
        CredentialEngine, CredentialOffer, EngineError, Format,
    };
    use crate::notifier::Notification;
    use crate::store::MemoryStore;

    mock!(
        FakeOutbound{}

        #[async_trait]
        impl Outbound for FakeOutbound {
            async fn send(&self, message: &Message, destination: &Destination) -> Result<(), DIDCommError>;
        }
    );

    mock!(
        FakeNotifier{}

        #[async_trait]
        impl Notifier for FakeNotifier {
            async fn notify(&self, notification: Notification) -> Result<(), HubError>;
        }
    );

    mock!(
        FakeEngine{}

        #[async_trait]
        impl CredentialEngine for FakeEngine {
            fn accept(&self, format: &str) -> bool;
            fn format(&self) -> Format;
            async fn register_schema(&self, registrant: &DID, schema: &Schema) -> Result<String, EngineError>;
            async fn create_credential_offer(&self, issuer: &DID, subject_did: &str, schema: &Schema, values: &CredentialValues) -> Result<CredentialOffer, EngineError>;
            async fn create_credential_request(&self, holder: &DID, offer: &[u8]) -> Result<Vec<u8>, EngineError>;
            async fn issue_credential(&self, issuer: &DID, schema: &Schema, offer_id: &str, request: &[u8], values: &CredentialValues) -> Result<Vec<u8>, EngineError>;
        }
    );

    const MY_DID: &str = "did:sov:hub";
    const THEIR_DID: &str = "did:sov:holder";

    type Sent = Arc<Mutex<Vec<Message>>>;
    type Events = Arc<Mutex<Vec<String>>>;

    fn build_engine(issue_result: Result<Vec<u8>, EngineError>, issue_times: usize) -> MockFakeEngine {
        let mut engine = MockFakeEngine::new();
        engine
            .expect_accept()
            .returning(|format| format == "lds/ld-proof");
        engine.expect_create_credential_offer().returning(|_, subject, _, values| {
            assert_eq!(subject, THEIR_DID);
            assert_eq!(values.get("n").map(String::as_str), Some("v"));
            Ok(CredentialOffer {
                offer_id: "offer-1".to_string(),
                data: b"{\"offer\":true}".to_vec(),
            })
        });
        engine
            .expect_issue_credential()
            .times(issue_times)
            .returning(move |_, _, offer_id, _, _| {
                assert_eq!(offer_id, "offer-1");
                issue_result.clone()
            });
        engine
    }

    async fn build_supervisor(
        engine: MockFakeEngine,
        connection_state: ConnectionState,
    ) -> (IssuanceSupervisor, Store, Sent, Events) {
        let store = Store::new(Arc::new(MemoryStore::new()));

        store
            .insert(&Agent::new("bob").with_schemas(vec!["s1".to_string()]))
            .await
            .unwrap();
        store
            .insert(&Schema::new("s1", "S", "1.0", Format::LdProof).with_attributes(&["n"]))
            .await
            .unwrap();
        store
            .insert(&DID::new(MY_DID, "hubverkey").with_key("hubverkey"))
            .await
            .unwrap();

        let mut conn = AgentConnection::invited("bob", "u42", "inv-1");
        conn.state = connection_state;
        conn.my_did = Some(MY_DID.to_string());
        conn.their_did = Some(THEIR_DID.to_string());
        store.insert(&conn).await.unwrap();

        let sent: Sent = Arc::new(Mutex::new(Vec::new()));
        let recorded = sent.clone();
        let mut outbound = MockFakeOutbound::new();
        outbound.expect_send().returning(move |message, destination| {
            assert_eq!(destination.recipient, THEIR_DID);
            recorded.lock().unwrap().push(message.clone());
            Ok(())
        });

        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let seen = events.clone();
        let mut notifier = MockFakeNotifier::new();
        notifier.expect_notify().returning(move |notification| {
            seen.lock().unwrap().push(notification.name());
            Ok(())
        });

        let supervisor = IssuanceSupervisor::new(
            store.clone(),
            CredentialRegistry::new().with_engine(Arc::new(engine)),
            Arc::new(outbound),
            Arc::new(notifier),
        );

        (supervisor, store, sent, events)
    }

    fn inbound(message: Message) -> Inbound {
        Inbound {
            msg_type: MessageType::from_str(&message.msg_type).unwrap(),
            message,
            from_did: THEIR_DID.to_string(),
            to_did: MY_DID.to_string(),
        }
    }

    fn request_message(thid: &str) -> Message {
        Message::build(
            REQUEST_CREDENTIAL,
            &RequestCredential {
                comment: None,
                formats: vec![AttachFormat {
                    attach_id: "request-0".to_string(),
                    format: "lds/ld-proof".to_string(),
                }],
                requests_attach: vec![Attachment::base64("request-0", MIME_JSON, b"{}")],
            },
        )
        .unwrap()
        .with_thread(thid)
    }

    fn preview() -> Vec<PreviewAttribute> {
        vec![PreviewAttribute::new("n", "v")]
    }

    #[tokio::test]
    async fn test_offer_requires_completed_connection() {
        let (supervisor, _, sent, _) =
            build_supervisor(build_engine(Ok(Vec::new()), 0), ConnectionState::Invited).await;

        let result = supervisor.offer("bob", "u42", "s1", None, preview()).await;
        assert!(matches!(result, Err(HubError::FailedPrecondition(_))));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_offer_rejects_unknown_attribute() {
        let (supervisor, _, _, _) =
            build_supervisor(build_engine(Ok(Vec::new()), 0), ConnectionState::Completed).await;

        let result = supervisor
            .offer("bob", "u42", "s1", None, vec![PreviewAttribute::new("x", "v")])
            .await;
        assert!(matches!(result, Err(HubError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn test_offer_request_ack() {
        let (supervisor, store, sent, events) = build_supervisor(
            build_engine(Ok(b"{\"vc\":1}".to_vec()), 1),
            ConnectionState::Completed,
        )
        .await;

        let cred = supervisor
            .offer("bob", "u42", "s1", Some("hello".to_string()), preview())
            .await
            .unwrap();
        assert_eq!(cred.state, IssuanceState::OfferSent);
        assert_eq!(cred.id, cred.protocol_id);

        let request = request_message(&cred.protocol_id);
        supervisor.handle(inbound(request.clone())).await.unwrap();
        supervisor.handle(inbound(request)).await.unwrap();

        {
            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 3);
            assert_eq!(sent[0].msg_type, OFFER_CREDENTIAL);
            assert_eq!(sent[1].msg_type, ISSUE_CREDENTIAL);
            assert_eq!(sent[1], sent[2], "duplicate request re-sends the same credential");
            assert_eq!(sent[1].thread_id(), cred.protocol_id);
        }

        let ack = Message::build(ACK, &json!({"status": "OK"}))
            .unwrap()
            .with_thread(&cred.protocol_id);
        supervisor.handle(inbound(ack.clone())).await.unwrap();
        supervisor.handle(inbound(ack)).await.unwrap();

        let stored = store.get::<IssuedCredential>(&cred.protocol_id).await.unwrap();
        assert_eq!(stored.state, IssuanceState::Done);
        assert_eq!(stored.preview, preview());
        assert_eq!(
            *events.lock().unwrap(),
            vec!["credentials/issued".to_string(), "credentials/done".to_string()]
        );
    }

    #[tokio::test]
    async fn test_engine_failure_abandons() {
        let (supervisor, store, sent, events) = build_supervisor(
            build_engine(Err(EngineError::IssueError("bad request".to_string())), 1),
            ConnectionState::Completed,
        )
        .await;

        let cred = supervisor
            .offer("bob", "u42", "s1", None, preview())
            .await
            .unwrap();
        supervisor
            .handle(inbound(request_message(&cred.protocol_id)))
            .await
            .unwrap();

        let stored = store.get::<IssuedCredential>(&cred.protocol_id).await.unwrap();
        assert_eq!(stored.state, IssuanceState::Abandoned);

        let sent = sent.lock().unwrap();
        assert_eq!(sent.last().map(|m| m.msg_type.as_str()), Some(PROBLEM_REPORT));
        assert_eq!(*events.lock().unwrap(), vec!["credentials/abandoned".to_string()]);
    }

    #[tokio::test]
    async fn test_request_out_of_order_ignored() {
        let (supervisor, store, sent, _) =
            build_supervisor(build_engine(Ok(Vec::new()), 0), ConnectionState::Completed).await;

        supervisor
            .handle(inbound(request_message("unknown-thread")))
            .await
            .unwrap();
        assert!(sent.lock().unwrap().is_empty());

        let cred = supervisor
            .offer("bob", "u42", "s1", None, preview())
            .await
            .unwrap();
        let early_ack = Message::build(ACK, &json!({"status": "OK"}))
            .unwrap()
            .with_thread(&cred.protocol_id);
        supervisor.handle(inbound(early_ack)).await.unwrap();

        let stored = store.get::<IssuedCredential>(&cred.protocol_id).await.unwrap();
        assert_eq!(stored.state, IssuanceState::OfferSent);
    }

    #[tokio::test]
    async fn test_proposal_then_offer_on_same_thread() {
        let (supervisor, store, sent, events) =
            build_supervisor(build_engine(Ok(Vec::new()), 0), ConnectionState::Completed).await;

        let proposal = ProposeCredential {
            comment: Some("please".to_string()),
            credential_preview: Some(CredentialPreview::new(preview())),
            formats: Vec::new(),
            filters_attach: vec![Attachment::json("filter-0", json!({"schema_id": "s1"}))],
        };
        let message = Message::build(PROPOSE_CREDENTIAL, &proposal).unwrap();
        let thid = message.thread_id();

        supervisor.handle(inbound(message.clone())).await.unwrap();
        supervisor.handle(inbound(message)).await.unwrap();

        let stored = store.get::<IssuedCredential>(&thid).await.unwrap();
        assert_eq!(stored.state, IssuanceState::ProposalReceived);
        assert_eq!(*events.lock().unwrap(), vec!["credentials/proposed".to_string()]);

        let cred = supervisor
            .offer("bob", "u42", "s1", None, preview())
            .await
            .unwrap();
        assert_eq!(cred.protocol_id, thid);
        assert_eq!(cred.state, IssuanceState::OfferSent);
        assert_eq!(sent.lock().unwrap()[0].thread_id(), thid);
    }

    #[tokio::test]
    async fn test_proposal_for_unendorsed_schema_dropped() {
        let (supervisor, store, _, events) =
            build_supervisor(build_engine(Ok(Vec::new()), 0), ConnectionState::Completed).await;

        let proposal = ProposeCredential {
            filters_attach: vec![Attachment::json("filter-0", json!({"schema_id": "s9"}))],
            ..Default::default()
        };
        let message = Message::build(PROPOSE_CREDENTIAL, &proposal).unwrap();
        supervisor.handle(inbound(message)).await.unwrap();

        assert!(store.list::<IssuedCredential>().await.unwrap().is_empty());
        assert!(events.lock().unwrap().is_empty());
    }
}
