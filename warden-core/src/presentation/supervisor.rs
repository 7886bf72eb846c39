use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, info, warn};
use uuid::Uuid;

use crate::agent::Agent;
use crate::common::types::HubError;
use crate::connection::require_completed;
use crate::didcomm::message::{pair_formats, Attachment, AttachFormat, Message, MessageType};
use crate::didcomm::protocol::presentproof::{
    Presentation as PresentationBody, RequestPresentation, ACK, PRESENTATION, PROBLEM_REPORT,
    PROPOSE_PRESENTATION, REQUEST_PRESENTATION,
};
use crate::didcomm::protocol::{Ack, ProblemReport};
use crate::didcomm::types::{Destination, Outbound};
use crate::engine::PresentationRegistry;
use crate::notifier::types::{EVENT_REJECTED, EVENT_VERIFIED, TOPIC_PRESENTATIONS};
use crate::notifier::{emit, Notifier};
use crate::store::types::Transition;
use crate::store::Store;
use crate::worker::types::{Inbound, ProtocolHandler};

use super::presentation::Presentation;
use super::request::PresentationRequest;
use super::types::{poll, PresentationEvent, PresentationState, ProofRequest, Step};

pub const PROTOCOL: &str = "present-proof";

const REQUEST_ATTACH_ID: &str = "request-0";
const MIME_JSON: &str = "application/json";

/// PresentationSupervisor drives the verifier side of present-proof
#[derive(Clone)]
pub struct PresentationSupervisor {
    store: Store,
    engines: PresentationRegistry,
    outbound: Arc<dyn Outbound>,
    notifier: Arc<dyn Notifier>,
}

impl PresentationSupervisor {
    pub fn new(
        store: Store,
        engines: PresentationRegistry,
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

    /// request sends a proof request to the subject of `(agent, external_id)`
    pub async fn request(
        &self,
        agent_name: &str,
        external_id: &str,
        proof: &ProofRequest,
    ) -> Result<PresentationRequest, HubError> {
        if proof.name.is_empty() {
            return Err(HubError::InvalidArgument(
                "presentation name is missing".to_string(),
            ));
        }

        if proof.requested_attributes.is_empty() && proof.requested_predicates.is_empty() {
            return Err(HubError::InvalidArgument(
                "presentation requests nothing".to_string(),
            ));
        }

        let agent = self
            .store
            .find::<Agent>(agent_name)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("agent {}", agent_name)))?;

        let conn = require_completed(&self.store, &agent.name, external_id).await?;
        let (my_did, their_did) = conn.dids().ok_or_else(|| {
            HubError::FailedPrecondition(format!("connection {} has no DIDs", external_id))
        })?;

        let engine = match &proof.format {
            Some(format) => self.engines.resolve(format)?,
            None => self.engines.default_engine()?,
        };

        let data = engine
            .request_presentation(
                &proof.name,
                &proof.version,
                &proof.requested_attributes,
                &proof.requested_predicates,
            )
            .await?;

        let Step::Advance(state) = poll(PresentationState::Idle, PresentationEvent::Request) else {
            return Err(HubError::Internal("presentation cannot start".to_string()));
        };

        let piid = Uuid::new_v4().to_string();
        let format = engine.format().to_string();
        let message = Message::build(
            REQUEST_PRESENTATION,
            &RequestPresentation {
                comment: proof.comment.clone(),
                will_confirm: true,
                formats: vec![AttachFormat {
                    attach_id: REQUEST_ATTACH_ID.to_string(),
                    format: format.clone(),
                }],
                request_presentations_attach: vec![Attachment::base64(
                    REQUEST_ATTACH_ID,
                    MIME_JSON,
                    &data,
                )],
            },
        )?
        .with_thread(&piid);

        let now = Utc::now();
        let request = PresentationRequest {
            id: piid.clone(),
            agent: agent.name.clone(),
            piid: piid.clone(),
            external_id: external_id.to_string(),
            name: proof.name.clone(),
            version: proof.version.clone(),
            format,
            requested_attributes: proof.requested_attributes.clone(),
            requested_predicates: proof.requested_predicates.clone(),
            data,
            my_did: my_did.clone(),
            their_did: their_did.clone(),
            state,
            last_outbound: Some(message.clone()),
            created_at: now,
            updated_at: now,
        };

        self.store.insert(&request).await?;
        self.outbound
            .send(&message, &Destination::new(&my_did, &their_did))
            .await?;

        info!(
            "presentation request {} sent to {} for agent {}",
            piid, their_did, agent.name
        );
        Ok(request)
    }

    async fn advance(
        &self,
        request: &PresentationRequest,
        event: PresentationEvent,
        outbound: Option<Message>,
    ) -> Result<Option<PresentationRequest>, HubError> {
        let Step::Advance(next) = poll(request.state, event) else {
            return Ok(None);
        };

        let expected = request.state;
        let transition = self
            .store
            .transition::<PresentationRequest, _, _>(
                &request.piid,
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
                    "presentation {} already moved to {}",
                    current.piid, current.state
                );
                Ok(None)
            }
        }
    }

    async fn send(&self, request: &PresentationRequest, message: &Message) -> Result<(), HubError> {
        self.outbound
            .send(
                message,
                &Destination::new(&request.my_did, &request.their_did),
            )
            .await?;
        Ok(())
    }

    async fn lookup(&self, inbound: &Inbound) -> Result<Option<PresentationRequest>, HubError> {
        let thid = inbound.thread_id();
        match self.store.find::<PresentationRequest>(&thid).await? {
            Some(request) if request.their_did == inbound.from_did => Ok(Some(request)),
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

    /// verify checks every attached proof, each verified proof is stored
    async fn verify(
        &self,
        request: &PresentationRequest,
        inbound: &Inbound,
    ) -> Result<usize, HubError> {
        let body: PresentationBody = inbound.message.decode()?;
        let pairs = pair_formats(&body.formats, &body.presentations_attach);
        if pairs.is_empty() {
            return Err(HubError::InvalidArgument(
                "no presentation attached".to_string(),
            ));
        }

        for (format, attach) in &pairs {
            let engine = self.engines.resolve(&format.format)?;
            let data = attach.fetch()?;

            engine
                .verify(&data, &request.data, &request.their_did, &request.my_did)
                .await?;

            let presentation = Presentation::new(
                &request.piid,
                &attach.id,
                &request.their_did,
                &request.my_did,
                &format.format,
                data,
            );
            self.store.put(&presentation).await?;
        }

        Ok(pairs.len())
    }

    async fn on_presentation(&self, inbound: &Inbound) -> Result<(), HubError> {
        let Some(request) = self.lookup(inbound).await? else {
            return Ok(());
        };

        match poll(request.state, PresentationEvent::Present) {
            Step::Advance(_) => {
                let Some(received) = self
                    .advance(&request, PresentationEvent::Present, None)
                    .await?
                else {
                    return Ok(());
                };

                let (event, reply) = match self.verify(&received, inbound).await {
                    Ok(count) => {
                        info!("presentation {} verified ({} proofs)", received.piid, count);
                        (
                            PresentationEvent::Verify,
                            Ack::ok().into_message(ACK, &received.piid),
                        )
                    }
                    Err(err) => {
                        warn!("presentation {} rejected: {}", received.piid, err);
                        (
                            PresentationEvent::Reject,
                            ProblemReport::new("verification-failed", &err.to_string())
                                .into_message(PROBLEM_REPORT, &received.piid),
                        )
                    }
                };

                if let Some(done) = self.advance(&received, event, Some(reply.clone())).await? {
                    self.send(&done, &reply).await?;

                    let topic_event = match done.state {
                        PresentationState::Verified => EVENT_VERIFIED,
                        _ => EVENT_REJECTED,
                    };
                    emit(
                        self.notifier.as_ref(),
                        TOPIC_PRESENTATIONS,
                        topic_event,
                        done.summary(),
                    )
                    .await;
                }
                Ok(())
            }
            Step::Duplicate => match &request.last_outbound {
                Some(message) if request.state.is_terminal() => {
                    debug!("duplicate presentation for {}, re-sending reply", request.piid);
                    self.send(&request, message).await
                }
                _ => Ok(()),
            },
            Step::Ignore => {
                debug!(
                    "ignoring presentation for {} in {}",
                    request.piid, request.state
                );
                Ok(())
            }
        }
    }

    /// on_propose answers a prover initiated flow with a problem report, only verifier
    /// initiated requests are supported
    async fn on_propose(&self, inbound: &Inbound) -> Result<(), HubError> {
        let thid = inbound.thread_id();
        let report = ProblemReport::new(
            "not-supported",
            "presentation proposals are not supported",
        )
        .into_message(PROBLEM_REPORT, &thid);

        if let Some(request) = self.lookup(inbound).await? {
            if self
                .advance(&request, PresentationEvent::Propose, Some(report.clone()))
                .await?
                .is_none()
            {
                return Ok(());
            }
        }

        self.outbound
            .send(&report, &Destination::new(&inbound.to_did, &inbound.from_did))
            .await?;
        info!("presentation proposal {} refused", thid);
        Ok(())
    }

    async fn on_problem_report(&self, inbound: &Inbound) -> Result<(), HubError> {
        let Some(request) = self.lookup(inbound).await? else {
            return Ok(());
        };

        if let Some(abandoned) = self
            .advance(&request, PresentationEvent::ProblemReport, None)
            .await?
        {
            warn!("prover abandoned presentation {}", abandoned.piid);
        }

        Ok(())
    }
}

#[async_trait]
impl ProtocolHandler for PresentationSupervisor {
    fn accept(&self, msg_type: &MessageType) -> bool {
        msg_type.protocol == PROTOCOL
    }

    async fn handle(&self, inbound: Inbound) -> Result<(), HubError> {
        match inbound.message.msg_type.as_str() {
            PRESENTATION => self.on_presentation(&inbound).await,
            PROPOSE_PRESENTATION => self.on_propose(&inbound).await,
            PROBLEM_REPORT => self.on_problem_report(&inbound).await,
            other => {
                debug!("verifier ignores {}", other);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::str::FromStr;
    use std::sync::Mutex;

    use mockall::mock;

    use crate::connection::{AgentConnection, ConnectionState};
    use crate::did::DID;
    use crate::didcomm::types::DIDCommError;
    use crate::engine::types::{AttributeInfo, EngineError, Format, PredicateInfo, PresentationEngine};
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
        impl PresentationEngine for FakeEngine {
            fn accept(&self, format: &str) -> bool;
            fn format(&self) -> Format;
            async fn request_presentation(&self, name: &str, version: &str, attributes: &BTreeMap<String, AttributeInfo>, predicates: &BTreeMap<String, PredicateInfo>) -> Result<Vec<u8>, EngineError>;
            async fn create_presentation(&self, holder: &DID, request: &[u8], credentials: &[Vec<u8>]) -> Result<Vec<u8>, EngineError>;
            async fn verify(&self, presentation: &[u8], request: &[u8], their_did: &str, my_did: &str) -> Result<(), EngineError>;
        }
    );

    const MY_DID: &str = "did:sov:hub";
    const THEIR_DID: &str = "did:sov:prover";

    type Sent = Arc<Mutex<Vec<Message>>>;

    fn build_engine(verify_ok: bool, verify_times: usize) -> MockFakeEngine {
        let mut engine = MockFakeEngine::new();
        engine
            .expect_accept()
            .returning(|format| format == "lds/ld-proof");
        engine.expect_format().returning(|| Format::LdProof);
        engine
            .expect_request_presentation()
            .returning(|_, _, _, _| Ok(b"{\"challenge\":\"c1\"}".to_vec()));
        engine
            .expect_verify()
            .times(verify_times)
            .returning(move |_, request, their_did, my_did| {
                assert_eq!(request, b"{\"challenge\":\"c1\"}");
                assert_eq!(their_did, THEIR_DID);
                assert_eq!(my_did, MY_DID);

                if verify_ok {
                    Ok(())
                } else {
                    Err(EngineError::VerifyError("bad proof".to_string()))
                }
            });
        engine
    }

    async fn build_supervisor(engine: MockFakeEngine) -> (PresentationSupervisor, Store, Sent) {
        let store = Store::new(Arc::new(MemoryStore::new()));
        store.insert(&Agent::new("bob")).await.unwrap();

        let mut conn = AgentConnection::invited("bob", "u42", "inv-1");
        conn.state = ConnectionState::Completed;
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

        let mut notifier = MockFakeNotifier::new();
        notifier.expect_notify().returning(|_| Ok(()));

        let supervisor = PresentationSupervisor::new(
            store.clone(),
            PresentationRegistry::new().with_engine(Arc::new(engine)),
            Arc::new(outbound),
            Arc::new(notifier),
        );
        (supervisor, store, sent)
    }

    fn proof_request() -> ProofRequest {
        let mut attributes = BTreeMap::new();
        attributes.insert(
            "attr1".to_string(),
            AttributeInfo {
                name: "name".to_string(),
                restrictions: None,
            },
        );

        ProofRequest {
            name: "kyc".to_string(),
            version: "1.0".to_string(),
            requested_attributes: attributes,
            ..Default::default()
        }
    }

    fn inbound(message: Message) -> Inbound {
        Inbound {
            msg_type: MessageType::from_str(&message.msg_type).unwrap(),
            message,
            from_did: THEIR_DID.to_string(),
            to_did: MY_DID.to_string(),
        }
    }

    fn presentation_message(piid: &str, format: &str) -> Message {
        Message::build(
            PRESENTATION,
            &PresentationBody {
                comment: None,
                formats: vec![AttachFormat {
                    attach_id: "proof-0".to_string(),
                    format: format.to_string(),
                }],
                presentations_attach: vec![Attachment::base64("proof-0", MIME_JSON, b"{\"vp\":1}")],
            },
        )
        .unwrap()
        .with_thread(piid)
    }

    #[tokio::test]
    async fn test_request_then_verified_once() {
        let (supervisor, store, sent) = build_supervisor(build_engine(true, 1)).await;

        let request = supervisor
            .request("bob", "u42", &proof_request())
            .await
            .unwrap();
        assert_eq!(request.state, PresentationState::RequestSent);

        let presentation = presentation_message(&request.piid, "lds/ld-proof");
        supervisor.handle(inbound(presentation.clone())).await.unwrap();
        supervisor.handle(inbound(presentation)).await.unwrap();

        let stored = store
            .get::<PresentationRequest>(&request.piid)
            .await
            .unwrap();
        assert_eq!(stored.state, PresentationState::Verified);

        let proofs = store.list::<Presentation>().await.unwrap();
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].data, b"{\"vp\":1}".to_vec());

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].msg_type, REQUEST_PRESENTATION);
        assert_eq!(sent[1].msg_type, ACK);
        assert_eq!(sent[1], sent[2]);
    }

    #[tokio::test]
    async fn test_failed_verification_rejects() {
        let (supervisor, store, sent) = build_supervisor(build_engine(false, 1)).await;

        let request = supervisor
            .request("bob", "u42", &proof_request())
            .await
            .unwrap();
        supervisor
            .handle(inbound(presentation_message(&request.piid, "lds/ld-proof")))
            .await
            .unwrap();

        let stored = store
            .get::<PresentationRequest>(&request.piid)
            .await
            .unwrap();
        assert_eq!(stored.state, PresentationState::Rejected);
        assert!(store.list::<Presentation>().await.unwrap().is_empty());
        assert_eq!(
            sent.lock().unwrap().last().map(|m| m.msg_type.clone()),
            Some(PROBLEM_REPORT.to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_format_fails_closed() {
        let (supervisor, store, _) = build_supervisor(build_engine(true, 0)).await;

        let request = supervisor
            .request("bob", "u42", &proof_request())
            .await
            .unwrap();
        supervisor
            .handle(inbound(presentation_message(&request.piid, "hlindy-zkp-v1.0")))
            .await
            .unwrap();

        let stored = store
            .get::<PresentationRequest>(&request.piid)
            .await
            .unwrap();
        assert_eq!(stored.state, PresentationState::Rejected);
    }

    #[tokio::test]
    async fn test_proposal_is_refused() {
        let (supervisor, _, sent) = build_supervisor(build_engine(true, 0)).await;

        let proposal = Message::new(PROPOSE_PRESENTATION);
        supervisor.handle(inbound(proposal)).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].msg_type, PROBLEM_REPORT);
    }

    #[tokio::test]
    async fn test_request_validation() {
        let (supervisor, _, _) = build_supervisor(build_engine(true, 0)).await;

        let empty = ProofRequest {
            name: "kyc".to_string(),
            ..Default::default()
        };
        let result = supervisor.request("bob", "u42", &empty).await;
        assert!(matches!(result, Err(HubError::InvalidArgument(_))));

        let result = supervisor.request("bob", "u99", &proof_request()).await;
        assert!(matches!(result, Err(HubError::NotFound(_))));
    }
}
