use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use prople_warden_core::agent::AgentEventType;
use prople_warden_core::bridge::types::{
    CloudConnectionStatus, HandleInvitationRequest, RegisterCloudAgentRequest,
};
use prople_warden_core::bridge::{signed_payload, Bridge, BridgeAPI, CloudAgent};
use prople_warden_core::broker::types::{
    Broker, QUEUE_DIDEXCHANGE, QUEUE_ISSUE_CREDENTIAL, QUEUE_NOTIFICATION, QUEUE_PRESENT_PROOF,
};
use prople_warden_core::broker::MemoryBroker;
use prople_warden_core::common::types::HubError;
use prople_warden_core::connection::bouncer::Bouncer;
use prople_warden_core::connection::{connection_key, AgentConnection, ConnectionState};
use prople_warden_core::control::types::{
    CreateAgentRequest, CreateSchemaRequest, CredentialParams, GetAgentInvitationRequest,
    IssueCredentialRequest, ListRequest, RequestPresentationRequest, UpdateAgentRequest,
};
use prople_warden_core::control::{AdminAPI, ControlDeps, ControlPlane, Watcher};
use prople_warden_core::did::{DidDoc, KeyManager, KeyPair, DID};
use prople_warden_core::didcomm::message::{Attachment, AttachFormat, Message};
use prople_warden_core::didcomm::protocol::didexchange::{
    ConnectionInfo, Invitation, Request, Response, ACK as CONNECTION_ACK, COMPLETE, REQUEST,
    RESPONSE,
};
use prople_warden_core::didcomm::protocol::issuecredential::{
    IssueCredential, OfferCredential, PreviewAttribute, RequestCredential, ACK as CREDENTIAL_ACK,
    ISSUE_CREDENTIAL, OFFER_CREDENTIAL, REQUEST_CREDENTIAL,
};
use prople_warden_core::didcomm::protocol::presentproof::{
    Presentation as PresentationBody, RequestPresentation, ACK as PRESENTATION_ACK,
    PRESENTATION, PROBLEM_REPORT as PRESENTATION_PROBLEM_REPORT, REQUEST_PRESENTATION,
};
use prople_warden_core::didcomm::protocol::{Ack, ProblemReport};
use prople_warden_core::didcomm::types::{
    DIDCommError, Destination, Outbound, Packer, Unpacked, CONTENT_TYPE_ENVELOPE,
};
use prople_warden_core::engine::{
    AttributeInfo, CredentialRegistry, LdProofEngine, PredicateInfo, PresentationEngine,
    PresentationRegistry,
};
use prople_warden_core::issuance::{IssuanceState, IssuanceSupervisor};
use prople_warden_core::ledger::{LedgerClient, LedgerError, Nym};
use prople_warden_core::notifier::{BrokerNotifier, Notification};
use prople_warden_core::presentation::{PresentationState, PresentationSupervisor, ProofRequest};
use prople_warden_core::router::{validate_request, Routed, Router};
use prople_warden_core::store::{MemoryStore, Store};
use prople_warden_core::worker::Worker;

const HUB_ENDPOINT: &str = "http://hub.example/";
const PEER_DID: &str = "did:sov:peer";
const PEER_ENDPOINT: &str = "http://peer.example/";
const FORMAT: &str = "lds/ld-proof";
const SEED: &str = "000000000000000000000000Steward1";
const BRIDGE_SECRET: &str = "bridge-secret";

/// TestEnvelope is a readable stand-in for the encrypted wire envelope
#[derive(Debug, Serialize, Deserialize)]
struct TestEnvelope {
    from: String,
    to: String,
    message: Value,
}

struct TestPacker;

#[async_trait]
impl Packer for TestPacker {
    async fn unpack(&self, envelope: &[u8]) -> Result<Unpacked, DIDCommError> {
        let envelope: TestEnvelope = serde_json::from_slice(envelope)
            .map_err(|err| DIDCommError::UnpackError(err.to_string()))?;
        let message = serde_json::to_vec(&envelope.message)
            .map_err(|err| DIDCommError::UnpackError(err.to_string()))?;

        Ok(Unpacked {
            message,
            from_did: envelope.from,
            to_did: envelope.to,
        })
    }

    async fn pack(
        &self,
        plaintext: &[u8],
        from_did: &str,
        to_did: &str,
    ) -> Result<Vec<u8>, DIDCommError> {
        let message: Value = serde_json::from_slice(plaintext)
            .map_err(|err| DIDCommError::PackError(err.to_string()))?;
        serde_json::to_vec(&TestEnvelope {
            from: from_did.to_string(),
            to: to_did.to_string(),
            message,
        })
        .map_err(|err| DIDCommError::PackError(err.to_string()))
    }
}

type Sent = Arc<Mutex<Vec<(Message, Destination)>>>;

/// RecordingOutbound plays the wire, every message the hub sends lands in `sent`
#[derive(Clone, Default)]
struct RecordingOutbound {
    sent: Sent,
}

#[async_trait]
impl Outbound for RecordingOutbound {
    async fn send(&self, message: &Message, destination: &Destination) -> Result<(), DIDCommError> {
        self.sent
            .lock()
            .unwrap()
            .push((message.clone(), destination.clone()));
        Ok(())
    }
}

#[derive(Default)]
struct StaticLedger {
    nyms: HashMap<String, Nym>,
}

impl StaticLedger {
    fn with_seed(seed: &str) -> Self {
        let keypair = KeyPair::from_seed(seed).unwrap();
        let did = keypair.did().unwrap();
        let nym = Nym {
            did: did.clone(),
            verkey: keypair.verkey().to_string(),
            endpoint: None,
            role: Some("TRUSTEE".to_string()),
        };

        Self {
            nyms: HashMap::from([(did, nym)]),
        }
    }
}

#[async_trait]
impl LedgerClient for StaticLedger {
    async fn get_nym(&self, did: &str) -> Result<Nym, LedgerError> {
        self.nyms
            .get(did)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(did.to_string()))
    }
}

/// Hub wires one process worth of components over the in-memory store and broker
struct Hub {
    plane: ControlPlane,
    bridge: Bridge,
    router: Router,
    broker: Arc<MemoryBroker>,
    store: Store,
    sent: Sent,
}

impl Hub {
    async fn start(ledger: StaticLedger) -> Self {
        let store = Store::new(Arc::new(MemoryStore::new()));
        let keys = KeyManager::new(store.clone());

        let broker = Arc::new(MemoryBroker::new());
        broker.declare(QUEUE_NOTIFICATION).await.unwrap();

        let packer: Arc<dyn Packer> = Arc::new(TestPacker);
        let outbound = RecordingOutbound::default();
        let sent = outbound.sent.clone();
        let outbound: Arc<dyn Outbound> = Arc::new(outbound);
        let notifier = Arc::new(BrokerNotifier::new(broker.clone()));

        let engine = Arc::new(LdProofEngine::new(store.clone(), keys.clone()));
        let credentials = CredentialRegistry::new().with_engine(engine.clone());
        let presentations = PresentationRegistry::new().with_engine(engine);

        let bouncer = Bouncer::new(
            store.clone(),
            keys.clone(),
            outbound.clone(),
            HUB_ENDPOINT,
            Duration::from_secs(30),
        );
        let issuance = IssuanceSupervisor::new(
            store.clone(),
            credentials.clone(),
            outbound.clone(),
            notifier.clone(),
        );
        let bridge = Bridge::new(
            store.clone(),
            bouncer.clone(),
            credentials.clone(),
            presentations.clone(),
            outbound.clone(),
            BRIDGE_SECRET,
        );
        let presentation = PresentationSupervisor::new(
            store.clone(),
            presentations,
            outbound,
            notifier.clone(),
        );

        let router = Router::new(packer.clone(), broker.clone());
        router.declare().await.unwrap();

        let workers = vec![
            Worker::new(QUEUE_DIDEXCHANGE, broker.clone(), packer.clone())
                .with_handler(Arc::new(bouncer.clone())),
            Worker::new(QUEUE_ISSUE_CREDENTIAL, broker.clone(), packer.clone())
                .with_handler(Arc::new(issuance.clone())),
            Worker::new(QUEUE_PRESENT_PROOF, broker.clone(), packer)
                .with_handler(Arc::new(presentation.clone())),
        ];

        for worker in workers {
            tokio::spawn(async move { worker.run().await });
        }

        let deps = ControlDeps {
            store: store.clone(),
            keys,
            bouncer,
            issuance,
            presentation,
            engines: credentials,
            ledger: Arc::new(ledger),
            notifier,
            endpoint: HUB_ENDPOINT.to_string(),
        };

        Self {
            plane: ControlPlane::new(deps, Watcher::default()),
            bridge,
            router,
            broker,
            store,
            sent,
        }
    }

    /// post behaves like the inbound HTTP endpoint
    async fn post(&self, message: &Message, from: &str, to: &str) -> Routed {
        let envelope = seal(message, from, to);
        validate_request("POST", Some(CONTENT_TYPE_ENVELOPE), &envelope).unwrap();
        self.router.route(&envelope).await.unwrap()
    }

    async fn wait_sent(&self, msg_type: &str, nth: usize) -> (Message, Destination) {
        let sent = self.sent.clone();
        let msg_type = msg_type.to_string();
        eventually(move || {
            let sent = sent.clone();
            let msg_type = msg_type.clone();
            async move {
                sent.lock()
                    .unwrap()
                    .iter()
                    .filter(|(message, _)| message.msg_type == msg_type)
                    .nth(nth)
                    .cloned()
            }
        })
        .await
    }

    fn count_sent(&self, msg_type: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(message, _)| message.msg_type == msg_type)
            .count()
    }

    async fn notifications(&self, event: &str) -> Vec<Notification> {
        self.broker
            .published(QUEUE_NOTIFICATION)
            .await
            .iter()
            .map(|body| serde_json::from_slice::<Notification>(body).unwrap())
            .filter(|notification| notification.event == event)
            .collect()
    }

    async fn wait_notifications(&self, event: &str, count: usize) -> Vec<Notification> {
        let broker = self.broker.clone();
        let event = event.to_string();
        eventually(move || {
            let broker = broker.clone();
            let event = event.clone();
            async move {
                let matching: Vec<Notification> = broker
                    .published(QUEUE_NOTIFICATION)
                    .await
                    .iter()
                    .filter_map(|body| serde_json::from_slice::<Notification>(body).ok())
                    .filter(|notification| notification.event == event)
                    .collect();
                (matching.len() >= count).then_some(matching)
            }
        })
        .await
    }

    /// connect runs the invitation round-trip for `external_id` and returns the hub side DID
    async fn connect(&self, agent: &str, external_id: &str) -> String {
        self.connect_as(agent, external_id, &peer_info()).await
    }

    async fn connect_as(&self, agent: &str, external_id: &str, peer: &ConnectionInfo) -> String {
        let resp = self
            .plane
            .get_agent_invitation(GetAgentInvitationRequest {
                agent: agent.to_string(),
                external_id: external_id.to_string(),
                name: "inv".to_string(),
            })
            .await
            .unwrap();

        let invitation: Invitation = serde_json::from_str(&resp.invitation).unwrap();
        let recipient = invitation.recipient().unwrap();
        let already_sent = self.count_sent(RESPONSE);

        let request = Message::build(
            REQUEST,
            &Request {
                label: "peer".to_string(),
                connection: peer.clone(),
            },
        )
        .unwrap()
        .with_parent_thread(&invitation.id);

        assert_eq!(
            self.post(&request, &peer.did, &recipient).await,
            Routed::Queued(QUEUE_DIDEXCHANGE.to_string())
        );

        let (response, destination) = self.wait_sent(RESPONSE, already_sent).await;
        assert_eq!(destination.recipient, peer.did);
        assert_eq!(response.thread_id(), request.id);
        let hub_did = response.decode::<Response>().unwrap().connection.did;

        // the invitee never answers with a response of its own, the hub must not move on it
        let stray = Message::build(
            RESPONSE,
            &Response {
                connection: peer.clone(),
            },
        )
        .unwrap()
        .with_thread(&request.id)
        .with_parent_thread(&invitation.id);
        self.post(&stray, &peer.did, &hub_did).await;

        let ack = Message::new(CONNECTION_ACK)
            .with_thread(&request.id)
            .with_parent_thread(&invitation.id);
        self.post(&ack, &peer.did, &hub_did).await;

        let store = self.store.clone();
        let key = connection_key(agent, external_id);
        let conn = eventually(move || {
            let store = store.clone();
            let key = key.clone();
            async move {
                store
                    .find::<AgentConnection>(&key)
                    .await
                    .unwrap()
                    .filter(|conn| conn.state == ConnectionState::Completed)
            }
        })
        .await;

        assert_eq!(conn.my_did.as_deref(), Some(hub_did.as_str()));
        assert_eq!(conn.their_did.as_deref(), Some(peer.did.as_str()));
        hub_did
    }

    /// issue runs offer, request and issue for a connected subject and returns the credential
    async fn issue(&self, agent: &str, external_id: &str, hub_did: &str, holder: &str) -> Vec<u8> {
        let already_offered = self.count_sent(OFFER_CREDENTIAL);
        let issued = self
            .plane
            .issue_credential(IssueCredentialRequest {
                agent: agent.to_string(),
                external_id: external_id.to_string(),
                credential: CredentialParams {
                    schema_id: "s1".to_string(),
                    comment: None,
                    preview: vec![
                        PreviewAttribute::new("name", "alice"),
                        PreviewAttribute::new("age", "30"),
                    ],
                },
            })
            .await
            .unwrap();
        let thid = issued.credential_id;

        let (offer, _) = self.wait_sent(OFFER_CREDENTIAL, already_offered).await;
        let offer: OfferCredential = offer.decode().unwrap();
        let offered = offer.offers_attach[0].fetch().unwrap();

        let already_issued = self.count_sent(ISSUE_CREDENTIAL);
        let request = Message::build(
            REQUEST_CREDENTIAL,
            &RequestCredential {
                comment: None,
                formats: vec![AttachFormat {
                    attach_id: "request-0".to_string(),
                    format: FORMAT.to_string(),
                }],
                requests_attach: vec![Attachment::base64("request-0", "application/json", &offered)],
            },
        )
        .unwrap()
        .with_thread(&thid);
        self.post(&request, holder, hub_did).await;

        let (issue, _) = self.wait_sent(ISSUE_CREDENTIAL, already_issued).await;
        let issue: IssueCredential = issue.decode().unwrap();
        let credential = issue.credentials_attach[0].fetch().unwrap();

        let ack = Ack::ok().into_message(CREDENTIAL_ACK, &thid);
        self.post(&ack, holder, hub_did).await;
        credential
    }

    /// ask_proof sends a proof request and returns its piid with the engine request it carried
    async fn ask_proof(&self, agent: &str, external_id: &str, proof: ProofRequest) -> (String, Vec<u8>) {
        let already_sent = self.count_sent(REQUEST_PRESENTATION);
        let resp = self
            .plane
            .request_presentation(RequestPresentationRequest {
                agent: agent.to_string(),
                external_id: external_id.to_string(),
                presentation: proof,
            })
            .await
            .unwrap();

        let (message, _) = self.wait_sent(REQUEST_PRESENTATION, already_sent).await;
        assert_eq!(message.thread_id(), resp.presentation_id);

        let request: RequestPresentation = message.decode().unwrap();
        let data = request.request_presentations_attach[0].fetch().unwrap();
        (resp.presentation_id, data)
    }

    async fn settled(&self, piid: &str) -> PresentationState {
        let plane = self.plane.clone();
        let piid = piid.to_string();
        eventually(move || {
            let plane = plane.clone();
            let piid = piid.clone();
            async move {
                plane
                    .get_presentation_request(piid)
                    .await
                    .ok()
                    .map(|detail| detail.request.state)
                    .filter(|state| state.is_terminal())
            }
        })
        .await
    }
}

/// Wallet is a prover with its own keys, it answers proof requests the way an edge agent would
struct Wallet {
    engine: LdProofEngine,
    holder: DID,
}

impl Wallet {
    async fn open() -> Self {
        let store = Store::new(Arc::new(MemoryStore::new()));
        let keys = KeyManager::new(store.clone());
        let holder = keys
            .create_did(Some(PEER_ENDPOINT.to_string()))
            .await
            .unwrap();

        Self {
            engine: LdProofEngine::new(store, keys),
            holder,
        }
    }

    fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            did: self.holder.id.clone(),
            did_doc: DidDoc::new(&self.holder.id, &self.holder.verkey, Some(PEER_ENDPOINT)),
        }
    }

    async fn present(&self, piid: &str, request: &[u8], credential: &[u8]) -> Message {
        let proof = self
            .engine
            .create_presentation(&self.holder, request, &[credential.to_vec()])
            .await
            .unwrap();

        Message::build(
            PRESENTATION,
            &PresentationBody {
                comment: None,
                formats: vec![AttachFormat {
                    attach_id: "proof-0".to_string(),
                    format: FORMAT.to_string(),
                }],
                presentations_attach: vec![Attachment::base64("proof-0", "application/json", &proof)],
            },
        )
        .unwrap()
        .with_thread(piid)
    }
}

fn seal(message: &Message, from: &str, to: &str) -> Vec<u8> {
    serde_json::to_vec(&TestEnvelope {
        from: from.to_string(),
        to: to.to_string(),
        message: serde_json::to_value(message).unwrap(),
    })
    .unwrap()
}

fn peer_info() -> ConnectionInfo {
    ConnectionInfo {
        did: PEER_DID.to_string(),
        did_doc: DidDoc::new(PEER_DID, "peerverkey", Some(PEER_ENDPOINT)),
    }
}

async fn eventually<T, F, Fut>(mut check: F) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    for _ in 0..300 {
        if let Some(value) = check().await {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    panic!("condition not reached in time");
}

fn agent_request(name: &str) -> CreateAgentRequest {
    CreateAgentRequest {
        name: name.to_string(),
        ..Default::default()
    }
}

fn adult_proof() -> ProofRequest {
    ProofRequest {
        name: "adult".to_string(),
        version: "1.0".to_string(),
        requested_attributes: [(
            "attr1".to_string(),
            AttributeInfo {
                name: "name".to_string(),
                restrictions: None,
            },
        )]
        .into(),
        requested_predicates: [(
            "pred1".to_string(),
            PredicateInfo {
                name: "age".to_string(),
                p_type: ">=".to_string(),
                p_value: 18,
                restrictions: None,
            },
        )]
        .into(),
        ..Default::default()
    }
}

fn schema_request(id: &str, format: &str) -> CreateSchemaRequest {
    CreateSchemaRequest {
        id: id.to_string(),
        name: "S".to_string(),
        version: "1.0".to_string(),
        format: format.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_agent_crud_with_watch() {
    let hub = Hub::start(StaticLedger::default()).await;
    let mut watch = hub.plane.watch_agents().await.unwrap();

    hub.plane
        .create_schema(schema_request("s1", FORMAT))
        .await
        .unwrap();

    let created = hub.plane.create_agent(agent_request("alice")).await.unwrap();
    assert!(!created.id.is_empty());

    let event = watch.events.recv().await.unwrap();
    assert_eq!(event.event_type, AgentEventType::Add);
    assert_eq!(event.new.unwrap().name, "alice");

    hub.plane
        .update_agent(UpdateAgentRequest {
            name: "alice".to_string(),
            endorsable_schemas: vec!["s1".to_string()],
        })
        .await
        .unwrap();

    let event = watch.events.recv().await.unwrap();
    assert_eq!(event.event_type, AgentEventType::Update);
    assert_eq!(event.new.unwrap().endorsable_schemas, vec!["s1".to_string()]);

    hub.plane.delete_agent("alice".to_string()).await.unwrap();
    let event = watch.events.recv().await.unwrap();
    assert_eq!(event.event_type, AgentEventType::Delete);
    assert_eq!(event.old.unwrap().name, "alice");

    let listed = hub.plane.list_agents(ListRequest::default()).await.unwrap();
    assert_eq!(listed.count, 0);
}

#[tokio::test]
async fn test_duplicate_schema_rejected() {
    let hub = Hub::start(StaticLedger::default()).await;

    hub.plane
        .create_schema(schema_request("s1", "hlindy-zkp-v1.0"))
        .await
        .unwrap();

    let again = hub
        .plane
        .create_schema(schema_request("s1", "hlindy-zkp-v1.0"))
        .await;
    assert!(matches!(again, Err(HubError::AlreadyExists(_))));
}

#[tokio::test]
async fn test_invitation_round_trip() {
    let hub = Hub::start(StaticLedger::default()).await;
    hub.plane.create_agent(agent_request("bob")).await.unwrap();

    hub.connect("bob", "u42").await;

    let connections = hub.plane.list_connections("bob".to_string()).await.unwrap();
    assert_eq!(connections.len(), 1);
    assert!(connections[0].is_completed());

    let accepted = hub.notifications("accepted").await;
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].message["external_id"], "u42");
    assert_eq!(accepted[0].message["their_did"], PEER_DID);
}

#[tokio::test]
async fn test_offer_to_issue() {
    let hub = Hub::start(StaticLedger::default()).await;
    hub.plane
        .create_schema(schema_request("s1", FORMAT))
        .await
        .unwrap();
    hub.plane.create_agent(agent_request("bob")).await.unwrap();
    let hub_did = hub.connect("bob", "u42").await;

    let preview = vec![PreviewAttribute::new("n", "v")];
    let issued = hub
        .plane
        .issue_credential(IssueCredentialRequest {
            agent: "bob".to_string(),
            external_id: "u42".to_string(),
            credential: CredentialParams {
                schema_id: "s1".to_string(),
                comment: None,
                preview: preview.clone(),
            },
        })
        .await
        .unwrap();
    let thid = issued.credential_id;

    let (offer, destination) = hub.wait_sent(OFFER_CREDENTIAL, 0).await;
    assert_eq!(offer.thread_id(), thid);
    assert_eq!(destination.recipient, PEER_DID);

    let offer: OfferCredential = offer.decode().unwrap();
    let offered = offer.offers_attach[0].fetch().unwrap();

    let request = Message::build(
        REQUEST_CREDENTIAL,
        &RequestCredential {
            comment: None,
            formats: vec![AttachFormat {
                attach_id: "request-0".to_string(),
                format: FORMAT.to_string(),
            }],
            requests_attach: vec![Attachment::base64("request-0", "application/json", &offered)],
        },
    )
    .unwrap()
    .with_thread(&thid);

    assert_eq!(
        hub.post(&request, PEER_DID, &hub_did).await,
        Routed::Queued(QUEUE_ISSUE_CREDENTIAL.to_string())
    );

    let (issue, _) = hub.wait_sent(ISSUE_CREDENTIAL, 0).await;
    assert_eq!(issue.thread_id(), thid);

    let issue: IssueCredential = issue.decode().unwrap();
    let credential: Value =
        serde_json::from_slice(&issue.credentials_attach[0].fetch().unwrap()).unwrap();
    assert_eq!(credential["credentialSubject"]["n"], "v");
    assert_eq!(credential["credentialSubject"]["id"], PEER_DID);

    let ack = Ack::ok().into_message(CREDENTIAL_ACK, &thid);
    hub.post(&ack, PEER_DID, &hub_did).await;

    let plane = hub.plane.clone();
    let id = thid.clone();
    let done = eventually(move || {
        let plane = plane.clone();
        let id = id.clone();
        async move {
            plane
                .get_credential(id)
                .await
                .ok()
                .filter(|cred| cred.state == IssuanceState::Done)
        }
    })
    .await;

    assert_eq!(done.preview, preview);
    assert_eq!(done.protocol_id, thid);
}

#[tokio::test]
async fn test_duplicate_delivery_advances_once() {
    let hub = Hub::start(StaticLedger::default()).await;
    hub.plane
        .create_schema(schema_request("s1", FORMAT))
        .await
        .unwrap();
    hub.plane.create_agent(agent_request("bob")).await.unwrap();
    let hub_did = hub.connect("bob", "u42").await;

    let issued = hub
        .plane
        .issue_credential(IssueCredentialRequest {
            agent: "bob".to_string(),
            external_id: "u42".to_string(),
            credential: CredentialParams {
                schema_id: "s1".to_string(),
                comment: None,
                preview: vec![PreviewAttribute::new("n", "v")],
            },
        })
        .await
        .unwrap();
    let thid = issued.credential_id;

    let (offer, _) = hub.wait_sent(OFFER_CREDENTIAL, 0).await;
    let offer: OfferCredential = offer.decode().unwrap();
    let offered = offer.offers_attach[0].fetch().unwrap();

    let request = Message::build(
        REQUEST_CREDENTIAL,
        &RequestCredential {
            comment: None,
            formats: vec![AttachFormat {
                attach_id: "request-0".to_string(),
                format: FORMAT.to_string(),
            }],
            requests_attach: vec![Attachment::base64("request-0", "application/json", &offered)],
        },
    )
    .unwrap()
    .with_thread(&thid);

    hub.post(&request, PEER_DID, &hub_did).await;
    hub.wait_sent(ISSUE_CREDENTIAL, 0).await;

    // the retried request is answered with the same credential
    hub.post(&request, PEER_DID, &hub_did).await;
    let (first, _) = hub.wait_sent(ISSUE_CREDENTIAL, 0).await;
    let (second, _) = hub.wait_sent(ISSUE_CREDENTIAL, 1).await;
    assert_eq!(first, second);

    let ack = Ack::ok().into_message(CREDENTIAL_ACK, &thid);
    hub.post(&ack, PEER_DID, &hub_did).await;
    hub.post(&ack, PEER_DID, &hub_did).await;

    let broker = hub.broker.clone();
    eventually(move || {
        let broker = broker.clone();
        async move {
            let bodies = broker.published(QUEUE_NOTIFICATION).await;
            bodies
                .iter()
                .any(|body| {
                    serde_json::from_slice::<Notification>(body)
                        .map(|n| n.event == "done")
                        .unwrap_or(false)
                })
                .then_some(())
        }
    })
    .await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(hub.notifications("issued").await.len(), 1);
    assert_eq!(hub.notifications("done").await.len(), 1);

    let cred = hub.plane.get_credential(thid).await.unwrap();
    assert_eq!(cred.state, IssuanceState::Done);
}

#[tokio::test]
async fn test_router_dispatch() {
    let broker = Arc::new(MemoryBroker::new());
    let router = Router::new(Arc::new(TestPacker), broker.clone());
    router.declare().await.unwrap();

    let cases = [
        (REQUEST, QUEUE_DIDEXCHANGE),
        (REQUEST_CREDENTIAL, QUEUE_ISSUE_CREDENTIAL),
        (
            "https://didcomm.org/present-proof/2.0/presentation",
            QUEUE_PRESENT_PROOF,
        ),
    ];

    for (msg_type, queue) in cases {
        let envelope = seal(&Message::new(msg_type), PEER_DID, "did:sov:hub");
        let routed = router.route(&envelope).await.unwrap();
        assert_eq!(routed, Routed::Queued(queue.to_string()));
    }

    for (_, queue) in cases {
        assert_eq!(broker.published(queue).await.len(), 1, "queue {}", queue);
    }

    let malformed = seal(&Message::new("foo"), PEER_DID, "did:sov:hub");
    let routed = router.route(&malformed).await.unwrap();
    assert!(matches!(routed, Routed::Dropped(_)));
    assert_eq!(router.dropped(), 1);

    for (_, queue) in cases {
        assert_eq!(broker.published(queue).await.len(), 1, "queue {}", queue);
    }
}

#[tokio::test]
async fn test_public_did_seed() {
    let hub = Hub::start(StaticLedger::with_seed(SEED)).await;

    let did = hub.plane.seed_public_did(SEED.to_string()).await.unwrap();
    assert!(did.public);

    let again = hub.plane.seed_public_did(SEED.to_string()).await;
    assert!(matches!(again, Err(HubError::FailedPrecondition(_))));

    let dids = hub.plane.list_dids().await.unwrap();
    let public: Vec<_> = dids.iter().filter(|did| did.public).collect();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].id, did.id);
}

#[tokio::test]
async fn test_presentation_verified_rejected_and_abandoned() {
    let hub = Hub::start(StaticLedger::default()).await;
    hub.plane
        .create_schema(schema_request("s1", FORMAT))
        .await
        .unwrap();
    hub.plane.create_agent(agent_request("bob")).await.unwrap();

    let wallet = Wallet::open().await;
    let holder = wallet.holder.id.clone();
    let hub_did = hub.connect_as("bob", "u42", &wallet.info()).await;
    let credential = hub.issue("bob", "u42", &hub_did, &holder).await;

    let (piid, request) = hub.ask_proof("bob", "u42", adult_proof()).await;
    let presentation = wallet.present(&piid, &request, &credential).await;
    assert_eq!(
        hub.post(&presentation, &holder, &hub_did).await,
        Routed::Queued(QUEUE_PRESENT_PROOF.to_string())
    );

    let (ack, destination) = hub.wait_sent(PRESENTATION_ACK, 0).await;
    assert_eq!(ack.thread_id(), piid);
    assert_eq!(destination.recipient, holder);
    assert_eq!(hub.settled(&piid).await, PresentationState::Verified);

    let detail = hub.plane.get_presentation_request(piid.clone()).await.unwrap();
    assert_eq!(detail.presentations.len(), 1);
    assert_eq!(detail.presentations[0].their_did, holder);

    let verified = hub.wait_notifications("verified", 1).await;
    assert_eq!(verified.len(), 1);
    assert_eq!(verified[0].message["piid"], piid.as_str());

    // a proof made for the first request does not answer the second one
    let (second, _) = hub.ask_proof("bob", "u42", adult_proof()).await;
    let replayed = wallet.present(&second, &request, &credential).await;
    hub.post(&replayed, &holder, &hub_did).await;

    let (report, destination) = hub.wait_sent(PRESENTATION_PROBLEM_REPORT, 0).await;
    assert_eq!(report.thread_id(), second);
    assert_eq!(destination.recipient, holder);
    assert_eq!(hub.settled(&second).await, PresentationState::Rejected);

    let detail = hub.plane.get_presentation_request(second.clone()).await.unwrap();
    assert!(detail.presentations.is_empty());
    assert_eq!(hub.wait_notifications("rejected", 1).await.len(), 1);

    let (third, _) = hub.ask_proof("bob", "u42", adult_proof()).await;
    let declined = ProblemReport::new("declined", "no matching credential")
        .into_message(PRESENTATION_PROBLEM_REPORT, &third);
    hub.post(&declined, &holder, &hub_did).await;
    assert_eq!(hub.settled(&third).await, PresentationState::Abandoned);

    assert_eq!(hub.count_sent(PRESENTATION_ACK), 1);
    assert_eq!(hub.count_sent(PRESENTATION_PROBLEM_REPORT), 1);
}

#[tokio::test]
async fn test_cloud_agent_accepts_invitation() {
    let hub = Hub::start(StaticLedger::default()).await;

    let signing = SigningKey::from_bytes(&[9u8; 32]);
    let public_key = signing.verifying_key().to_bytes().to_vec();
    let registration = |secret: &str| RegisterCloudAgentRequest {
        external_id: "wallet-1".to_string(),
        public_key: public_key.clone(),
        next_key: public_key.clone(),
        secret: secret.to_string(),
    };

    let refused = hub.bridge.register(registration("guess")).await;
    assert!(matches!(refused, Err(HubError::Unauthenticated(_))));

    let registered = hub.bridge.register(registration(BRIDGE_SECRET)).await.unwrap();

    let invitation = Invitation::ephemeral("inv-cloud", "issuer", "peerverkey", PEER_ENDPOINT);
    let body = serde_json::to_vec(&HandleInvitationRequest {
        invitation: URL_SAFE_NO_PAD.encode(serde_json::to_vec(&invitation).unwrap()),
    })
    .unwrap();

    let signed = signed_payload("POST", "/invitations", &body);
    let signature = URL_SAFE.encode(signing.sign(signed).to_bytes());
    let agent: CloudAgent = hub
        .bridge
        .authenticate(&registered.cloud_agent_id, &signature, signed)
        .await
        .unwrap();

    let forged = hub
        .bridge
        .authenticate(&registered.cloud_agent_id, &signature, b"{}")
        .await;
    assert!(matches!(forged, Err(HubError::Unauthenticated(_))));

    hub.bridge
        .handle_invitation(&agent, serde_json::from_slice(&body).unwrap())
        .await
        .unwrap();

    let (request, destination) = hub.wait_sent(REQUEST, 0).await;
    assert_eq!(destination.recipient, "peerverkey");
    assert_eq!(destination.endpoint.as_deref(), Some(PEER_ENDPOINT));
    assert_eq!(request.parent_thread_id().as_deref(), Some("inv-cloud"));

    let body: Request = request.decode().unwrap();
    assert_eq!(body.label, "wallet-1");
    let hub_did = body.connection.did;

    let pending = hub.bridge.list_connections(&agent).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].status, CloudConnectionStatus::Requested);
    assert_eq!(pending[0].their_label, "issuer");

    let response = Message::build(
        RESPONSE,
        &Response {
            connection: peer_info(),
        },
    )
    .unwrap()
    .with_thread(&request.id)
    .with_parent_thread("inv-cloud");
    assert_eq!(
        hub.post(&response, PEER_DID, &hub_did).await,
        Routed::Queued(QUEUE_DIDEXCHANGE.to_string())
    );

    let (complete, destination) = hub.wait_sent(COMPLETE, 0).await;
    assert_eq!(complete.thread_id(), request.id);
    assert_eq!(destination.recipient, PEER_DID);

    let bridge = hub.bridge.clone();
    let owner = agent.clone();
    let accepted = eventually(move || {
        let bridge = bridge.clone();
        let owner = owner.clone();
        async move {
            bridge
                .list_connections(&owner)
                .await
                .unwrap()
                .into_iter()
                .find(|conn| conn.status == CloudConnectionStatus::Accepted)
        }
    })
    .await;

    assert!(accepted.joins(&hub_did, PEER_DID));
    assert_eq!(accepted.invitation_id, "inv-cloud");
    assert!(accepted.connection_id.is_some());
}
