use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::agent::{Agent, AgentEvent};
use crate::common::types::HubError;
use crate::connection::bouncer::{Bouncer, Connection, Notify};
use crate::connection::{connection_key, AgentConnection, ConnectionState};
use crate::did::{expand_verkey, KeyManager, KeyPair, DID};
use crate::didcomm::protocol::didexchange::Invitation;
use crate::engine::types::Format;
use crate::engine::CredentialRegistry;
use crate::issuance::{IssuanceSupervisor, IssuedCredential};
use crate::ledger::LedgerClient;
use crate::notifier::types::{EVENT_ACCEPTED, TOPIC_CONNECTIONS};
use crate::notifier::{emit, Notifier, Webhook};
use crate::presentation::{Presentation, PresentationRequest, PresentationSupervisor};
use crate::schema::Schema;
use crate::store::types::{Document, StoreError, Transition};
use crate::store::Store;

use super::types::*;
use super::watcher::{AgentWatch, Watcher};

const PUBLIC_ANCHOR_KEY: &str = "public";

/// PublicAnchor is the single document that makes seeding the public DID a one time operation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct PublicAnchor {
    did: String,
}

impl Document for PublicAnchor {
    const COLLECTION: &'static str = "public-did";

    fn key(&self) -> String {
        PUBLIC_ANCHOR_KEY.to_string()
    }
}

/// ControlDeps are the collaborators of the control plane, built once at startup
#[derive(Clone)]
pub struct ControlDeps {
    pub store: Store,
    pub keys: KeyManager,
    pub bouncer: Bouncer,
    pub issuance: IssuanceSupervisor,
    pub presentation: PresentationSupervisor,
    pub engines: CredentialRegistry,
    pub ledger: Arc<dyn LedgerClient>,
    pub notifier: Arc<dyn Notifier>,
    pub endpoint: String,
}

/// ControlPlane implements [`AdminAPI`]
#[derive(Clone)]
pub struct ControlPlane {
    deps: ControlDeps,
    watcher: Watcher,
}

impl ControlPlane {
    pub fn new(deps: ControlDeps, watcher: Watcher) -> Self {
        Self { deps, watcher }
    }

    fn store(&self) -> &Store {
        &self.deps.store
    }

    async fn load_agent(&self, name: &str) -> Result<Agent, HubError> {
        self.store()
            .find::<Agent>(name)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("agent {}", name)))
    }

    async fn load_schema(&self, id: &str) -> Result<Schema, HubError> {
        self.store()
            .find::<Schema>(id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("schema {}", id)))
    }

    async fn public_did(&self) -> Result<Option<DID>, HubError> {
        Ok(self.store().first::<DID, _>(|did| did.public).await?)
    }

    /// purge_exchanges drops the issued credentials and presentation requests of an agent together
    /// with the presentations received for those requests
    async fn purge_exchanges(&self, agent: &str) -> Result<(), HubError> {
        let credentials = self
            .store()
            .filter::<IssuedCredential, _>(|cred| cred.agent == agent)
            .await?;
        for cred in credentials {
            self.store().remove::<IssuedCredential>(&cred.key()).await?;
        }

        let requests = self
            .store()
            .filter::<PresentationRequest, _>(|req| req.agent == agent)
            .await?;
        for req in requests {
            let presentations = self
                .store()
                .filter::<Presentation, _>(|p| p.piid == req.piid)
                .await?;
            for presentation in presentations {
                self.store().remove::<Presentation>(&presentation.key()).await?;
            }
            self.store().remove::<PresentationRequest>(&req.key()).await?;
        }

        Ok(())
    }

    /// claim_anchor takes the public DID slot, a slot already held by the same DID is reused so an
    /// interrupted seed can be retried
    async fn claim_anchor(&self, did_id: &str) -> Result<(), HubError> {
        let anchor = PublicAnchor {
            did: did_id.to_string(),
        };

        match self.store().insert(&anchor).await {
            Ok(()) => Ok(()),
            Err(StoreError::AlreadyExists(_)) => match self.store().find::<PublicAnchor>(PUBLIC_ANCHOR_KEY).await? {
                Some(held) if held.did == did_id => Ok(()),
                _ => Err(HubError::FailedPrecondition(
                    "public DID already exists".to_string(),
                )),
            },
            Err(err) => Err(err.into()),
        }
    }

    async fn publish_did(&self, mut did: DID) -> Result<DID, HubError> {
        did.public = true;
        self.store().put(&did).await?;

        let others = self
            .store()
            .filter::<DID, _>(|other| other.public && other.id != did.id)
            .await?;
        for other in others {
            self.store()
                .transition::<DID, _, _>(
                    &other.id,
                    |current| current.public,
                    |mut current| {
                        current.public = false;
                        current
                    },
                )
                .await?;
        }

        Ok(did)
    }

    /// register_schema hands a schema to the engine of its format, failures are only logged
    async fn register_schema(&self, registrant: &DID, schema: &Schema) -> Option<String> {
        let engine = match self.deps.engines.resolve(schema.format.as_str()) {
            Ok(engine) => engine,
            Err(err) => {
                warn!("schema {} not registered: {}", schema.id, err);
                return None;
            }
        };

        match engine.register_schema(registrant, schema).await {
            Ok(external_id) => Some(external_id),
            Err(err) => {
                warn!("engine refused schema {}: {}", schema.id, err);
                None
            }
        }
    }

    fn build_schema(req: CreateSchemaRequest) -> Result<Schema, HubError> {
        if req.name.is_empty() {
            return Err(HubError::InvalidArgument("schema name is missing".to_string()));
        }

        let format = Format::from_str(&req.format)?;
        let id = if req.id.is_empty() {
            Uuid::new_v4().to_string()
        } else {
            req.id
        };

        let mut schema = Schema::new(&id, &req.name, &req.version, format);
        schema.schema_type = req.schema_type;
        schema.context = req.context;
        schema.attributes = req.attributes;
        Ok(schema)
    }

    /// connection_notify completes the agent connection once the bootstrap of its invitation
    /// finishes, a connection re-invited in the meantime is left alone
    fn connection_notify(&self, agent: &str, external_id: &str) -> Notify {
        let store = self.store().clone();
        let notifier = self.deps.notifier.clone();
        let agent = agent.to_string();
        let external_id = external_id.to_string();
        let failed_key = connection_key(&agent, &external_id);

        Notify::new(
            move |invitation_id: String, conn: Connection| async move {
                let key = connection_key(&agent, &external_id);
                let transition = store
                    .transition::<AgentConnection, _, _>(
                        &key,
                        |current| {
                            current.state == ConnectionState::Invited
                                && current.invitation_id == invitation_id
                        },
                        |mut current| {
                            current.state = ConnectionState::Completed;
                            current.my_did = Some(conn.my_did.clone());
                            current.their_did = Some(conn.their_did.clone());
                            current.their_label = Some(conn.their_label.clone());
                            current.connection_id = Some(conn.id.clone());
                            current.updated_at = Utc::now();
                            current
                        },
                    )
                    .await?;

                match transition {
                    Transition::Applied(completed) => {
                        info!("agent {} connected to {}", agent, external_id);
                        emit(
                            notifier.as_ref(),
                            TOPIC_CONNECTIONS,
                            EVENT_ACCEPTED,
                            json!({
                                "agent_id": completed.agent,
                                "my_did": conn.my_did,
                                "their_did": conn.their_did,
                                "connection_id": conn.id,
                                "external_id": completed.external_id,
                            }),
                        )
                        .await;
                    }
                    Transition::Rejected(_) => {
                        warn!("connection {} moved on, invitation {} ignored", key, invitation_id)
                    }
                }
                Ok(())
            },
            move |invitation_id: String, reason: String| async move {
                warn!(
                    "connection {} for invitation {} failed: {}",
                    failed_key, invitation_id, reason
                );
                Ok(())
            },
        )
    }

    async fn prepare_connection(&self, agent: &str, external_id: &str) -> Result<(), HubError> {
        if external_id.is_empty() {
            return Err(HubError::InvalidArgument("externalID is missing".to_string()));
        }

        let key = connection_key(agent, external_id);
        match self.store().find::<AgentConnection>(&key).await? {
            Some(conn) if conn.is_completed() => Err(HubError::AlreadyExists(format!(
                "connection {} of agent {}",
                external_id, agent
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl AdminAPI for ControlPlane {
    async fn create_agent(&self, req: CreateAgentRequest) -> Result<CreateAgentResponse, HubError> {
        if req.name.is_empty() {
            return Err(HubError::InvalidArgument("agent name is missing".to_string()));
        }

        if self.store().find::<Agent>(&req.name).await?.is_some() {
            return Err(HubError::AlreadyExists(format!("agent {}", req.name)));
        }

        let mut schemas = Vec::with_capacity(req.endorsable_schemas.len());
        for id in &req.endorsable_schemas {
            schemas.push(self.load_schema(id).await?);
        }

        let mut agent = Agent::new(&req.name).with_schemas(req.endorsable_schemas.clone());
        if req.public_did {
            let did = self
                .deps
                .keys
                .create_did(Some(self.deps.endpoint.clone()))
                .await?;

            for schema in &schemas {
                self.register_schema(&did, schema).await;
            }
            agent.public_did = Some(did.id);
        }

        self.store().insert(&agent).await?;
        self.watcher.publish(AgentEvent::added(agent.clone())).await;

        info!("agent {} created", agent.name);
        Ok(CreateAgentResponse { id: agent.id })
    }

    async fn list_agents(&self, req: ListRequest) -> Result<ListAgentResponse, HubError> {
        let filter = req.name.unwrap_or_default();
        let mut agents = self
            .store()
            .filter::<Agent, _>(|agent| agent.name.contains(&filter))
            .await?;
        agents.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(ListAgentResponse {
            count: agents.len(),
            agents: req.page.paginate(agents),
        })
    }

    async fn get_agent(&self, name: String) -> Result<Agent, HubError> {
        self.load_agent(&name).await
    }

    async fn update_agent(&self, req: UpdateAgentRequest) -> Result<Agent, HubError> {
        let old = self.load_agent(&req.name).await?;
        for id in &req.endorsable_schemas {
            self.load_schema(id).await?;
        }

        let mut agent = old.clone();
        agent.endorsable_schemas = req.endorsable_schemas;
        agent.updated_at = Utc::now();
        self.store().put(&agent).await?;

        self.watcher
            .publish(AgentEvent::updated(old, agent.clone()))
            .await;
        Ok(agent)
    }

    async fn delete_agent(&self, name: String) -> Result<(), HubError> {
        let agent = self.load_agent(&name).await?;

        let referenced = self
            .store()
            .first::<AgentConnection, _>(|conn| conn.agent == agent.name)
            .await?;
        if referenced.is_some() {
            return Err(HubError::FailedPrecondition(format!(
                "agent {} still has connections",
                agent.name
            )));
        }

        self.purge_exchanges(&agent.name).await?;
        self.store().remove::<Agent>(&agent.name).await?;
        self.watcher.publish(AgentEvent::deleted(agent)).await;

        info!("agent {} deleted", name);
        Ok(())
    }

    async fn watch_agents(&self) -> Result<AgentWatch, HubError> {
        Ok(self.watcher.subscribe().await)
    }

    async fn unwatch_agents(&self, id: String) -> Result<(), HubError> {
        self.watcher.unsubscribe(&id).await;
        Ok(())
    }

    async fn create_schema(
        &self,
        req: CreateSchemaRequest,
    ) -> Result<CreateSchemaResponse, HubError> {
        let mut schema = Self::build_schema(req)?;
        self.store().insert(&schema).await?;

        match self.public_did().await? {
            Some(registrant) => {
                if let Some(external_id) = self.register_schema(&registrant, &schema).await {
                    schema.external_schema_id = Some(external_id);
                    self.store().put(&schema).await?;
                }
            }
            None => info!("schema {} stored without a public DID to register it", schema.id),
        }

        Ok(CreateSchemaResponse { id: schema.id })
    }

    async fn list_schemas(&self, req: ListRequest) -> Result<ListSchemaResponse, HubError> {
        let filter = req.name.unwrap_or_default();
        let mut schemas = self
            .store()
            .filter::<Schema, _>(|schema| schema.name.contains(&filter))
            .await?;
        schemas.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(ListSchemaResponse {
            count: schemas.len(),
            schemas: req.page.paginate(schemas),
        })
    }

    async fn get_schema(&self, id: String) -> Result<Schema, HubError> {
        self.load_schema(&id).await
    }

    async fn update_schema(&self, req: CreateSchemaRequest) -> Result<Schema, HubError> {
        let current = self.load_schema(&req.id).await?;
        if current.external_schema_id.is_some() {
            return Err(HubError::FailedPrecondition(format!(
                "schema {} is registered and cannot change",
                current.id
            )));
        }

        let schema = Self::build_schema(req)?;
        self.store().put(&schema).await?;
        Ok(schema)
    }

    async fn delete_schema(&self, id: String) -> Result<(), HubError> {
        self.load_schema(&id).await?;

        let endorsing = self
            .store()
            .first::<Agent, _>(|agent| agent.can_endorse(&id))
            .await?;
        if let Some(agent) = endorsing {
            return Err(HubError::FailedPrecondition(format!(
                "schema {} is endorsed by agent {}",
                id, agent.name
            )));
        }

        self.store().remove::<Schema>(&id).await?;
        Ok(())
    }

    async fn issue_credential(
        &self,
        req: IssueCredentialRequest,
    ) -> Result<IssueCredentialResponse, HubError> {
        let credential = self
            .deps
            .issuance
            .offer(
                &req.agent,
                &req.external_id,
                &req.credential.schema_id,
                req.credential.comment,
                req.credential.preview,
            )
            .await?;

        Ok(IssueCredentialResponse {
            credential_id: credential.id,
        })
    }

    async fn request_presentation(
        &self,
        req: RequestPresentationRequest,
    ) -> Result<RequestPresentationResponse, HubError> {
        let request = self
            .deps
            .presentation
            .request(&req.agent, &req.external_id, &req.presentation)
            .await?;

        Ok(RequestPresentationResponse {
            presentation_id: request.id,
        })
    }

    async fn get_agent_invitation(
        &self,
        req: GetAgentInvitationRequest,
    ) -> Result<InvitationResponse, HubError> {
        let agent = self.load_agent(&req.agent).await?;
        self.prepare_connection(&agent.name, &req.external_id).await?;

        let label = if req.name.is_empty() {
            agent.name.clone()
        } else {
            req.name.clone()
        };

        let notify = self.connection_notify(&agent.name, &req.external_id);
        let invitation = match &agent.public_did {
            Some(did) => {
                self.deps
                    .bouncer
                    .create_invitation_with_did_notify(&label, did, notify)
                    .await?
            }
            None => self.deps.bouncer.create_invitation_notify(&label, notify).await?,
        };

        let conn = AgentConnection::invited(&agent.name, &req.external_id, &invitation.id);
        self.store().put(&conn).await?;

        let encoded = serde_json::to_string(&invitation)
            .map_err(|err| HubError::Internal(err.to_string()))?;

        info!(
            "invitation {} issued for {} of agent {}",
            invitation.id, req.external_id, agent.name
        );
        Ok(InvitationResponse {
            invitation: encoded,
        })
    }

    async fn accept_invitation(&self, req: AcceptInvitationRequest) -> Result<(), HubError> {
        let invitation: Invitation = serde_json::from_str(&req.invitation)
            .map_err(|err| HubError::InvalidArgument(format!("invalid invitation: {}", err)))?;

        let agent = self.load_agent(&req.agent).await?;
        self.prepare_connection(&agent.name, &req.external_id).await?;

        let conn = AgentConnection::invited(&agent.name, &req.external_id, &invitation.id);
        self.store().put(&conn).await?;

        let label = if req.name.is_empty() {
            agent.name.clone()
        } else {
            req.name.clone()
        };

        let notify = self.connection_notify(&agent.name, &req.external_id);
        self.deps
            .bouncer
            .establish_connection_notify(&invitation, &label, notify)
            .await?;

        Ok(())
    }

    async fn seed_public_did(&self, seed: String) -> Result<DID, HubError> {
        if let Some(existing) = self.public_did().await? {
            return Err(HubError::FailedPrecondition(format!(
                "public DID {} already exists",
                existing.id
            )));
        }

        let keypair = KeyPair::from_seed(&seed)?;
        let did_id = keypair.did()?;

        let nym = self.deps.ledger.get_nym(&did_id).await?;
        if expand_verkey(&did_id, &nym.verkey)? != keypair.verkey() {
            return Err(HubError::InvalidArgument(format!(
                "seed does not match the verkey of {} on the ledger",
                did_id
            )));
        }

        self.deps.keys.import(&keypair).await?;
        let did = DID::new(&did_id, keypair.verkey())
            .with_key(&keypair.id)
            .with_endpoint(Some(self.deps.endpoint.clone()));
        self.store().put(&did).await?;

        self.claim_anchor(&did_id).await?;
        let did = match self.publish_did(did).await {
            Ok(did) => did,
            Err(err) => {
                if let Err(release) = self.store().remove::<PublicAnchor>(PUBLIC_ANCHOR_KEY).await {
                    warn!("unable to release public DID anchor: {}", release);
                }
                return Err(err);
            }
        };

        info!("public DID {} seeded", did.id);
        Ok(did)
    }

    async fn list_dids(&self) -> Result<Vec<DID>, HubError> {
        let mut dids = self.store().list::<DID>().await?;
        dids.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(dids)
    }

    async fn list_connections(&self, agent: String) -> Result<Vec<AgentConnection>, HubError> {
        self.load_agent(&agent).await?;

        let mut conns = self
            .store()
            .filter::<AgentConnection, _>(|conn| conn.agent == agent)
            .await?;
        conns.sort_by(|a, b| a.external_id.cmp(&b.external_id));
        Ok(conns)
    }

    async fn delete_connection(
        &self,
        agent: String,
        external_id: String,
    ) -> Result<(), HubError> {
        let removed = self
            .store()
            .remove::<AgentConnection>(&connection_key(&agent, &external_id))
            .await?;

        if !removed {
            return Err(HubError::NotFound(format!(
                "connection {} of agent {}",
                external_id, agent
            )));
        }
        Ok(())
    }

    async fn list_credentials(
        &self,
        agent: Option<String>,
    ) -> Result<Vec<IssuedCredential>, HubError> {
        let mut creds = self
            .store()
            .filter::<IssuedCredential, _>(|cred| {
                agent.as_deref().map_or(true, |name| cred.agent == name)
            })
            .await?;
        creds.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(creds)
    }

    async fn get_credential(&self, id: String) -> Result<IssuedCredential, HubError> {
        self.store()
            .find::<IssuedCredential>(&id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("credential {}", id)))
    }

    async fn get_presentation_request(
        &self,
        id: String,
    ) -> Result<PresentationRequestDetail, HubError> {
        let request = self
            .store()
            .find::<PresentationRequest>(&id)
            .await?
            .ok_or_else(|| HubError::NotFound(format!("presentation request {}", id)))?;

        let presentations = self
            .store()
            .filter::<Presentation, _>(|presentation| presentation.piid == request.piid)
            .await?;

        Ok(PresentationRequestDetail {
            request,
            presentations,
        })
    }

    async fn add_webhook(&self, topic: String, url: String) -> Result<Webhook, HubError> {
        if topic.is_empty() {
            return Err(HubError::InvalidArgument("webhook topic is missing".to_string()));
        }

        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(HubError::InvalidArgument(format!("invalid webhook url {}", url)));
        }

        let hook = Webhook::new(&topic, &url);
        self.store().insert(&hook).await?;
        Ok(hook)
    }

    async fn list_webhooks(&self, topic: String) -> Result<Vec<Webhook>, HubError> {
        Ok(self
            .store()
            .filter::<Webhook, _>(|hook| hook.topic == topic)
            .await?)
    }

    async fn delete_webhook(&self, topic: String) -> Result<usize, HubError> {
        let hooks = self.list_webhooks(topic.clone()).await?;
        if hooks.is_empty() {
            return Err(HubError::NotFound(format!("webhooks of {}", topic)));
        }

        for hook in &hooks {
            self.store().remove::<Webhook>(&hook.id).await?;
        }
        Ok(hooks.len())
    }
}
