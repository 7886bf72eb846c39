use std::sync::Arc;
use std::time::Duration;

use log::info;

use prople_warden_core::bridge::{Bridge, HolderHandler};
use prople_warden_core::broker::types::{
    Broker, Subscription, QUEUE_DIDEXCHANGE, QUEUE_ISSUE_CREDENTIAL, QUEUE_NOTIFICATION,
    QUEUE_PRESENT_PROOF,
};
use prople_warden_core::connection::bouncer::Bouncer;
use prople_warden_core::control::{ControlDeps, ControlPlane, Watcher};
use prople_warden_core::did::{KeyManager, StoreEndpointResolver};
use prople_warden_core::didcomm::types::{Outbound, Packer};
use prople_warden_core::didcomm::Messenger;
use prople_warden_core::engine::{CredentialRegistry, LdProofEngine, PresentationRegistry};
use prople_warden_core::issuance::IssuanceSupervisor;
use prople_warden_core::ledger::LedgerClient;
use prople_warden_core::notifier::{BrokerNotifier, Dispatcher};
use prople_warden_core::presentation::PresentationSupervisor;
use prople_warden_core::resolver::Resolver;
use prople_warden_core::router::Router;
use prople_warden_core::store::types::DocumentStore;
use prople_warden_core::store::Store;
use prople_warden_core::worker::Worker;

use crate::common::types::CommonError;
use crate::config::Config;

use super::broker::AmqpBroker;
use super::db::Builder as DbBuilder;
use super::didcomm::{HttpTransport, PlaintextPacker};
use super::ledger::HttpLedgerClient;
use super::webhook::HttpWebhookClient;

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(30);

/// Provider owns every runtime collaborator of one daemon process
///
/// Components are built once from [`Config`], the daemon commands only pick which of them
/// they serve
#[derive(Clone)]
pub struct Provider {
    cfg: Config,
    store: Store,
    keys: KeyManager,
    broker: Arc<dyn Broker>,
    packer: Arc<dyn Packer>,
    ledger: Arc<dyn LedgerClient>,
    outbound: Arc<dyn Outbound>,
    notifier: Arc<BrokerNotifier>,
    router: Router,
    credentials: CredentialRegistry,
    presentations: PresentationRegistry,
    bouncer: Bouncer,
    issuance: IssuanceSupervisor,
    presentation: PresentationSupervisor,
    watcher: Watcher,
}

impl Provider {
    /// build opens the configured store and connects to the AMQP server
    pub async fn build(cfg: Config) -> Result<Self, CommonError> {
        let backend = DbBuilder::new(cfg.db().clone()).build()?;
        let broker = AmqpBroker::connect(cfg.amqp())
            .await
            .map_err(|err| CommonError::InternalError(err.to_string()))?;

        Self::with_backends(cfg, backend, Arc::new(broker))
    }

    /// with_backends wires the components over an already opened store and broker
    pub fn with_backends(
        cfg: Config,
        backend: Arc<dyn DocumentStore>,
        broker: Arc<dyn Broker>,
    ) -> Result<Self, CommonError> {
        let store = Store::new(backend);
        let keys = KeyManager::new(store.clone());
        let packer: Arc<dyn Packer> = Arc::new(PlaintextPacker::new());

        let ledger_cfg = cfg.ledger();
        let ledger: Arc<dyn LedgerClient> = Arc::new(
            HttpLedgerClient::new(
                &ledger_cfg.get_url(),
                Duration::from_secs(ledger_cfg.get_timeout_secs()),
            )
            .map_err(|err| CommonError::InternalError(err.to_string()))?,
        );

        let router = Router::new(packer.clone(), broker.clone());
        let transport = HttpTransport::new(OUTBOUND_TIMEOUT)
            .map_err(|err| CommonError::InternalError(err.to_string()))?
            .with_inbound(router.clone());

        let resolver = StoreEndpointResolver::new(store.clone(), ledger.clone());
        let outbound: Arc<dyn Outbound> = Arc::new(Messenger::new(
            packer.clone(),
            Arc::new(resolver),
            Arc::new(transport),
        ));
        let notifier = Arc::new(BrokerNotifier::new(broker.clone()));

        let engine = Arc::new(LdProofEngine::new(store.clone(), keys.clone()));
        let credentials = CredentialRegistry::new().with_engine(engine.clone());
        let presentations = PresentationRegistry::new().with_engine(engine);

        let endpoint = cfg.router().get_external();
        let bouncer = Bouncer::new(
            store.clone(),
            keys.clone(),
            outbound.clone(),
            &endpoint,
            Duration::from_secs(cfg.workers().get_connection_timeout_secs()),
        );
        let issuance = IssuanceSupervisor::new(
            store.clone(),
            credentials.clone(),
            outbound.clone(),
            notifier.clone(),
        );
        let presentation = PresentationSupervisor::new(
            store.clone(),
            presentations.clone(),
            outbound.clone(),
            notifier.clone(),
        );

        let watcher = Watcher::new(cfg.workers().get_watch_mailbox());

        info!("provider ready (endpoint: {})", endpoint);
        Ok(Self {
            cfg,
            store,
            keys,
            broker,
            packer,
            ledger,
            outbound,
            notifier,
            router,
            credentials,
            presentations,
            bouncer,
            issuance,
            presentation,
            watcher,
        })
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn store(&self) -> Store {
        self.store.clone()
    }

    pub fn broker(&self) -> Arc<dyn Broker> {
        self.broker.clone()
    }

    /// router declares the protocol queues before handing out the inbound router
    pub async fn router(&self) -> Result<Router, CommonError> {
        self.router
            .declare()
            .await
            .map_err(|err| CommonError::InternalError(err.to_string()))?;
        Ok(self.router.clone())
    }

    /// control_plane hands out an admin API, every plane of one provider shares the agent watcher
    pub fn control_plane(&self) -> ControlPlane {
        let deps = ControlDeps {
            store: self.store.clone(),
            keys: self.keys.clone(),
            bouncer: self.bouncer.clone(),
            issuance: self.issuance.clone(),
            presentation: self.presentation.clone(),
            engines: self.credentials.clone(),
            ledger: self.ledger.clone(),
            notifier: self.notifier.clone(),
            endpoint: self.cfg.router().get_external(),
        };

        ControlPlane::new(deps, self.watcher.clone())
    }

    pub fn bridge(&self) -> Bridge {
        Bridge::new(
            self.store.clone(),
            self.bouncer.clone(),
            self.credentials.clone(),
            self.presentations.clone(),
            self.outbound.clone(),
            &self.cfg.bridge().get_secret(),
        )
    }

    pub fn resolver(&self) -> Resolver {
        Resolver::new(self.ledger.clone(), &self.cfg.resolver().get_method())
    }

    pub fn dispatcher(&self) -> Result<Dispatcher, CommonError> {
        let client = HttpWebhookClient::new(Duration::from_secs(10))
            .map_err(|err| CommonError::InternalError(err.to_string()))?;
        Ok(Dispatcher::new(self.store.clone(), Arc::new(client)))
    }

    /// worker builds the consumer of one protocol queue
    ///
    /// The holder handler goes first, messages addressed to a cloud agent never reach the
    /// supervisors
    pub fn worker(&self, queue: &str) -> Result<Worker, CommonError> {
        let holder = Arc::new(HolderHandler::new(self.store.clone(), self.outbound.clone()));
        let worker = Worker::new(queue, self.broker.clone(), self.packer.clone())
            .with_concurrency(self.cfg.workers().get_concurrency());

        let worker = match queue {
            QUEUE_DIDEXCHANGE => worker.with_handler(Arc::new(self.bouncer.clone())),
            QUEUE_ISSUE_CREDENTIAL => worker
                .with_handler(holder)
                .with_handler(Arc::new(self.issuance.clone())),
            QUEUE_PRESENT_PROOF => worker
                .with_handler(holder)
                .with_handler(Arc::new(self.presentation.clone())),
            other => {
                return Err(CommonError::ValidationError(format!(
                    "no worker for queue {}",
                    other
                )))
            }
        };

        Ok(worker)
    }

    /// notifications declares the notification queue and opens its subscription
    pub async fn notifications(&self) -> Result<Subscription, CommonError> {
        self.broker
            .declare(QUEUE_NOTIFICATION)
            .await
            .map_err(|err| CommonError::InternalError(err.to_string()))?;

        self.broker
            .consume(QUEUE_NOTIFICATION)
            .await
            .map_err(|err| CommonError::InternalError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use prople_warden_core::agent::Agent;
    use prople_warden_core::broker::MemoryBroker;
    use prople_warden_core::control::types::CreateAgentRequest;
    use prople_warden_core::control::AdminAPI;
    use prople_warden_core::store::MemoryStore;

    use crate::common::helpers::testconfig;

    fn provider() -> Provider {
        Provider::with_backends(
            testconfig::global_config().clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(MemoryBroker::new()),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_control_plane_shares_store() {
        let provider = provider();
        let plane = provider.control_plane();

        let created = plane
            .create_agent(CreateAgentRequest {
                name: "alice".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let agent = provider
            .store()
            .find::<Agent>("alice")
            .await
            .unwrap();
        assert!(agent.is_some());
        assert!(!created.id.is_empty());
    }

    #[tokio::test]
    async fn test_control_planes_share_watcher() {
        let provider = provider();

        let mut watch = provider.control_plane().watch_agents().await.unwrap();
        provider
            .control_plane()
            .create_agent(CreateAgentRequest {
                name: "bob".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();

        let event = watch.events.recv().await.unwrap();
        assert_eq!(event.new.map(|agent| agent.name), Some("bob".to_string()));
    }

    #[test]
    fn test_worker_per_queue() {
        let provider = provider();

        for queue in [QUEUE_DIDEXCHANGE, QUEUE_ISSUE_CREDENTIAL, QUEUE_PRESENT_PROOF] {
            let worker = provider.worker(queue).unwrap();
            assert_eq!(worker.queue(), queue);
        }

        let result = provider.worker("foo");
        assert!(matches!(result, Err(CommonError::ValidationError(_))));
    }
}
