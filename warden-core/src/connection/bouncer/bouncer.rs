use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{oneshot, Mutex};
use uuid::Uuid;

use crate::common::types::HubError;
use crate::did::{DidDoc, KeyManager, DID};
use crate::didcomm::message::{Message, MessageType};
use crate::didcomm::protocol::didexchange::{
    ConnectionInfo, Invitation, Request, Response, COMPLETE, REQUEST, RESPONSE,
};
use crate::didcomm::protocol::ProblemReport;
use crate::didcomm::types::{Destination, Outbound};
use crate::store::types::{Document, Transition};
use crate::store::Store;
use crate::worker::types::{Inbound, ProtocolHandler};

use super::machine::{poll, Event, Step};
use super::types::{
    exchange_key, BouncerError, Connection, ConnectionOutcome, Exchange, ExchangeState, Notify,
    Role, Waiter,
};

pub const PROTOCOL: &str = "didexchange";

/// Bouncer drives connection bootstraps on both sides of an invitation
///
/// Exchange progress is kept in the store, the completion waiters are held in memory by the
/// process that registered them. Every registered waiter is resolved exactly once, either by the
/// handler that observes the terminal transition or by the timeout
#[derive(Clone)]
pub struct Bouncer {
    store: Store,
    keys: KeyManager,
    outbound: Arc<dyn Outbound>,
    endpoint: String,
    timeout: Duration,
    waiters: Arc<Mutex<HashMap<String, Waiter>>>,
}

impl Bouncer {
    pub fn new(
        store: Store,
        keys: KeyManager,
        outbound: Arc<dyn Outbound>,
        endpoint: &str,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            keys,
            outbound,
            endpoint: endpoint.to_string(),
            timeout,
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// create_invitation_notify creates an invitation bound to a fresh key
    ///
    /// The invitation stays open until a peer answers it, only invitee side exchanges expire
    pub async fn create_invitation_notify(
        &self,
        label: &str,
        notify: Notify,
    ) -> Result<Invitation, BouncerError> {
        let did = self.keys.create_did(Some(self.endpoint.clone())).await?;
        let invitation = Invitation::ephemeral(
            &Uuid::new_v4().to_string(),
            label,
            &did.verkey,
            &self.endpoint,
        );

        self.open_invitation(&invitation, label, &did.id, notify)
            .await?;
        Ok(invitation)
    }

    /// create_invitation_with_did_notify creates an invitation anchored on one of our public DIDs
    pub async fn create_invitation_with_did_notify(
        &self,
        label: &str,
        public_did: &str,
        notify: Notify,
    ) -> Result<Invitation, BouncerError> {
        let did = self
            .store
            .find::<DID>(public_did)
            .await?
            .filter(DID::is_owned)
            .ok_or_else(|| BouncerError::InvalidInvitation(format!("unknown DID {}", public_did)))?;

        let invitation = Invitation::public(&Uuid::new_v4().to_string(), label, &did.id);
        self.open_invitation(&invitation, label, &did.id, notify)
            .await?;
        Ok(invitation)
    }

    async fn open_invitation(
        &self,
        invitation: &Invitation,
        label: &str,
        my_did: &str,
        notify: Notify,
    ) -> Result<(), BouncerError> {
        let exchange = Exchange::inviter(&invitation.id, label, my_did);
        self.store.insert(&exchange).await?;
        self.register(&exchange.key(), Waiter::Notify(notify)).await;

        info!("invitation {} created for {}", invitation.id, label);
        Ok(())
    }

    /// establish_connection accepts an invitation and waits for the bootstrap to complete
    ///
    /// On timeout the exchange is purged and [`BouncerError::Timeout`] is returned
    pub async fn establish_connection(
        &self,
        invitation: &Invitation,
        label: &str,
        timeout: Duration,
    ) -> Result<Connection, BouncerError> {
        let (tx, rx) = oneshot::channel();
        self.start(invitation, label, Waiter::Channel(tx)).await?;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(ConnectionOutcome::Completed(conn))) => Ok(conn),
            Ok(Ok(ConnectionOutcome::Failed(reason))) => Err(BouncerError::Failed(reason)),
            Ok(Ok(ConnectionOutcome::TimedOut)) | Err(_) => {
                self.expire(Role::Invitee, &invitation.id).await;
                Err(BouncerError::Timeout(invitation.id.clone()))
            }
            Ok(Err(_)) => Err(BouncerError::Failed(
                "bootstrap waiter dropped".to_string(),
            )),
        }
    }

    /// establish_connection_notify accepts an invitation and reports through the callbacks
    pub async fn establish_connection_notify(
        &self,
        invitation: &Invitation,
        label: &str,
        notify: Notify,
    ) -> Result<(), BouncerError> {
        self.start(invitation, label, Waiter::Notify(notify)).await?;
        self.arm_timeout(Role::Invitee, &invitation.id, self.timeout);
        Ok(())
    }

    async fn start(
        &self,
        invitation: &Invitation,
        label: &str,
        waiter: Waiter,
    ) -> Result<(), BouncerError> {
        if invitation.id.is_empty() {
            return Err(BouncerError::InvalidInvitation(
                "invitation has no id".to_string(),
            ));
        }

        let recipient = invitation.recipient().ok_or_else(|| {
            BouncerError::InvalidInvitation("invitation has no recipient".to_string())
        })?;

        if invitation.did.is_none() && invitation.service_endpoint.is_none() {
            return Err(BouncerError::InvalidInvitation(
                "invitation has no service endpoint".to_string(),
            ));
        }

        let did = self.keys.create_did(Some(self.endpoint.clone())).await?;
        let request = Message::build(
            REQUEST,
            &Request {
                label: label.to_string(),
                connection: ConnectionInfo {
                    did: did.id.clone(),
                    did_doc: DidDoc::new(&did.id, &did.verkey, Some(&self.endpoint)),
                },
            },
        )
        .map_err(|err| BouncerError::InvalidMessage(err.to_string()))?
        .with_parent_thread(&invitation.id);

        let mut exchange = Exchange::invitee(&invitation.id, label, &did.id, &request.id);
        exchange.their_label = Some(invitation.label.clone());
        self.store.insert(&exchange).await?;
        self.register(&exchange.key(), waiter).await;

        let mut destination = Destination::new(&did.id, &recipient);
        if let Some(endpoint) = &invitation.service_endpoint {
            destination = destination.with_endpoint(endpoint);
        }

        if let Err(err) = self.outbound.send(&request, &destination).await {
            self.waiters.lock().await.remove(&exchange.key());
            if let Err(purge) = self.store.remove::<Exchange>(&exchange.key()).await {
                error!("unable to purge exchange {}: {}", exchange.key(), purge);
            }
            return Err(BouncerError::Outbound(err));
        }

        info!("connection request sent for invitation {}", invitation.id);
        Ok(())
    }

    async fn register(&self, key: &str, waiter: Waiter) {
        self.waiters.lock().await.insert(key.to_string(), waiter);
    }

    fn arm_timeout(&self, role: Role, invitation_id: &str, timeout: Duration) {
        let bouncer = self.clone();
        let invitation_id = invitation_id.to_string();

        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            bouncer.expire(role, &invitation_id).await;
        });
    }

    async fn expire(&self, role: Role, invitation_id: &str) {
        let key = exchange_key(role, invitation_id);
        let waiter = self.waiters.lock().await.remove(&key);

        if let Some(waiter) = waiter {
            warn!("connection bootstrap {} timed out", key);
            if let Err(err) = self.store.remove::<Exchange>(&key).await {
                error!("unable to purge exchange {}: {}", key, err);
            }

            self.deliver(invitation_id, waiter, ConnectionOutcome::TimedOut)
                .await;
        }
    }

    async fn finish(&self, exchange: &Exchange, outcome: ConnectionOutcome) {
        let waiter = self.waiters.lock().await.remove(&exchange.key());
        match waiter {
            Some(waiter) => {
                self.deliver(&exchange.invitation_id, waiter, outcome)
                    .await
            }
            None => debug!("no waiter registered for {}", exchange.key()),
        }
    }

    async fn deliver(&self, invitation_id: &str, waiter: Waiter, outcome: ConnectionOutcome) {
        match waiter {
            Waiter::Channel(tx) => {
                if tx.send(outcome).is_err() {
                    debug!("waiter for {} is gone", invitation_id);
                }
            }
            Waiter::Notify(notify) => {
                let id = invitation_id.to_string();
                let result = match outcome {
                    ConnectionOutcome::Completed(conn) => (notify.on_success)(id, conn).await,
                    ConnectionOutcome::Failed(reason) => (notify.on_fail)(id, reason).await,
                    ConnectionOutcome::TimedOut => {
                        (notify.on_fail)(id, "connection timed out".to_string()).await
                    }
                };

                if let Err(err) = result {
                    error!("bootstrap callback for {} failed: {}", invitation_id, err);
                }
            }
        }
    }

    async fn finish_completed(&self, exchange: &Exchange) {
        let outcome = match exchange.connection() {
            Some(conn) => ConnectionOutcome::Completed(conn),
            None => ConnectionOutcome::Failed("completed without a peer DID".to_string()),
        };

        self.finish(exchange, outcome).await
    }

    /// locate finds the exchange a message belongs to, through its parent thread (the invitation)
    /// or its own thread
    async fn locate(
        &self,
        message: &Message,
        roles: &[Role],
    ) -> Result<Option<Exchange>, BouncerError> {
        let thid = message.thread_id();
        let pthid = message.parent_thread_id();

        for role in roles {
            if let Some(pthid) = &pthid {
                if let Some(found) = self.store.find::<Exchange>(&exchange_key(*role, pthid)).await? {
                    return Ok(Some(found));
                }
            }

            let by_thread = self
                .store
                .first::<Exchange, _>(|exchange| {
                    exchange.role == *role && exchange.thread_id.as_deref() == Some(thid.as_str())
                })
                .await?;

            if by_thread.is_some() {
                return Ok(by_thread);
            }
        }

        Ok(None)
    }

    async fn remember_peer(&self, info: &ConnectionInfo) -> Result<(), BouncerError> {
        let verkey = info.did_doc.verkey().ok_or_else(|| {
            BouncerError::InvalidMessage(format!("DID document of {} has no key", info.did))
        })?;

        if let Some(existing) = self.store.find::<DID>(&info.did).await? {
            if existing.is_owned() {
                return Ok(());
            }
        }

        let peer = DID::new(&info.did, verkey)
            .with_endpoint(info.did_doc.service_endpoint().map(str::to_string));
        self.store.put(&peer).await?;
        Ok(())
    }

    async fn advance(
        &self,
        exchange: &Exchange,
        next: ExchangeState,
        thread_id: Option<String>,
        peer: Option<(String, String)>,
    ) -> Result<Option<Exchange>, BouncerError> {
        let expected = exchange.state;
        let transition = self
            .store
            .transition::<Exchange, _, _>(
                &exchange.key(),
                |current| current.state == expected,
                |mut current| {
                    current.state = next;
                    if let Some(thid) = &thread_id {
                        current.thread_id = Some(thid.clone());
                    }
                    if let Some((did, label)) = &peer {
                        current.their_did = Some(did.clone());
                        if !label.is_empty() {
                            current.their_label = Some(label.clone());
                        }
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
                    "exchange {} moved to {:?} concurrently",
                    current.key(),
                    current.state
                );
                Ok(None)
            }
        }
    }

    async fn send_response(&self, exchange: &Exchange) -> Result<(), BouncerError> {
        let (thid, their_did) = match (&exchange.thread_id, &exchange.their_did) {
            (Some(thid), Some(their_did)) => (thid, their_did),
            _ => {
                return Err(BouncerError::Failed(format!(
                    "exchange {} has no peer yet",
                    exchange.key()
                )))
            }
        };

        let me = self.store.get::<DID>(&exchange.my_did).await?;
        let response = Message::build(
            RESPONSE,
            &Response {
                connection: ConnectionInfo {
                    did: me.id.clone(),
                    did_doc: DidDoc::new(&me.id, &me.verkey, Some(&self.endpoint)),
                },
            },
        )
        .map_err(|err| BouncerError::InvalidMessage(err.to_string()))?
        .with_thread(thid)
        .with_parent_thread(&exchange.invitation_id);

        self.outbound
            .send(&response, &Destination::new(&me.id, their_did))
            .await?;
        Ok(())
    }

    async fn send_complete(&self, exchange: &Exchange) -> Result<(), BouncerError> {
        let (thid, their_did) = match (&exchange.thread_id, &exchange.their_did) {
            (Some(thid), Some(their_did)) => (thid, their_did),
            _ => {
                return Err(BouncerError::Failed(format!(
                    "exchange {} has no peer yet",
                    exchange.key()
                )))
            }
        };

        let complete = Message::new(COMPLETE)
            .with_thread(thid)
            .with_parent_thread(&exchange.invitation_id);

        self.outbound
            .send(&complete, &Destination::new(&exchange.my_did, their_did))
            .await?;
        Ok(())
    }

    async fn on_request(&self, inbound: &Inbound) -> Result<(), BouncerError> {
        let request: Request = inbound
            .message
            .decode()
            .map_err(|err| BouncerError::InvalidMessage(err.to_string()))?;

        let thid = inbound.thread_id();
        let Some(exchange) = self.locate(&inbound.message, &[Role::Inviter]).await? else {
            warn!("connection request {} matches no invitation", thid);
            return Ok(());
        };

        match poll(exchange.role, exchange.state, Event::Request) {
            Step::Advance(next) => {
                self.remember_peer(&request.connection).await?;
                let peer = (request.connection.did.clone(), request.label.clone());

                match self
                    .advance(&exchange, next, Some(thid), Some(peer))
                    .await?
                {
                    Some(updated) => self.send_response(&updated).await,
                    None => Ok(()),
                }
            }
            Step::Duplicate if exchange.thread_id.as_deref() == Some(thid.as_str()) => {
                debug!("duplicate connection request {}, sending response again", thid);
                self.send_response(&exchange).await
            }
            _ => {
                debug!(
                    "ignoring connection request {} for exchange in {:?}",
                    thid, exchange.state
                );
                Ok(())
            }
        }
    }

    async fn on_response(&self, inbound: &Inbound) -> Result<(), BouncerError> {
        let response: Response = inbound
            .message
            .decode()
            .map_err(|err| BouncerError::InvalidMessage(err.to_string()))?;

        let thid = inbound.thread_id();
        let Some(exchange) = self.locate(&inbound.message, &[Role::Invitee]).await? else {
            warn!("connection response {} matches no request", thid);
            return Ok(());
        };

        match poll(exchange.role, exchange.state, Event::Response) {
            Step::Advance(next) => {
                self.remember_peer(&response.connection).await?;
                let peer = (response.connection.did.clone(), String::new());

                if let Some(updated) = self.advance(&exchange, next, None, Some(peer)).await? {
                    if let Err(err) = self.send_complete(&updated).await {
                        warn!("unable to send complete for {}: {}", thid, err);
                    }

                    info!("connection {} completed", updated.connection_id);
                    self.finish_completed(&updated).await;
                }
                Ok(())
            }
            Step::Duplicate => {
                debug!("duplicate connection response {}, sending complete again", thid);
                self.send_complete(&exchange).await
            }
            Step::Ignore => {
                debug!("ignoring connection response {} in {:?}", thid, exchange.state);
                Ok(())
            }
        }
    }

    async fn on_complete(&self, inbound: &Inbound) -> Result<(), BouncerError> {
        let thid = inbound.thread_id();
        let Some(exchange) = self.locate(&inbound.message, &[Role::Inviter]).await? else {
            warn!("connection complete {} matches no exchange", thid);
            return Ok(());
        };

        if let Step::Advance(next) = poll(exchange.role, exchange.state, Event::Complete) {
            if let Some(updated) = self.advance(&exchange, next, None, None).await? {
                info!("connection {} completed", updated.connection_id);
                self.finish_completed(&updated).await;
            }
        }

        Ok(())
    }

    async fn on_problem_report(&self, inbound: &Inbound) -> Result<(), BouncerError> {
        let reason = inbound
            .message
            .decode::<ProblemReport>()
            .map(|report| format!("{}: {}", report.description.code, report.description.en))
            .unwrap_or_else(|_| "problem report".to_string());

        let Some(exchange) = self
            .locate(&inbound.message, &[Role::Inviter, Role::Invitee])
            .await?
        else {
            debug!("problem report {} matches no exchange", inbound.thread_id());
            return Ok(());
        };

        if let Step::Advance(next) = poll(exchange.role, exchange.state, Event::ProblemReport) {
            if let Some(updated) = self.advance(&exchange, next, None, None).await? {
                warn!("connection bootstrap {} abandoned: {}", updated.key(), reason);
                self.finish(&updated, ConnectionOutcome::Failed(reason)).await;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ProtocolHandler for Bouncer {
    fn accept(&self, msg_type: &MessageType) -> bool {
        msg_type.protocol == PROTOCOL
    }

    async fn handle(&self, inbound: Inbound) -> Result<(), HubError> {
        let Some(event) = Event::from_name(&inbound.msg_type.name) else {
            debug!("bouncer ignores {}", inbound.msg_type);
            return Ok(());
        };

        let result = match event {
            Event::Request => self.on_request(&inbound).await,
            Event::Response => self.on_response(&inbound).await,
            Event::Complete => self.on_complete(&inbound).await,
            Event::ProblemReport => self.on_problem_report(&inbound).await,
        };

        result.map_err(HubError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use std::sync::Mutex as StdMutex;

    use mockall::mock;
    use tokio::sync::mpsc;

    use crate::didcomm::protocol::didexchange::{ACK, PROBLEM_REPORT};
    use crate::didcomm::types::DIDCommError;
    use crate::store::MemoryStore;

    mock!(
        FakeOutbound{}

        #[async_trait]
        impl Outbound for FakeOutbound {
            async fn send(&self, message: &Message, destination: &Destination) -> Result<(), DIDCommError>;
        }
    );

    type Sent = Arc<StdMutex<Vec<(Message, Destination)>>>;

    fn recording_outbound() -> (MockFakeOutbound, Sent) {
        let sent: Sent = Arc::new(StdMutex::new(Vec::new()));
        let recorded = sent.clone();

        let mut outbound = MockFakeOutbound::new();
        outbound.expect_send().returning(move |message, destination| {
            recorded
                .lock()
                .unwrap()
                .push((message.clone(), destination.clone()));
            Ok(())
        });

        (outbound, sent)
    }

    fn build_bouncer(outbound: MockFakeOutbound, timeout: Duration) -> (Bouncer, Store) {
        let store = Store::new(Arc::new(MemoryStore::new()));
        let keys = KeyManager::new(store.clone());
        let bouncer = Bouncer::new(
            store.clone(),
            keys,
            Arc::new(outbound),
            "http://hub.example/",
            timeout,
        );
        (bouncer, store)
    }

    fn inbound(message: Message) -> Inbound {
        Inbound {
            msg_type: MessageType::from_str(&message.msg_type).unwrap(),
            message,
            from_did: "did:sov:peer".to_string(),
            to_did: "did:sov:hub".to_string(),
        }
    }

    fn peer_info() -> ConnectionInfo {
        ConnectionInfo {
            did: "did:sov:peer".to_string(),
            did_doc: DidDoc::new("did:sov:peer", "peerverkey", Some("http://peer.example/")),
        }
    }

    fn notify_channel() -> (Notify, mpsc::UnboundedReceiver<Result<Connection, String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let on_fail_tx = tx.clone();

        let notify = Notify::new(
            move |_, conn| async move {
                let _ = tx.send(Ok(conn));
                Ok(())
            },
            move |_, reason| async move {
                let _ = on_fail_tx.send(Err(reason));
                Ok(())
            },
        );
        (notify, rx)
    }

    async fn wait_for_sent(sent: &Sent, count: usize) {
        for _ in 0..100 {
            if sent.lock().unwrap().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("expected {} outbound messages", count);
    }

    #[tokio::test]
    async fn test_inviter_flow_completes_once() {
        let (outbound, sent) = recording_outbound();
        let (bouncer, store) = build_bouncer(outbound, Duration::from_secs(30));
        let (notify, mut outcomes) = notify_channel();

        let invitation = bouncer
            .create_invitation_notify("hub", notify)
            .await
            .unwrap();
        assert_eq!(invitation.recipient_keys.len(), 1);
        assert_eq!(
            invitation.service_endpoint.as_deref(),
            Some("http://hub.example/")
        );

        let request = Message::build(
            REQUEST,
            &Request {
                label: "peer".to_string(),
                connection: peer_info(),
            },
        )
        .unwrap()
        .with_parent_thread(&invitation.id);
        let thid = request.id.clone();

        bouncer.handle(inbound(request.clone())).await.unwrap();
        bouncer.handle(inbound(request)).await.unwrap();

        {
            let sent = sent.lock().unwrap();
            assert_eq!(sent.len(), 2, "duplicate request re-sends the response");
            assert_eq!(sent[0].0.msg_type, RESPONSE);
            assert_eq!(sent[0].0.thread_id(), thid);
            assert_eq!(sent[0].1.recipient, "did:sov:peer");
        }

        let peer = store.get::<DID>("did:sov:peer").await.unwrap();
        assert_eq!(peer.endpoint.as_deref(), Some("http://peer.example/"));

        let ack = Message::new(ACK)
            .with_thread(&thid)
            .with_parent_thread(&invitation.id);
        bouncer.handle(inbound(ack.clone())).await.unwrap();
        bouncer.handle(inbound(ack)).await.unwrap();

        let outcome = outcomes.recv().await.unwrap().unwrap();
        assert_eq!(outcome.their_did, "did:sov:peer");
        assert_eq!(outcome.their_label, "peer");
        assert_eq!(outcome.invitation_id, invitation.id);
        assert!(outcomes.try_recv().is_err());

        let exchange = store
            .get::<Exchange>(&exchange_key(Role::Inviter, &invitation.id))
            .await
            .unwrap();
        assert_eq!(exchange.state, ExchangeState::Completed);
    }

    #[tokio::test]
    async fn test_inviter_ignores_response() {
        let (outbound, _) = recording_outbound();
        let (bouncer, store) = build_bouncer(outbound, Duration::from_secs(30));
        let (notify, _outcomes) = notify_channel();

        let invitation = bouncer
            .create_invitation_notify("hub", notify)
            .await
            .unwrap();

        let response = Message::build(
            RESPONSE,
            &Response {
                connection: peer_info(),
            },
        )
        .unwrap()
        .with_parent_thread(&invitation.id);
        bouncer.handle(inbound(response)).await.unwrap();

        let exchange = store
            .get::<Exchange>(&exchange_key(Role::Inviter, &invitation.id))
            .await
            .unwrap();
        assert_eq!(exchange.state, ExchangeState::Invited);
    }

    #[tokio::test]
    async fn test_establish_connection() {
        let (outbound, sent) = recording_outbound();
        let (bouncer, _) = build_bouncer(outbound, Duration::from_secs(30));

        let invitation =
            Invitation::ephemeral("inv-1", "peer", "peerverkey", "http://peer.example/");
        let waiting = bouncer.clone();
        let task = tokio::spawn(async move {
            waiting
                .establish_connection(&invitation, "hub", Duration::from_secs(5))
                .await
        });

        wait_for_sent(&sent, 1).await;
        let (request, destination) = sent.lock().unwrap()[0].clone();
        assert_eq!(request.msg_type, REQUEST);
        assert_eq!(request.parent_thread_id().as_deref(), Some("inv-1"));
        assert_eq!(destination.recipient, "peerverkey");
        assert_eq!(destination.endpoint.as_deref(), Some("http://peer.example/"));

        let response = Message::build(
            RESPONSE,
            &Response {
                connection: peer_info(),
            },
        )
        .unwrap()
        .with_thread(&request.id);
        bouncer.handle(inbound(response)).await.unwrap();

        let conn = task.await.unwrap().unwrap();
        assert_eq!(conn.their_did, "did:sov:peer");
        assert_eq!(conn.their_label, "peer");

        wait_for_sent(&sent, 2).await;
        assert_eq!(sent.lock().unwrap()[1].0.msg_type, COMPLETE);
    }

    #[tokio::test]
    async fn test_establish_connection_timeout_purges() {
        let (outbound, _) = recording_outbound();
        let (bouncer, store) = build_bouncer(outbound, Duration::from_secs(30));

        let invitation =
            Invitation::ephemeral("inv-2", "peer", "peerverkey", "http://peer.example/");
        let result = bouncer
            .establish_connection(&invitation, "hub", Duration::from_millis(20))
            .await;
        assert!(matches!(result, Err(BouncerError::Timeout(_))));

        let exchange = store
            .find::<Exchange>(&exchange_key(Role::Invitee, "inv-2"))
            .await
            .unwrap();
        assert!(exchange.is_none());
    }

    #[tokio::test]
    async fn test_notify_timeout_calls_on_fail() {
        let (outbound, _) = recording_outbound();
        let (bouncer, store) = build_bouncer(outbound, Duration::from_millis(20));
        let (notify, mut outcomes) = notify_channel();

        let invitation =
            Invitation::ephemeral("inv-4", "peer", "peerverkey", "http://peer.example/");
        bouncer
            .establish_connection_notify(&invitation, "hub", notify)
            .await
            .unwrap();

        let outcome = outcomes.recv().await.unwrap();
        assert!(matches!(outcome, Err(reason) if reason.contains("timed out")));

        let exchange = store
            .find::<Exchange>(&exchange_key(Role::Invitee, "inv-4"))
            .await
            .unwrap();
        assert!(exchange.is_none());
    }

    #[tokio::test]
    async fn test_invitation_outlives_connection_timeout() {
        let (outbound, sent) = recording_outbound();
        let (bouncer, _) = build_bouncer(outbound, Duration::from_millis(50));
        let (notify, mut outcomes) = notify_channel();

        let invitation = bouncer
            .create_invitation_notify("hub", notify)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(outcomes.try_recv().is_err());

        let request = Message::build(
            REQUEST,
            &Request {
                label: "peer".to_string(),
                connection: peer_info(),
            },
        )
        .unwrap()
        .with_parent_thread(&invitation.id);
        bouncer.handle(inbound(request)).await.unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0.msg_type, RESPONSE);
    }

    #[tokio::test]
    async fn test_problem_report_fails_exchange() {
        let (outbound, _) = recording_outbound();
        let (bouncer, store) = build_bouncer(outbound, Duration::from_secs(30));
        let (notify, mut outcomes) = notify_channel();

        let invitation = bouncer
            .create_invitation_notify("hub", notify)
            .await
            .unwrap();

        let report = ProblemReport::new("request_not_accepted", "no thanks")
            .into_message(PROBLEM_REPORT, &invitation.id)
            .with_parent_thread(&invitation.id);
        bouncer.handle(inbound(report)).await.unwrap();

        let outcome = outcomes.recv().await.unwrap();
        assert!(matches!(outcome, Err(reason) if reason.contains("request_not_accepted")));

        let exchange = store
            .get::<Exchange>(&exchange_key(Role::Inviter, &invitation.id))
            .await
            .unwrap();
        assert_eq!(exchange.state, ExchangeState::Abandoned);
    }

    #[tokio::test]
    async fn test_invalid_invitation() {
        let (outbound, _) = recording_outbound();
        let (bouncer, _) = build_bouncer(outbound, Duration::from_secs(30));

        let mut invitation =
            Invitation::ephemeral("inv-3", "peer", "peerverkey", "http://peer.example/");
        invitation.recipient_keys.clear();

        let result = bouncer
            .establish_connection(&invitation, "hub", Duration::from_secs(1))
            .await;
        assert!(matches!(result, Err(BouncerError::InvalidInvitation(_))));
    }
}
