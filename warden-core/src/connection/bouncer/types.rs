use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::common::types::HubError;
use crate::didcomm::types::DIDCommError;
use crate::did::DIDError;
use crate::store::types::{Document, StoreError};

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub type OnSuccess = Box<dyn FnOnce(String, Connection) -> BoxFuture<Result<(), HubError>> + Send>;
pub type OnFail = Box<dyn FnOnce(String, String) -> BoxFuture<Result<(), HubError>> + Send>;

#[derive(Debug, PartialEq, Error, Clone)]
pub enum BouncerError {
    #[error("invalid invitation: {0}")]
    InvalidInvitation(String),

    #[error("connection timed out: {0}")]
    Timeout(String),

    #[error("connection failed: {0}")]
    Failed(String),

    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("did error: {0}")]
    DID(DIDError),

    #[error("outbound error: {0}")]
    Outbound(DIDCommError),
}

impl From<StoreError> for BouncerError {
    fn from(value: StoreError) -> Self {
        BouncerError::Store(value)
    }
}

impl From<DIDError> for BouncerError {
    fn from(value: DIDError) -> Self {
        BouncerError::DID(value)
    }
}

impl From<DIDCommError> for BouncerError {
    fn from(value: DIDCommError) -> Self {
        BouncerError::Outbound(value)
    }
}

impl From<BouncerError> for HubError {
    fn from(value: BouncerError) -> Self {
        match value {
            BouncerError::InvalidInvitation(_) | BouncerError::InvalidMessage(_) => {
                HubError::InvalidArgument(value.to_string())
            }
            BouncerError::Timeout(_) => HubError::DeadlineExceeded(value.to_string()),
            BouncerError::Store(err) => HubError::from(err),
            BouncerError::DID(err) => HubError::from(err),
            other => HubError::Internal(other.to_string()),
        }
    }
}

/// Connection is the result of a completed bootstrap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub my_did: String,
    pub their_did: String,
    pub their_label: String,
    pub invitation_id: String,
}

/// ConnectionOutcome is delivered exactly once per registered exchange
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionOutcome {
    Completed(Connection),
    Failed(String),
    TimedOut,
}

/// Notify is the completion callback pair of the notify variants
pub struct Notify {
    pub(super) on_success: OnSuccess,
    pub(super) on_fail: OnFail,
}

impl Notify {
    pub fn new<S, SF, F, FF>(on_success: S, on_fail: F) -> Self
    where
        S: FnOnce(String, Connection) -> SF + Send + 'static,
        SF: Future<Output = Result<(), HubError>> + Send + 'static,
        F: FnOnce(String, String) -> FF + Send + 'static,
        FF: Future<Output = Result<(), HubError>> + Send + 'static,
    {
        Self {
            on_success: Box::new(move |id, conn| Box::pin(on_success(id, conn))),
            on_fail: Box::new(move |id, reason| Box::pin(on_fail(id, reason))),
        }
    }
}

pub(super) enum Waiter {
    Channel(oneshot::Sender<ConnectionOutcome>),
    Notify(Notify),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Inviter,
    Invitee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeState {
    Invited,
    Requested,
    Responded,
    Completed,
    Abandoned,
}

/// exchange_key is the natural key of an [`Exchange`]
///
/// The role is part of the key so the hub can sit on both sides of the same invitation
pub fn exchange_key(role: Role, invitation_id: &str) -> String {
    match role {
        Role::Inviter => format!("inviter:{}", invitation_id),
        Role::Invitee => format!("invitee:{}", invitation_id),
    }
}

/// Exchange is the persisted progress of one bootstrap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    pub invitation_id: String,
    pub connection_id: String,
    pub role: Role,
    pub state: ExchangeState,
    pub label: String,
    pub my_did: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub their_did: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub their_label: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exchange {
    pub fn inviter(invitation_id: &str, label: &str, my_did: &str) -> Self {
        Self::build(invitation_id, Role::Inviter, ExchangeState::Invited, label, my_did)
    }

    pub fn invitee(invitation_id: &str, label: &str, my_did: &str, thread_id: &str) -> Self {
        let mut exchange =
            Self::build(invitation_id, Role::Invitee, ExchangeState::Requested, label, my_did);
        exchange.thread_id = Some(thread_id.to_string());
        exchange
    }

    fn build(
        invitation_id: &str,
        role: Role,
        state: ExchangeState,
        label: &str,
        my_did: &str,
    ) -> Self {
        let now = Utc::now();
        Self {
            invitation_id: invitation_id.to_string(),
            connection_id: Uuid::new_v4().to_string(),
            role,
            state,
            label: label.to_string(),
            my_did: my_did.to_string(),
            thread_id: None,
            their_did: None,
            their_label: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn connection(&self) -> Option<Connection> {
        let their_did = self.their_did.clone()?;
        Some(Connection {
            id: self.connection_id.clone(),
            my_did: self.my_did.clone(),
            their_did,
            their_label: self.their_label.clone().unwrap_or_default(),
            invitation_id: self.invitation_id.clone(),
        })
    }
}

impl Document for Exchange {
    const COLLECTION: &'static str = "didexchange";

    fn key(&self) -> String {
        exchange_key(self.role, &self.invitation_id)
    }
}
