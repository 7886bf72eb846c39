use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::common::types::HubError;
use crate::store::types::Document;

pub const TOPIC_CONNECTIONS: &str = "connections";
pub const TOPIC_CREDENTIALS: &str = "credentials";
pub const TOPIC_PRESENTATIONS: &str = "presentations";

pub const EVENT_ACCEPTED: &str = "accepted";
pub const EVENT_PROPOSED: &str = "proposed";
pub const EVENT_ISSUED: &str = "issued";
pub const EVENT_DONE: &str = "done";
pub const EVENT_ABANDONED: &str = "abandoned";
pub const EVENT_VERIFIED: &str = "verified";
pub const EVENT_REJECTED: &str = "rejected";

/// Notification is a domain event travelling on the notification queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub topic: String,
    pub event: String,
    pub message: Value,
}

impl Notification {
    pub fn new(topic: &str, event: &str, message: Value) -> Self {
        Self {
            topic: topic.to_string(),
            event: event.to_string(),
            message,
        }
    }

    /// name is the `<topic>/<event>` form used in logs and webhook payloads
    pub fn name(&self) -> String {
        format!("{}/{}", self.topic, self.event)
    }
}

/// EventMessage is the body POSTed to a webhook
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventMessage {
    pub event: String,
    pub timestamp: DateTime<Utc>,
    pub message: Value,
}

impl From<&Notification> for EventMessage {
    fn from(value: &Notification) -> Self {
        Self {
            event: value.name(),
            timestamp: Utc::now(),
            message: value.message.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Webhook {
    pub id: String,
    pub topic: String,
    pub url: String,
}

impl Webhook {
    pub fn new(topic: &str, url: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            topic: topic.to_string(),
            url: url.to_string(),
        }
    }
}

impl Document for Webhook {
    const COLLECTION: &'static str = "webhooks";

    fn key(&self) -> String {
        self.id.clone()
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: Notification) -> Result<(), HubError>;
}

/// `WebhookClient` delivers an event to a webhook url and returns the HTTP status
#[async_trait]
pub trait WebhookClient: Send + Sync {
    async fn post(&self, url: &str, event: &EventMessage) -> Result<u16, HubError>;
}
