use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;

use crate::broker::types::{Broker, CONTENT_TYPE_JSON, QUEUE_NOTIFICATION};
use crate::common::types::HubError;

use super::types::{Notification, Notifier};

/// BrokerNotifier publishes notifications on the `notification` queue
#[derive(Clone)]
pub struct BrokerNotifier {
    broker: Arc<dyn Broker>,
}

impl BrokerNotifier {
    pub fn new(broker: Arc<dyn Broker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl Notifier for BrokerNotifier {
    async fn notify(&self, notification: Notification) -> Result<(), HubError> {
        let body = serde_json::to_vec(&notification)
            .map_err(|err| HubError::Internal(err.to_string()))?;

        self.broker
            .publish(QUEUE_NOTIFICATION, body, CONTENT_TYPE_JSON)
            .await?;

        debug!("notification {} published", notification.name());
        Ok(())
    }
}

/// emit publishes a domain event, a failing notifier never fails the protocol step
pub async fn emit(notifier: &dyn Notifier, topic: &str, event: &str, message: Value) {
    let notification = Notification::new(topic, event, message);
    let name = notification.name();

    if let Err(err) = notifier.notify(notification).await {
        warn!("unable to publish notification {}: {}", name, err);
    }
}
