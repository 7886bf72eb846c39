use std::sync::Arc;

use log::{debug, error, info, warn};

use crate::broker::types::Subscription;
use crate::common::types::HubError;
use crate::store::Store;

use super::types::{EventMessage, Notification, Webhook, WebhookClient};

/// Dispatcher fans notifications out to the webhooks registered for their topic
#[derive(Clone)]
pub struct Dispatcher {
    store: Store,
    client: Arc<dyn WebhookClient>,
}

impl Dispatcher {
    pub fn new(store: Store, client: Arc<dyn WebhookClient>) -> Self {
        Self { store, client }
    }

    /// dispatch returns the number of webhooks that accepted the event
    pub async fn dispatch(&self, notification: &Notification) -> Result<usize, HubError> {
        let topic = notification.topic.clone();
        let hooks = self
            .store
            .filter::<Webhook, _>(|hook| hook.topic == topic)
            .await?;

        if hooks.is_empty() {
            debug!("no webhook registered for {}", notification.name());
            return Ok(0);
        }

        let event = EventMessage::from(notification);
        let mut delivered = 0;
        for hook in hooks {
            match self.client.post(&hook.url, &event).await {
                Ok(200) | Ok(204) => delivered += 1,
                Ok(status) => warn!(
                    "webhook {} answered {} for {}",
                    hook.url,
                    status,
                    notification.name()
                ),
                Err(err) => warn!("webhook {} failed: {}", hook.url, err),
            }
        }

        Ok(delivered)
    }

    /// run consumes the notification queue until the subscription closes
    pub async fn run(&self, mut subscription: Subscription) {
        info!("webhook dispatcher started");

        while let Some(delivery) = subscription.next().await {
            match serde_json::from_slice::<Notification>(delivery.body()) {
                Ok(notification) => {
                    if let Err(err) = self.dispatch(&notification).await {
                        error!("unable to dispatch {}: {}", notification.name(), err);
                    }
                }
                Err(err) => warn!("dropping malformed notification: {}", err),
            }

            if let Err(err) = delivery.ack().await {
                error!("unable to ack notification: {}", err);
            }
        }

        info!("webhook dispatcher stopped");
    }
}
