use std::sync::Arc;

use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::acker::Acker as LapinAcker;
use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, BasicQosOptions,
    ConfirmSelectOptions, QueueDeclareOptions,
};
use lapin::publisher_confirm::Confirmation;
use lapin::types::{FieldTable, ShortString};
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties};
use log::{debug, error, info, warn};
use tokio::sync::mpsc;
use uuid::Uuid;

use prople_warden_core::broker::types::{Acker, Broker, BrokerError, Delivery, Subscription};

use crate::config::{AckMode, Amqp};

struct DeliveryAcker {
    acker: LapinAcker,
}

#[async_trait]
impl Acker for DeliveryAcker {
    async fn ack(&self) -> Result<(), BrokerError> {
        self.acker
            .ack(BasicAckOptions::default())
            .await
            .map_err(|err| BrokerError::AckError(err.to_string()))
    }
}

/// AmqpBroker publishes and consumes the hub work queues on an AMQP 0.9.1 server
///
/// Publishing shares one channel in confirm mode, a publish only returns once the server acked it.
/// Every consumer gets its own channel so `prefetch` applies per consumer
#[derive(Clone)]
pub struct AmqpBroker {
    connection: Arc<Connection>,
    publisher: Channel,
    ack_mode: AckMode,
    prefetch: u16,
}

pub(crate) fn declare_options() -> QueueDeclareOptions {
    QueueDeclareOptions {
        durable: false,
        exclusive: false,
        auto_delete: false,
        ..QueueDeclareOptions::default()
    }
}

pub(crate) fn check_confirmation(queue: &str, confirmation: Confirmation) -> Result<(), BrokerError> {
    match confirmation {
        Confirmation::Ack(None) => Ok(()),
        Confirmation::Ack(Some(_)) => Err(BrokerError::PublishError(format!(
            "message to {} returned unroutable",
            queue
        ))),
        Confirmation::Nack(_) => Err(BrokerError::PublishError(format!(
            "message to {} rejected by server",
            queue
        ))),
        Confirmation::NotRequested => Err(BrokerError::PublishError(format!(
            "publisher confirms not enabled for {}",
            queue
        ))),
    }
}

pub(crate) fn consume_options(ack_mode: AckMode) -> BasicConsumeOptions {
    BasicConsumeOptions {
        no_ack: ack_mode == AckMode::Auto,
        ..BasicConsumeOptions::default()
    }
}

impl AmqpBroker {
    pub async fn connect(cfg: &Amqp) -> Result<Self, BrokerError> {
        let connection = Connection::connect(cfg.get_address().as_str(), ConnectionProperties::default())
            .await
            .map_err(|err| BrokerError::ConnectionError(err.to_string()))?;

        let publisher = connection
            .create_channel()
            .await
            .map_err(|err| BrokerError::ConnectionError(err.to_string()))?;

        publisher
            .confirm_select(ConfirmSelectOptions::default())
            .await
            .map_err(|err| BrokerError::ConnectionError(err.to_string()))?;

        info!("amqp broker connected (ack mode: {:?})", cfg.get_ack_mode());
        Ok(Self {
            connection: Arc::new(connection),
            publisher,
            ack_mode: cfg.get_ack_mode(),
            prefetch: cfg.get_prefetch(),
        })
    }
}

#[async_trait]
impl Broker for AmqpBroker {
    async fn declare(&self, queue: &str) -> Result<(), BrokerError> {
        self.publisher
            .queue_declare(queue, declare_options(), FieldTable::default())
            .await
            .map_err(|err| BrokerError::DeclareError(err.to_string()))?;

        debug!("queue {} declared", queue);
        Ok(())
    }

    async fn publish(
        &self,
        queue: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), BrokerError> {
        let properties =
            BasicProperties::default().with_content_type(ShortString::from(content_type.to_string()));

        let confirmation = self
            .publisher
            .basic_publish(
                "",
                queue,
                BasicPublishOptions::default(),
                &body,
                properties,
            )
            .await
            .map_err(|err| BrokerError::PublishError(err.to_string()))?
            .await
            .map_err(|err| BrokerError::PublishError(err.to_string()))?;

        check_confirmation(queue, confirmation)
    }

    async fn consume(&self, queue: &str) -> Result<Subscription, BrokerError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|err| BrokerError::ConsumeError(err.to_string()))?;

        channel
            .basic_qos(self.prefetch, BasicQosOptions::default())
            .await
            .map_err(|err| BrokerError::ConsumeError(err.to_string()))?;

        let tag = format!("warden-{}-{}", queue, Uuid::new_v4());
        let mut consumer = channel
            .basic_consume(
                queue,
                &tag,
                consume_options(self.ack_mode),
                FieldTable::default(),
            )
            .await
            .map_err(|err| BrokerError::ConsumeError(err.to_string()))?;

        let (tx, rx) = mpsc::channel(usize::from(self.prefetch.max(1)));
        let ack_mode = self.ack_mode;
        let queue = queue.to_string();

        tokio::spawn(async move {
            // keeps the consumer channel open as long as the forwarding task lives
            let _channel = channel;

            while let Some(item) = consumer.next().await {
                let delivery = match item {
                    Ok(delivery) => delivery,
                    Err(err) => {
                        error!("consumer on {} failed: {}", queue, err);
                        break;
                    }
                };

                let forwarded = match ack_mode {
                    AckMode::Explicit => Delivery::with_acker(
                        delivery.data,
                        Box::new(DeliveryAcker {
                            acker: delivery.acker,
                        }),
                    ),
                    AckMode::Auto => Delivery::new(delivery.data),
                };

                if tx.send(forwarded).await.is_err() {
                    warn!("subscription on {} dropped, stopping consumer", queue);
                    break;
                }
            }

            debug!("consumer on {} finished", queue);
        });

        Ok(Subscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_declare_options() {
        let opts = declare_options();
        assert!(!opts.durable);
        assert!(!opts.exclusive);
        assert!(!opts.auto_delete);
        assert!(!opts.passive);
    }

    #[test]
    fn test_confirmation_requires_ack() {
        assert!(check_confirmation("q", Confirmation::Ack(None)).is_ok());
        assert!(matches!(
            check_confirmation("q", Confirmation::Nack(None)),
            Err(BrokerError::PublishError(_))
        ));
        assert!(matches!(
            check_confirmation("q", Confirmation::NotRequested),
            Err(BrokerError::PublishError(_))
        ));
    }

    #[test]
    fn test_consume_options_follow_ack_mode() {
        assert!(!consume_options(AckMode::Explicit).no_ack);
        assert!(consume_options(AckMode::Auto).no_ack);
    }
}
