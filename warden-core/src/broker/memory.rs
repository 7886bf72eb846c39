use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use tokio::sync::{mpsc, Mutex};

use super::types::{Broker, BrokerError, Delivery, Subscription};

struct Queue {
    tx: mpsc::UnboundedSender<Vec<u8>>,
    rx: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
    published: Vec<Vec<u8>>,
}

impl Queue {
    fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
            published: Vec::new(),
        }
    }
}

/// MemoryBroker is an in-process replacement for the AMQP broker
///
/// Competing consumers of one queue share a single receiver. Every published body is also
/// recorded so callers can inspect what reached each queue
#[derive(Clone, Default)]
pub struct MemoryBroker {
    queues: Arc<Mutex<HashMap<String, Queue>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// published returns every body published to the queue so far
    pub async fn published(&self, queue: &str) -> Vec<Vec<u8>> {
        let queues = self.queues.lock().await;
        queues
            .get(queue)
            .map(|q| q.published.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn declare(&self, queue: &str) -> Result<(), BrokerError> {
        let mut queues = self.queues.lock().await;
        queues.entry(queue.to_string()).or_insert_with(Queue::new);
        Ok(())
    }

    async fn publish(
        &self,
        queue: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), BrokerError> {
        let mut queues = self.queues.lock().await;
        let target = queues
            .get_mut(queue)
            .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?;

        target.published.push(body.clone());
        target
            .tx
            .send(body)
            .map_err(|err| BrokerError::PublishError(err.to_string()))
    }

    async fn consume(&self, queue: &str) -> Result<Subscription, BrokerError> {
        let shared = {
            let queues = self.queues.lock().await;
            queues
                .get(queue)
                .map(|q| q.rx.clone())
                .ok_or_else(|| BrokerError::UnknownQueue(queue.to_string()))?
        };

        let (tx, rx) = mpsc::channel(1);
        let name = queue.to_string();
        tokio::spawn(async move {
            loop {
                let body = {
                    let mut guard = shared.lock().await;
                    guard.recv().await
                };

                let Some(body) = body else {
                    break;
                };

                if tx.send(Delivery::new(body)).await.is_err() {
                    debug!("memory consumer on {} closed", name);
                    break;
                }
            }
        });

        Ok(Subscription::new(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_unknown_queue() {
        let broker = MemoryBroker::new();
        let result = broker.publish("nope", b"{}".to_vec(), "application/json").await;
        assert!(matches!(result, Err(BrokerError::UnknownQueue(_))));
    }

    #[tokio::test]
    async fn test_publish_and_consume() {
        let broker = MemoryBroker::new();
        broker.declare("q").await.unwrap();
        broker.declare("q").await.unwrap();

        broker
            .publish("q", b"one".to_vec(), "application/json")
            .await
            .unwrap();

        let mut sub = broker.consume("q").await.unwrap();
        let delivery = sub.next().await.unwrap();
        assert_eq!(delivery.body(), b"one");
        assert!(delivery.ack().await.is_ok());
        assert_eq!(broker.published("q").await.len(), 1);
    }
}
