use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::agent::AgentEvent;

pub const DEFAULT_MAILBOX: usize = 64;

/// AgentWatch is one live subscription, dropping `events` closes it on the next publish
pub struct AgentWatch {
    pub id: String,
    pub events: mpsc::Receiver<AgentEvent>,
}

/// Watcher fans agent events out to every subscriber mailbox
///
/// Producers only take the read lock. A subscriber whose mailbox is full or closed is removed
/// under the write lock once the fan-out is done, which drops its sender and ends its stream
#[derive(Clone)]
pub struct Watcher {
    subscribers: Arc<RwLock<HashMap<String, mpsc::Sender<AgentEvent>>>>,
    capacity: usize,
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX)
    }
}

impl Watcher {
    pub fn new(capacity: usize) -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    pub async fn subscribe(&self) -> AgentWatch {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = Uuid::new_v4().to_string();

        self.subscribers.write().await.insert(id.clone(), tx);
        debug!("agent watcher {} registered", id);

        AgentWatch { id, events: rx }
    }

    pub async fn unsubscribe(&self, id: &str) -> bool {
        let removed = self.subscribers.write().await.remove(id).is_some();
        if removed {
            debug!("agent watcher {} removed", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// publish never waits on a subscriber
    pub async fn publish(&self, event: AgentEvent) {
        let evicted: Vec<String> = {
            let subscribers = self.subscribers.read().await;
            subscribers
                .iter()
                .filter_map(|(id, tx)| match tx.try_send(event.clone()) {
                    Ok(()) => None,
                    Err(TrySendError::Full(_)) => {
                        info!("agent watcher {} is too slow, closing it", id);
                        Some(id.clone())
                    }
                    Err(TrySendError::Closed(_)) => Some(id.clone()),
                })
                .collect()
        };

        if evicted.is_empty() {
            return;
        }

        let mut subscribers = self.subscribers.write().await;
        for id in evicted {
            subscribers.remove(&id);
        }
    }
}
