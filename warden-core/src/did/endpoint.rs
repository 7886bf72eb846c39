use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use crate::didcomm::types::{DIDCommError, EndpointResolver};
use crate::ledger::LedgerClient;
use crate::store::Store;

use super::did::DID;

/// StoreEndpointResolver looks up peer DIDs learnt during connection bootstrap first and falls
/// back to the ledger for public DIDs
#[derive(Clone)]
pub struct StoreEndpointResolver {
    store: Store,
    ledger: Arc<dyn LedgerClient>,
}

impl StoreEndpointResolver {
    pub fn new(store: Store, ledger: Arc<dyn LedgerClient>) -> Self {
        Self { store, ledger }
    }
}

#[async_trait]
impl EndpointResolver for StoreEndpointResolver {
    async fn service_endpoint(&self, did: &str) -> Result<String, DIDCommError> {
        let stored = self
            .store
            .find::<DID>(did)
            .await
            .map_err(|err| DIDCommError::EndpointError(err.to_string()))?;

        if let Some(endpoint) = stored.and_then(|record| record.endpoint) {
            return Ok(endpoint);
        }

        debug!("no stored endpoint for {}, asking the ledger", did);
        let nym = self
            .ledger
            .get_nym(did)
            .await
            .map_err(|err| DIDCommError::EndpointError(err.to_string()))?;

        nym.endpoint
            .ok_or_else(|| DIDCommError::EndpointError(format!("no endpoint for {}", did)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::mock;

    use crate::ledger::{LedgerError, Nym};
    use crate::store::MemoryStore;

    mock!(
        FakeLedger{}

        #[async_trait]
        impl LedgerClient for FakeLedger {
            async fn get_nym(&self, did: &str) -> Result<Nym, LedgerError>;
        }
    );

    #[tokio::test]
    async fn test_endpoint_from_store() {
        let store = Store::new(Arc::new(MemoryStore::new()));
        let peer = DID::new("did:sov:peer", "verkey")
            .with_endpoint(Some("http://peer.example/".to_string()));
        store.insert(&peer).await.unwrap();

        let mut ledger = MockFakeLedger::new();
        ledger.expect_get_nym().never();

        let resolver = StoreEndpointResolver::new(store, Arc::new(ledger));
        let endpoint = resolver.service_endpoint("did:sov:peer").await.unwrap();
        assert_eq!(endpoint, "http://peer.example/")
    }

    #[tokio::test]
    async fn test_endpoint_from_ledger() {
        let store = Store::new(Arc::new(MemoryStore::new()));

        let mut ledger = MockFakeLedger::new();
        ledger.expect_get_nym().times(1).returning(|did| {
            Ok(Nym {
                did: did.to_string(),
                verkey: "verkey".to_string(),
                endpoint: Some("http://ledger.example/".to_string()),
                role: None,
            })
        });

        let resolver = StoreEndpointResolver::new(store, Arc::new(ledger));
        let endpoint = resolver.service_endpoint("did:sov:public").await.unwrap();
        assert_eq!(endpoint, "http://ledger.example/")
    }

    #[tokio::test]
    async fn test_endpoint_missing() {
        let store = Store::new(Arc::new(MemoryStore::new()));

        let mut ledger = MockFakeLedger::new();
        ledger
            .expect_get_nym()
            .returning(|did| Err(LedgerError::NotFound(did.to_string())));

        let resolver = StoreEndpointResolver::new(store, Arc::new(ledger));
        let result = resolver.service_endpoint("did:sov:unknown").await;
        assert!(matches!(result, Err(DIDCommError::EndpointError(_))))
    }
}
