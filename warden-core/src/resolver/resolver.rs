use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::types::HubError;
use crate::did::{expand_verkey, DidDoc};
use crate::ledger::LedgerClient;

pub const RESOLUTION_CONTEXT: &str = "https://www.w3.org/ns/did-resolution/v1";
pub const DRIVER: &str = "WardenHttpIndyDriver";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolverMetadata {
    #[serde(rename = "driverId")]
    pub driver_id: String,

    pub driver: String,

    pub retrieved: DateTime<Utc>,

    /// duration of the ledger lookup in milliseconds
    pub duration: u64,
}

/// ResolutionResult is the DID resolution document served on `GET /did/{did}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResolutionResult {
    #[serde(rename = "@context")]
    pub context: String,

    #[serde(rename = "didDocument")]
    pub did_document: DidDoc,

    #[serde(rename = "resolverMetadata")]
    pub resolver_metadata: ResolverMetadata,

    #[serde(rename = "methodMetadata")]
    pub method_metadata: Value,
}

/// Resolver answers DID resolution requests for one DID method from the ledger
#[derive(Clone)]
pub struct Resolver {
    ledger: Arc<dyn LedgerClient>,
    method: String,
}

impl Resolver {
    pub fn new(ledger: Arc<dyn LedgerClient>, method: &str) -> Self {
        Self {
            ledger,
            method: method.to_string(),
        }
    }

    pub async fn resolve(&self, did: &str) -> Result<ResolutionResult, HubError> {
        let started = Instant::now();

        let method = match did.split(':').collect::<Vec<_>>().as_slice() {
            ["did", method, id] if !method.is_empty() && !id.is_empty() => method.to_string(),
            _ => return Err(HubError::InvalidArgument(format!("malformed DID {}", did))),
        };
        if method != self.method {
            return Err(HubError::InvalidArgument(format!(
                "method {} is not resolved here",
                method
            )));
        }

        let nym = self.ledger.get_nym(did).await?;
        let verkey = expand_verkey(did, &nym.verkey)?;
        debug!("resolved {} in {:?}", did, started.elapsed());

        let method_metadata = serde_json::to_value(&nym)
            .map_err(|err| HubError::Internal(err.to_string()))?;

        Ok(ResolutionResult {
            context: RESOLUTION_CONTEXT.to_string(),
            did_document: DidDoc::new(did, &verkey, nym.endpoint.as_deref()),
            resolver_metadata: ResolverMetadata {
                driver_id: format!("did:{}", self.method),
                driver: DRIVER.to_string(),
                retrieved: Utc::now(),
                duration: started.elapsed().as_millis() as u64,
            },
            method_metadata: serde_json::json!({ "nymResponse": method_metadata }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use mockall::mock;

    use crate::ledger::{LedgerError, Nym};

    mock!(
        FakeLedger{}

        #[async_trait]
        impl LedgerClient for FakeLedger {
            async fn get_nym(&self, did: &str) -> Result<Nym, LedgerError>;
        }
    );

    #[tokio::test]
    async fn test_resolve() {
        let mut ledger = MockFakeLedger::new();
        ledger.expect_get_nym().times(1).returning(|did| {
            Ok(Nym {
                did: did.to_string(),
                verkey: "4zvwRjXUKGfvwnParsHAS3HuSVzV5cA4McphgmoCtajS".to_string(),
                endpoint: Some("http://peer.example/".to_string()),
                role: None,
            })
        });

        let resolver = Resolver::new(Arc::new(ledger), "sov");
        let result = resolver.resolve("did:sov:WgWxqztrNooG92RXvxSTWv").await.unwrap();

        assert_eq!(result.context, RESOLUTION_CONTEXT);
        assert_eq!(result.resolver_metadata.driver_id, "did:sov");
        assert_eq!(result.did_document.id, "did:sov:WgWxqztrNooG92RXvxSTWv");
        assert_eq!(
            result.did_document.service_endpoint(),
            Some("http://peer.example/")
        );
    }

    #[tokio::test]
    async fn test_resolve_rejects_other_inputs() {
        let mut ledger = MockFakeLedger::new();
        ledger
            .expect_get_nym()
            .returning(|did| Err(LedgerError::NotFound(did.to_string())));

        let resolver = Resolver::new(Arc::new(ledger), "sov");

        let malformed = resolver.resolve("sov:abc").await;
        assert!(matches!(malformed, Err(HubError::InvalidArgument(_))));

        let other = resolver.resolve("did:web:example.com").await;
        assert!(matches!(other, Err(HubError::InvalidArgument(_))));

        let missing = resolver.resolve("did:sov:unknown").await;
        assert!(matches!(missing, Err(HubError::NotFound(_))));
    }
}
