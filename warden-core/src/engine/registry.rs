use std::sync::Arc;

use super::types::{CredentialEngine, EngineError, PresentationEngine};

/// CredentialRegistry resolves the first engine accepting a format
#[derive(Clone, Default)]
pub struct CredentialRegistry {
    engines: Vec<Arc<dyn CredentialEngine>>,
}

impl CredentialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, engine: Arc<dyn CredentialEngine>) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn resolve(&self, format: &str) -> Result<Arc<dyn CredentialEngine>, EngineError> {
        self.engines
            .iter()
            .find(|engine| engine.accept(format))
            .cloned()
            .ok_or_else(|| EngineError::UnsupportedFormat(format.to_string()))
    }
}

/// PresentationRegistry resolves the first engine accepting a format, unknown formats fail closed
#[derive(Clone, Default)]
pub struct PresentationRegistry {
    engines: Vec<Arc<dyn PresentationEngine>>,
}

impl PresentationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_engine(mut self, engine: Arc<dyn PresentationEngine>) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn resolve(&self, format: &str) -> Result<Arc<dyn PresentationEngine>, EngineError> {
        self.engines
            .iter()
            .find(|engine| engine.accept(format))
            .cloned()
            .ok_or_else(|| EngineError::UnsupportedFormat(format.to_string()))
    }

    /// default_engine is used when the caller did not pick a format
    pub fn default_engine(&self) -> Result<Arc<dyn PresentationEngine>, EngineError> {
        self.engines
            .first()
            .cloned()
            .ok_or_else(|| EngineError::UnsupportedFormat("no presentation engine".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use async_trait::async_trait;
    use mockall::mock;

    use crate::did::DID;
    use crate::engine::types::{AttributeInfo, Format, PredicateInfo};

    mock!(
        FakeEngine{}

        #[async_trait]
        impl PresentationEngine for FakeEngine {
            fn accept(&self, format: &str) -> bool;
            fn format(&self) -> Format;
            async fn request_presentation(
                &self,
                name: &str,
                version: &str,
                attributes: &BTreeMap<String, AttributeInfo>,
                predicates: &BTreeMap<String, PredicateInfo>,
            ) -> Result<Vec<u8>, EngineError>;
            async fn create_presentation(&self, holder: &DID, request: &[u8], credentials: &[Vec<u8>]) -> Result<Vec<u8>, EngineError>;
            async fn verify(&self, presentation: &[u8], request: &[u8], their_did: &str, my_did: &str) -> Result<(), EngineError>;
        }
    );

    #[test]
    fn test_resolve_first_match() {
        let mut first = MockFakeEngine::new();
        first
            .expect_accept()
            .returning(|format| format == "lds/ld-proof");
        first.expect_format().return_const(Format::LdProof);

        let mut second = MockFakeEngine::new();
        second.expect_accept().return_const(true);
        second.expect_format().return_const(Format::HlindyZkp);

        let registry = PresentationRegistry::new()
            .with_engine(Arc::new(first))
            .with_engine(Arc::new(second));

        let engine = registry.resolve("lds/ld-proof").unwrap();
        assert_eq!(engine.format(), Format::LdProof);

        let engine = registry.resolve("hlindy-zkp-v1.0").unwrap();
        assert_eq!(engine.format(), Format::HlindyZkp);
    }

    #[test]
    fn test_resolve_unknown_fails_closed() {
        let registry = PresentationRegistry::new();
        let result = registry.resolve("lds/ld-proof");
        assert!(matches!(result, Err(EngineError::UnsupportedFormat(_))));

        let registry = CredentialRegistry::new();
        assert!(registry.resolve("hlindy-zkp-v1.0").is_err());
    }
}
