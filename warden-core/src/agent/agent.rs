use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::types::Document;

/// Agent is a logical identity the hub operates on behalf of a subject
///
/// Agents are keyed by their unique `name`, the `id` is only an opaque handle returned to callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Agent {
    pub id: String,
    pub name: String,

    #[serde(rename = "endorsableSchemas", default)]
    pub endorsable_schemas: Vec<String>,

    #[serde(rename = "publicDID", default, skip_serializing_if = "Option::is_none")]
    pub public_did: Option<String>,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            endorsable_schemas: Vec::new(),
            public_did: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_schemas(mut self, schemas: Vec<String>) -> Self {
        self.endorsable_schemas = schemas;
        self
    }

    pub fn can_endorse(&self, schema_id: &str) -> bool {
        self.endorsable_schemas.iter().any(|id| id == schema_id)
    }
}

impl Document for Agent {
    const COLLECTION: &'static str = "agents";

    fn key(&self) -> String {
        self.name.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_can_endorse() {
        let agent = Agent::new("alice").with_schemas(vec!["s1".to_string()]);
        assert!(agent.can_endorse("s1"));
        assert!(!agent.can_endorse("s2"));
        assert_eq!(agent.key(), "alice");
    }
}
