use serde::{Deserialize, Serialize};

use crate::engine::types::Format;
use crate::store::types::Document;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SchemaAttribute {
    pub name: String,

    #[serde(rename = "type", default)]
    pub attr_type: String,
}

impl SchemaAttribute {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            attr_type: "string".to_string(),
        }
    }
}

/// Schema describes a credential type, it is immutable once registered with its engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schema {
    pub id: String,
    pub name: String,
    pub version: String,
    pub format: Format,

    #[serde(rename = "type", default)]
    pub schema_type: String,

    #[serde(default)]
    pub context: Vec<String>,

    #[serde(default)]
    pub attributes: Vec<SchemaAttribute>,

    #[serde(rename = "externalSchemaID", default, skip_serializing_if = "Option::is_none")]
    pub external_schema_id: Option<String>,
}

impl Schema {
    pub fn new(id: &str, name: &str, version: &str, format: Format) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            format,
            schema_type: String::new(),
            context: Vec::new(),
            attributes: Vec::new(),
            external_schema_id: None,
        }
    }

    pub fn with_attributes(mut self, names: &[&str]) -> Self {
        self.attributes = names.iter().map(|name| SchemaAttribute::new(name)).collect();
        self
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|attr| attr.name == name)
    }
}

impl Document for Schema {
    const COLLECTION: &'static str = "schemas";

    fn key(&self) -> String {
        self.id.clone()
    }
}
