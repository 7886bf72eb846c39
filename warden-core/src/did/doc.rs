use serde::{Deserialize, Serialize};

pub const DID_CONTEXT: &str = "https://w3id.org/did/v1";
pub const KEY_TYPE_ED25519: &str = "Ed25519VerificationKey2018";
pub const SERVICE_TYPE_DIDCOMM: &str = "did-communication";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PublicKey {
    pub id: String,

    #[serde(rename = "type")]
    pub key_type: String,

    pub controller: String,

    #[serde(rename = "publicKeyBase58")]
    pub public_key_base58: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Service {
    pub id: String,

    #[serde(rename = "type")]
    pub service_type: String,

    #[serde(default)]
    pub priority: u32,

    #[serde(rename = "recipientKeys", default)]
    pub recipient_keys: Vec<String>,

    #[serde(rename = "serviceEndpoint")]
    pub service_endpoint: String,
}

/// DidDoc is the minimal DID document exchanged during connection bootstrap and served by the
/// resolver
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DidDoc {
    #[serde(rename = "@context")]
    pub context: String,

    pub id: String,

    #[serde(rename = "publicKey", default)]
    pub public_key: Vec<PublicKey>,

    #[serde(default)]
    pub service: Vec<Service>,
}

impl DidDoc {
    pub fn new(did: &str, verkey: &str, endpoint: Option<&str>) -> Self {
        let public_key = PublicKey {
            id: format!("{}#key-1", did),
            key_type: KEY_TYPE_ED25519.to_string(),
            controller: did.to_string(),
            public_key_base58: verkey.to_string(),
        };

        let service = endpoint
            .map(|endpoint| {
                vec![Service {
                    id: format!("{}#didcomm", did),
                    service_type: SERVICE_TYPE_DIDCOMM.to_string(),
                    priority: 0,
                    recipient_keys: vec![verkey.to_string()],
                    service_endpoint: endpoint.to_string(),
                }]
            })
            .unwrap_or_default();

        Self {
            context: DID_CONTEXT.to_string(),
            id: did.to_string(),
            public_key: vec![public_key],
            service,
        }
    }

    pub fn verkey(&self) -> Option<&str> {
        self.public_key
            .first()
            .map(|key| key.public_key_base58.as_str())
    }

    pub fn service_endpoint(&self) -> Option<&str> {
        self.service
            .iter()
            .find(|service| service.service_type == SERVICE_TYPE_DIDCOMM)
            .map(|service| service.service_endpoint.as_str())
    }
}
