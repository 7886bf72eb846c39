use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::store::types::Document;
use crate::store::Store;

use super::did::{derive_did, DID};
use super::types::DIDError;

const SEED_LENGTH: usize = 32;

/// KeyPair is a persisted ed25519 signing key, its id is the base58 verkey
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KeyPair {
    pub id: String,
    secret: String,
    pub created_at: DateTime<Utc>,
}

impl KeyPair {
    fn from_signing_key(signing: &SigningKey) -> Self {
        Self {
            id: bs58::encode(signing.verifying_key().to_bytes()).into_string(),
            secret: bs58::encode(signing.to_bytes()).into_string(),
            created_at: Utc::now(),
        }
    }

    pub fn generate() -> Self {
        let signing = SigningKey::generate(&mut OsRng);
        Self::from_signing_key(&signing)
    }

    /// from_seed derives the key deterministically, the seed must be exactly 32 bytes
    pub fn from_seed(seed: &str) -> Result<Self, DIDError> {
        let bytes: [u8; SEED_LENGTH] = seed.as_bytes().try_into().map_err(|_| {
            DIDError::InvalidSeed(format!("seed must be {} bytes", SEED_LENGTH))
        })?;

        Ok(Self::from_signing_key(&SigningKey::from_bytes(&bytes)))
    }

    pub fn verkey(&self) -> &str {
        &self.id
    }

    pub fn did(&self) -> Result<String, DIDError> {
        let public = bs58::decode(&self.id)
            .into_vec()
            .map_err(|err| DIDError::InvalidKey(err.to_string()))?;
        derive_did(&public)
    }

    fn signing_key(&self) -> Result<SigningKey, DIDError> {
        let secret = bs58::decode(&self.secret)
            .into_vec()
            .map_err(|err| DIDError::InvalidKey(err.to_string()))?;

        let bytes: [u8; 32] = secret
            .as_slice()
            .try_into()
            .map_err(|_| DIDError::InvalidKey("invalid secret key length".to_string()))?;

        Ok(SigningKey::from_bytes(&bytes))
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>, DIDError> {
        let signing = self.signing_key()?;
        Ok(signing.sign(message).to_bytes().to_vec())
    }
}

impl Document for KeyPair {
    const COLLECTION: &'static str = "keys";

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// verify_signature checks an ed25519 signature against a base58 verkey
pub fn verify_signature(verkey: &str, message: &[u8], signature: &[u8]) -> Result<(), DIDError> {
    let public = bs58::decode(verkey)
        .into_vec()
        .map_err(|err| DIDError::InvalidKey(err.to_string()))?;

    let public: [u8; 32] = public
        .as_slice()
        .try_into()
        .map_err(|_| DIDError::InvalidKey("invalid verkey length".to_string()))?;

    let verifying =
        VerifyingKey::from_bytes(&public).map_err(|err| DIDError::InvalidKey(err.to_string()))?;
    let signature = Signature::from_slice(signature)
        .map_err(|err| DIDError::SignatureError(err.to_string()))?;

    verifying
        .verify(message, &signature)
        .map_err(|err| DIDError::SignatureError(err.to_string()))
}

/// KeyManager owns the hub's signing keys
#[derive(Clone)]
pub struct KeyManager {
    store: Store,
}

impl KeyManager {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// create_did generates and stores a new keypair and its DID record
    pub async fn create_did(&self, endpoint: Option<String>) -> Result<DID, DIDError> {
        let keypair = KeyPair::generate();
        self.store.insert(&keypair).await?;

        let did = DID::new(&keypair.did()?, keypair.verkey())
            .with_key(&keypair.id)
            .with_endpoint(endpoint);
        self.store.insert(&did).await?;
        Ok(did)
    }

    /// import stores a seeded keypair, storing the same seed twice is not an error
    pub async fn import(&self, keypair: &KeyPair) -> Result<(), DIDError> {
        self.store.put(keypair).await.map_err(DIDError::from)
    }

    pub async fn sign(&self, key_id: &str, message: &[u8]) -> Result<Vec<u8>, DIDError> {
        let keypair = self
            .store
            .find::<KeyPair>(key_id)
            .await?
            .ok_or_else(|| DIDError::KeyNotFound(key_id.to_string()))?;

        keypair.sign(message)
    }

    /// sign_as signs with the key behind one of our own DIDs
    pub async fn sign_as(&self, did: &DID, message: &[u8]) -> Result<Vec<u8>, DIDError> {
        let key_id = did
            .key_id
            .as_deref()
            .ok_or_else(|| DIDError::KeyNotFound(format!("no key for {}", did.id)))?;

        self.sign(key_id, message).await
    }
}
