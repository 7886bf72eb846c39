use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::did::{did_from_verkey, verify_signature, KeyManager, DID};
use crate::schema::Schema;
use crate::store::types::Document;
use crate::store::Store;

use super::types::{
    AttributeInfo, CredentialEngine, CredentialOffer, CredentialValues, EngineError, Format,
    PredicateInfo, PresentationEngine, FORMAT_LD_PROOF,
};

pub const CREDENTIALS_CONTEXT: &str = "https://www.w3.org/2018/credentials/v1";
pub const SIGNATURE_TYPE: &str = "Ed25519Signature2018";
pub const OPERATIONAL_DOMAIN: &str = "warden.prople/credentials";

const PURPOSE_ASSERTION: &str = "assertionMethod";
const PURPOSE_AUTHENTICATION: &str = "authentication";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LdsOffer {
    offer_id: String,
    subject_did: String,
    values: Value,
}

impl Document for LdsOffer {
    const COLLECTION: &'static str = "lds-offers";

    fn key(&self) -> String {
        self.offer_id.clone()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct LdsPresentationRequest {
    name: String,
    version: String,
    domain: String,
    challenge: String,

    #[serde(default)]
    requested_attributes: BTreeMap<String, AttributeInfo>,

    #[serde(default)]
    requested_predicates: BTreeMap<String, PredicateInfo>,
}

fn parse_json(bytes: &[u8]) -> Result<Value, EngineError> {
    serde_json::from_slice(bytes).map_err(|err| EngineError::InvalidInput(err.to_string()))
}

fn to_bytes(value: &Value) -> Result<Vec<u8>, EngineError> {
    serde_json::to_vec(value).map_err(|err| EngineError::InvalidInput(err.to_string()))
}

/// digest hashes the canonical form of a JSON value, object keys are always serialized sorted
fn digest(value: &Value) -> Result<Vec<u8>, EngineError> {
    let canonical = to_bytes(value)?;
    Ok(Sha256::digest(canonical).to_vec())
}

fn signing_input(document: &Value, proof: &Value) -> Result<Vec<u8>, EngineError> {
    let mut input = digest(proof)?;
    input.extend(digest(document)?);
    Ok(input)
}

fn subject_values(credential: &Value) -> Map<String, Value> {
    credential
        .get("credentialSubject")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn predicate_holds(value: &Value, predicate: &PredicateInfo) -> bool {
    let actual = match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.parse::<i64>().ok(),
        _ => None,
    };

    match actual {
        Some(actual) => match predicate.p_type.as_str() {
            ">=" => actual >= predicate.p_value,
            ">" => actual > predicate.p_value,
            "<=" => actual <= predicate.p_value,
            "<" => actual < predicate.p_value,
            _ => false,
        },
        None => false,
    }
}

/// LdProofEngine is the bundled `lds/ld-proof` engine
///
/// Credentials and presentations are JSON-LD shaped documents carrying an ed25519 proof. The
/// proof embeds the signer's verkey, and a `did:sov` identifier is derived from its verkey, so a
/// proof can be checked against the claimed DID without resolving it
#[derive(Clone)]
pub struct LdProofEngine {
    store: Store,
    keys: KeyManager,
}

impl LdProofEngine {
    pub fn new(store: Store, keys: KeyManager) -> Self {
        Self { store, keys }
    }

    async fn attach_proof(
        &self,
        document: Value,
        signer: &DID,
        purpose: &str,
        challenge: Option<(&str, &str)>,
    ) -> Result<Value, EngineError> {
        let mut proof = json!({
            "type": SIGNATURE_TYPE,
            "created": Utc::now().to_rfc3339(),
            "proofPurpose": purpose,
            "verificationMethod": format!("{}#key-1", signer.id),
            "publicKeyBase58": signer.verkey,
        });

        if let Some((domain, nonce)) = challenge {
            proof["domain"] = json!(domain);
            proof["challenge"] = json!(nonce);
        }

        let input = signing_input(&document, &proof)?;
        let signature = self
            .keys
            .sign_as(signer, &input)
            .await
            .map_err(|err| EngineError::KeyError(err.to_string()))?;

        proof["proofValue"] = json!(URL_SAFE_NO_PAD.encode(signature));

        let mut signed = document;
        signed["proof"] = proof;
        Ok(signed)
    }

    /// check_proof verifies the embedded proof and returns the DID that produced it
    fn check_proof(document: &Value) -> Result<(String, Value), EngineError> {
        let mut unsigned = document.clone();
        let mut proof = unsigned
            .as_object_mut()
            .and_then(|object| object.remove("proof"))
            .ok_or_else(|| EngineError::VerifyError("document has no proof".to_string()))?;

        let proof_value = proof
            .as_object_mut()
            .and_then(|object| object.remove("proofValue"))
            .and_then(|value| value.as_str().map(str::to_string))
            .ok_or_else(|| EngineError::VerifyError("proof has no value".to_string()))?;

        let verkey = proof
            .get("publicKeyBase58")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::VerifyError("proof has no public key".to_string()))?;

        let controller = proof
            .get("verificationMethod")
            .and_then(Value::as_str)
            .and_then(|method| method.split('#').next())
            .ok_or_else(|| EngineError::VerifyError("proof has no verification method".to_string()))?
            .to_string();

        let derived =
            did_from_verkey(verkey).map_err(|err| EngineError::VerifyError(err.to_string()))?;
        if derived != controller {
            return Err(EngineError::VerifyError(format!(
                "verification key does not belong to {}",
                controller
            )));
        }

        let signature = URL_SAFE_NO_PAD
            .decode(proof_value)
            .map_err(|err| EngineError::VerifyError(err.to_string()))?;

        let input = signing_input(&unsigned, &proof)?;
        verify_signature(verkey, &input, &signature)
            .map_err(|err| EngineError::VerifyError(err.to_string()))?;

        Ok((controller, proof))
    }
}

#[async_trait]
impl CredentialEngine for LdProofEngine {
    fn accept(&self, format: &str) -> bool {
        format == FORMAT_LD_PROOF
    }

    fn format(&self) -> Format {
        Format::LdProof
    }

    async fn register_schema(
        &self,
        _registrant: &DID,
        schema: &Schema,
    ) -> Result<String, EngineError> {
        Ok(schema.id.clone())
    }

    async fn create_credential_offer(
        &self,
        _issuer: &DID,
        subject_did: &str,
        schema: &Schema,
        values: &CredentialValues,
    ) -> Result<CredentialOffer, EngineError> {
        let mut offered = Map::new();
        for (name, value) in values {
            offered.insert(name.clone(), json!(value));
        }
        offered.insert("@type".to_string(), json!([schema.schema_type]));
        offered.insert("@context".to_string(), json!(schema.context));

        let offered = Value::Object(offered);
        let offer = LdsOffer {
            offer_id: Uuid::new_v4().urn().to_string(),
            subject_did: subject_did.to_string(),
            values: offered.clone(),
        };

        self.store
            .insert(&offer)
            .await
            .map_err(|err| EngineError::StoreError(err.to_string()))?;

        Ok(CredentialOffer {
            offer_id: offer.offer_id,
            data: to_bytes(&offered)?,
        })
    }

    async fn create_credential_request(
        &self,
        _holder: &DID,
        offer: &[u8],
    ) -> Result<Vec<u8>, EngineError> {
        let offered = parse_json(offer)?;
        to_bytes(&offered)
    }

    async fn issue_credential(
        &self,
        issuer: &DID,
        schema: &Schema,
        offer_id: &str,
        request: &[u8],
        values: &CredentialValues,
    ) -> Result<Vec<u8>, EngineError> {
        let offer = self
            .store
            .find::<LdsOffer>(offer_id)
            .await
            .map_err(|err| EngineError::StoreError(err.to_string()))?
            .ok_or_else(|| EngineError::IssueError(format!("unknown offer {}", offer_id)))?;

        let requested = parse_json(request)?;
        if requested != offer.values {
            return Err(EngineError::IssueError(
                "requested values do not match original offer".to_string(),
            ));
        }

        let mut subject = Map::new();
        for (name, value) in values {
            subject.insert(name.clone(), json!(value));
        }
        subject.insert("id".to_string(), json!(offer.subject_did));

        let mut types = vec![json!("VerifiableCredential")];
        if !schema.schema_type.is_empty() {
            types.push(json!(schema.schema_type));
        }

        let mut context = vec![json!(CREDENTIALS_CONTEXT)];
        context.extend(schema.context.iter().map(|item| json!(item)));

        let credential = json!({
            "@context": context,
            "id": Uuid::new_v4().urn().to_string(),
            "type": types,
            "issuer": issuer.id,
            "issuanceDate": Utc::now().to_rfc3339(),
            "credentialSubject": subject,
        });

        let signed = self
            .attach_proof(credential, issuer, PURPOSE_ASSERTION, None)
            .await?;
        debug!("issued ld-proof credential for {}", offer.subject_did);
        to_bytes(&signed)
    }
}

#[async_trait]
impl PresentationEngine for LdProofEngine {
    fn accept(&self, format: &str) -> bool {
        format == FORMAT_LD_PROOF
    }

    fn format(&self) -> Format {
        Format::LdProof
    }

    async fn request_presentation(
        &self,
        name: &str,
        version: &str,
        attributes: &BTreeMap<String, AttributeInfo>,
        predicates: &BTreeMap<String, PredicateInfo>,
    ) -> Result<Vec<u8>, EngineError> {
        if attributes.is_empty() && predicates.is_empty() {
            return Err(EngineError::InvalidInput(
                "presentation request needs at least one attribute or predicate".to_string(),
            ));
        }

        let request = LdsPresentationRequest {
            name: name.to_string(),
            version: version.to_string(),
            domain: OPERATIONAL_DOMAIN.to_string(),
            challenge: Uuid::new_v4().to_string(),
            requested_attributes: attributes.clone(),
            requested_predicates: predicates.clone(),
        };

        serde_json::to_vec(&request).map_err(|err| EngineError::InvalidInput(err.to_string()))
    }

    async fn create_presentation(
        &self,
        holder: &DID,
        request: &[u8],
        credentials: &[Vec<u8>],
    ) -> Result<Vec<u8>, EngineError> {
        let request: LdsPresentationRequest = serde_json::from_slice(request)
            .map_err(|err| EngineError::InvalidInput(err.to_string()))?;

        let wanted: Vec<&str> = request
            .requested_attributes
            .values()
            .map(|attr| attr.name.as_str())
            .chain(
                request
                    .requested_predicates
                    .values()
                    .map(|pred| pred.name.as_str()),
            )
            .collect();

        let mut selected = Vec::new();
        for raw in credentials {
            let credential = parse_json(raw)?;
            let subject = subject_values(&credential);
            if wanted.iter().any(|name| subject.contains_key(*name)) {
                selected.push(credential);
            }
        }

        if selected.is_empty() {
            return Err(EngineError::InvalidInput(
                "no held credential answers the request".to_string(),
            ));
        }

        let presentation = json!({
            "@context": [CREDENTIALS_CONTEXT],
            "type": ["VerifiablePresentation"],
            "holder": holder.id,
            "verifiableCredential": selected,
        });

        let signed = self
            .attach_proof(
                presentation,
                holder,
                PURPOSE_AUTHENTICATION,
                Some((&request.domain, &request.challenge)),
            )
            .await?;
        to_bytes(&signed)
    }

    async fn verify(
        &self,
        presentation: &[u8],
        request: &[u8],
        their_did: &str,
        my_did: &str,
    ) -> Result<(), EngineError> {
        let request: LdsPresentationRequest = serde_json::from_slice(request)
            .map_err(|err| EngineError::InvalidInput(err.to_string()))?;
        let presentation = parse_json(presentation)?;

        let (holder, proof) = Self::check_proof(&presentation)?;
        if holder != their_did {
            return Err(EngineError::VerifyError(format!(
                "presentation signed by {} instead of {}",
                holder, their_did
            )));
        }

        let challenge = proof.get("challenge").and_then(Value::as_str);
        let domain = proof.get("domain").and_then(Value::as_str);
        if challenge != Some(request.challenge.as_str()) || domain != Some(request.domain.as_str())
        {
            return Err(EngineError::VerifyError(
                "presentation does not answer this request".to_string(),
            ));
        }

        let credentials = presentation
            .get("verifiableCredential")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut disclosed = Map::new();
        for credential in &credentials {
            Self::check_proof(credential)?;
            disclosed.extend(subject_values(credential));
        }

        for attr in request.requested_attributes.values() {
            if !disclosed.contains_key(&attr.name) {
                return Err(EngineError::VerifyError(format!(
                    "attribute {} not disclosed",
                    attr.name
                )));
            }
        }

        for predicate in request.requested_predicates.values() {
            let holds = disclosed
                .get(&predicate.name)
                .map(|value| predicate_holds(value, predicate))
                .unwrap_or(false);

            if !holds {
                return Err(EngineError::VerifyError(format!(
                    "predicate {} {} {} not satisfied",
                    predicate.name, predicate.p_type, predicate.p_value
                )));
            }
        }

        debug!("verified ld-proof presentation from {} for {}", their_did, my_did);
        Ok(())
    }
}
