use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine;

use crate::common::types::HubError;
use crate::did::verify_signature;

use super::types::CloudAgent;

/// signed_payload picks what a cloud agent signs: the path for reads and deletes, the body
/// otherwise
pub fn signed_payload<'a>(method: &str, path: &'a str, body: &'a [u8]) -> &'a [u8] {
    if method.eq_ignore_ascii_case("GET") || method.eq_ignore_ascii_case("DELETE") {
        path.as_bytes()
    } else {
        body
    }
}

/// verify_request checks a base64url ed25519 signature made with the agent's registered key
pub fn verify_request(agent: &CloudAgent, signed: &[u8], signature: &str) -> Result<(), HubError> {
    let decoded = URL_SAFE
        .decode(signature)
        .or_else(|_| URL_SAFE_NO_PAD.decode(signature))
        .map_err(|_| HubError::Unauthenticated("malformed signature".to_string()))?;

    let verkey = bs58::encode(&agent.public_key).into_string();
    verify_signature(&verkey, signed, &decoded)
        .map_err(|_| HubError::Unauthenticated(format!("bad signature for {}", agent.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn agent_with_key() -> (CloudAgent, SigningKey) {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let public = signing.verifying_key().to_bytes().to_vec();
        (CloudAgent::new("wallet-1", public.clone(), public), signing)
    }

    #[test]
    fn test_signed_payload() {
        assert_eq!(signed_payload("GET", "/credentials", b"ignored"), b"/credentials");
        assert_eq!(signed_payload("DELETE", "/x", b"ignored"), b"/x");
        assert_eq!(signed_payload("POST", "/invitations", b"{}"), b"{}");
    }

    #[test]
    fn test_verify_request() {
        let (agent, signing) = agent_with_key();
        let body = br#"{"invitation":"abc"}"#;
        let signature = URL_SAFE.encode(signing.sign(body).to_bytes());

        assert!(verify_request(&agent, body, &signature).is_ok());

        let tampered = verify_request(&agent, b"{}", &signature);
        assert!(matches!(tampered, Err(HubError::Unauthenticated(_))));

        let garbage = verify_request(&agent, body, "***");
        assert!(matches!(garbage, Err(HubError::Unauthenticated(_))));
    }
}
