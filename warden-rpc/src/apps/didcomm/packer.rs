use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use serde::{Deserialize, Serialize};

use prople_warden_core::didcomm::types::{DIDCommError, Packer, Unpacked};

#[derive(Debug, Serialize, Deserialize)]
struct Protected {
    from: String,
    to: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    protected: String,
    payload: String,
}

/// PlaintextPacker is the development envelope format: `{"protected", "payload"}` where both
/// members are base64url JSON, nothing is encrypted
#[derive(Debug, Clone, Default)]
pub struct PlaintextPacker;

impl PlaintextPacker {
    pub fn new() -> Self {
        Self
    }
}

fn decode(field: &str, value: &str) -> Result<Vec<u8>, DIDCommError> {
    URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|err| DIDCommError::UnpackError(format!("{}: {}", field, err)))
}

#[async_trait]
impl Packer for PlaintextPacker {
    async fn unpack(&self, envelope: &[u8]) -> Result<Unpacked, DIDCommError> {
        let envelope: Envelope = serde_json::from_slice(envelope)
            .map_err(|err| DIDCommError::UnpackError(err.to_string()))?;

        let protected: Protected = serde_json::from_slice(&decode("protected", &envelope.protected)?)
            .map_err(|err| DIDCommError::UnpackError(err.to_string()))?;
        let message = decode("payload", &envelope.payload)?;

        Ok(Unpacked {
            message,
            from_did: protected.from,
            to_did: protected.to,
        })
    }

    async fn pack(
        &self,
        plaintext: &[u8],
        from_did: &str,
        to_did: &str,
    ) -> Result<Vec<u8>, DIDCommError> {
        let protected = serde_json::to_vec(&Protected {
            from: from_did.to_string(),
            to: to_did.to_string(),
        })
        .map_err(|err| DIDCommError::PackError(err.to_string()))?;

        serde_json::to_vec(&Envelope {
            protected: URL_SAFE_NO_PAD.encode(protected),
            payload: URL_SAFE_NO_PAD.encode(plaintext),
        })
        .map_err(|err| DIDCommError::PackError(err.to_string()))
    }
}
