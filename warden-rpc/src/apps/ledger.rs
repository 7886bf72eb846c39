use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use prople_warden_core::ledger::{LedgerClient, LedgerError, Nym};

#[derive(Debug, Deserialize)]
struct Reply {
    result: ReplyResult,
}

#[derive(Debug, Deserialize)]
struct ReplyResult {
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NymData {
    dest: String,
    verkey: String,

    #[serde(default)]
    role: Option<String>,
}

/// HttpLedgerClient reads nyms through an indy-vdr-proxy style HTTP gateway
///
/// `GET {url}/nym/{did}` answers the raw ledger reply, whose `result.data` is the JSON encoded
/// nym or `null`. The endpoint attribute is looked up with `GET {url}/attrib/{did}/endpoint`
#[derive(Clone)]
pub struct HttpLedgerClient {
    client: Client,
    url: String,
}

impl HttpLedgerClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| LedgerError::RequestError(err.to_string()))?;

        Ok(Self {
            client,
            url: url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch(&self, path: &str) -> Result<Option<String>, LedgerError> {
        let response = self
            .client
            .get(format!("{}/{}", self.url, path))
            .send()
            .await
            .map_err(|err| LedgerError::RequestError(err.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::NOT_FOUND => return Ok(None),
            other => {
                return Err(LedgerError::ResponseError(format!(
                    "ledger answered {}",
                    other
                )))
            }
        }

        let reply: Reply = response
            .json()
            .await
            .map_err(|err| LedgerError::ResponseError(err.to_string()))?;
        Ok(reply.result.data)
    }

    async fn endpoint(&self, did: &str) -> Option<String> {
        let raw = match self.fetch(&format!("attrib/{}/endpoint", did)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                debug!("endpoint attribute of {} unavailable: {}", did, err);
                return None;
            }
        };

        let value: Value = serde_json::from_str(&raw).ok()?;
        value
            .get("endpoint")
            .and_then(|endpoint| endpoint.get("endpoint"))
            .and_then(Value::as_str)
            .map(|endpoint| endpoint.to_string())
    }
}

fn unqualified(did: &str) -> &str {
    did.rsplit(':').next().unwrap_or(did)
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn get_nym(&self, did: &str) -> Result<Nym, LedgerError> {
        let id = unqualified(did);
        let raw = self
            .fetch(&format!("nym/{}", id))
            .await?
            .ok_or_else(|| LedgerError::NotFound(did.to_string()))?;

        let data: NymData = serde_json::from_str(&raw)
            .map_err(|err| LedgerError::ResponseError(err.to_string()))?;

        let full_did = if did.starts_with("did:") {
            did.to_string()
        } else {
            format!("did:sov:{}", data.dest)
        };

        Ok(Nym {
            did: full_did,
            verkey: data.verkey,
            endpoint: self.endpoint(id).await,
            role: data.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn reply(data: Option<Value>) -> String {
        json!({
            "op": "REPLY",
            "result": {"data": data.map(|value| value.to_string())}
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_get_nym() {
        let mut server = mockito::Server::new_async().await;
        let _nym = server
            .mock("GET", "/nym/Th7MpTaRZVRYnPiabds81Y")
            .with_status(200)
            .with_body(reply(Some(json!({
                "dest": "Th7MpTaRZVRYnPiabds81Y",
                "verkey": "~7TYfekw4GUagBnBVCqPjiC",
                "role": "0"
            }))))
            .create_async()
            .await;
        let _attrib = server
            .mock("GET", "/attrib/Th7MpTaRZVRYnPiabds81Y/endpoint")
            .with_status(200)
            .with_body(reply(Some(json!({"endpoint": {"endpoint": "http://peer.example/"}}))))
            .create_async()
            .await;

        let client = HttpLedgerClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let nym = client.get_nym("did:sov:Th7MpTaRZVRYnPiabds81Y").await.unwrap();

        assert_eq!(nym.did, "did:sov:Th7MpTaRZVRYnPiabds81Y");
        assert_eq!(nym.verkey, "~7TYfekw4GUagBnBVCqPjiC");
        assert_eq!(nym.role, Some("0".to_string()));
        assert_eq!(nym.endpoint, Some("http://peer.example/".to_string()));
    }

    #[tokio::test]
    async fn test_get_nym_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _nym = server
            .mock("GET", "/nym/unknown")
            .with_status(200)
            .with_body(reply(None))
            .create_async()
            .await;

        let client = HttpLedgerClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let result = client.get_nym("did:sov:unknown").await;
        assert_eq!(result, Err(LedgerError::NotFound("did:sov:unknown".to_string())));
    }

    #[tokio::test]
    async fn test_get_nym_ledger_failure() {
        let mut server = mockito::Server::new_async().await;
        let _nym = server
            .mock("GET", "/nym/broken")
            .with_status(503)
            .create_async()
            .await;

        let client = HttpLedgerClient::new(&server.url(), Duration::from_secs(5)).unwrap();
        let result = client.get_nym("broken").await;
        assert!(matches!(result, Err(LedgerError::ResponseError(_))));
    }
}
