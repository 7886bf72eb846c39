use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;

use prople_warden_core::didcomm::types::{DIDCommError, Transport, CONTENT_TYPE_ENVELOPE};
use prople_warden_core::router::Router;

pub const WS_PING_INTERVAL: Duration = Duration::from_secs(30);
const WS_OUTBOX: usize = 32;

type Sockets = Arc<Mutex<HashMap<String, mpsc::Sender<Vec<u8>>>>>;

/// HttpTransport delivers envelopes over HTTP POST, or over a cached outbound WebSocket for
/// `ws://` and `wss://` endpoints
///
/// Outbound sockets are pinged every [`WS_PING_INTERVAL`]. Frames the peer sends back on them are
/// handed to the inbound router when one is attached
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    sockets: Sockets,
    inbound: Option<Router>,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, DIDCommError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| DIDCommError::TransportError(err.to_string()))?;

        Ok(Self {
            client,
            sockets: Arc::new(Mutex::new(HashMap::new())),
            inbound: None,
        })
    }

    pub fn with_inbound(mut self, router: Router) -> Self {
        self.inbound = Some(router);
        self
    }

    async fn post(&self, envelope: Vec<u8>, endpoint: &str) -> Result<(), DIDCommError> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, CONTENT_TYPE_ENVELOPE)
            .body(envelope)
            .send()
            .await
            .map_err(|err| DIDCommError::TransportError(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DIDCommError::TransportError(format!(
                "{} answered {}",
                endpoint, status
            )));
        }

        debug!("envelope posted to {}", endpoint);
        Ok(())
    }

    async fn socket(&self, endpoint: &str) -> Result<mpsc::Sender<Vec<u8>>, DIDCommError> {
        let mut sockets = self.sockets.lock().await;
        if let Some(outbox) = sockets.get(endpoint) {
            if !outbox.is_closed() {
                return Ok(outbox.clone());
            }
            sockets.remove(endpoint);
        }

        let (stream, _) = connect_async(endpoint)
            .await
            .map_err(|err| DIDCommError::TransportError(err.to_string()))?;
        info!("outbound websocket opened to {}", endpoint);

        let (tx, rx) = mpsc::channel(WS_OUTBOX);
        sockets.insert(endpoint.to_string(), tx.clone());

        let endpoint = endpoint.to_string();
        let inbound = self.inbound.clone();
        let cache = self.sockets.clone();
        tokio::spawn(async move {
            run_socket(stream, rx, inbound, &endpoint).await;
            cache.lock().await.remove(&endpoint);
            info!("outbound websocket to {} closed", endpoint);
        });

        Ok(tx)
    }

    async fn push(&self, envelope: Vec<u8>, endpoint: &str) -> Result<(), DIDCommError> {
        let outbox = self.socket(endpoint).await?;
        outbox
            .send(envelope)
            .await
            .map_err(|_| DIDCommError::TransportError(format!("websocket to {} is closed", endpoint)))
    }
}

async fn run_socket<S>(
    stream: tokio_tungstenite::WebSocketStream<S>,
    mut outbox: mpsc::Receiver<Vec<u8>>,
    inbound: Option<Router>,
    endpoint: &str,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    let (mut sink, mut source) = stream.split();
    let mut ping = tokio::time::interval(WS_PING_INTERVAL);
    ping.tick().await;

    loop {
        tokio::select! {
            envelope = outbox.recv() => {
                let Some(envelope) = envelope else { break };
                if let Err(err) = sink.send(WsMessage::Binary(envelope)).await {
                    error!("websocket send to {} failed: {}", endpoint, err);
                    break;
                }
            }
            _ = ping.tick() => {
                if let Err(err) = sink.send(WsMessage::Ping(Vec::new())).await {
                    warn!("websocket ping to {} failed: {}", endpoint, err);
                    break;
                }
            }
            frame = source.next() => {
                let frame = match frame {
                    Some(Ok(frame)) => frame,
                    Some(Err(err)) => {
                        error!("websocket read from {} failed: {}", endpoint, err);
                        break;
                    }
                    None => break,
                };

                let envelope = match frame {
                    WsMessage::Binary(data) => data,
                    WsMessage::Text(text) => text.into_bytes(),
                    WsMessage::Close(_) => break,
                    _ => continue,
                };

                if let Some(router) = &inbound {
                    if let Err(err) = router.route(&envelope).await {
                        error!("inbound frame from {} not routed: {}", endpoint, err);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, envelope: Vec<u8>, endpoint: &str) -> Result<(), DIDCommError> {
        match endpoint.split_once("://").map(|(scheme, _)| scheme) {
            Some("http") | Some("https") => self.post(envelope, endpoint).await,
            Some("ws") | Some("wss") => self.push(envelope, endpoint).await,
            _ => Err(DIDCommError::EndpointError(format!(
                "unsupported endpoint: {}",
                endpoint
            ))),
        }
    }
}
