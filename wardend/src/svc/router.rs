use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::Response;
use axum::routing::{any, get};
use axum::Router;
use tracing::{debug, error, info, warn};

use prople_warden_core::router::{validate_request, Router as EnvelopeRouter};
use prople_warden_rpc::Provider;

use crate::errors::WardenError;

use super::server;

#[derive(Clone)]
pub struct RouterState {
    router: EnvelopeRouter,
    external: String,
}

fn status(code: u16) -> StatusCode {
    StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn inbound(
    State(state): State<RouterState>,
    method: Method,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let content_type = headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok());
    if let Err(err) = validate_request(method.as_str(), content_type, &body) {
        debug!("inbound request rejected: {}", err);
        return status(err.status());
    }

    match state.router.route(&body).await {
        Ok(_) => StatusCode::OK,
        Err(err) => status(err.status()),
    }
}

async fn endpoint(State(state): State<RouterState>) -> String {
    state.external
}

async fn upgrade(State(state): State<RouterState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.router))
}

/// handle_socket treats every data frame as one envelope until the peer closes
async fn handle_socket(mut socket: WebSocket, router: EnvelopeRouter) {
    info!("inbound websocket opened");

    while let Some(frame) = socket.recv().await {
        let envelope = match frame {
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Text(text)) => text.as_str().as_bytes().to_vec(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(err) => {
                warn!("inbound websocket failed: {}", err);
                break;
            }
        };

        if let Err(err) = router.route(&envelope).await {
            error!("inbound frame not routed: {}", err);
        }
    }

    info!("inbound websocket closed");
}

pub fn http_routes(state: RouterState, timeout: Duration) -> Router {
    let app = Router::new()
        .route("/", any(inbound))
        .route("/endpoint", get(endpoint));

    server::layered(app, timeout).with_state(state)
}

pub fn ws_routes(state: RouterState) -> Router {
    Router::new()
        .route("/", get(upgrade))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Inbound serves the DIDComm front door over HTTP and, when configured, WebSocket
pub struct Inbound {
    provider: Provider,
}

impl Inbound {
    pub fn new(provider: Provider) -> Self {
        Self { provider }
    }

    pub async fn serve(&self) -> Result<(), WardenError> {
        let config = self.provider.config();
        let timeout = Duration::from_secs(config.app().get_timeout_secs());

        let state = RouterState {
            router: self.provider.router().await?,
            external: config.router().get_external(),
        };

        let http_addr = config.router().get_http_addr();
        let http = server::serve("router http", &http_addr, http_routes(state.clone(), timeout));

        match config.router().get_ws_addr() {
            Some(ws_addr) => {
                let ws = server::serve("router websocket", &ws_addr, ws_routes(state));
                tokio::try_join!(http, ws).map(|_| ())
            }
            None => http.await,
        }
    }
}
