use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::stream::{self, Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use prople_warden_core::broker::types::QUEUE_DIDEXCHANGE;
use prople_warden_core::control::{AdminAPI, ControlPlane};
use prople_warden_rpc::rpc::shared::rpc::processor::RpcProcessor;
use prople_warden_rpc::rpc::shared::rpc::types::RpcResponse;
use prople_warden_rpc::{Provider, WardenRPC};

use crate::errors::WardenError;

use super::bridge;
use super::server::{self, ApiError};

#[derive(Clone)]
pub struct RpcState {
    processor: RpcProcessor,
    plane: ControlPlane,
}

async fn rpc_handler(State(state): State<RpcState>, body: Bytes) -> Json<RpcResponse> {
    Json(state.processor.execute_raw(&body).await)
}

/// watch_agents streams agent lifecycle events, the first event carries the watch id that
/// `admin.agent.unwatch` accepts
async fn watch_agents(
    State(state): State<RpcState>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let watch = state.plane.watch_agents().await?;
    info!("agent watch {} opened", watch.id);

    let opened = stream::once(async move {
        Ok::<_, axum::Error>(Event::default().event("watch").data(watch.id))
    });
    let events = ReceiverStream::new(watch.events)
        .map(|event| Event::default().event("agent").json_data(event));

    Ok(Sse::new(opened.chain(events)).keep_alive(KeepAlive::default()))
}

pub fn routes(state: RpcState, timeout: Duration) -> Router {
    let rpc = server::layered(
        Router::new().route("/rpc", post(rpc_handler)),
        timeout,
    );

    // the watch stream outlives the request deadline
    let watch = Router::new()
        .route("/watch/agents", get(watch_agents))
        .layer(TraceLayer::new_for_http());

    rpc.merge(watch).with_state(state)
}

/// Rpc serves the control plane: admin JSON-RPC with the watch stream, the cloud-agent bridge
/// and the `didexchange` worker whose bouncer callbacks are registered by this process
pub struct Rpc {
    warden: WardenRPC,
    provider: Provider,
}

impl Rpc {
    pub fn new(warden: WardenRPC, provider: Provider) -> Self {
        Self { warden, provider }
    }

    pub async fn serve(&self) -> Result<(), WardenError> {
        let config = self.warden.config();
        let timeout = Duration::from_secs(config.app().get_timeout_secs());

        let manager = self.warden.build_rpc_admin(&self.provider)?;
        let state = RpcState {
            processor: manager.processor(),
            plane: self.provider.control_plane(),
        };

        let (host, port) = config.app().get_app_config();
        let admin_addr = format!("{}:{}", host, port);
        let admin_app = routes(state, timeout);

        let bridge_addr = config.bridge().get_addr();
        let bridge_app = bridge::routes(self.provider.bridge(), timeout);

        let worker = self.provider.worker(QUEUE_DIDEXCHANGE)?;
        let didexchange = async move {
            worker
                .run()
                .await
                .map_err(|err| WardenError::WorkerError(err.to_string()))
        };

        tokio::try_join!(
            server::serve("admin rpc", &admin_addr, admin_app),
            server::serve("cloud-agent bridge", &bridge_addr, bridge_app),
            didexchange,
        )
        .map(|_| ())
        .inspect_err(|err| error!("control plane stopped: {}", err))
    }
}
