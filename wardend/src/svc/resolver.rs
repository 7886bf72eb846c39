use std::time::Duration;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use prople_warden_core::resolver::{ResolutionResult, Resolver};
use prople_warden_rpc::Provider;

use crate::errors::WardenError;

use super::server::{self, ApiError};

async fn resolve(
    State(resolver): State<Resolver>,
    Path(did): Path<String>,
) -> Result<Json<ResolutionResult>, ApiError> {
    Ok(Json(resolver.resolve(&did).await?))
}

pub fn routes(resolver: Resolver, timeout: Duration) -> Router {
    let app = Router::new().route("/did/{did}", get(resolve));
    server::layered(app, timeout).with_state(resolver)
}

pub async fn serve(provider: &Provider) -> Result<(), WardenError> {
    let config = provider.config();
    let timeout = Duration::from_secs(config.app().get_timeout_secs());

    let addr = config.resolver().get_addr();
    server::serve("did resolver", &addr, routes(provider.resolver(), timeout)).await
}
