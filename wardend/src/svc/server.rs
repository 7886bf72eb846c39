use std::time::Duration;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use prople_warden_core::common::types::{ErrorCode, HubError};

use crate::errors::WardenError;

/// layered wraps a service with request tracing and the request deadline
pub fn layered<S>(app: Router<S>, timeout: Duration) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    app.layer((TraceLayer::new_for_http(), TimeoutLayer::new(timeout)))
}

pub async fn serve(name: &str, addr: &str, app: Router) -> Result<(), WardenError> {
    let listener = TcpListener::bind(addr).await?;
    info!("{} listening on {}", name, addr);

    axum::serve(listener, app)
        .await
        .map_err(|err| WardenError::ServerError(format!("{}: {}", name, err)))
}

pub fn status_of(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::FailedPrecondition => StatusCode::PRECONDITION_FAILED,
        ErrorCode::AlreadyExists => StatusCode::CONFLICT,
        ErrorCode::Unauthenticated => StatusCode::UNAUTHORIZED,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorCode::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
    }
}

/// ApiError renders a [`HubError`] on the REST surfaces as `{"code", "message"}`
#[derive(Debug)]
pub struct ApiError(pub HubError);

impl From<HubError> for ApiError {
    fn from(value: HubError) -> Self {
        ApiError(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let body = json!({
            "code": code.as_str(),
            "message": self.0.to_string(),
        });

        (status_of(code), Json(body)).into_response()
    }
}
