use tracing_subscriber::{self, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use prople_warden_rpc::config::LogFormat;

use crate::errors::WardenError;

fn default_filter() -> String {
    format!(
        "wardend=debug,{}=debug,prople_warden_core=debug,prople_warden_rpc=debug,tower_http=debug,axum=trace",
        env!("CARGO_CRATE_NAME")
    )
}

/// init installs the global subscriber once per process, `log` records from the library
/// crates are forwarded to it
pub fn init(format: LogFormat) -> Result<(), WardenError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter().into());
    let registry = tracing_subscriber::registry().with(filter);

    let installed = match format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().without_time())
            .try_init(),
    };

    installed.map_err(|err| WardenError::ServerError(err.to_string()))
}
