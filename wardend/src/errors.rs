use thiserror::Error;

use prople_warden_rpc::common::types::CommonError;

#[derive(Debug, Error)]
pub enum WardenError {
    #[error("rpc error: {0}")]
    RpcError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("server error: {0}")]
    ServerError(String),

    #[error("worker error: {0}")]
    WorkerError(String),
}

impl From<CommonError> for WardenError {
    fn from(value: CommonError) -> Self {
        match value {
            CommonError::ConfigError(msg) | CommonError::ValidationError(msg) => {
                WardenError::ConfigError(msg)
            }
            other => WardenError::RpcError(other.to_string()),
        }
    }
}

impl From<std::io::Error> for WardenError {
    fn from(value: std::io::Error) -> Self {
        WardenError::ServerError(value.to_string())
    }
}
