use thiserror::Error;

use prople_warden_core::common::types::HubError;

/// CommonError covers configuration and wiring failures of the runtime crates
///
/// Protocol and admin failures travel as [`HubError`] instead
#[derive(Debug, Error, PartialEq)]
pub enum CommonError {
    #[error("dberror: {0}")]
    DbError(String),

    #[error("valdation error: {0}")]
    ValidationError(String),

    #[error("json error: {0}")]
    JSONError(String),

    #[error("internal error: {0}")]
    InternalError(String),

    #[error("method error: {0}")]
    MethodError(String),

    #[error("config error: {0}")]
    ConfigError(String),

    #[error("rpc error: {0}")]
    RpcError(String),
}

impl From<CommonError> for HubError {
    fn from(value: CommonError) -> Self {
        match value {
            CommonError::ValidationError(msg) | CommonError::JSONError(msg) => {
                HubError::InvalidArgument(msg)
            }
            other => HubError::Internal(other.to_string()),
        }
    }
}

pub trait ToValidate {
    fn validate(&self) -> Result<(), CommonError>;
}
