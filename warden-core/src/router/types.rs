use thiserror::Error;

use crate::common::types::HubError;

pub const METHOD_POST: &str = "POST";

/// RouterError is the rejection of an inbound HTTP request, before any envelope is read
#[derive(Debug, PartialEq, Error, Clone)]
pub enum RouterError {
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),

    #[error("unsupported content type: {0}")]
    UnsupportedMediaType(String),

    #[error("missing body")]
    MissingBody,

    #[error("publish error: {0}")]
    Publish(String),
}

impl RouterError {
    pub fn status(&self) -> u16 {
        match self {
            RouterError::MethodNotAllowed(_) => 405,
            RouterError::UnsupportedMediaType(_) => 415,
            RouterError::MissingBody => 400,
            RouterError::Publish(_) => 500,
        }
    }
}

impl From<RouterError> for HubError {
    fn from(value: RouterError) -> Self {
        match value {
            RouterError::Publish(_) => HubError::Internal(value.to_string()),
            other => HubError::InvalidArgument(other.to_string()),
        }
    }
}

/// Routed tells what happened to one envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Routed {
    /// Queued names the queue the original envelope was published to
    Queued(String),

    /// Dropped carries the reason, the envelope never reached a queue
    Dropped(String),
}
