use serde::{Deserialize, Serialize};
use thiserror::Error;

/// ErrorCode is the stable classification exposed to RPC callers
///
/// Every [`HubError`] maps into exactly one code, the JSON-RPC layer and the bridge
/// REST surface only need this value to choose their own status representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    AlreadyExists,
    Unauthenticated,
    Internal,
    DeadlineExceeded,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::FailedPrecondition => "FailedPrecondition",
            ErrorCode::AlreadyExists => "AlreadyExists",
            ErrorCode::Unauthenticated => "Unauthenticated",
            ErrorCode::Internal => "Internal",
            ErrorCode::DeadlineExceeded => "DeadlineExceeded",
        }
    }
}

/// HubError is the base error taxonomy shared by the control plane, the supervisors
/// and the cloud-agent bridge
#[derive(Debug, PartialEq, Error, Serialize, Deserialize, Clone)]
pub enum HubError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("deadline exceeded: {0}")]
    DeadlineExceeded(String),
}

impl HubError {
    pub fn code(&self) -> ErrorCode {
        match self {
            HubError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            HubError::NotFound(_) => ErrorCode::NotFound,
            HubError::FailedPrecondition(_) => ErrorCode::FailedPrecondition,
            HubError::AlreadyExists(_) => ErrorCode::AlreadyExists,
            HubError::Unauthenticated(_) => ErrorCode::Unauthenticated,
            HubError::Internal(_) => ErrorCode::Internal,
            HubError::DeadlineExceeded(_) => ErrorCode::DeadlineExceeded,
        }
    }
}

/// PaginationParams used by the list operations, `start` is a zero based offset
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PaginationParams {
    #[serde(default)]
    pub start: usize,

    #[serde(default, rename = "pageSize")]
    pub page_size: usize,
}

impl PaginationParams {
    pub const DEFAULT_PAGE_SIZE: usize = 10;

    pub fn new(start: usize, page_size: usize) -> Self {
        Self { start, page_size }
    }

    /// paginate slices the given items, a zero `page_size` falls back to
    /// [`PaginationParams::DEFAULT_PAGE_SIZE`]
    pub fn paginate<T>(&self, items: Vec<T>) -> Vec<T> {
        let size = if self.page_size == 0 {
            Self::DEFAULT_PAGE_SIZE
        } else {
            self.page_size
        };

        items.into_iter().skip(self.start).take(size).collect()
    }
}
