use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use prople_warden_core::common::types::HubError;

pub const JSONRPC_VERSION: &str = "2.0";

const CODE_PARSE_ERROR: i64 = -32700;
const CODE_INVALID_REQUEST: i64 = -32600;
const CODE_METHOD_NOT_FOUND: i64 = -32601;
const CODE_INVALID_PARAMS: i64 = -32602;
const CODE_INTERNAL_ERROR: i64 = -32603;
const CODE_HANDLER_ERROR: i64 = -32000;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RpcMethod(String);

impl From<&str> for RpcMethod {
    fn from(value: &str) -> Self {
        RpcMethod(value.to_string())
    }
}

impl From<String> for RpcMethod {
    fn from(value: String) -> Self {
        RpcMethod(value)
    }
}

impl fmt::Display for RpcMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RpcError {
    #[error("parse error")]
    ParseError,

    #[error("invalid request")]
    InvalidRequest,

    #[error("method not found")]
    MethodNotFound,

    #[error("invalid params")]
    InvalidParams,

    #[error("internal error")]
    InternalError,

    #[error("{0}")]
    HandlerError(HubError),
}

impl From<HubError> for RpcError {
    fn from(value: HubError) -> Self {
        RpcError::HandlerError(value)
    }
}

impl RpcError {
    /// to_object builds the JSON-RPC error member, hub failures carry their taxonomy code
    /// in `data.code`
    pub fn to_object(&self) -> RpcErrorObject {
        let (code, data) = match self {
            RpcError::ParseError => (CODE_PARSE_ERROR, None),
            RpcError::InvalidRequest => (CODE_INVALID_REQUEST, None),
            RpcError::MethodNotFound => (CODE_METHOD_NOT_FOUND, None),
            RpcError::InvalidParams => (CODE_INVALID_PARAMS, None),
            RpcError::InternalError => (CODE_INTERNAL_ERROR, None),
            RpcError::HandlerError(err) => (
                CODE_HANDLER_ERROR,
                Some(json!({ "code": err.code().as_str() })),
            ),
        };

        RpcErrorObject {
            code,
            message: self.to_string(),
            data,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub method: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,

    #[serde(default)]
    pub id: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,

    pub id: Option<Value>,
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: Some(result.unwrap_or(Value::Null)),
            error: None,
            id,
        }
    }

    pub fn failure(id: Option<Value>, err: &RpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            result: None,
            error: Some(err.to_object()),
            id,
        }
    }
}

pub type RpcHandlerOutput = Result<Option<Value>, RpcError>;

#[async_trait]
pub trait RpcHandler: Send + Sync {
    async fn call(&self, method: RpcMethod, params: Option<Value>) -> RpcHandlerOutput;
}

#[derive(Clone)]
pub struct RpcRoute {
    pub(crate) method: RpcMethod,
    pub(crate) handler: Arc<dyn RpcHandler>,
}

impl RpcRoute {
    pub fn new(method: RpcMethod, handler: Arc<dyn RpcHandler>) -> Self {
        Self { method, handler }
    }

    pub fn method(&self) -> &RpcMethod {
        &self.method
    }
}
