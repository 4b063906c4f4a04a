//! Wire format: one JSON object per line.
//!
//! ```text
//! → {"id": 1, "service": "roster", "method": "employees.get", "params": {"id": 7}}
//! ← {"id": 1, "result": {...}}
//! ← {"id": 1, "error": {"code": -32004, "message": "employee 7 not found"}}
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::service::ServiceError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub id: Value,
    pub service: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: i32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcResponse {
    pub id: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl RpcResponse {
    pub fn ok(id: Value, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: Value, error: &RpcError) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorBody {
                code: error.code(),
                message: error.to_string(),
            }),
        }
    }
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("malformed request: {0}")]
    Parse(String),
    #[error("unknown service {0:?}")]
    UnknownService(String),
    #[error("unknown method {service}.{method}")]
    UnknownMethod { service: String, method: String },
    #[error("request line exceeds {limit} bytes")]
    FrameTooLarge { limit: usize },
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("{0}")]
    NotFound(String),
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("server is shutting down")]
    Unavailable,
    #[error("internal error")]
    Internal,
}

impl RpcError {
    pub fn code(&self) -> i32 {
        match self {
            RpcError::Parse(_) => -32700,
            RpcError::FrameTooLarge { .. } => -32600,
            RpcError::UnknownService(_) | RpcError::UnknownMethod { .. } => -32601,
            RpcError::InvalidParams(_) => -32602,
            RpcError::Internal => -32603,
            RpcError::Unavailable => -32003,
            RpcError::NotFound(_) => -32004,
            RpcError::Unauthenticated => -32001,
        }
    }
}

impl From<ServiceError> for RpcError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound { .. } => RpcError::NotFound(err.to_string()),
            ServiceError::InvalidCredentials => RpcError::Unauthenticated,
            ServiceError::Invalid(msg) => RpcError::InvalidParams(msg),
            ServiceError::Repo(e) => {
                tracing::error!(error = %e, "RPC call failed");
                RpcError::Internal
            }
        }
    }
}

/// Decode call params. A missing or null value decodes as an empty object.
pub fn params<T: DeserializeOwned>(value: Value) -> Result<T, RpcError> {
    let value = if value.is_null() {
        Value::Object(Default::default())
    } else {
        value
    };
    serde_json::from_value(value).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

/// Encode a call result.
pub fn result<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| {
        tracing::error!(error = %e, "Failed to encode RPC result");
        RpcError::Internal
    })
}
