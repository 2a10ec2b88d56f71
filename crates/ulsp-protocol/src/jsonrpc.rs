//! JSON-RPC 2.0 message types.
//!
//! Core request, response and error types for JSON-RPC communication over
//! the `Content-Length` framed transport in [`ulsp_transport`](../ulsp_transport/index.html).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-RPC 2.0 request or notification message.
///
/// The `id` field is `None` for notifications: callers must not reply to
/// those, per the JSON-RPC spec.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version, always `"2.0"`.
    #[serde(rename = "jsonrpc")]
    pub _jsonrpc: String,

    /// Request identifier. `None` for notifications.
    pub id: Option<Value>,

    /// Method name to invoke.
    pub method: String,

    /// Method parameters.
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 response message.
///
/// Either `result` or `error` is set, never both.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version, always `"2.0"`.
    pub jsonrpc: String,

    /// Request identifier, echoed from the request.
    pub id: Option<Value>,

    /// Success result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Error result.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Build a success response.
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(result), error: None }
    }

    /// Build an error response.
    pub fn error(id: Option<Value>, error: JsonRpcError) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: None, error: Some(error) }
    }

    /// Build a `null`-result response, used for requests with no payload.
    pub fn null(id: Option<Value>) -> Self {
        Self { jsonrpc: "2.0".to_string(), id, result: Some(Value::Null), error: None }
    }
}

/// Outbound JSON-RPC notification (no `id`, no reply expected).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcNotification {
    /// JSON-RPC version, always `"2.0"`.
    pub jsonrpc: String,
    /// Method name.
    pub method: String,
    /// Notification parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    /// Build a notification with the given method and params.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self { jsonrpc: "2.0".to_string(), method: method.into(), params: Some(params) }
    }
}

/// Outbound JSON-RPC request originated by the server (client-bound request).
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcClientRequest {
    /// JSON-RPC version, always `"2.0"`.
    pub jsonrpc: String,
    /// Request identifier, allocated by the sender.
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Request parameters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code. See [`codes`] for the standard JSON-RPC/LSP codes.
    pub code: i32,
    /// Human-readable error message.
    pub message: String,
    /// Additional structured error data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Build a new error with no extra data.
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self { code, message: message.into(), data: None }
    }

    /// Build an error carrying additional structured data.
    pub fn with_data(code: i32, message: impl Into<String>, data: Value) -> Self {
        Self { code, message: message.into(), data: Some(data) }
    }
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}
