//! Standard JSON-RPC / LSP error codes.

/// Standard and LSP-specific JSON-RPC error codes.
pub mod codes {
    /// Invalid JSON was received by the server.
    pub const PARSE_ERROR: i32 = -32700;
    /// The JSON sent is not a valid request object.
    pub const INVALID_REQUEST: i32 = -32600;
    /// The method does not exist or is not supported.
    pub const METHOD_NOT_FOUND: i32 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i32 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i32 = -32603;
    /// A request was sent before the server finished `initialize`.
    pub const SERVER_NOT_INITIALIZED: i32 = -32002;
    /// The request was cancelled by the client (`$/cancelRequest`).
    pub const REQUEST_CANCELLED: i32 = -32800;
    /// The content of a request was modified after it was sent (race with a later edit).
    pub const CONTENT_MODIFIED: i32 = -32801;
}
