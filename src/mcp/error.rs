//! The single error shape surfaced by every MCP operation.
//!
//! Heterogeneous transport, protocol, and configuration failures are
//! normalized into [`McpTransportError`] before they leave this subsystem,
//! so the request-handling layer can translate any of them into an HTTP
//! response directly.

use rust_mcp_schema::RpcError;
use std::error::Error;
use std::fmt;

/// JSON-RPC application error codes recognized by the status mapping.
pub(crate) const RPC_CONNECTION_CLOSED: i64 = -32000;
pub(crate) const RPC_REQUEST_TIMEOUT: i64 = -32001;
pub(crate) const RPC_INVALID_REQUEST: i64 = -32600;
pub(crate) const RPC_METHOD_NOT_FOUND: i64 = -32601;
pub(crate) const RPC_INVALID_PARAMS: i64 = -32602;

#[derive(Debug)]
pub struct McpTransportError {
    message: String,
    status: u16,
    cause: Option<Box<dyn Error + Send + Sync>>,
}

impl McpTransportError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status,
            cause: None,
        }
    }

    /// Configuration rejected before any I/O was attempted.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(message, 400)
    }

    /// The primary-transport connect attempt hit its wall-clock deadline.
    pub fn connect_timeout(message: impl Into<String>) -> Self {
        Self::new(message, 504)
    }

    /// A tool call was abandoned because the caller's abort signal fired.
    pub fn cancelled() -> Self {
        Self::new("MCP operation interrupted.", 499)
    }

    /// A well-formed remote error response, mapped by application code.
    pub fn from_rpc_error(error: &RpcError) -> Self {
        let status = match error.code {
            RPC_INVALID_REQUEST | RPC_INVALID_PARAMS => 400,
            RPC_METHOD_NOT_FOUND => 404,
            RPC_REQUEST_TIMEOUT => 504,
            RPC_CONNECTION_CLOSED => 502,
            _ => 502,
        };
        Self::new(format_rpc_error(error), status)
    }

    /// An HTTP-style failure: statuses in [400, 599] pass through, anything
    /// absent or out of range becomes 502.
    pub fn from_http_status(status: Option<u16>, message: impl Into<String>) -> Self {
        let status = match status {
            Some(code) if (400..=599).contains(&code) => code,
            _ => 502,
        };
        Self::new(message, status)
    }

    /// Wrap an arbitrary underlying failure as a 502, preserving its message
    /// behind `fallback` and the original error as the diagnostic cause.
    pub fn wrap(fallback: &str, cause: impl Error + Send + Sync + 'static) -> Self {
        Self {
            message: format!("{fallback}: {cause}"),
            status: 502,
            cause: Some(Box::new(cause)),
        }
    }

    /// A failure with a message but no recoverable source error.
    pub fn other(fallback: &str, detail: &str) -> Self {
        if detail.is_empty() {
            Self::new(fallback, 502)
        } else {
            Self::new(format!("{fallback}: {detail}"), 502)
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn status(&self) -> u16 {
        self.status
    }
}

impl fmt::Display for McpTransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for McpTransportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn Error + 'static))
    }
}

pub(crate) fn format_rpc_error(error: &RpcError) -> String {
    let mut output = format!("MCP error {}: {}", error.code, error.message);
    if let Some(data) = &error.data {
        let details = data
            .get("details")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string())
            .or_else(|| data.as_str().map(|value| value.to_string()))
            .or_else(|| serde_json::to_string_pretty(data).ok());

        if let Some(details) = details {
            if !details.is_empty() {
                output.push('\n');
                output.push_str(&details);
            }
        }
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rpc(code: i64) -> RpcError {
        RpcError {
            code,
            message: "remote failure".to_string(),
            data: None,
        }
    }

    #[test]
    fn rpc_codes_map_to_statuses() {
        assert_eq!(McpTransportError::from_rpc_error(&rpc(-32600)).status(), 400);
        assert_eq!(McpTransportError::from_rpc_error(&rpc(-32602)).status(), 400);
        assert_eq!(McpTransportError::from_rpc_error(&rpc(-32601)).status(), 404);
        assert_eq!(McpTransportError::from_rpc_error(&rpc(-32001)).status(), 504);
        assert_eq!(McpTransportError::from_rpc_error(&rpc(-32000)).status(), 502);
        assert_eq!(McpTransportError::from_rpc_error(&rpc(-32603)).status(), 502);
        assert_eq!(McpTransportError::from_rpc_error(&rpc(-32700)).status(), 502);
        assert_eq!(McpTransportError::from_rpc_error(&rpc(12345)).status(), 502);
    }

    #[test]
    fn http_statuses_pass_through_only_in_error_range() {
        assert_eq!(
            McpTransportError::from_http_status(Some(404), "x").status(),
            404
        );
        assert_eq!(
            McpTransportError::from_http_status(Some(599), "x").status(),
            599
        );
        assert_eq!(
            McpTransportError::from_http_status(Some(302), "x").status(),
            502
        );
        assert_eq!(
            McpTransportError::from_http_status(Some(600), "x").status(),
            502
        );
        assert_eq!(McpTransportError::from_http_status(None, "x").status(), 502);
    }

    #[test]
    fn wrap_preserves_fallback_and_original_message() {
        let source = std::io::Error::other("socket closed");
        let err = McpTransportError::wrap("Tool listing failed", source);
        assert_eq!(err.status(), 502);
        assert_eq!(err.message(), "Tool listing failed: socket closed");
        assert!(err.source().is_some());
    }

    #[test]
    fn rpc_error_details_are_appended() {
        let error = RpcError {
            code: -32603,
            message: "boom".to_string(),
            data: Some(serde_json::json!({"details": "stack trace"})),
        };
        let formatted = format_rpc_error(&error);
        assert!(formatted.starts_with("MCP error -32603: boom"));
        assert!(formatted.contains("stack trace"));
    }
}
