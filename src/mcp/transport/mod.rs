//! Shared MCP transport abstractions.
//!
//! Both wire transports implement one capability contract so the connector
//! and everything above it stay transport-agnostic.

use crate::mcp::error::McpTransportError;
use async_trait::async_trait;
use rust_mcp_schema::schema_utils::{RequestFromClient, ServerMessage};

pub mod event_stream;
pub mod sse;
pub mod streamable_http;

/// Supported MCP transport backends, in negotiation order.
///
/// - [`McpTransportKind::StreamableHttp`] is the preferred bidirectional
///   streaming transport.
/// - [`McpTransportKind::Sse`] is the older HTTP+SSE transport kept for
///   servers that have not migrated yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransportKind {
    StreamableHttp,
    Sse,
}

impl McpTransportKind {
    pub fn is_fallback(self) -> bool {
        matches!(self, McpTransportKind::Sse)
    }
}

/// Transport contract required by the connector and the operations above it.
#[async_trait]
pub trait McpTransport: Send + Sync {
    fn kind(&self) -> McpTransportKind;

    async fn send_request(
        &self,
        request: RequestFromClient,
    ) -> Result<ServerMessage, McpTransportError>;

    /// Best-effort session teardown; errors are swallowed.
    async fn close(&self);
}

/// How a primary-transport connect attempt failed, kept separate from the
/// normalized error so the connector can decide fallback eligibility.
#[derive(Debug)]
pub(crate) enum ConnectFailure {
    /// The HTTP layer rejected the handshake. `status` is absent when the
    /// response carried no usable status (e.g. an unexpected content type).
    Http {
        status: Option<u16>,
        message: String,
    },
    /// The attempt hit a transport-level timeout.
    Timeout,
    /// The server answered with a well-formed JSON-RPC error.
    Rpc(McpTransportError),
    /// Network-level failure (DNS, refused connection) or a malformed
    /// response unrelated to HTTP status.
    Transport(String),
}

impl ConnectFailure {
    pub(crate) fn into_error(self) -> McpTransportError {
        match self {
            ConnectFailure::Http { status, message } => {
                McpTransportError::from_http_status(status, message)
            }
            ConnectFailure::Timeout => {
                McpTransportError::connect_timeout("MCP connect attempt timed out.")
            }
            ConnectFailure::Rpc(error) => error,
            ConnectFailure::Transport(message) => {
                McpTransportError::other("MCP connect failed", &message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_failures_normalize_to_expected_statuses() {
        assert_eq!(ConnectFailure::Timeout.into_error().status(), 504);
        assert_eq!(
            ConnectFailure::Http {
                status: Some(503),
                message: "down".to_string(),
            }
            .into_error()
            .status(),
            503
        );
        assert_eq!(
            ConnectFailure::Http {
                status: None,
                message: "odd".to_string(),
            }
            .into_error()
            .status(),
            502
        );
        assert_eq!(
            ConnectFailure::Transport("dns".to_string())
                .into_error()
                .status(),
            502
        );
    }
}
