//! Transport negotiation and the per-operation connection handle.
//!
//! The streamable HTTP transport is tried first under a hard wall-clock
//! deadline; on timeout or an HTTP-layer rejection the older SSE transport
//! gets one attempt with the same URL and headers. Every connection is owned
//! by exactly one operation and must be closed by it on every exit path.

use crate::core::http::HttpClientFactory;
use crate::mcp::config::{sanitize_headers, validated_server_url, McpServerConfig};
use crate::mcp::error::McpTransportError;
use crate::mcp::protocol;
use crate::mcp::transport::sse::SseTransport;
use crate::mcp::transport::streamable_http::StreamableHttpTransport;
use crate::mcp::transport::{ConnectFailure, McpTransport, McpTransportKind};
use rust_mcp_schema::schema_utils::RequestFromClient;
use rust_mcp_schema::{
    CallToolRequestParams, CallToolResult, InitializeResult, ListToolsResult, Tool,
};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

/// Hard deadline for the primary-transport handshake. Only this attempt is
/// bounded here; everything else inherits the surrounding request deadline.
pub(crate) const MCP_CONNECT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Combined cap across tool-listing pages.
pub(crate) const MCP_MAX_TOOL_LIST: usize = 100;

/// A live session with one MCP server, bound to whichever transport the
/// negotiation settled on.
pub struct McpClientConnection {
    server_id: String,
    transport: Box<dyn McpTransport>,
    server: InitializeResult,
}

impl std::fmt::Debug for McpClientConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("McpClientConnection")
            .field("server_id", &self.server_id)
            .field("transport", &self.transport.kind())
            .field("server", &self.server)
            .finish()
    }
}

impl McpClientConnection {
    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn transport_kind(&self) -> McpTransportKind {
        self.transport.kind()
    }

    pub fn supports_tools(&self) -> bool {
        self.server.capabilities.tools.is_some()
    }

    /// List every tool the server exposes, following pagination cursors up
    /// to the listing cap.
    pub async fn list_all_tools(&self) -> Result<Vec<Tool>, McpTransportError> {
        let mut tools = Vec::new();
        let mut cursor = None;

        loop {
            let page = self.list_tools_page(cursor).await?;
            tools.extend(page.tools);
            if tools.len() >= MCP_MAX_TOOL_LIST {
                tools.truncate(MCP_MAX_TOOL_LIST);
                break;
            }
            match page.next_cursor {
                Some(next_cursor) => cursor = Some(next_cursor),
                None => break,
            }
        }

        Ok(tools)
    }

    async fn list_tools_page(
        &self,
        cursor: Option<String>,
    ) -> Result<ListToolsResult, McpTransportError> {
        let params = protocol::paginated_params(cursor);
        let response = self
            .transport
            .send_request(RequestFromClient::ListToolsRequest(params))
            .await?;
        protocol::parse_list_tools(response)
    }

    pub async fn call_tool(
        &self,
        tool_name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, McpTransportError> {
        let mut params = CallToolRequestParams::new(tool_name);
        if let Some(arguments) = arguments {
            params = params.with_arguments(arguments);
        }
        let response = self
            .transport
            .send_request(RequestFromClient::CallToolRequest(params))
            .await?;
        protocol::parse_call_tool(response)
    }

    /// Release the underlying session. Best-effort; safe to call exactly
    /// once from the owning operation.
    pub async fn close(&self) {
        self.transport.close().await;
    }
}

/// Connect to `config`'s server, negotiating the transport.
pub async fn connect(
    config: &McpServerConfig,
    http: &HttpClientFactory,
) -> Result<McpClientConnection, McpTransportError> {
    connect_with_timeout(config, http, MCP_CONNECT_TIMEOUT).await
}

pub(crate) async fn connect_with_timeout(
    config: &McpServerConfig,
    http: &HttpClientFactory,
    deadline: Duration,
) -> Result<McpClientConnection, McpTransportError> {
    let url = validated_server_url(config.url().unwrap_or_default())?;
    let headers = sanitize_headers(&config.headers);
    let client = http
        .mcp_client()
        .map_err(|message| McpTransportError::other("Failed to build HTTP client", &message))?;

    let primary = tokio::time::timeout(
        deadline,
        StreamableHttpTransport::connect(client.clone(), url.clone(), headers.clone()),
    );

    // Dropping the timed-out attempt future releases whatever it held; the
    // timer itself is dropped as soon as the connect settles.
    let failure = match primary.await {
        Ok(Ok((transport, server))) => {
            return Ok(McpClientConnection {
                server_id: config.id.clone(),
                transport: Box::new(transport),
                server,
            });
        }
        Ok(Err(failure)) => failure,
        Err(_) => ConnectFailure::Timeout,
    };

    if !is_fallback_eligible(&failure) {
        return Err(failure.into_error());
    }

    debug!(
        server_id = %config.id,
        reason = %failure.into_error(),
        "MCP streamable HTTP connect failed; trying SSE fallback"
    );

    let (transport, server) = SseTransport::connect(client, url, headers).await?;
    Ok(McpClientConnection {
        server_id: config.id.clone(),
        transport: Box::new(transport),
        server,
    })
}

/// Timeouts and HTTP-layer rejections outside the 200–399 range fall back;
/// everything else propagates. Whether 3xx handshake statuses should also
/// fall back is unresolved upstream; they are treated as non-eligible here.
fn is_fallback_eligible(failure: &ConnectFailure) -> bool {
    match failure {
        ConnectFailure::Timeout => true,
        ConnectFailure::Http { status, .. } => {
            status.map_or(true, |code| !(200..400).contains(&code))
        }
        ConnectFailure::Rpc(_) | ConnectFailure::Transport(_) => false,
    }
}

pub(crate) fn ensure_tools_capability(
    connection: &McpClientConnection,
) -> Result<(), McpTransportError> {
    if connection.supports_tools() {
        Ok(())
    } else {
        Err(McpTransportError::invalid_config(format!(
            "MCP server '{}' does not advertise the tools capability.",
            connection.server_id()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_eligibility_follows_status_classes() {
        assert!(is_fallback_eligible(&ConnectFailure::Timeout));
        assert!(is_fallback_eligible(&ConnectFailure::Http {
            status: Some(404),
            message: String::new(),
        }));
        assert!(is_fallback_eligible(&ConnectFailure::Http {
            status: Some(500),
            message: String::new(),
        }));
        assert!(is_fallback_eligible(&ConnectFailure::Http {
            status: None,
            message: String::new(),
        }));
        assert!(!is_fallback_eligible(&ConnectFailure::Http {
            status: Some(204),
            message: String::new(),
        }));
        assert!(!is_fallback_eligible(&ConnectFailure::Http {
            status: Some(302),
            message: String::new(),
        }));
        assert!(!is_fallback_eligible(&ConnectFailure::Transport(
            "dns failure".to_string()
        )));
    }

    #[test]
    fn invalid_urls_are_rejected_before_any_io() {
        let config = McpServerConfig {
            id: "alpha".to_string(),
            url: Some("not a url".to_string()),
            ..McpServerConfig::default()
        };
        let rt = tokio::runtime::Runtime::new().expect("runtime");
        let err = rt
            .block_on(connect(&config, &HttpClientFactory::no_proxy()))
            .expect_err("invalid url should fail");
        assert_eq!(err.status(), 400);
    }
}
