//! One-shot tool invocation against a single server.
//!
//! This path serves administrative calls made outside any chat session; tools
//! bound into an active session go through the aggregator instead.

use crate::core::http::HttpClientFactory;
use crate::mcp::config::{require_server_url, McpServerConfig};
use crate::mcp::connector::{self, ensure_tools_capability};
use crate::mcp::error::McpTransportError;
use rust_mcp_schema::CallToolResult;
use serde_json::Value;
use tracing::debug;

#[derive(Debug)]
pub struct ToolCallOutcome {
    pub tool_name: String,
    /// The remote result payload, unchanged.
    pub result: CallToolResult,
}

pub async fn call_server_tool(
    config: &McpServerConfig,
    tool_name: &str,
    input: Option<Value>,
    http: &HttpClientFactory,
) -> Result<ToolCallOutcome, McpTransportError> {
    let tool_name = tool_name.trim();
    if tool_name.is_empty() {
        return Err(McpTransportError::invalid_config(
            "Tool name is required.".to_string(),
        ));
    }
    require_server_url(config)?;

    // Arguments are forwarded only when the input is a plain object.
    let arguments = input.as_ref().and_then(Value::as_object).cloned();

    let connection = connector::connect(config, http).await?;
    let result = match ensure_tools_capability(&connection) {
        Ok(()) => {
            debug!(server_id = %connection.server_id(), tool = %tool_name, "Invoking MCP tool");
            connection.call_tool(tool_name, arguments).await
        }
        Err(err) => Err(err),
    };
    connection.close().await;

    result.map(|result| ToolCallOutcome {
        tool_name: tool_name.to_string(),
        result,
    })
}
