//! Per-server tool catalog queries.

use crate::core::http::HttpClientFactory;
use crate::mcp::config::{require_server_url, McpServerConfig};
use crate::mcp::connector::{self, ensure_tools_capability, McpClientConnection};
use crate::mcp::error::McpTransportError;
use rust_mcp_schema::Tool;
use serde_json::{Map, Value};
use tracing::debug;

/// One remote tool as the server advertises it. Produced fresh on every
/// catalog query; nothing here is cached.
#[derive(Debug, Clone, PartialEq)]
pub struct McpToolDescriptor {
    pub name: String,
    pub description: Option<String>,
    pub input_schema: Value,
    pub output_schema: Option<Value>,
}

impl McpToolDescriptor {
    pub(crate) fn from_tool(tool: &Tool) -> Self {
        Self {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: serde_json::to_value(&tool.input_schema)
                .unwrap_or_else(|_| Value::Object(Map::new())),
            output_schema: tool
                .output_schema
                .as_ref()
                .and_then(|schema| serde_json::to_value(schema).ok()),
        }
    }
}

/// List the tools one configured server exposes.
///
/// Opens a fresh connection, asserts the tools capability, and releases the
/// connection whether or not any step succeeds.
pub async fn list_server_tools(
    config: &McpServerConfig,
    http: &HttpClientFactory,
) -> Result<Vec<McpToolDescriptor>, McpTransportError> {
    require_server_url(config)?;

    let connection = connector::connect(config, http).await?;
    let result = catalog_from_connection(&connection).await;
    connection.close().await;
    result
}

async fn catalog_from_connection(
    connection: &McpClientConnection,
) -> Result<Vec<McpToolDescriptor>, McpTransportError> {
    ensure_tools_capability(connection)?;
    let tools = connection.list_all_tools().await?;
    debug!(
        server_id = %connection.server_id(),
        count = tools.len(),
        "MCP tool listing complete"
    );
    Ok(tools.iter().map(McpToolDescriptor::from_tool).collect())
}
