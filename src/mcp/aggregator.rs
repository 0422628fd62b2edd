//! Per-session tool aggregation across several MCP servers.
//!
//! Servers are connected and listed strictly in the caller-supplied order.
//! A failing server degrades to a warning rather than aborting the turn, and
//! name collisions resolve first-writer-wins: the earliest server keeps the
//! name, later duplicates are dropped with a warning.

use crate::core::http::HttpClientFactory;
use crate::mcp::config::McpServerConfig;
use crate::mcp::connector::{self, ensure_tools_capability, McpClientConnection};
use crate::mcp::error::McpTransportError;
use futures_util::future::join_all;
use rust_mcp_schema::CallToolResult;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Denormalized view of one aggregated tool, for provenance display.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolSummary {
    pub name: String,
    pub server_id: String,
    pub description: Option<String>,
}

/// One invocable tool bound to the still-open connection of its owning
/// server.
pub struct AggregatedTool {
    name: String,
    server_id: String,
    description: Option<String>,
    input_schema: Value,
    connection: Arc<McpClientConnection>,
}

impl AggregatedTool {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// The remote input schema, with `additionalProperties` forced off and
    /// `properties` defaulted.
    pub fn input_schema(&self) -> &Value {
        &self.input_schema
    }

    /// Invoke the remote tool. A cancelled token fails fast before any
    /// remote work and aborts an in-flight call cooperatively.
    pub async fn execute(
        &self,
        arguments: Option<Map<String, Value>>,
        cancel_token: Option<&CancellationToken>,
    ) -> Result<CallToolResult, McpTransportError> {
        if cancel_token.is_some_and(CancellationToken::is_cancelled) {
            return Err(McpTransportError::cancelled());
        }
        run_cancellable(cancel_token, self.connection.call_tool(&self.name, arguments)).await
    }
}

async fn run_cancellable<F, T>(
    cancel_token: Option<&CancellationToken>,
    operation: F,
) -> Result<T, McpTransportError>
where
    F: std::future::Future<Output = Result<T, McpTransportError>>,
{
    if let Some(token) = cancel_token {
        tokio::select! {
            _ = token.cancelled() => Err(McpTransportError::cancelled()),
            result = operation => result,
        }
    } else {
        operation.await
    }
}

/// Name-unique tools in registration order. Immutable once built for the
/// session.
#[derive(Default)]
pub struct AggregatedToolSet {
    entries: Vec<AggregatedTool>,
}

impl AggregatedToolSet {
    pub fn get(&self, name: &str) -> Option<&AggregatedTool> {
        self.entries.iter().find(|tool| tool.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AggregatedTool> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Releases every connection the aggregation opened, concurrently and
/// independently.
pub struct McpSessionCleanup {
    connections: Vec<Arc<McpClientConnection>>,
}

impl McpSessionCleanup {
    pub async fn cleanup(self) {
        debug!(count = self.connections.len(), "Releasing MCP session connections");
        join_all(
            self.connections
                .iter()
                .map(|connection| connection.close()),
        )
        .await;
    }
}

pub struct LoadedChatTools {
    pub tools: AggregatedToolSet,
    pub summaries: Vec<ToolSummary>,
    pub warnings: Vec<String>,
    pub cleanup: McpSessionCleanup,
}

/// Connect to every configured server in order and merge their tools into
/// one namespace for the chat session.
///
/// Never fails as a whole: servers that cannot be reached or listed turn
/// into warnings and the rest proceed.
pub async fn load_tools_for_chat(
    servers: &[McpServerConfig],
    http: &HttpClientFactory,
) -> LoadedChatTools {
    let mut entries: Vec<AggregatedTool> = Vec::new();
    let mut registered: HashSet<String> = HashSet::new();
    let mut summaries = Vec::new();
    let mut warnings = Vec::new();
    let mut connections = Vec::new();

    for config in servers {
        if config.url().is_none() {
            warnings.push(format!("MCP server '{}' has no url configured; skipped.", config.id));
            continue;
        }

        let connection = match connector::connect(config, http).await {
            Ok(connection) => connection,
            Err(err) => {
                warnings.push(format!("MCP server '{}': {}", config.id, err));
                continue;
            }
        };

        if connection.transport_kind().is_fallback() {
            warnings.push(format!(
                "MCP server '{}' connected over the SSE fallback transport.",
                config.id
            ));
        }

        if let Err(err) = ensure_tools_capability(&connection) {
            warnings.push(format!("MCP server '{}': {}", config.id, err));
            connection.close().await;
            continue;
        }

        let listed = match connection.list_all_tools().await {
            Ok(listed) => listed,
            Err(err) => {
                warnings.push(format!("MCP server '{}': {}", config.id, err));
                connection.close().await;
                continue;
            }
        };

        debug!(server_id = %config.id, count = listed.len(), "Registering MCP tools");
        let connection = Arc::new(connection);

        for tool in &listed {
            if !config.allows_tool(&tool.name) {
                continue;
            }
            if registered.contains(&tool.name) {
                warnings.push(format!(
                    "Duplicate MCP tool '{}' from server '{}' ignored; an earlier server already registered it.",
                    tool.name, config.id
                ));
                continue;
            }
            registered.insert(tool.name.clone());

            let input_schema = normalized_input_schema(
                serde_json::to_value(&tool.input_schema)
                    .unwrap_or_else(|_| Value::Object(Map::new())),
            );
            summaries.push(ToolSummary {
                name: tool.name.clone(),
                server_id: config.id.clone(),
                description: tool.description.clone(),
            });
            entries.push(AggregatedTool {
                name: tool.name.clone(),
                server_id: config.id.clone(),
                description: tool.description.clone(),
                input_schema,
                connection: Arc::clone(&connection),
            });
        }

        connections.push(connection);
    }

    LoadedChatTools {
        tools: AggregatedToolSet { entries },
        summaries,
        warnings,
        cleanup: McpSessionCleanup { connections },
    }
}

/// Close the remote schema against unknown keys and guarantee a `properties`
/// object, so the streaming layer can hand it to a model verbatim.
fn normalized_input_schema(schema: Value) -> Value {
    let mut map = match schema {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert("additionalProperties".to_string(), Value::Bool(false));
    map.entry("properties".to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_schema_normalization_closes_and_defaults() {
        let normalized = normalized_input_schema(json!({
            "type": "object",
            "properties": {"path": {"type": "string"}}
        }));
        assert_eq!(normalized["additionalProperties"], json!(false));
        assert_eq!(normalized["properties"]["path"]["type"], json!("string"));

        let defaulted = normalized_input_schema(json!({"type": "object"}));
        assert_eq!(defaulted["properties"], json!({}));
        assert_eq!(defaulted["additionalProperties"], json!(false));
    }

    #[tokio::test]
    async fn run_cancellable_returns_cancelled_error() {
        let token = CancellationToken::new();
        token.cancel();

        let result = run_cancellable(Some(&token), async {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            Ok::<_, McpTransportError>(())
        })
        .await;

        let err = result.expect_err("cancelled token should interrupt");
        assert_eq!(err.status(), 499);
    }
}
