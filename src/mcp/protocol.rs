//! JSON-RPC payload construction and response parsing shared by both
//! transports.

use crate::mcp::error::McpTransportError;
use rust_mcp_schema::schema_utils::ServerMessage;
use rust_mcp_schema::{
    CallToolResult, ClientCapabilities, Implementation, InitializeRequestParams, InitializeResult,
    ListToolsResult, PaginatedRequestParams, LATEST_PROTOCOL_VERSION,
};
use serde_json::Value;

pub(crate) fn client_details() -> InitializeRequestParams {
    InitializeRequestParams {
        capabilities: ClientCapabilities::default(),
        client_info: Implementation {
            name: "ponton".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            title: Some("Ponton MCP Client".to_string()),
            description: Some("Ponton MCP client runtime".to_string()),
            icons: Vec::new(),
            website_url: Some("https://github.com/permacommons/ponton".to_string()),
        },
        meta: None,
        protocol_version: LATEST_PROTOCOL_VERSION.to_string(),
    }
}

/// Prefer the version the server negotiated; fall back to the latest we speak.
pub(crate) fn effective_protocol_version(negotiated: Option<&str>) -> String {
    match negotiated {
        Some(version) if !version.trim().is_empty() => version.to_string(),
        _ => LATEST_PROTOCOL_VERSION.to_string(),
    }
}

pub(crate) fn paginated_params(cursor: Option<String>) -> Option<PaginatedRequestParams> {
    cursor.map(|cursor| PaginatedRequestParams {
        cursor: Some(cursor),
        meta: None,
    })
}

pub(crate) fn parse_initialize_result(
    message: ServerMessage,
) -> Result<InitializeResult, McpTransportError> {
    let result: InitializeResult = parse_response(message)?;
    if result.protocol_version.trim().is_empty() {
        return Err(McpTransportError::other(
            "Unexpected initialize response",
            "missing protocol version",
        ));
    }
    Ok(result)
}

pub(crate) fn parse_list_tools(
    message: ServerMessage,
) -> Result<ListToolsResult, McpTransportError> {
    parse_response(message)
}

pub(crate) fn parse_call_tool(message: ServerMessage) -> Result<CallToolResult, McpTransportError> {
    parse_response(message)
}

fn parse_response<T: serde::de::DeserializeOwned>(
    message: ServerMessage,
) -> Result<T, McpTransportError> {
    let value = parse_response_value(message)?;
    serde_json::from_value::<T>(value)
        .map_err(|err| McpTransportError::wrap("Malformed MCP response", err))
}

pub(crate) fn parse_response_value(message: ServerMessage) -> Result<Value, McpTransportError> {
    match message {
        ServerMessage::Response(response) => serde_json::to_value(&response.result)
            .map_err(|err| McpTransportError::wrap("Malformed MCP response", err)),
        ServerMessage::Error(error) => Err(McpTransportError::from_rpc_error(&error.error)),
        other => Err(McpTransportError::other(
            "Unexpected MCP server message",
            &format!("{other:?}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::error::format_rpc_error;

    #[test]
    fn parse_initialize_rejects_blank_protocol_version() {
        let message = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "capabilities": {},
                "protocolVersion": " ",
                "serverInfo": {"name": "x", "version": "1.0.0"}
            }
        }))
        .expect("message should parse");

        assert!(parse_initialize_result(message).is_err());
    }

    #[test]
    fn rpc_error_response_carries_mapped_status() {
        let message = serde_json::from_value(serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32601, "message": "no such method"}
        }))
        .expect("message should parse");

        let err = parse_response_value(message).expect_err("error response should fail");
        assert_eq!(err.status(), 404);
        assert!(err.message().contains("no such method"));
    }

    #[test]
    fn effective_protocol_prefers_negotiated() {
        assert_eq!(effective_protocol_version(Some("2025-06-18")), "2025-06-18");
        assert_eq!(effective_protocol_version(Some("  ")), LATEST_PROTOCOL_VERSION);
        assert_eq!(effective_protocol_version(None), LATEST_PROTOCOL_VERSION);
    }

    #[test]
    fn rpc_error_formatting_matches_code_and_message() {
        let formatted = format_rpc_error(&rust_mcp_schema::RpcError {
            code: -32000,
            message: "gone".to_string(),
            data: None,
        });
        assert_eq!(formatted, "MCP error -32000: gone");
    }
}
