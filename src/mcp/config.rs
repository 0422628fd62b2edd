//! Per-session MCP server configuration.
//!
//! Configurations arrive from the request-handling layer on every chat turn
//! and are never persisted here. URLs are validated and headers sanitized
//! before any connection attempt.

use crate::mcp::error::McpTransportError;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct McpServerConfig {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub headers: Vec<(String, Value)>,
    #[serde(default)]
    pub enabled_tools: Option<Vec<String>>,
}

impl McpServerConfig {
    /// The configured URL, trimmed, when present and non-empty.
    pub fn url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    /// Whether `tool` passes the optional allow-list. Filtering is silent;
    /// a missing list allows everything.
    pub fn allows_tool(&self, tool: &str) -> bool {
        match &self.enabled_tools {
            Some(allowed) => allowed.iter().any(|name| name == tool),
            None => true,
        }
    }
}

pub(crate) fn require_server_url(config: &McpServerConfig) -> Result<&str, McpTransportError> {
    config.url().ok_or_else(|| {
        McpTransportError::invalid_config(format!(
            "MCP server '{}' has no url configured.",
            config.id
        ))
    })
}

/// Parse and validate the server URL before any I/O: absolute, http or https.
pub(crate) fn validated_server_url(url: &str) -> Result<reqwest::Url, McpTransportError> {
    let parsed = reqwest::Url::parse(url).map_err(|_| {
        McpTransportError::invalid_config(format!("MCP server url is not a valid URL: {url}"))
    })?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(McpTransportError::invalid_config(format!(
            "MCP server url must use http or https, not {other}."
        ))),
    }
}

/// Drop header pairs with empty or whitespace-only keys; non-string values
/// sanitize to the empty string.
pub(crate) fn sanitize_headers(headers: &[(String, Value)]) -> Vec<(String, String)> {
    headers
        .iter()
        .filter(|(key, _)| !key.trim().is_empty())
        .map(|(key, value)| {
            let value = match value {
                Value::String(text) => text.clone(),
                _ => String::new(),
            };
            (key.clone(), value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn blank_url_counts_as_missing() {
        let config = McpServerConfig {
            id: "alpha".to_string(),
            url: Some("   ".to_string()),
            ..McpServerConfig::default()
        };
        assert!(config.url().is_none());
        assert_eq!(require_server_url(&config).unwrap_err().status(), 400);
    }

    #[test]
    fn url_validation_rejects_relative_and_odd_schemes() {
        assert_eq!(validated_server_url("not a url").unwrap_err().status(), 400);
        assert_eq!(
            validated_server_url("ftp://example.com").unwrap_err().status(),
            400
        );
        assert!(validated_server_url("https://example.com/mcp").is_ok());
        assert!(validated_server_url("http://127.0.0.1:9000").is_ok());
    }

    #[test]
    fn header_sanitization_drops_blank_keys_and_coerces_values() {
        let headers = vec![
            ("Authorization".to_string(), json!("Bearer token")),
            ("   ".to_string(), json!("dropped")),
            ("".to_string(), json!("dropped")),
            ("X-Version".to_string(), json!(7)),
        ];
        let sanitized = sanitize_headers(&headers);
        assert_eq!(
            sanitized,
            vec![
                ("Authorization".to_string(), "Bearer token".to_string()),
                ("X-Version".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn allow_list_filters_tools() {
        let config = McpServerConfig {
            id: "alpha".to_string(),
            enabled_tools: Some(vec!["a".to_string()]),
            ..McpServerConfig::default()
        };
        assert!(config.allows_tool("a"));
        assert!(!config.allows_tool("b"));

        let open = McpServerConfig {
            id: "beta".to_string(),
            ..McpServerConfig::default()
        };
        assert!(open.allows_tool("anything"));
    }
}
