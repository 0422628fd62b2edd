//! Authentication utilities for API requests
//!
//! This module provides utilities for adding provider-specific authentication
//! headers to HTTP requests.

use crate::core::builtin_providers::BuiltinProvider;

/// Add provider-specific authentication headers to an HTTP request
///
/// Anthropic-mode providers use an `x-api-key` header plus
/// `anthropic-version`; all other providers use a standard
/// `Authorization: Bearer` header.
pub fn add_auth_headers(
    request: reqwest::RequestBuilder,
    provider: &BuiltinProvider,
    api_key: &str,
) -> reqwest::RequestBuilder {
    if provider.is_anthropic_mode() {
        return request
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01");
    }

    request.header("Authorization", format!("Bearer {api_key}"))
}
