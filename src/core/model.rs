//! Model selection and the handle consumed by the streaming layer.

use crate::core::builtin_providers::{find_builtin_provider, BuiltinProvider};
use crate::core::credentials::{resolve_base_url, resolve_credentials, ProviderError};
use crate::core::http::HttpClientFactory;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::{construct_api_url, normalize_base_url};
use serde::Deserialize;
use std::collections::HashMap;

/// Which backend and which model name a request targets. Immutable once
/// constructed.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelSelection {
    pub id: String,
    pub provider: String,
}

/// A callable model binding: resolved credentials, endpoint, and HTTP client
/// for one request. Opaque to everything except the streaming layer.
#[derive(Clone, Debug)]
pub struct ModelHandle {
    model: String,
    provider: BuiltinProvider,
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

impl ModelHandle {
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn provider_id(&self) -> &str {
        &self.provider.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Authenticated POST builder for the provider's chat completions
    /// endpoint. The streaming layer supplies the body and drives the
    /// response.
    pub fn chat_request(&self) -> reqwest::RequestBuilder {
        let url = construct_api_url(&self.base_url, "chat/completions");
        let request = self
            .client
            .post(url)
            .header("Content-Type", "application/json");
        add_auth_headers(request, &self.provider, &self.api_key)
    }
}

fn lookup<'a>(map: Option<&'a HashMap<String, String>>, provider: &str) -> Option<&'a str> {
    map.and_then(|values| {
        values
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(provider))
            .map(|(_, value)| value.as_str())
    })
}

/// Resolve credentials for `selection` and bind them into a [`ModelHandle`].
///
/// Performs no network I/O. A provider missing from the built-in registry and
/// a missing API key are client errors; HTTP client construction failures are
/// server errors.
pub fn resolve_and_build_model(
    selection: &ModelSelection,
    user_keys: Option<&HashMap<String, String>>,
    user_base_urls: Option<&HashMap<String, String>>,
    http: &HttpClientFactory,
) -> Result<ModelHandle, ProviderError> {
    let provider = find_builtin_provider(&selection.provider).ok_or_else(|| {
        ProviderError::UnsupportedProvider {
            provider: selection.provider.clone(),
        }
    })?;

    let credential = resolve_credentials(
        &provider,
        lookup(user_keys, &provider.id),
        lookup(user_base_urls, &provider.id),
    )?;
    let base_url = normalize_base_url(&resolve_base_url(
        &provider,
        credential.base_url.as_deref(),
    ));

    let client = http
        .provider_client()
        .map_err(|message| ProviderError::ClientConstruction { message })?;

    Ok(ModelHandle {
        model: selection.id.clone(),
        provider,
        api_key: credential.api_key,
        base_url,
        client,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::TestEnvVarGuard;

    fn selection(provider: &str) -> ModelSelection {
        ModelSelection {
            id: "test-model".to_string(),
            provider: provider.to_string(),
        }
    }

    fn keys(provider: &str, key: &str) -> HashMap<String, String> {
        HashMap::from([(provider.to_string(), key.to_string())])
    }

    #[test]
    fn unsupported_provider_is_a_client_error() {
        let err = resolve_and_build_model(
            &selection("nonexistent"),
            None,
            None,
            &HttpClientFactory::no_proxy(),
        )
        .expect_err("unknown provider should fail");
        assert_eq!(err.status(), 400);
        assert!(err.to_string().contains("nonexistent"));
    }

    #[test]
    fn chat_request_targets_completions_endpoint_with_bearer_auth() {
        let mut env_guard = TestEnvVarGuard::new();
        env_guard.remove_var("OPENAI_API_KEY");

        let handle = resolve_and_build_model(
            &selection("openai"),
            Some(&keys("openai", "sk-user")),
            Some(&keys("openai", "https://example.test/v1/")),
            &HttpClientFactory::no_proxy(),
        )
        .expect("handle should build");

        assert_eq!(handle.model(), "test-model");
        assert_eq!(handle.base_url(), "https://example.test/v1");

        let request = handle.chat_request().build().expect("request should build");
        assert_eq!(
            request.url().as_str(),
            "https://example.test/v1/chat/completions"
        );
        assert_eq!(
            request
                .headers()
                .get("Authorization")
                .and_then(|value| value.to_str().ok()),
            Some("Bearer sk-user")
        );
    }

    #[test]
    fn anthropic_mode_uses_api_key_header() {
        let mut env_guard = TestEnvVarGuard::new();
        env_guard.remove_var("ANTHROPIC_API_KEY");

        let handle = resolve_and_build_model(
            &selection("anthropic"),
            Some(&keys("Anthropic", "sk-ant")),
            None,
            &HttpClientFactory::no_proxy(),
        )
        .expect("handle should build");

        let request = handle.chat_request().build().expect("request should build");
        assert_eq!(
            request
                .headers()
                .get("x-api-key")
                .and_then(|value| value.to_str().ok()),
            Some("sk-ant")
        );
        assert!(request.headers().get("anthropic-version").is_some());
        assert!(request.headers().get("Authorization").is_none());
    }
}
