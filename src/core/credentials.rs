//! Per-request credential resolution.
//!
//! Effective credentials are computed fresh for every chat request and never
//! persisted: a user-supplied key wins, the provider's designated environment
//! variable is the fallback, and resolution fails explicitly when neither is
//! available.

use crate::core::builtin_providers::BuiltinProvider;
use std::error::Error;
use std::fmt;

/// Request-scoped credentials for one provider.
#[derive(Clone, Debug)]
pub struct ProviderCredential {
    pub provider: String,
    pub api_key: String,
    pub base_url: Option<String>,
}

#[derive(Debug)]
pub enum ProviderError {
    MissingCredential { provider: String },
    UnsupportedProvider { provider: String },
    ClientConstruction { message: String },
}

impl ProviderError {
    /// HTTP-style status the request-handling layer should surface.
    pub fn status(&self) -> u16 {
        match self {
            ProviderError::MissingCredential { .. } => 400,
            ProviderError::UnsupportedProvider { .. } => 400,
            ProviderError::ClientConstruction { .. } => 500,
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::MissingCredential { provider } => write!(
                f,
                "No API key configured for provider '{provider}'. Supply one in settings or set the provider's key environment variable."
            ),
            ProviderError::UnsupportedProvider { provider } => {
                write!(f, "Unsupported provider: {provider}")
            }
            ProviderError::ClientConstruction { message } => {
                write!(f, "Failed to build HTTP client: {message}")
            }
        }
    }
}

impl Error for ProviderError {}

/// Resolve the effective API key for a provider.
///
/// A non-empty user-supplied key always wins over the environment; both are
/// trimmed before use.
pub fn resolve_api_key(
    provider: &BuiltinProvider,
    user_key: Option<&str>,
) -> Result<String, ProviderError> {
    if let Some(key) = user_key.map(str::trim).filter(|key| !key.is_empty()) {
        return Ok(key.to_string());
    }

    if let Some(key) = std::env::var(&provider.key_env)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
    {
        return Ok(key);
    }

    Err(ProviderError::MissingCredential {
        provider: provider.id.clone(),
    })
}

/// Resolve the effective base URL: trimmed user override if present, else the
/// provider's built-in default. There is no environment fallback for base
/// URLs.
pub fn resolve_base_url(provider: &BuiltinProvider, user_base_url: Option<&str>) -> String {
    user_base_url
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| provider.base_url.clone())
}

pub fn resolve_credentials(
    provider: &BuiltinProvider,
    user_key: Option<&str>,
    user_base_url: Option<&str>,
) -> Result<ProviderCredential, ProviderError> {
    let api_key = resolve_api_key(provider, user_key)?;
    let base_url = user_base_url
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string);
    Ok(ProviderCredential {
        provider: provider.id.clone(),
        api_key,
        base_url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::builtin_providers::find_builtin_provider;
    use crate::utils::test_utils::TestEnvVarGuard;

    fn openai() -> BuiltinProvider {
        find_builtin_provider("openai").expect("openai should be built in")
    }

    #[test]
    fn user_key_wins_over_environment() {
        let mut env_guard = TestEnvVarGuard::new();
        env_guard.set_var("OPENAI_API_KEY", "sk-env");

        let key = resolve_api_key(&openai(), Some("  sk-user  ")).expect("key should resolve");
        assert_eq!(key, "sk-user");
    }

    #[test]
    fn blank_user_key_falls_back_to_environment() {
        let mut env_guard = TestEnvVarGuard::new();
        env_guard.set_var("OPENAI_API_KEY", "  sk-env  ");

        let key = resolve_api_key(&openai(), Some("   ")).expect("key should resolve");
        assert_eq!(key, "sk-env");
    }

    #[test]
    fn missing_key_names_the_provider() {
        let mut env_guard = TestEnvVarGuard::new();
        env_guard.remove_var("OPENAI_API_KEY");

        let err = resolve_api_key(&openai(), None).expect_err("resolution should fail");
        assert_eq!(err.status(), 400);
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn base_url_override_wins_and_is_trimmed() {
        let provider = openai();
        assert_eq!(
            resolve_base_url(&provider, Some(" https://proxy.example/v1 ")),
            "https://proxy.example/v1"
        );
        assert_eq!(resolve_base_url(&provider, Some("   ")), provider.base_url);
        assert_eq!(resolve_base_url(&provider, None), provider.base_url);
    }
}
