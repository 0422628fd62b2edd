//! Process-wide HTTP client construction.
//!
//! Proxy settings are snapshotted from the environment exactly once and the
//! resulting factory is passed explicitly into both the provider path and the
//! MCP transports; nothing below this module reads proxy state on its own.

use std::sync::OnceLock;
use std::time::Duration;

const HTTP_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const HTTP_REQUEST_TIMEOUT_SECONDS: u64 = 60;
const HTTP_POOL_IDLE_TIMEOUT_SECONDS: u64 = 90;
const HTTP_POOL_MAX_IDLE_PER_HOST: usize = 8;

#[derive(Clone, Debug, Default)]
struct ProxySettings {
    all_proxy: Option<String>,
    https_proxy: Option<String>,
    http_proxy: Option<String>,
    no_proxy: Option<String>,
}

fn env_proxy_value(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn proxy_settings_from_env() -> &'static ProxySettings {
    static SETTINGS: OnceLock<ProxySettings> = OnceLock::new();
    SETTINGS.get_or_init(|| ProxySettings {
        all_proxy: env_proxy_value(&["ALL_PROXY", "all_proxy"]),
        https_proxy: env_proxy_value(&["HTTPS_PROXY", "https_proxy"]),
        http_proxy: env_proxy_value(&["HTTP_PROXY", "http_proxy"]),
        no_proxy: env_proxy_value(&["NO_PROXY", "no_proxy"]),
    })
}

/// Builds the `reqwest` clients used by the provider path and the MCP
/// transports.
#[derive(Clone, Debug)]
pub struct HttpClientFactory {
    proxy: Option<ProxySettings>,
}

impl HttpClientFactory {
    /// Factory configured from the process environment. Safe to call more
    /// than once; the environment is read on the first call only.
    pub fn from_env() -> Self {
        Self {
            proxy: Some(proxy_settings_from_env().clone()),
        }
    }

    /// Factory that ignores any proxy configuration entirely.
    pub fn no_proxy() -> Self {
        Self { proxy: None }
    }

    /// Client for provider chat requests. No request timeout: streaming
    /// completions routinely outlive any fixed deadline.
    pub fn provider_client(&self) -> Result<reqwest::Client, String> {
        self.apply_proxies(reqwest::Client::builder())?
            .build()
            .map_err(|err| err.to_string())
    }

    /// Client for MCP transports, with bounded connect/request times and a
    /// small idle pool.
    pub fn mcp_client(&self) -> Result<reqwest::Client, String> {
        self.apply_proxies(reqwest::Client::builder())?
            .connect_timeout(Duration::from_secs(HTTP_CONNECT_TIMEOUT_SECONDS))
            .timeout(Duration::from_secs(HTTP_REQUEST_TIMEOUT_SECONDS))
            .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECONDS))
            .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE_PER_HOST)
            .build()
            .map_err(|err| err.to_string())
    }

    fn apply_proxies(
        &self,
        builder: reqwest::ClientBuilder,
    ) -> Result<reqwest::ClientBuilder, String> {
        let Some(settings) = &self.proxy else {
            return Ok(builder.no_proxy());
        };

        let no_proxy = settings
            .no_proxy
            .as_deref()
            .and_then(reqwest::NoProxy::from_string);

        let mut proxies = Vec::new();
        if let Some(url) = &settings.all_proxy {
            proxies.push(reqwest::Proxy::all(url).map_err(|err| err.to_string())?);
        } else {
            if let Some(url) = &settings.https_proxy {
                proxies.push(reqwest::Proxy::https(url).map_err(|err| err.to_string())?);
            }
            if let Some(url) = &settings.http_proxy {
                proxies.push(reqwest::Proxy::http(url).map_err(|err| err.to_string())?);
            }
        }

        let mut builder = builder;
        for proxy in proxies {
            builder = builder.proxy(proxy.no_proxy(no_proxy.clone()));
        }
        Ok(builder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_proxy_factory_builds_clients() {
        let factory = HttpClientFactory::no_proxy();
        assert!(factory.provider_client().is_ok());
        assert!(factory.mcp_client().is_ok());
    }

    #[test]
    fn env_factory_is_idempotent() {
        let first = HttpClientFactory::from_env();
        let second = HttpClientFactory::from_env();
        assert!(first.mcp_client().is_ok());
        assert!(second.mcp_client().is_ok());
    }
}
