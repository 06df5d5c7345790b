//! Network side of the controller.
//!
//! [`Network`] is the seam the strategies fetch through; [`HttpNetwork`] is
//! the reqwest-backed implementation used outside tests.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, header};
use shellcache_core::{Error, ResponseKind, ResponseSnapshot};

use crate::request::InterceptedRequest;

/// Anything that can perform a fetch for an intercepted request.
#[async_trait]
pub trait Network: Send + Sync {
    /// Perform the request. HTTP error statuses are responses, not errors;
    /// `Err` means the network could not produce a response at all.
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error>;
}

/// Configuration for the HTTP network adapter.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self { user_agent: "shellcache/0.1".to_string(), timeout: Duration::from_millis(20000), max_redirects: 5 }
    }
}

impl From<&shellcache_core::AppConfig> for NetworkConfig {
    fn from(config: &shellcache_core::AppConfig) -> Self {
        Self { user_agent: config.user_agent.clone(), timeout: config.timeout(), max_redirects: config.max_redirects }
    }
}

/// reqwest-backed network.
pub struct HttpNetwork {
    http: Client,
    config: NetworkConfig,
}

impl HttpNetwork {
    /// Create a new network adapter with the given configuration.
    pub fn new(config: NetworkConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }
}

/// Classify a response the way a same-origin fetch would see it.
///
/// A response that ends up on another origin (including through a redirect)
/// is opaque to the application.
fn classify(request: &InterceptedRequest, final_url: &url::Url) -> ResponseKind {
    if final_url.origin() == request.url.origin() { ResponseKind::Basic } else { ResponseKind::Opaque }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<ResponseSnapshot, Error> {
        let start = Instant::now();

        let mut builder = self.http.request(request.method.clone(), request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{}: {e}", request.url)))?;

        let status = response.status();
        let final_url = response.url().clone();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter(|(name, _)| **name != header::SET_COOKIE)
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {e}")))?;

        let kind = classify(request, &final_url);

        tracing::debug!(
            url = %request.url,
            final_url = %final_url,
            status = status.as_u16(),
            kind = %kind,
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "network fetch"
        );

        Ok(ResponseSnapshot {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            kind,
            headers,
            body,
        })
    }
}
