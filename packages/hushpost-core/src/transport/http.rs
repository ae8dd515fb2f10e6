//! HTTP requests through the local SOCKS proxy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Proxy};

use crate::config::TransportConfig;
use crate::error::{Error, Result};
use crate::logging::{RedactedBytes, RedactedUrl};

/// Header sent on every request so no origin leaks through redirects
pub const REFERRER_POLICY: (&str, &str) = ("Referrer-Policy", "no-referrer");

/// An outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method, e.g. `POST`
    pub method: String,
    /// Absolute URL
    pub url: String,
    /// Request body
    pub body: Option<Vec<u8>>,
    /// Extra headers
    pub headers: Vec<(String, String)>,
}

/// Sends requests over the anonymized circuit
#[async_trait]
pub trait HttpDispatcher: Send + Sync {
    /// Send a request and return the response body
    async fn send(&self, request: HttpRequest) -> Result<Vec<u8>>;
}

/// reqwest client pinned to the daemon's SOCKS port
pub struct SocksHttpClient {
    client: reqwest::Client,
}

impl SocksHttpClient {
    /// Build a client for the configured proxy
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let proxy = Proxy::all(config.socks_proxy_url())
            .map_err(|e| Error::InvalidConfig(format!("proxy: {}", e)))?;

        let mut defaults = HeaderMap::new();
        defaults.insert(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static(REFERRER_POLICY.1),
        );

        let client = reqwest::Client::builder()
            .proxy(proxy)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .default_headers(defaults)
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpDispatcher for SocksHttpClient {
    async fn send(&self, request: HttpRequest) -> Result<Vec<u8>> {
        let url = reqwest::Url::parse(&request.url).map_err(|e| Error::InvalidUrl(e.to_string()))?;
        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| Error::InvalidInput(format!("HTTP method {:?}", request.method)))?;

        let mut builder = self.client.request(method, url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.bytes().await?.to_vec();

        tracing::debug!(
            url = %RedactedUrl(&request.url),
            status = status.as_u16(),
            body = %RedactedBytes(&body),
            "Response received"
        );

        if !status.is_success() {
            return Err(Error::Http(format!("server returned {}", status)));
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(url: &str) -> HttpRequest {
        HttpRequest {
            method: "POST".into(),
            url: url.into(),
            body: Some(vec![1, 2, 3]),
            headers: vec![],
        }
    }

    #[test]
    fn test_client_builds_for_default_config() {
        assert!(SocksHttpClient::new(&TransportConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_invalid_url() {
        let client = SocksHttpClient::new(&TransportConfig::default()).unwrap();
        let err = client.send(request("not a url")).await.unwrap_err();
        assert!(matches!(err, Error::InvalidUrl(_)));
    }

    #[tokio::test]
    async fn test_invalid_method() {
        let client = SocksHttpClient::new(&TransportConfig::default()).unwrap();
        let mut req = request("http://example.onion/api/login");
        req.method = "BAD METHOD".into();
        let err = client.send(req).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
