//! Transport seam between the protocol core and the network.
//!
//! The core builds `(method, path, query, headers, body)` requests and
//! interprets `(status, headers, body)` replies. Connection handling, TLS
//! and signing live behind the [`Transport`] and [`Credentials`] traits;
//! [`HttpTransport`] is the reqwest-backed production implementation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client, Method};
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::error::{ClientError, Result};

/// A wire request. Paths are absolute (`/bucket/key`); the transport owns
/// endpoint resolution.
#[derive(Clone, Debug, Default)]
pub struct WireRequest {
    pub method: String,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: HashMap<String, String>,
    pub body: Option<Bytes>,
}

impl WireRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// A wire reply.
#[derive(Clone, Debug, Default)]
pub struct WireResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl WireResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Executes a single wire request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WireRequest) -> Result<WireResponse>;
}

/// Request signer, invoked by the transport before dispatch. Opaque to the
/// protocol core.
pub trait Credentials: Send + Sync {
    fn sign(&self, request: &mut WireRequest);
}

/// Bearer-token credentials.
pub struct TokenCredentials {
    token: String,
}

impl TokenCredentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl Credentials for TokenCredentials {
    fn sign(&self, request: &mut WireRequest) {
        request
            .headers
            .insert("Authorization".to_string(), format!("Bearer {}", self.token));
    }
}

/// No-op signer for anonymous access and tests.
pub struct AnonymousCredentials;

impl Credentials for AnonymousCredentials {
    fn sign(&self, _request: &mut WireRequest) {}
}

/// reqwest-backed transport.
pub struct HttpTransport {
    endpoint: Url,
    http: Client,
    credentials: Arc<dyn Credentials>,
}

impl HttpTransport {
    pub fn new(config: &Config, credentials: Arc<dyn Credentials>) -> Result<Self> {
        let endpoint = Url::parse(&config.endpoint)
            .map_err(|e| ClientError::Config(format!("invalid endpoint: {}", e)))?;

        let mut headers = header::HeaderMap::new();
        let user_agent = config
            .user_agent
            .parse()
            .map_err(|_| ClientError::Config("invalid user agent".to_string()))?;
        headers.insert(header::USER_AGENT, user_agent);

        let http = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(ClientError::Http)?;

        Ok(Self {
            endpoint,
            http,
            credentials,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, mut request: WireRequest) -> Result<WireResponse> {
        self.credentials.sign(&mut request);

        let method = Method::from_bytes(request.method.as_bytes())
            .map_err(|_| ClientError::Config(format!("unknown method: {}", request.method)))?;
        let url = self
            .endpoint
            .join(&request.path)
            .map_err(|e| ClientError::Config(format!("invalid request path: {}", e)))?;
        debug!(method = %request.method, url = %url, "sending request");

        let mut builder = self.http.request(method, url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        // Header names come back lowercased; the decode tables rely on that.
        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                headers.insert(name.as_str().to_string(), value.to_string());
            }
        }
        let body = response.bytes().await?;

        Ok(WireResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_credentials_sign_authorization_header() {
        let mut request = WireRequest::new("GET", "/bucket/key");
        TokenCredentials::new("secret").sign(&mut request);
        assert_eq!(
            request.headers.get("Authorization").map(String::as_str),
            Some("Bearer secret")
        );
    }

    #[test]
    fn test_request_builder_helpers() {
        let request = WireRequest::new("PUT", "/b/k")
            .with_query("partNumber", "2")
            .with_header("Content-Type", "application/xml")
            .with_body("payload");
        assert_eq!(request.query, vec![("partNumber".into(), "2".into())]);
        assert_eq!(request.body.as_deref(), Some(b"payload".as_slice()));
    }
}
