use std::collections::BTreeMap;

use arangolayer_core::{
    backend::{HttpBackend, HttpBackendBuilder, HttpCall, TransportError},
    config::ConnectionConfig,
    envelope::{Method, RawResponse},
    error::{ArangoError, ArangoResult},
};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

const DEFAULT_USER_AGENT: &str = concat!("arangolayer/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct ReqwestBackend {
    client: Client,
}

impl ReqwestBackend {
    /// Wraps an existing client. The client must not carry a timeout of its
    /// own; the connection enforces per-call timeouts.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn builder() -> ReqwestBackendBuilder {
        ReqwestBackendBuilder::new()
    }

    fn method(method: Method) -> reqwest::Method {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Patch => reqwest::Method::PATCH,
            Method::Delete => reqwest::Method::DELETE,
            Method::Head => reqwest::Method::HEAD,
        }
    }
}

#[async_trait]
impl HttpBackend for ReqwestBackend {
    async fn send(&self, call: HttpCall) -> Result<RawResponse, TransportError> {
        let mut request = self.client.request(Self::method(call.method), &call.uri);

        for (name, value) in &call.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = call.body {
            request = request.body(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| match value.to_str() {
                Ok(value) => Some((name.as_str().to_ascii_lowercase(), value.to_string())),
                Err(_) => {
                    debug!(header = name.as_str(), "skipping non-ASCII response header");
                    None
                }
            })
            .collect();

        let body = response.bytes().await.map_err(|e| {
            warn!(uri = %call.uri, status, error = %e, "response body interrupted");
            TransportError::new(e.to_string())
        })?;

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}

/// Builds a [`ReqwestBackend`] from a connection configuration.
#[derive(Debug, Clone)]
pub struct ReqwestBackendBuilder {
    user_agent: String,
}

impl ReqwestBackendBuilder {
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for ReqwestBackendBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpBackendBuilder for ReqwestBackendBuilder {
    type Backend = ReqwestBackend;

    async fn build(self, config: &ConnectionConfig) -> ArangoResult<Self::Backend> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .user_agent(self.user_agent);

        if !config.use_web_proxy() {
            builder = builder.no_proxy();
        }

        let client = builder
            .build()
            .map_err(|e| ArangoError::Configuration(e.to_string()))?;

        Ok(ReqwestBackend::new(client))
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path},
    };

    use super::*;

    async fn backend() -> ReqwestBackend {
        let config = ConnectionConfig::builder()
            .endpoint("http://localhost:8529")
            .database("profiles")
            .username("root")
            .build()
            .unwrap();

        ReqwestBackend::builder().build(&config).await.unwrap()
    }

    #[tokio::test]
    async fn sends_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_db/profiles/_api/cursor"))
            .and(header("x-arango-trx-id", "12"))
            .and(body_json(serde_json::json!({"query": "RETURN 1"})))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("X-Arango-Queue-Time-Seconds", "0.0")
                    .set_body_json(serde_json::json!({"result": [1], "hasMore": false})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let call = HttpCall {
            method: Method::Post,
            uri: format!("{}/_db/profiles/_api/cursor", server.uri()),
            headers: BTreeMap::from([
                ("x-arango-trx-id".to_string(), "12".to_string()),
                ("content-type".to_string(), "application/json".to_string()),
            ]),
            body: Some(Bytes::from_static(br#"{"query":"RETURN 1"}"#)),
        };

        let raw = backend().await.send(call).await.unwrap();

        assert_eq!(raw.status, 201);
        assert_eq!(raw.header("x-arango-queue-time-seconds"), Some("0.0"));
        let body: serde_json::Value = serde_json::from_slice(&raw.body).unwrap();
        assert_eq!(body, serde_json::json!({"result": [1], "hasMore": false}));
    }

    #[tokio::test]
    async fn error_statuses_are_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).insert_header("x-arango-endpoint", "tcp://leader:8529"))
            .mount(&server)
            .await;

        let call = HttpCall {
            method: Method::Get,
            uri: format!("{}/_db/profiles/_api/version", server.uri()),
            headers: BTreeMap::new(),
            body: None,
        };

        let raw = backend().await.send(call).await.unwrap();

        assert_eq!(raw.status, 503);
        assert_eq!(raw.header("x-arango-endpoint"), Some("tcp://leader:8529"));
    }

    #[tokio::test]
    async fn unreachable_hosts_are_transport_errors() {
        let call = HttpCall {
            method: Method::Get,
            uri: "http://127.0.0.1:1/_db/profiles/_api/version".into(),
            headers: BTreeMap::new(),
            body: None,
        };

        assert!(backend().await.send(call).await.is_err());
    }
}
