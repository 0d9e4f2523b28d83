//! Connection transport: one logical call against the endpoint pool.
//!
//! [`Connection::execute`] resolves the target host, applies authentication
//! and per-call headers, enforces the per-call timeout and cancellation, and
//! handles the two cluster conditions the client recovers from on its own:
//!
//! - **unreachable host** (active failover only): the host is rotated to the
//!   back of the pool and the next candidate is tried, at most once per
//!   endpoint, after which [`ArangoError::EndpointsExhausted`] is returned;
//! - **not-leader redirect**: a `503` carrying errorNum 1496 and an
//!   `x-arango-endpoint` header makes the named leader the sticky host and the
//!   same request is re-issued against it once.

use std::{collections::BTreeMap, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::Utc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    backend::{HttpBackend, HttpCall},
    config::ConnectionConfig,
    endpoint::{EndpointAddress, EndpointPool},
    envelope::{
        DIRTY_READ_HEADER, DebugInfo, LEADER_ENDPOINT_HEADER, Request, Response,
        TRANSACTION_HEADER,
    },
    error::{ArangoError, ArangoResult, codes},
};

/// Per-call settings.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Overrides the connection's timeout for this call.
    pub timeout: Option<Duration>,
    /// Lets a follower answer the call.
    pub dirty_read: bool,
    /// Aborts the call when cancelled.
    pub cancellation: Option<CancellationToken>,
    /// Sends the call once whatever the retry policy says; for requests the
    /// server does not treat as idempotent.
    pub single_attempt: bool,
    /// `errorNum`s the caller handles itself; they are not reported to the
    /// exception hook.
    pub handled_errors: Vec<i64>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn dirty_read(mut self, enabled: bool) -> Self {
        self.dirty_read = enabled;
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn single_attempt(mut self, enabled: bool) -> Self {
        self.single_attempt = enabled;
        self
    }

    pub fn handled_error(mut self, error_num: i64) -> Self {
        self.handled_errors.push(error_num);
        self
    }
}

enum AttemptError {
    Failed(ArangoError),
    Cancelled,
}

/// Executes envelopes against a pool of endpoints through an [`HttpBackend`].
#[derive(Debug)]
pub struct Connection<B: HttpBackend> {
    config: ConnectionConfig,
    backend: B,
    pool: EndpointPool,
    authorization: String,
}

impl<B: HttpBackend> Connection<B> {
    /// Creates a connection; the pool is seeded from the configured endpoints.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Configuration`] if the configuration holds no
    /// endpoint.
    pub fn new(config: ConnectionConfig, backend: B) -> ArangoResult<Self> {
        let pool = EndpointPool::new(config.endpoints().to_vec())?;
        let authorization = format!(
            "Basic {}",
            STANDARD.encode(format!("{}:{}", config.username(), config.password()))
        );

        Ok(Self {
            config,
            backend,
            pool,
            authorization,
        })
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// The endpoint pool shared by every call of this connection.
    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Executes `request` once, following failover and leader redirects.
    ///
    /// Server errors come back as a [`Response`] with an exception set; only
    /// failures without any response are returned as `Err`.
    ///
    /// # Errors
    ///
    /// - [`ArangoError::Cancelled`] when the cancellation token fires;
    /// - [`ArangoError::Transport`] / [`ArangoError::Timeout`] when the host
    ///   did not answer and active failover is off;
    /// - [`ArangoError::EndpointsExhausted`] when every endpoint failed.
    pub async fn execute(&self, request: &Request, options: &CallOptions) -> ArangoResult<Response> {
        let cancel = options.cancellation.clone().unwrap_or_default();
        let timeout = options.timeout.or(self.config.timeout());
        let mut tried: Vec<String> = Vec::new();
        let mut members_tried = 0;
        let mut redirected = false;

        loop {
            if cancel.is_cancelled() {
                return Err(ArangoError::Cancelled);
            }

            let host = self.pool.next().await;

            match self.attempt(&host, request, options, timeout, &cancel).await {
                Ok(response) => {
                    if !redirected {
                        if let Some(leader) = self.leader_redirect(&response) {
                            self.pool.redirect(leader).await;
                            redirected = true;
                            continue;
                        }
                    }

                    return Ok(response);
                }
                Err(AttemptError::Cancelled) => return Err(ArangoError::Cancelled),
                Err(AttemptError::Failed(err)) => {
                    if !self.config.active_failover() {
                        return Err(err);
                    }

                    warn!(
                        connection = self.config.alias().unwrap_or_default(),
                        endpoint = %host,
                        error = %err,
                        "endpoint failed"
                    );
                    tried.push(host.to_string());
                    self.pool.rotate(&host).await;

                    // A redirect target outside the pool fails at most once
                    // per call and does not use up a configured endpoint.
                    if self.pool.contains(&host) {
                        members_tried += 1;
                    }
                    if members_tried >= self.pool.len() {
                        return Err(ArangoError::EndpointsExhausted { tried });
                    }
                }
            }
        }
    }

    async fn attempt(
        &self,
        host: &EndpointAddress,
        request: &Request,
        options: &CallOptions,
        timeout: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<Response, AttemptError> {
        let uri = request.uri(host, self.config.database());
        let call = HttpCall {
            method: request.method(),
            uri: uri.clone(),
            headers: self.headers(request, options),
            body: request.body().cloned(),
        };

        let started_at = Utc::now();
        let start = Instant::now();

        let exchange = async {
            let sent = self.backend.send(call);
            let result = match timeout {
                Some(limit) => match tokio::time::timeout(limit, sent).await {
                    Ok(result) => result,
                    Err(_) => {
                        return Err(ArangoError::Timeout {
                            endpoint: host.to_string(),
                            millis: limit.as_millis(),
                        });
                    }
                },
                None => sent.await,
            };

            result.map_err(|e| ArangoError::Transport {
                endpoint: host.to_string(),
                message: e.message,
            })
        };

        let raw = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(AttemptError::Cancelled),
            result = exchange => result.map_err(AttemptError::Failed)?,
        };

        let debug_info = DebugInfo {
            endpoint: host.to_string(),
            request_uri: uri,
            method: request.method(),
            request_body: if self.config.debug() {
                request
                    .body()
                    .map(|b| String::from_utf8_lossy(b).into_owned())
            } else {
                None
            },
            started_at,
            elapsed: start.elapsed(),
            transaction_id: request.transaction_id().map(str::to_string),
        };

        let response = Response::from_raw(raw, debug_info);

        if self.config.debug() {
            let info = response.debug_info();
            debug!(
                connection = self.config.alias().unwrap_or_default(),
                method = %info.method,
                uri = %info.request_uri,
                body = info.request_body.as_deref().unwrap_or(""),
                status = response.status(),
                elapsed_ms = info.elapsed.as_millis() as u64,
                transaction = info.transaction_id.as_deref().unwrap_or(""),
                "request completed"
            );
        }

        Ok(response)
    }

    /// Builds the header set for one attempt; nothing carries over between
    /// attempts.
    fn headers(&self, request: &Request, options: &CallOptions) -> BTreeMap<String, String> {
        let mut headers = request.headers().clone();

        headers.insert("authorization".into(), self.authorization.clone());
        headers.insert("accept".into(), "application/json".into());

        if request.body().is_some() {
            headers.insert("content-type".into(), "application/json".into());
        }
        if let Some(transaction_id) = request.transaction_id() {
            headers.insert(TRANSACTION_HEADER.into(), transaction_id.to_string());
        }
        if options.dirty_read {
            headers.insert(DIRTY_READ_HEADER.into(), "true".into());
        }

        headers
    }

    fn leader_redirect(&self, response: &Response) -> Option<EndpointAddress> {
        if response.status() != codes::HTTP_SERVICE_UNAVAILABLE {
            return None;
        }

        let api = response.exception()?;
        if !api.is_not_leader() {
            return None;
        }

        let Some(header) = response.header(LEADER_ENDPOINT_HEADER) else {
            warn!(
                endpoint = %response.debug_info().endpoint,
                "not-leader response without leader endpoint header"
            );
            return None;
        };

        match EndpointAddress::parse(header) {
            Ok(leader) => Some(leader),
            Err(e) => {
                warn!(header, error = %e, "unusable leader endpoint header");
                None
            }
        }
    }
}
