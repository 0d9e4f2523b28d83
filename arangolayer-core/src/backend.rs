//! HTTP backend abstraction.
//!
//! The connection layer decides *where* and *what* to send; an [`HttpBackend`]
//! only performs one HTTP exchange against an absolute URI. Keeping the seam
//! this narrow lets the failover and retry logic run against any HTTP client,
//! including scripted ones in tests.
//!
//! # Traits
//!
//! - [`HttpBackend`]: executes a single [`HttpCall`]
//! - [`HttpBackendBuilder`]: factory creating a backend from a [`ConnectionConfig`]

use std::{collections::BTreeMap, fmt::Debug};

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::{
    config::ConnectionConfig,
    envelope::{Method, RawResponse},
    error::ArangoResult,
};

/// One fully resolved HTTP exchange.
#[derive(Debug, Clone)]
pub struct HttpCall {
    pub method: Method,
    pub uri: String,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
}

/// A failure where no HTTP response was received at all.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Abstract interface for HTTP clients.
///
/// # Thread Safety
///
/// Implementations are shared by every call made through a connection and
/// must support concurrent use; connection pooling is the implementation's
/// concern.
///
/// # Timeouts
///
/// Implementations must not apply a timeout of their own. The connection
/// enforces the per-call timeout, which would otherwise be shadowed.
#[async_trait]
pub trait HttpBackend: Send + Sync + Debug {
    /// Performs the exchange.
    ///
    /// Any HTTP status, including 4xx and 5xx, is a successful exchange and
    /// must be returned as a [`RawResponse`]. Only failures that produced no
    /// response (refused connection, reset, DNS, TLS) are errors.
    ///
    /// # Arguments
    ///
    /// * `call` - The resolved method, absolute URI, lowercase headers and body
    ///
    /// # Returns
    ///
    /// The status, lowercase headers and raw body of the answer, or a
    /// [`TransportError`] when nothing was received.
    async fn send(&self, call: HttpCall) -> Result<RawResponse, TransportError>;
}

#[async_trait]
impl<B> HttpBackend for std::sync::Arc<B>
where
    B: HttpBackend + ?Sized,
{
    async fn send(&self, call: HttpCall) -> Result<RawResponse, TransportError> {
        (**self).send(call).await
    }
}

#[async_trait]
impl<B> HttpBackend for &B
where
    B: HttpBackend + ?Sized,
{
    async fn send(&self, call: HttpCall) -> Result<RawResponse, TransportError> {
        (**self).send(call).await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait HttpBackendBuilder: Send + Sync {
    /// The type of backend this builder creates.
    type Backend: HttpBackend;

    /// Creates a backend for `config`.
    ///
    /// # Arguments
    ///
    /// * `config` - The parsed connection settings; backends honour
    ///   [`use_web_proxy`](ConnectionConfig::use_web_proxy). Timeouts and
    ///   debug logging are applied by the connection, not the backend.
    ///
    /// # Returns
    ///
    /// A backend ready to be handed to
    /// [`Connection::new`](crate::connection::Connection::new).
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Configuration`](crate::error::ArangoError::Configuration)
    /// if the underlying client cannot be created.
    async fn build(self, config: &ConnectionConfig) -> ArangoResult<Self::Backend>;
}
