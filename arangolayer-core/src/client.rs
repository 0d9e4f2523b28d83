//! The client: a connection wrapped in the retry policy, plus the handful of
//! server operations every application needs at startup.
//!
//! # Example
//!
//! ```ignore
//! let config: ConnectionConfig = "Endpoints=http://db1:8529,http://db2:8529;\
//!     Database=profiles;UserName=root;Password=secret;ActiveFailover=true"
//!     .parse()?;
//! let backend = ReqwestBackend::builder().build(&config).await?;
//! let client = ArangoClient::new(Connection::new(config, backend)?, ConnectionOptions::default());
//!
//! client.ensure_collections(&registry).await?;
//! let version = client.version().await?;
//! ```

use std::{fmt, sync::Arc, time::Duration};

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;
use tracing::{debug, info};

use crate::{
    backend::HttpBackend,
    connection::{CallOptions, Connection},
    cursor::{Cursor, CursorQuery},
    envelope::{Method, Request, Response},
    error::{ArangoError, ArangoResult, codes},
    model::{CollectionKind, ModelRegistry},
    retry::{ExceptionHook, RetryPolicy},
    transaction::{TransactionOptions, TransactionStatus},
};

/// Client-wide tunables.
#[derive(Clone, Default)]
pub struct ConnectionOptions {
    pub retry: RetryPolicy,
    /// Notified of the final error of every failed call.
    pub exception_hook: Option<ExceptionHook>,
    /// Default per-call timeout; overrides the connection string's.
    pub timeout: Option<Duration>,
}

impl ConnectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn exception_hook(mut self, hook: ExceptionHook) -> Self {
        self.exception_hook = Some(hook);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl fmt::Debug for ConnectionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionOptions")
            .field("retry", &self.retry)
            .field("exception_hook", &self.exception_hook.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// `result` of `GET /_api/version`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ServerVersion {
    pub server: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,
}

/// A cheaply cloneable handle to a connection and its retry settings.
///
/// # Type Parameters
///
/// * `B` - The HTTP backend implementation type
pub struct ArangoClient<B: HttpBackend> {
    connection: Arc<Connection<B>>,
    options: Arc<ConnectionOptions>,
}

impl<B: HttpBackend> Clone for ArangoClient<B> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            options: self.options.clone(),
        }
    }
}

impl<B: HttpBackend> fmt::Debug for ArangoClient<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArangoClient")
            .field("connection", &self.connection)
            .field("options", &self.options)
            .finish()
    }
}

impl<B: HttpBackend> ArangoClient<B> {
    pub fn new(connection: Connection<B>, options: ConnectionOptions) -> Self {
        Self {
            connection: Arc::new(connection),
            options: Arc::new(options),
        }
    }

    pub fn connection(&self) -> &Connection<B> {
        &self.connection
    }

    pub fn options(&self) -> &ConnectionOptions {
        &self.options
    }

    /// Sends `request` with default call options.
    ///
    /// # Errors
    ///
    /// See [`send_with`](Self::send_with).
    pub async fn send(&self, request: &Request) -> ArangoResult<Response> {
        self.send_with(request, CallOptions::default()).await
    }

    /// Sends `request`, retrying retryable outcomes under the client's
    /// [`RetryPolicy`] unless [`CallOptions::single_attempt`] is set.
    ///
    /// Server errors are returned as a [`Response`] carrying an exception,
    /// after the exception hook has seen them. Codes listed in
    /// [`CallOptions::handled_errors`] are kept from the hook.
    ///
    /// # Errors
    ///
    /// Returns configuration, exhausted-endpoint, transport, timeout and
    /// cancellation failures, where no response is available.
    pub async fn send_with(&self, request: &Request, options: CallOptions) -> ArangoResult<Response> {
        let cancel = options.cancellation.clone().unwrap_or_default();
        let options = CallOptions {
            timeout: options.timeout.or(self.options.timeout),
            cancellation: Some(cancel.clone()),
            ..options
        };

        let once;
        let policy = if options.single_attempt {
            once = RetryPolicy::disabled();
            &once
        } else {
            &self.options.retry
        };
        let hook = self.exception_hook(&options.handled_errors);

        policy
            .run(&cancel, hook.as_ref(), |attempt| {
                if attempt > 1 {
                    debug!(attempt, method = %request.method(), path = request.path(), "resending request");
                }
                self.connection.execute(request, &options)
            })
            .await
    }

    fn exception_hook(&self, handled: &[i64]) -> Option<ExceptionHook> {
        let hook = self.options.exception_hook.clone()?;
        if handled.is_empty() {
            return Some(hook);
        }

        let handled = handled.to_vec();
        let filtered: ExceptionHook = Arc::new(move |err: &ArangoError| match err.error_num() {
            Some(num) if handled.contains(&num) => Ok(()),
            _ => hook(err),
        });
        Some(filtered)
    }

    /// Sends `request` and decodes the `result` member of a successful body.
    ///
    /// # Errors
    ///
    /// Everything [`send`](Self::send) returns, plus [`ArangoError::Api`](crate::error::ArangoError::Api)
    /// for server errors and decoding failures.
    pub async fn send_for_result<T: DeserializeOwned>(&self, request: &Request) -> ArangoResult<T> {
        self.send(request).await?.result()
    }

    /// Reads the server version.
    ///
    /// # Errors
    ///
    /// See [`send_for_result`](Self::send_for_result).
    pub async fn version(&self) -> ArangoResult<ServerVersion> {
        self.send(&Request::builder(Method::Get, "_api/version").build())
            .await?
            .json()
    }

    /// Creates a collection, returning `false` if it already existed.
    ///
    /// # Errors
    ///
    /// Returns any server error other than a duplicate name.
    pub async fn create_collection(&self, name: &str, kind: CollectionKind) -> ArangoResult<bool> {
        let request = Request::builder(Method::Post, "_api/collection")
            .json_body(&json!({"name": name, "type": kind.type_code()}))?
            .build();

        let response = self
            .send_with(&request, CallOptions::new().handled_error(codes::DUPLICATE_NAME))
            .await?;

        if response
            .exception()
            .is_some_and(|e| e.error_num == codes::DUPLICATE_NAME)
        {
            debug!(collection = name, "collection already exists");
            return Ok(false);
        }

        response.error_for_status()?;
        info!(collection = name, ?kind, "created collection");
        Ok(true)
    }

    /// Creates every collection of `registry` that does not exist yet,
    /// returning the names actually created.
    ///
    /// # Errors
    ///
    /// Stops at the first collection that fails for a reason other than a
    /// duplicate name.
    pub async fn ensure_collections(&self, registry: &ModelRegistry) -> ArangoResult<Vec<String>> {
        let mut created = Vec::new();

        for spec in registry.collections() {
            if self.create_collection(&spec.name, spec.kind).await? {
                created.push(spec.name);
            }
        }

        Ok(created)
    }

    /// Begins a stream transaction.
    ///
    /// # Errors
    ///
    /// See [`send_for_result`](Self::send_for_result).
    pub async fn begin_transaction(&self, options: &TransactionOptions) -> ArangoResult<TransactionStatus> {
        let request = Request::builder(Method::Post, "_api/transaction/begin")
            .json_body(options)?
            .build();

        let mut response = self.send(&request).await?;
        let status: TransactionStatus = response.result()?;
        response.set_transaction_id(status.id.clone());

        debug!(
            transaction = response.debug_info().transaction_id.as_deref().unwrap_or(""),
            endpoint = %response.debug_info().endpoint,
            "transaction started"
        );

        Ok(status)
    }

    /// Commits stream transaction `id`.
    ///
    /// # Errors
    ///
    /// See [`send_for_result`](Self::send_for_result).
    pub async fn commit_transaction(&self, id: &str) -> ArangoResult<TransactionStatus> {
        self.finish_transaction(Method::Put, id).await
    }

    /// Aborts stream transaction `id`.
    ///
    /// # Errors
    ///
    /// See [`send_for_result`](Self::send_for_result).
    pub async fn abort_transaction(&self, id: &str) -> ArangoResult<TransactionStatus> {
        self.finish_transaction(Method::Delete, id).await
    }

    async fn finish_transaction(&self, method: Method, id: &str) -> ArangoResult<TransactionStatus> {
        let request = Request::builder(method, format!("_api/transaction/{id}"))
            .transaction(id)
            .build();

        let status: TransactionStatus = self.send_for_result(&request).await?;
        debug!(transaction = id, status = ?status.status, "transaction finished");
        Ok(status)
    }

    /// Opens a cursor over `query` and fetches its first batch.
    ///
    /// # Errors
    ///
    /// Returns the server error if the query is rejected, or a decoding error
    /// if the batch does not match `T`.
    pub async fn cursor<T: DeserializeOwned>(&self, query: CursorQuery) -> ArangoResult<Cursor<B, T>> {
        Cursor::open(self.clone(), query).await
    }
}
