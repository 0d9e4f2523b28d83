//! Request and response envelopes exchanged with the server.
//!
//! A [`Request`] is an immutable description of one logical call: method,
//! path relative to the database, query parameters, headers, an optional JSON
//! body and an optional stream-transaction id. A [`Response`] is the
//! normalized result of one dispatch attempt.

use std::{collections::BTreeMap, fmt, time::Duration};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::warn;
use url::form_urlencoded;

use crate::{
    endpoint::EndpointAddress,
    error::{ApiError, ArangoError, ArangoResult},
};

/// HTTP header carrying the stream-transaction id.
pub const TRANSACTION_HEADER: &str = "x-arango-trx-id";
/// HTTP header allowing a follower to answer a read.
pub const DIRTY_READ_HEADER: &str = "x-arango-allow-dirty-read";
/// HTTP header naming the current leader on a not-leader response.
pub const LEADER_ENDPOINT_HEADER: &str = "x-arango-endpoint";

/// HTTP methods used by the ArangoDB HTTP API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outgoing call, immutable once built.
///
/// # Example
///
/// ```ignore
/// let request = Request::builder(Method::Post, "_api/document/users")
///     .query("returnNew", "true")
///     .json_body(&user)?
///     .build();
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    method: Method,
    path: String,
    query: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
    body: Option<Bytes>,
    transaction_id: Option<String>,
}

impl Request {
    /// Starts building a request for `path`, relative to `_db/{database}/`.
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder::new(method, path)
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Query parameters, ordered by key.
    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    /// Relative path plus the encoded query string, if any.
    pub fn path_and_query(&self) -> String {
        if self.query.is_empty() {
            return self.path.clone();
        }

        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish();

        format!("{}?{}", self.path, encoded)
    }

    /// Builds the absolute URI `{host}_db/{database}/{path}[?query]`.
    pub fn uri(&self, host: &EndpointAddress, database: &str) -> String {
        format!("{}_db/{}/{}", host, database, self.path_and_query())
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    request: Request,
}

impl RequestBuilder {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        let path = path.into();

        Self {
            request: Request {
                method,
                path: path.trim_start_matches('/').to_string(),
                query: BTreeMap::new(),
                headers: BTreeMap::new(),
                body: None,
                transaction_id: None,
            },
        }
    }

    /// Sets a query parameter, replacing an earlier value for the same key.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.request.query.insert(key.into(), value.to_string());
        self
    }

    /// Sets a header; names are stored lowercase.
    pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.request
            .headers
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
        self
    }

    /// Serializes `body` as the JSON request body.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Serialization`] if `body` cannot be encoded.
    pub fn json_body<T: Serialize + ?Sized>(mut self, body: &T) -> ArangoResult<Self> {
        let encoded =
            serde_json::to_vec(body).map_err(|e| ArangoError::Serialization(e.to_string()))?;
        self.request.body = Some(Bytes::from(encoded));
        Ok(self)
    }

    /// Uses already encoded bytes as the body.
    pub fn raw_body(mut self, body: impl Into<Bytes>) -> Self {
        self.request.body = Some(body.into());
        self
    }

    /// Runs the request inside the given stream transaction.
    pub fn transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.request.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn build(self) -> Request {
        self.request
    }
}

/// Diagnostics recorded for one dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct DebugInfo {
    pub endpoint: String,
    pub request_uri: String,
    pub method: Method,
    /// The request body as text, when the connection runs in debug mode.
    pub request_body: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub transaction_id: Option<String>,
}

/// Raw material a backend hands back for one HTTP exchange.
#[derive(Debug, Clone, Default)]
pub struct RawResponse {
    pub status: u16,
    /// Header names are lowercase.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

#[derive(Deserialize)]
struct ErrorFlag {
    #[serde(default)]
    error: bool,
}

/// The normalized result of one dispatch attempt.
///
/// Server-side failures are represented by [`exception`](Self::exception)
/// rather than by an `Err`, so callers keep access to status and body.
#[derive(Debug, Clone)]
pub struct Response {
    status: u16,
    success: bool,
    body: Bytes,
    headers: BTreeMap<String, String>,
    exception: Option<ApiError>,
    info: DebugInfo,
}

impl Response {
    /// Normalizes a raw exchange.
    ///
    /// A response is successful when the status is 2xx and the body does not
    /// carry `"error": true`. Error bodies that cannot be decoded degrade to a
    /// generic [`ApiError`] with `errorNum` 0.
    pub fn from_raw(raw: RawResponse, info: DebugInfo) -> Self {
        let status_ok = (200..300).contains(&raw.status);
        let flagged = !raw.body.is_empty()
            && serde_json::from_slice::<ErrorFlag>(&raw.body)
                .map(|flag| flag.error)
                .unwrap_or(false);

        let exception = if status_ok && !flagged {
            None
        } else {
            Some(Self::parse_error(raw.status, &raw.body, &info))
        };

        Self {
            status: raw.status,
            success: exception.is_none(),
            body: raw.body,
            headers: raw.headers,
            exception,
            info,
        }
    }

    fn parse_error(status: u16, body: &Bytes, info: &DebugInfo) -> ApiError {
        match serde_json::from_slice::<ApiError>(body) {
            Ok(mut api) => {
                if api.code == 0 {
                    api.code = status;
                }
                api
            }
            Err(e) => {
                warn!(
                    uri = %info.request_uri,
                    status,
                    error = %e,
                    "could not decode error body"
                );
                ApiError::new(
                    0,
                    status,
                    format!("HTTP {status}: {}", String::from_utf8_lossy(body)),
                )
            }
        }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn exception(&self) -> Option<&ApiError> {
        self.exception.as_ref()
    }

    pub fn debug_info(&self) -> &DebugInfo {
        &self.info
    }

    /// Back-fills the transaction id, for correlating a response with the
    /// transaction it started.
    pub fn set_transaction_id(&mut self, transaction_id: impl Into<String>) {
        self.info.transaction_id = Some(transaction_id.into());
    }

    /// Converts into `Err` if the server reported an error.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Api`] with the server's error.
    pub fn error_for_status(self) -> ArangoResult<Self> {
        match self.exception {
            Some(api) => Err(ArangoError::Api(api)),
            None => Ok(self),
        }
    }

    /// Decodes the whole body.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Api`] for error responses and
    /// [`ArangoError::Deserialization`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> ArangoResult<T> {
        if let Some(api) = &self.exception {
            return Err(ArangoError::Api(api.clone()));
        }

        serde_json::from_slice(&self.body).map_err(|e| {
            warn!(uri = %self.info.request_uri, error = %e, "could not decode response body");
            ArangoError::Deserialization(e.to_string())
        })
    }

    /// Decodes the body as a [`ResponseEnvelope`].
    ///
    /// # Errors
    ///
    /// Same as [`json`](Self::json).
    pub fn envelope<T: DeserializeOwned>(&self) -> ArangoResult<ResponseEnvelope<T>> {
        self.json()
    }

    /// Decodes the `result` member of the body.
    ///
    /// # Errors
    ///
    /// Same as [`json`](Self::json); a missing `result` is a deserialization
    /// error.
    pub fn result<T: DeserializeOwned>(&self) -> ArangoResult<T> {
        self.envelope::<T>()?.result.ok_or_else(|| {
            ArangoError::Deserialization("response body has no 'result' member".into())
        })
    }
}

/// The JSON shape shared by most ArangoDB responses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResponseEnvelope<T> {
    #[serde(default)]
    pub error: bool,
    #[serde(rename = "errorNum", default, skip_serializing_if = "Option::is_none")]
    pub error_num: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
    #[serde(rename = "errorMessage", default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default = "Option::default", skip_serializing_if = "Option::is_none")]
    pub result: Option<T>,
    /// Cursor endpoints: more batches are available.
    #[serde(rename = "hasMore", default)]
    pub has_more: bool,
    /// Cursor endpoints: handle for follow-up calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Cursor endpoints: total count, if requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}
