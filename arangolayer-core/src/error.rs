//! Error types and result types for database access operations.
//!
//! Every fallible operation in this crate returns [`ArangoResult<T>`]. The
//! variants of [`ArangoError`] follow the failure taxonomy of the client:
//! configuration problems are fatal at construction, transport failures and a
//! subset of server errors are retryable, everything else is terminal.

use serde::{Deserialize, Serialize};
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Well-known ArangoDB `errorNum` values the client reacts to.
pub mod codes {
    /// Lock acquisition timed out.
    pub const LOCK_TIMEOUT: i64 = 18;
    /// The server is shutting down.
    pub const SHUTTING_DOWN: i64 = 21;
    /// Write-write conflict between concurrent transactions.
    pub const CONFLICT: i64 = 1200;
    /// A collection or view with the same name already exists.
    pub const DUPLICATE_NAME: i64 = 1207;
    /// A cluster-internal request timed out.
    pub const CLUSTER_TIMEOUT: i64 = 1447;
    /// A cluster-internal connection was lost.
    pub const CLUSTER_CONNECTION_LOST: i64 = 1457;
    /// A cluster backend (DB-Server) is unavailable.
    pub const CLUSTER_BACKEND_UNAVAILABLE: i64 = 1478;
    /// Leadership is being challenged; the request may succeed later.
    pub const LEADERSHIP_CHALLENGE_ONGOING: i64 = 1495;
    /// The contacted server is not the current leader.
    pub const CLUSTER_NOT_LEADER: i64 = 1496;
    /// The cursor id is unknown or the cursor expired.
    pub const CURSOR_NOT_FOUND: i64 = 1600;

    /// HTTP status used by ArangoDB for unavailable or non-leading servers.
    pub const HTTP_SERVICE_UNAVAILABLE: u16 = 503;

    pub(crate) const RETRYABLE: [i64; 8] = [
        LOCK_TIMEOUT,
        SHUTTING_DOWN,
        CONFLICT,
        CLUSTER_TIMEOUT,
        CLUSTER_CONNECTION_LOST,
        CLUSTER_BACKEND_UNAVAILABLE,
        LEADERSHIP_CHALLENGE_ONGOING,
        CLUSTER_NOT_LEADER,
    ];
}

/// An error reported by the server inside a response body.
///
/// ArangoDB answers failed operations with a JSON body of the shape
/// `{"error": true, "errorNum": 1202, "code": 404, "errorMessage": "..."}`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Error)]
#[error("server error {error_num} (HTTP {code}): {message}")]
pub struct ApiError {
    /// The server's numeric error code.
    #[serde(rename = "errorNum", default)]
    pub error_num: i64,
    /// The HTTP status code echoed in the body.
    #[serde(default)]
    pub code: u16,
    /// Human readable description.
    #[serde(rename = "errorMessage", default)]
    pub message: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(error_num: i64, code: u16, message: impl Into<String>) -> Self {
        Self {
            error_num,
            code,
            message: message.into(),
        }
    }

    /// Whether a later attempt of the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        self.code == codes::HTTP_SERVICE_UNAVAILABLE || codes::RETRYABLE.contains(&self.error_num)
    }

    /// Whether this error tells the client to go to another server.
    pub fn is_not_leader(&self) -> bool {
        self.error_num == codes::CLUSTER_NOT_LEADER
    }
}

/// Represents all possible errors that can occur when talking to the database
/// or building the mapping registry.
#[derive(Error, Debug)]
pub enum ArangoError {
    /// A connection string or configuration value is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// No response was received from the endpoint (connection refused, reset, ...).
    #[error("Transport error on {endpoint}: {message}")]
    Transport { endpoint: String, message: String },
    /// The per-call timeout elapsed before a response was received.
    #[error("Request to {endpoint} timed out after {millis} ms")]
    Timeout { endpoint: String, millis: u128 },
    /// The server answered with an error body.
    #[error(transparent)]
    Api(#[from] ApiError),
    /// A body could not be decoded into the requested shape.
    #[error("Deserialization error: {0}")]
    Deserialization(String),
    /// A value could not be encoded into a request body.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Every known endpoint was tried and none answered.
    #[error("No reachable endpoint, tried: {}", tried.join(", "))]
    EndpointsExhausted { tried: Vec<String> },
    /// The call was cancelled by the caller.
    #[error("Operation cancelled")]
    Cancelled,
    /// The mapping registry is inconsistent.
    #[error("Mapping error: {0}")]
    Mapping(String),
    /// An unknown error occurred.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl ArangoError {
    /// Whether the retry policy may attempt the call again.
    ///
    /// Configuration errors, exhausted endpoints and cancellation are never
    /// retryable; server errors are retryable only for the codes in [`codes`].
    pub fn is_retryable(&self) -> bool {
        match self {
            ArangoError::Transport { .. } | ArangoError::Timeout { .. } => true,
            ArangoError::Api(api) => api.is_retryable(),
            _ => false,
        }
    }

    /// The server's `errorNum`, if this is a server error.
    pub fn error_num(&self) -> Option<i64> {
        match self {
            ArangoError::Api(api) => Some(api.error_num),
            _ => None,
        }
    }
}

/// A specialized `Result` type for database access operations.
pub type ArangoResult<T> = Result<T, ArangoError>;

/// `?` on a `serde_json` result is a decoding failure. Encoding call sites
/// map to [`ArangoError::Serialization`] themselves, since `serde_json`
/// reports custom serializer errors in the data category too.
impl From<SerdeJsonError> for ArangoError {
    fn from(err: SerdeJsonError) -> Self {
        ArangoError::Deserialization(err.to_string())
    }
}
