//! Connection configuration and connection-string parsing.
//!
//! A connection string is a semicolon separated list of `key=value` pairs with
//! case-insensitive keys:
//!
//! ```text
//! Endpoints=http://db1:8529,http://db2:8529;Database=profiles;UserName=root;Password=secret;ActiveFailover=true
//! ```
//!
//! Every invariant is checked when the [`ConnectionConfig`] is created, never
//! on first use.

use std::{fmt, str::FromStr, time::Duration};

use crate::{
    endpoint::EndpointAddress,
    error::{ArangoError, ArangoResult},
};

const KEY_ENDPOINTS: &str = "endpoints";
const KEY_DATABASE: &str = "database";
const KEY_USERNAME: &str = "username";
const KEY_PASSWORD: &str = "password";
const KEY_ACTIVE_FAILOVER: &str = "activefailover";
const KEY_DEBUG: &str = "debug";
const KEY_USE_WEB_PROXY: &str = "usewebproxy";
const KEY_TIMEOUT: &str = "timeout";
const KEY_ALIAS: &str = "alias";

/// Validated settings for one database connection.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    alias: Option<String>,
    endpoints: Vec<EndpointAddress>,
    database: String,
    username: String,
    password: String,
    active_failover: bool,
    debug: bool,
    use_web_proxy: bool,
    timeout: Option<Duration>,
}

impl ConnectionConfig {
    /// Creates a builder for assembling a configuration programmatically.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::default()
    }

    /// Parses a connection string.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Configuration`] naming the offending key when a
    /// required key is missing, a value is malformed, or the endpoint count
    /// violates the active-failover requirement.
    pub fn parse(connection_string: &str) -> ArangoResult<Self> {
        let mut builder = ConnectionConfigBuilder::default();
        let mut seen_endpoints = false;

        for pair in connection_string.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }

            let (key, value) = pair.split_once('=').ok_or_else(|| {
                ArangoError::Configuration(format!("Malformed connection string segment '{pair}'"))
            })?;
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                KEY_ENDPOINTS => {
                    seen_endpoints = true;
                    for endpoint in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
                        builder = builder.endpoint(endpoint);
                    }
                }
                KEY_DATABASE => builder = builder.database(value),
                KEY_USERNAME => builder = builder.username(value),
                KEY_PASSWORD => builder = builder.password(value),
                KEY_ACTIVE_FAILOVER => builder = builder.active_failover(parse_bool(KEY_ACTIVE_FAILOVER, value)?),
                KEY_DEBUG => builder = builder.debug(parse_bool(KEY_DEBUG, value)?),
                KEY_USE_WEB_PROXY => builder = builder.use_web_proxy(parse_bool(KEY_USE_WEB_PROXY, value)?),
                KEY_TIMEOUT => {
                    let seconds: u64 = value.parse().map_err(|_| {
                        ArangoError::Configuration(format!("Invalid value '{value}' for key 'Timeout'"))
                    })?;
                    builder = builder.timeout(Duration::from_secs(seconds));
                }
                KEY_ALIAS => builder = builder.alias(value),
                other => {
                    return Err(ArangoError::Configuration(format!(
                        "Unknown connection string key '{other}'"
                    )));
                }
            }
        }

        if !seen_endpoints {
            return Err(missing(KEY_ENDPOINTS));
        }

        builder.build()
    }

    /// The connection label used in log records.
    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    /// Configured endpoints in declaration order.
    pub fn endpoints(&self) -> &[EndpointAddress] {
        &self.endpoints
    }

    /// The database every request is scoped to with `/_db/{database}`.
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Whether unreachable hosts are rotated out in favour of the next one.
    pub fn active_failover(&self) -> bool {
        self.active_failover
    }

    /// Whether every exchange is logged, request bodies included.
    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Whether the backend may use the system proxy settings.
    pub fn use_web_proxy(&self) -> bool {
        self.use_web_proxy
    }

    /// Default per-call timeout from the `Timeout` key.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("alias", &self.alias)
            .field("endpoints", &self.endpoints)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .field("active_failover", &self.active_failover)
            .field("debug", &self.debug)
            .field("use_web_proxy", &self.use_web_proxy)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl FromStr for ConnectionConfig {
    type Err = ArangoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Builder for [`ConnectionConfig`].
///
/// Values are only checked in [`build`](Self::build).
#[derive(Default, Debug, Clone)]
pub struct ConnectionConfigBuilder {
    alias: Option<String>,
    endpoints: Vec<String>,
    database: Option<String>,
    username: Option<String>,
    password: Option<String>,
    active_failover: bool,
    debug: bool,
    use_web_proxy: bool,
    timeout: Option<Duration>,
}

impl ConnectionConfigBuilder {
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Appends an endpoint; order is the initial rotation order.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoints.push(endpoint.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn active_failover(mut self, enabled: bool) -> Self {
        self.active_failover = enabled;
        self
    }

    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    pub fn use_web_proxy(mut self, enabled: bool) -> Self {
        self.use_web_proxy = enabled;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Validates the collected values.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Configuration`] if a required value is missing,
    /// an endpoint is malformed, or active failover is requested with fewer
    /// than two endpoints.
    pub fn build(self) -> ArangoResult<ConnectionConfig> {
        if self.endpoints.is_empty() {
            return Err(missing(KEY_ENDPOINTS));
        }

        let database = required(KEY_DATABASE, self.database)?;
        let username = required(KEY_USERNAME, self.username)?;

        let endpoints = self
            .endpoints
            .iter()
            .map(|e| EndpointAddress::parse(e))
            .collect::<ArangoResult<Vec<_>>>()?;

        if self.active_failover && endpoints.len() < 2 {
            return Err(ArangoError::Configuration(format!(
                "ActiveFailover requires at least 2 endpoints, got {}",
                endpoints.len()
            )));
        }

        Ok(ConnectionConfig {
            alias: self.alias,
            endpoints,
            database,
            username,
            password: self.password.unwrap_or_default(),
            active_failover: self.active_failover,
            debug: self.debug,
            use_web_proxy: self.use_web_proxy,
            timeout: self.timeout,
        })
    }
}

fn required(key: &str, value: Option<String>) -> ArangoResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(missing(key)),
    }
}

fn missing(key: &str) -> ArangoError {
    let name = match key {
        KEY_ENDPOINTS => "Endpoints",
        KEY_DATABASE => "Database",
        KEY_USERNAME => "UserName",
        other => other,
    };
    ArangoError::Configuration(format!("Missing required key '{name}'"))
}

fn parse_bool(key: &str, value: &str) -> ArangoResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" | "" => Ok(false),
        _ => Err(ArangoError::Configuration(format!(
            "Invalid boolean '{value}' for key '{key}'"
        ))),
    }
}
