//! Stream transaction payloads.

use serde::{Deserialize, Serialize};

/// Collections locked by a stream transaction.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TransactionCollections {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub read: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub write: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclusive: Vec<String>,
}

/// Body of `POST /_api/transaction/begin`.
///
/// # Example
///
/// ```ignore
/// let options = TransactionOptions::new()
///     .write("p_profiles")
///     .read("p_roles")
///     .lock_timeout(5);
/// let trx = client.begin_transaction(&options).await?;
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct TransactionOptions {
    pub collections: TransactionCollections,
    #[serde(rename = "waitForSync", skip_serializing_if = "Option::is_none")]
    pub wait_for_sync: Option<bool>,
    /// Seconds to wait for collection locks.
    #[serde(rename = "lockTimeout", skip_serializing_if = "Option::is_none")]
    pub lock_timeout: Option<u64>,
    #[serde(rename = "allowImplicit", skip_serializing_if = "Option::is_none")]
    pub allow_implicit: Option<bool>,
}

impl TransactionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(mut self, collection: impl Into<String>) -> Self {
        self.collections.read.push(collection.into());
        self
    }

    pub fn write(mut self, collection: impl Into<String>) -> Self {
        self.collections.write.push(collection.into());
        self
    }

    pub fn exclusive(mut self, collection: impl Into<String>) -> Self {
        self.collections.exclusive.push(collection.into());
        self
    }

    pub fn wait_for_sync(mut self, enabled: bool) -> Self {
        self.wait_for_sync = Some(enabled);
        self
    }

    pub fn lock_timeout(mut self, seconds: u64) -> Self {
        self.lock_timeout = Some(seconds);
        self
    }

    pub fn allow_implicit(mut self, enabled: bool) -> Self {
        self.allow_implicit = Some(enabled);
        self
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Running,
    Committed,
    Aborted,
}

/// The `result` of the stream transaction endpoints.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    pub id: String,
    pub status: TransactionState,
}
