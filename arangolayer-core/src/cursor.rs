//! Batched result cursors.
//!
//! A cursor is created by `POST /_api/cursor` and advanced with
//! `PUT /_api/cursor/{id}` for as long as the server reports `hasMore`. The
//! query text is supplied by the caller; this module only pages through what
//! the server returns.

use std::{collections::BTreeMap, mem};

use futures::{
    Stream, TryStreamExt,
    stream::{self, try_unfold},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::debug;

use crate::{
    backend::HttpBackend,
    client::ArangoClient,
    connection::CallOptions,
    envelope::{Method, Request},
    error::{ArangoError, ArangoResult, codes},
};

/// Body of `POST /_api/cursor`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CursorQuery {
    pub query: String,
    #[serde(rename = "bindVars", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub bind_vars: BTreeMap<String, Value>,
    #[serde(rename = "batchSize", skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<u32>,
    /// Asks the server for the total result count.
    #[serde(default)]
    pub count: bool,
    /// Stream transaction the cursor runs in; sent as a header.
    #[serde(skip)]
    pub transaction: Option<String>,
}

impl CursorQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            bind_vars: BTreeMap::new(),
            batch_size: None,
            count: false,
            transaction: None,
        }
    }

    /// Binds `@name` (or `@@name` for collections) in the query.
    ///
    /// # Errors
    ///
    /// Returns [`ArangoError::Serialization`] if `value` cannot be converted
    /// to JSON.
    pub fn bind(mut self, name: impl Into<String>, value: impl Serialize) -> ArangoResult<Self> {
        let value = serde_json::to_value(value).map_err(|e| ArangoError::Serialization(e.to_string()))?;
        self.bind_vars.insert(name.into(), value);
        Ok(self)
    }

    pub fn batch_size(mut self, size: u32) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn count(mut self, enabled: bool) -> Self {
        self.count = enabled;
        self
    }

    pub fn transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction = Some(transaction_id.into());
        self
    }
}

/// One batch of a cursor response.
#[derive(Deserialize)]
struct Batch<T> {
    #[serde(default = "Vec::new")]
    result: Vec<T>,
    #[serde(rename = "hasMore", default)]
    has_more: bool,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    count: Option<u64>,
}

/// A server-side cursor holding the current batch of decoded items.
///
/// Cursors that are dropped before being exhausted stay alive on the server
/// until their TTL expires; call [`dispose`](Self::dispose) to release them
/// early.
#[derive(Debug)]
pub struct Cursor<B: HttpBackend, T> {
    client: ArangoClient<B>,
    id: Option<String>,
    has_more: bool,
    items: Vec<T>,
    count: Option<u64>,
    transaction: Option<String>,
}

impl<B, T> Cursor<B, T>
where
    B: HttpBackend,
    T: DeserializeOwned,
{
    pub(crate) async fn open(client: ArangoClient<B>, query: CursorQuery) -> ArangoResult<Self> {
        let mut request = Request::builder(Method::Post, "_api/cursor").json_body(&query)?;
        if let Some(transaction) = &query.transaction {
            request = request.transaction(transaction.clone());
        }

        let batch: Batch<T> = client.send(&request.build()).await?.json()?;
        debug!(
            cursor = batch.id.as_deref().unwrap_or(""),
            items = batch.result.len(),
            has_more = batch.has_more,
            "cursor opened"
        );

        Ok(Self {
            client,
            id: batch.id,
            has_more: batch.has_more,
            items: batch.result,
            count: batch.count,
            transaction: query.transaction,
        })
    }

    /// The server-side handle; absent when everything fit in the first batch.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether the server holds further batches.
    pub fn has_more(&self) -> bool {
        self.has_more
    }

    /// The items of the current batch.
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Total number of results, when requested with [`CursorQuery::count`].
    pub fn count(&self) -> Option<u64> {
        self.count
    }

    /// Moves the items of the current batch out of the cursor.
    pub fn take_items(&mut self) -> Vec<T> {
        mem::take(&mut self.items)
    }

    fn request(&self, method: Method, id: &str) -> Request {
        let builder = Request::builder(method, format!("_api/cursor/{id}"));
        match &self.transaction {
            Some(transaction) => builder.transaction(transaction.clone()).build(),
            None => builder.build(),
        }
    }

    /// Replaces the current batch with the next one.
    ///
    /// Returns `false`, leaving the current batch untouched, once the server
    /// has no more results.
    ///
    /// Advancing is sent exactly once: the server moves the cursor forward
    /// even when the answer is lost, so a resend would skip a batch.
    ///
    /// # Errors
    ///
    /// Returns the server error, e.g. for an expired cursor, a transport or
    /// timeout error if the answer was lost, or a decoding error if the batch
    /// does not match `T`.
    pub async fn next_batch(&mut self) -> ArangoResult<bool> {
        let Some(id) = self.id.as_deref().filter(|_| self.has_more) else {
            return Ok(false);
        };

        let request = self.request(Method::Put, id);
        let batch: Batch<T> = self
            .client
            .send_with(&request, CallOptions::new().single_attempt(true))
            .await?
            .json()?;

        self.items = batch.result;
        self.has_more = batch.has_more;
        if batch.id.is_some() {
            self.id = batch.id;
        }
        if batch.count.is_some() {
            self.count = batch.count;
        }

        Ok(true)
    }

    /// Reads every remaining batch and returns all items, starting with the
    /// current batch.
    ///
    /// # Errors
    ///
    /// See [`next_batch`](Self::next_batch).
    pub async fn collect_all(mut self) -> ArangoResult<Vec<T>> {
        let mut all = self.take_items();

        while self.next_batch().await? {
            all.append(&mut self.items);
        }

        Ok(all)
    }

    /// Turns the cursor into a stream of items, fetching batches lazily.
    pub fn into_stream(self) -> impl Stream<Item = ArangoResult<T>> {
        try_unfold((self, true), |(mut cursor, first)| async move {
            if !first && !cursor.next_batch().await? {
                return Ok(None);
            }

            let items = cursor.take_items().into_iter().map(Ok::<T, ArangoError>);
            Ok::<_, ArangoError>(Some((stream::iter(items), (cursor, false))))
        })
        .try_flatten()
    }

    /// Releases the server-side cursor if it still holds results.
    ///
    /// # Errors
    ///
    /// Returns server errors other than an already expired cursor.
    pub async fn dispose(self) -> ArangoResult<()> {
        let Some(id) = self.id.as_deref().filter(|_| self.has_more) else {
            return Ok(());
        };

        let response = self
            .client
            .send_with(
                &self.request(Method::Delete, id),
                CallOptions::new().handled_error(codes::CURSOR_NOT_FOUND),
            )
            .await?;

        if response
            .exception()
            .is_some_and(|e| e.error_num == codes::CURSOR_NOT_FOUND)
        {
            debug!(cursor = id, "cursor already expired");
            return Ok(());
        }

        response.error_for_status()?;
        Ok(())
    }
}
