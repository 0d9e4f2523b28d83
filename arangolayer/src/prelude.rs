//! Convenient re-exports of commonly used types from arangolayer.
//!
//! ```ignore
//! use arangolayer::prelude::*;
//! ```
//!
//! This provides access to:
//! - Connection configuration and the client
//! - Requests, responses and cursors
//! - The mapping registry and entity traits
//! - Error types and the retry policy

pub use arangolayer_core::{
    backend::{HttpBackend, HttpBackendBuilder},
    client::{ArangoClient, ConnectionOptions},
    config::ConnectionConfig,
    connection::{CallOptions, Connection},
    cursor::{Cursor, CursorQuery},
    entity::{Entity, EntityExt, TypeTag, new_key},
    envelope::{Method, Request, Response},
    error::{ApiError, ArangoError, ArangoResult},
    model::{CollectionKind, Discriminator, ModelBuilder, ModelRegistry},
    retry::{ExceptionHook, RetryPolicy},
    transaction::{TransactionOptions, TransactionStatus},
};
