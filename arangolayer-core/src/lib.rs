//! Core of the arangolayer project: an ArangoDB HTTP client with endpoint
//! failover and retries, plus a build-once mapping registry.
//!
//! This crate provides:
//!
//! - **Configuration** ([`config`]) - Connection strings and their validation
//! - **Endpoint pool** ([`endpoint`]) - Sticky host selection and failover rotation
//! - **Envelopes** ([`envelope`]) - Immutable requests and normalized responses
//! - **HTTP seam** ([`backend`]) - Traits for plugging in an HTTP client
//! - **Connection** ([`connection`]) - Failover, leader redirects, timeouts and cancellation
//! - **Retry policy** ([`retry`]) - Bounded retries and the exception hook
//! - **Client** ([`client`]) - Retry-wrapped calls and startup operations
//! - **Cursors** ([`cursor`]) - Batched query results
//! - **Mapping registry** ([`model`], [`entity`], [`relation`]) - Types to collections, keys,
//!   discriminators and edges
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use arangolayer::prelude::*;
//!
//! const USER: TypeTag = TypeTag::new("User");
//! const ROLE: TypeTag = TypeTag::new("Role");
//!
//! let mut builder = ModelBuilder::new();
//! builder
//!     .set_collection(USER, "users")
//!     .set_collection(ROLE, "roles")
//!     .add_relation(USER, ROLE, None, &[], &[]);
//! let registry = builder.build("prod_", "prod_query_")?;
//!
//! let config: ConnectionConfig = "Endpoints=http://localhost:8529;Database=app;UserName=root".parse()?;
//! let client = ArangoClient::new(Connection::new(config, backend)?, ConnectionOptions::default());
//! client.ensure_collections(&registry).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as arangolayer_core;

pub mod backend;
pub mod client;
pub mod config;
pub mod connection;
pub mod cursor;
pub mod endpoint;
pub mod entity;
pub mod envelope;
pub mod error;
pub mod model;
pub mod relation;
pub mod retry;
pub mod transaction;

#[cfg(test)]
pub(crate) mod testing;

