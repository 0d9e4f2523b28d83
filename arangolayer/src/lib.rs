//! Main arangolayer crate: a failover-aware ArangoDB client and a build-once
//! mapping registry for the types an application stores.
//!
//! This crate is the primary entry point. It re-exports the core types and
//! the default HTTP backend.
//!
//! # Features
//!
//! - **Endpoint failover** - Sticky leader tracking, host rotation and not-leader redirects
//! - **Bounded retries** - Retry policy with backoff, cancellation and an exception hook
//! - **Mapping registry** - Collections, keys, discriminators, aliases and edge relations
//! - **Cursors** - Batched query results as batches or as a stream
//!
//! # Quick Start
//!
//! ```ignore
//! use arangolayer::prelude::*;
//!
//! const USER: TypeTag = TypeTag::new("User");
//! const GROUP: TypeTag = TypeTag::new("Group");
//! const PROFILE: TypeTag = TypeTag::new("IProfile");
//!
//! #[tokio::main]
//! async fn main() -> ArangoResult<()> {
//!     let mut builder = ModelBuilder::new();
//!     builder
//!         .set_collection(USER, "profiles")
//!         .set_discriminator(USER, "Kind", "User")
//!         .set_collection(GROUP, "profiles")
//!         .set_discriminator(GROUP, "Kind", "Group")
//!         .add_alias(USER, PROFILE)
//!         .add_alias(GROUP, PROFILE)
//!         .add_relation(USER, GROUP, Some("memberOf"), &[], &[]);
//!     let registry = builder.build("prod_", "prod_query_")?;
//!
//!     let client = arangolayer::connect(
//!         "Endpoints=http://db1:8529,http://db2:8529;Database=app;\
//!          UserName=root;Password=secret;ActiveFailover=true",
//!         ConnectionOptions::default(),
//!     )
//!     .await?;
//!
//!     client.ensure_collections(&registry).await?;
//!
//!     let profiles: Vec<serde_json::Value> = client
//!         .cursor(
//!             CursorQuery::new("FOR p IN @@profiles RETURN p")
//!                 .bind("@profiles", registry.collection_name(PROFILE))?,
//!         )
//!         .await?
//!         .collect_all()
//!         .await?;
//!
//!     println!("{} profiles", profiles.len());
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`reqwest`] - The default backend built on `reqwest` (requires the `reqwest` feature)
//!
//! Any other HTTP client can be used by implementing
//! [`HttpBackend`](backend::HttpBackend).

pub mod prelude;

pub use arangolayer_core::{
    backend, client, config, connection, cursor, endpoint, entity, envelope, error, model,
    relation, retry, transaction,
};

#[cfg(feature = "reqwest")]
pub use arangolayer_reqwest as reqwest;

/// Parses `connection_string`, builds the default backend and returns a
/// ready client.
///
/// # Errors
///
/// Returns [`ArangoError::Configuration`](error::ArangoError::Configuration)
/// if the connection string is invalid or the HTTP client cannot be built.
#[cfg(feature = "reqwest")]
pub async fn connect(
    connection_string: &str,
    options: client::ConnectionOptions,
) -> error::ArangoResult<client::ArangoClient<reqwest::ReqwestBackend>> {
    use backend::HttpBackendBuilder;

    let config: config::ConnectionConfig = connection_string.parse()?;
    let backend = reqwest::ReqwestBackend::builder().build(&config).await?;

    Ok(client::ArangoClient::new(
        connection::Connection::new(config, backend)?,
        options,
    ))
}
