//! reqwest backend implementation for arangolayer.
//!
//! This crate provides the production [`HttpBackend`](arangolayer_core::backend::HttpBackend)
//! built on `reqwest` with rustls. It is enabled by the `reqwest` feature of
//! the `arangolayer` crate, which is on by default:
//!
//! ```toml
//! [dependencies]
//! arangolayer = { version = "x.y.z" }
//! ```
//!
//! # Example
//!
//! ```ignore
//! use arangolayer::{backend::HttpBackendBuilder, reqwest::ReqwestBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = "Endpoints=http://localhost:8529;Database=app;UserName=root".parse()?;
//!     let backend = ReqwestBackend::builder()
//!         .user_agent("my-service/1.0")
//!         .build(&config)
//!         .await?;
//!
//!     Ok(())
//! }
//! ```

pub mod backend;

pub use backend::{ReqwestBackend, ReqwestBackendBuilder};
