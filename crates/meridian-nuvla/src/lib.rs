//! Typed client for the Nuvla REST API.
//!
//! Nuvla exposes every entity as a resource in a named collection
//! (`nuvlabox`, `infrastructure-service`, `credential`, `module`,
//! `deployment`, ...). Resource identifiers are `<collection>/<uuid>`.
//! This crate covers the subset of the API needed to place an application
//! on an edge device or infrastructure service:
//!
//! - API-key session login, with the session cookie held by the client
//! - `get`, `search`, `add`, `edit`, `operation` and `delete` on resources
//! - A builder for Kubernetes application modules
//! - The deployment lifecycle state enumeration
//!
//! # Example
//!
//! ```ignore
//! use meridian_nuvla::{NuvlaClient, NuvlaConfig, ResourceKind, SearchQuery};
//!
//! let client = NuvlaClient::new(&config)?;
//! client.login_apikey(&config.api_key, &config.api_secret).await?;
//!
//! let creds = client
//!     .search(
//!         ResourceKind::Credential,
//!         &SearchQuery::new().filter(r#"parent="infrastructure-service/1""#),
//!     )
//!     .await?;
//! ```

#![forbid(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod resources;

pub use client::{NuvlaClient, SearchQuery};
pub use config::NuvlaConfig;
pub use error::{NuvlaError, NuvlaResult};
pub use resources::{Application, ApplicationBuilder, DeploymentState, ResourceKind};
