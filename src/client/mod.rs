//! # Request Executor
//!
//! Builds and sends a single HTTP request from a declarative description and
//! returns a normalized response.
//!
//! ## Modules
//!
//! - [`auth`] - The API credential and how a request attaches it
//! - [`client`] - The [`Executor`] trait and the live `reqwest` implementation
//! - [`cassette`] - Recording and replaying exchanges as golden fixtures
//! - [`template`] - Request templates with `{{name}}` placeholders
//! - [`types`] - Request and response types
//!
//! ## Quick Start
//!
//! ```no_run
//! use api_conformance::client::{ApiClient, Executor, RequestSpec};
//! use api_conformance::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let client = ApiClient::new(&config);
//!
//! let spec = RequestSpec::get("/recipes/716429/information")
//!     .query("includeNutrition", true)
//!     .build()?;
//! let response = client.execute(&spec, config.credential()).await?;
//! println!("status {}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cassette;
#[allow(clippy::module_inception)]
pub mod client;
pub mod template;
pub mod types;

pub use auth::{AuthMode, Credential};
pub use cassette::{Cassette, RecordingExecutor, ReplayExecutor};
pub use client::{ApiClient, Executor};
pub use template::{RequestTemplate, Variables};
pub use types::*;
