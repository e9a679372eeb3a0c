//! # API Conformance Library
//!
//! This library checks a third-party REST API against declared status and
//! payload-shape contracts. It consists of two main components:
//!
//! ## Client Module
//!
//! The [`client`] module is the request executor: it sends one declaratively
//! described HTTP request, attaching the API credential as a query parameter,
//! and returns a normalized response. Recorded cassettes can stand in for the
//! live service.
//!
//! ## Scenario Module
//!
//! The [`scenario`] module runs ordered scenarios grouped by shared fixture
//! state, evaluates every predicate against each response and reports
//! Pass/Fail/Skip.
//!
//! ## Quick Start
//!
//! ```no_run
//! use api_conformance::client::{ApiClient, Method, RequestTemplate};
//! use api_conformance::scenario::{Predicate, Runner, Scenario, Suite};
//! use api_conformance::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_env()?;
//! let client = ApiClient::new(&config);
//!
//! let suite = Suite::new().scenario(
//!     Scenario::new(
//!         "recipe information",
//!         RequestTemplate::new(Method::Get, "/recipes/716429/information"),
//!     )
//!     .expect(Predicate::status(200))
//!     .expect(Predicate::equals("/id", 716429)),
//! );
//!
//! let report = Runner::new(&config, &client).run(&suite).await;
//! println!("{}", report);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod scenario;

pub use client::ApiClient;
pub use config::Config;
pub use error::{HarnessError, HarnessResult};
pub use scenario::{RunReport, Runner, Suite};
