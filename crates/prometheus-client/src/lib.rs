//! Prometheus HTTP API Client
//!
//! A small client for the parts of the Prometheus HTTP API the controller
//! needs to judge whether a configured server is usable: reachability,
//! credentials and build information. It works against Prometheus itself
//! and API-compatible frontends such as Thanos Query.
//!
//! # Example
//!
//! ```no_run
//! use prometheus_client::{Credentials, PrometheusClient};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = PrometheusClient::new(
//!     "http://prometheus.monitoring:9090",
//!     Some(Credentials::Bearer("token".to_string())),
//!     Duration::from_secs(10),
//! )?;
//!
//! let info = client.build_info().await?;
//! println!("connected to Prometheus {}", info.version);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod prometheus_trait;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::PrometheusClient;
pub use common::HttpClient;
pub use error::PrometheusError;
pub use models::*;
pub use prometheus_trait::PrometheusClientTrait;
#[cfg(feature = "test-util")]
pub use mock::MockPrometheusClient;
