//! # Backstop Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - The reqwest transport and session refresher
//! - The error logger (tracing plus remote reporting)
//! - The connectivity probe
//! - Configuration loading and tracing initialisation
//! - [`ResilientClient`], the facade wiring everything together
//!
//! ## Architecture
//! - Implements traits defined in `backstop-core`
//! - Depends on `backstop-domain` and `backstop-core`
//! - Contains all "impure" code (network I/O, environment, files)

pub mod client;
pub mod config;
pub mod errors;
pub mod health;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use client::{ResilientClient, ResilientClientBuilder};
pub use errors::{transport_failure, InfraError};
pub use health::ConnectivityProbe;
pub use http::{HttpClient, HttpClientBuilder, HttpSessionRefresher};
pub use observability::{init_tracing, ErrorLogger, ErrorReport};
