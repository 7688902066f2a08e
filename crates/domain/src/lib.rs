//! # Backstop Domain
//!
//! Domain types shared by every Backstop crate.
//!
//! This crate contains:
//! - The error taxonomy (`ErrorKind`, `AppError`) and construction errors
//! - Request, response and transport failure descriptions
//! - Client events, session and connectivity state
//! - Configuration structures and constants
//!
//! ## Architecture
//! - No dependencies on other Backstop crates
//! - Only external dependencies allowed
//! - Pure data structures, no I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
