#![deny(missing_docs)]

//! Shared configuration, error types, and identifiers for Flint crates.
//!
//! Architecture role:
//! - defines the language/session configuration read by the analyzer
//! - provides the common [`FlintError`] / [`Result`] contracts
//! - hosts the process-wide expression-id allocator
//!
//! Key modules:
//! - [`config`]
//! - [`error`]
//! - [`ids`]

/// Language and test-harness configuration types.
pub mod config;
/// Shared error taxonomy.
pub mod error;
/// Strongly-typed identifier wrappers.
pub mod ids;

pub use config::{Config, ExprGenConfig, LanguageConfig, PlanGenConfig, TestConfig, TypeGenConfig};
pub use error::{FlintError, Result};
pub use ids::ExprId;
