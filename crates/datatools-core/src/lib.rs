//! Data Tools Core - Foundation crate for the Data Tools administration console.
//!
//! This crate provides shared types, error handling, configuration management,
//! and the organization/project catalog that the other Data Tools crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Validated identifier newtypes (`OrganizationId`, `ProjectId`, `FeedId`) and `Timestamp`
//! - [`catalog`] - Read-only catalog of organizations and the projects they own
//!
//! # Example
//!
//! ```rust
//! use datatools_core::{Catalog, Organization, Project};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::new(
//!     vec![Organization::new("org1", "Metro Transit")?],
//!     vec![Project::new("proj1", Some("org1"), "Regional Feeds")?],
//! )?;
//!
//! assert_eq!(
//!     catalog.organization_of("proj1").map(|id| id.as_str()),
//!     Some("org1")
//! );
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod catalog;
pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use catalog::{Catalog, Organization, Project};
pub use config::{AppConfig, CatalogConfig, LoggingConfig, SessionConfig};
pub use error::{ConfigError, ConfigResult, DatatoolsError, Result};
pub use types::{FeedId, OrganizationId, ProjectId, Timestamp, WILDCARD};
