//! Shared types used across Data Tools.
//!
//! This module defines the identifier newtypes for the tenancy chain
//! (organization, project, feed source) and a timestamp wrapper.

use crate::error::DatatoolsError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Reserved token meaning "every feed in the project" inside a feed scope.
///
/// Only an entry equal to it is special; identifiers may contain `*`.
pub const WILDCARD: &str = "*";

/// Validate an identifier. Any non-empty string is accepted; ids are
/// compared by exact string equality.
fn validate_id(kind: &str, id: &str) -> Result<(), DatatoolsError> {
    if id.is_empty() {
        return Err(DatatoolsError::Validation(format!(
            "invalid {kind} ID: must not be empty"
        )));
    }
    Ok(())
}

macro_rules! identifier {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new `", stringify!($name), "` from a string.")]
            ///
            /// # Errors
            /// Returns error if the ID is empty.
            pub fn new(id: impl Into<String>) -> Result<Self, DatatoolsError> {
                let id = id.into();
                validate_id($kind, &id)?;
                Ok(Self(id))
            }

            /// Get the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        // Lets maps keyed by the newtype be queried with a plain `&str`.
        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = DatatoolsError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

identifier!(
    /// Identifier of an organization, the top tenancy level below the application.
    OrganizationId,
    "organization"
);

identifier!(
    /// Identifier of a project. Projects may or may not belong to an organization.
    ProjectId,
    "project"
);

identifier!(
    /// Identifier of a feed source inside a project.
    FeedId,
    "feed"
);

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Format as RFC3339 string.
    #[must_use]
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
