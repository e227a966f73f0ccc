//! Data Tools Permissions - Hierarchical permission evaluation for the Data Tools console.
//!
//! A principal's access is described by a flat list of grants, each scoped to one
//! level of the tenancy chain:
//!
//! ```text
//! application
//!   └── organization
//!         └── project
//!               └── feed source
//! ```
//!
//! This crate validates that list into an immutable [`GrantSet`] and answers
//! authorization questions through a [`PermissionEvaluator`], applying a single
//! precedence rule everywhere: application admin overrides everything,
//! organization admin overrides everything inside its organization, project admin
//! overrides everything inside its project, and otherwise explicit scoped grants
//! apply.
//!
//! # Example
//!
//! ```rust
//! use datatools_permissions::{PermissionEvaluator, PermissionType, RawGrant};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let evaluator = PermissionEvaluator::from_raw(&[RawGrant::project("p1")
//!     .with_types([PermissionType::ViewFeed, PermissionType::EditGtfs])
//!     .with_feed_scope(["f1", "f2"])])?;
//!
//! assert!(evaluator.has_feed_permission(None, "p1", "f1", &PermissionType::ViewFeed));
//! assert!(!evaluator.has_feed_permission(None, "p1", "f3", &PermissionType::ViewFeed));
//! assert!(!evaluator.is_project_admin("p1", None));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

mod evaluator;
mod grant;
mod grant_set;
mod scope;
mod session;
mod settings;

pub use evaluator::PermissionEvaluator;
pub use grant::{Grant, GrantId, GrantKey, GrantLevel, ProjectAccess, RawGrant};
pub use grant_set::GrantSet;
pub use scope::{FeedScope, FeedScopeError};
pub use session::PermissionSession;
pub use settings::{AccessLevel, ProjectSettings, UserSettings};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Reasons a grant list is rejected during [`GrantSet`] construction.
///
/// `index` is the position of the offending record in the input list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The `level` field is not one of the four tenancy levels
    #[error("grant #{index}: unknown level '{level}'")]
    UnknownLevel {
        /// Position of the grant
        index: usize,
        /// The unrecognized level
        level: String,
    },

    /// A field required at this level is absent
    #[error("grant #{index}: {level} grant requires `{field}`")]
    MissingField {
        /// Position of the grant
        index: usize,
        /// Level of the grant
        level: GrantLevel,
        /// Name of the missing field
        field: &'static str,
    },

    /// A field that has no meaning at this level is present
    #[error("grant #{index}: `{field}` is not allowed on a {level} grant")]
    UnexpectedField {
        /// Position of the grant
        index: usize,
        /// Level of the grant
        level: GrantLevel,
        /// Name of the unexpected field
        field: &'static str,
    },

    /// An identifier field failed validation
    #[error("grant #{index}: invalid `{field}`: {reason}")]
    InvalidId {
        /// Position of the grant
        index: usize,
        /// Name of the identifier field
        field: &'static str,
        /// Why the identifier was rejected
        reason: String,
    },

    /// A grant that needs at least one permission type has none
    #[error("grant #{index}: {level} grant must list at least one permission type")]
    EmptyTypes {
        /// Position of the grant
        index: usize,
        /// Level of the grant
        level: GrantLevel,
    },

    /// An administer token appears on a grant of another level
    #[error("grant #{index}: '{token}' is not allowed on a {level} grant")]
    UnsupportedToken {
        /// Position of the grant
        index: usize,
        /// Level of the grant
        level: GrantLevel,
        /// The misplaced token
        token: PermissionType,
    },

    /// Custom project access without a scoped `view-feed` token
    #[error(
        "grant #{index}: custom access to project '{project_id}' requires `view-feed` with a feed scope"
    )]
    MissingFeedScope {
        /// Position of the grant
        index: usize,
        /// Project the grant refers to
        project_id: String,
    },

    /// The feed scope does not follow the wildcard-or-list grammar
    #[error("grant #{index}: invalid feed scope: {source}")]
    InvalidFeedScope {
        /// Position of the grant
        index: usize,
        /// Grammar violation
        source: FeedScopeError,
    },

    /// More than one administer-application grant
    #[error("grants #{first} and #{second} both administer the application")]
    DuplicateApplicationAdmin {
        /// Position of the first grant
        first: usize,
        /// Position of the second grant
        second: usize,
    },

    /// The organization declared for a project disagrees with another source
    #[error(
        "grant #{index}: project '{project_id}' is declared under organization '{declared}' but belongs to '{expected}'"
    )]
    InconsistentChain {
        /// Position of the grant
        index: usize,
        /// Project the grant refers to
        project_id: String,
        /// Organization declared by this grant
        declared: String,
        /// Organization declared earlier or by the catalog
        expected: String,
    },
}

/// Errors that can occur while loading permissions.
#[derive(Error, Debug)]
pub enum PermissionError {
    /// The grant list is structurally invalid
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The grant list could not be parsed
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for permission operations.
pub type Result<T> = std::result::Result<T, PermissionError>;

/// Permission-type token carried by a grant.
///
/// Tokens travel as kebab-case strings (`"view-feed"`, `"edit-gtfs"`, ...).
/// Tokens this crate does not know are kept verbatim in [`PermissionType::Other`]
/// and behave as ordinary custom tokens.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PermissionType {
    // ── Administer tokens ─────────────────────────────────
    /// Full control over every organization, project and feed
    AdministerApplication,

    /// Full control inside one organization
    AdministerOrganization,

    /// Full control inside one project
    AdministerProject,

    // ── Feed tokens ──────────────────────────────────────
    /// See a feed source; always gated by the grant's feed scope
    ViewFeed,

    /// Change feed source settings, fetch and upload versions
    ManageFeed,

    /// Edit GTFS data in the editor
    EditGtfs,

    /// Approve GTFS edits for publishing
    ApproveGtfs,

    /// Create and edit service alerts
    EditAlert,

    /// Approve and publish service alerts
    ApproveAlert,

    /// Any other token, preserved as received
    Other(String),
}

impl PermissionType {
    /// Wire token for this permission type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::AdministerApplication => "administer-application",
            Self::AdministerOrganization => "administer-organization",
            Self::AdministerProject => "administer-project",
            Self::ViewFeed => "view-feed",
            Self::ManageFeed => "manage-feed",
            Self::EditGtfs => "edit-gtfs",
            Self::ApproveGtfs => "approve-gtfs",
            Self::EditAlert => "edit-alert",
            Self::ApproveAlert => "approve-alert",
            Self::Other(token) => token,
        }
    }

    /// Get a human-readable name for the permission type.
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::AdministerApplication => "Administer Application",
            Self::AdministerOrganization => "Administer Organization",
            Self::AdministerProject => "Administer Project",
            Self::ViewFeed => "View Feed",
            Self::ManageFeed => "Manage Feed",
            Self::EditGtfs => "Edit GTFS",
            Self::ApproveGtfs => "Approve GTFS",
            Self::EditAlert => "Edit Alerts",
            Self::ApproveAlert => "Approve Alerts",
            Self::Other(token) => token,
        }
    }

    /// The level this token administers, if it is an administer token.
    #[must_use]
    pub fn administered_level(&self) -> Option<GrantLevel> {
        match self {
            Self::AdministerApplication => Some(GrantLevel::Application),
            Self::AdministerOrganization => Some(GrantLevel::Organization),
            Self::AdministerProject => Some(GrantLevel::Project),
            _ => None,
        }
    }

    /// Whether this is one of the administer tokens.
    #[must_use]
    pub fn is_administer(&self) -> bool {
        self.administered_level().is_some()
    }

    /// Custom tokens offered when editing project access, in display order.
    #[must_use]
    pub fn project_tokens() -> Vec<Self> {
        vec![
            Self::ViewFeed,
            Self::ManageFeed,
            Self::EditGtfs,
            Self::ApproveGtfs,
            Self::EditAlert,
            Self::ApproveAlert,
        ]
    }
}

impl From<&str> for PermissionType {
    fn from(token: &str) -> Self {
        match token {
            "administer-application" => Self::AdministerApplication,
            "administer-organization" => Self::AdministerOrganization,
            "administer-project" => Self::AdministerProject,
            "view-feed" => Self::ViewFeed,
            "manage-feed" => Self::ManageFeed,
            "edit-gtfs" => Self::EditGtfs,
            "approve-gtfs" => Self::ApproveGtfs,
            "edit-alert" => Self::EditAlert,
            "approve-alert" => Self::ApproveAlert,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for PermissionType {
    fn from(token: String) -> Self {
        match Self::from(token.as_str()) {
            Self::Other(_) => Self::Other(token),
            known => known,
        }
    }
}

impl From<PermissionType> for String {
    fn from(permission: PermissionType) -> Self {
        match permission {
            PermissionType::Other(token) => token,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for PermissionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
