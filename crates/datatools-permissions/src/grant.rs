//! Grant records: the raw input shape and the validated, typed form.

use crate::scope::FeedScope;
use crate::{PermissionType, ValidationError};
use datatools_core::{FeedId, OrganizationId, ProjectId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Tenancy level a grant is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantLevel {
    /// The whole application
    Application,
    /// One organization
    Organization,
    /// One project
    Project,
    /// One feed source inside a project
    Feed,
}

impl GrantLevel {
    /// All levels from widest to narrowest.
    pub const ALL: [Self; 4] = [
        Self::Application,
        Self::Organization,
        Self::Project,
        Self::Feed,
    ];

    /// Wire name of the level.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::Organization => "organization",
            Self::Project => "project",
            Self::Feed => "feed",
        }
    }
}

impl fmt::Display for GrantLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Opaque identifier of a grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GrantId(String);

impl GrantId {
    /// Wrap an identifier supplied by the session service.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a new random `GrantId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GrantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A grant record exactly as supplied by the session/profile service.
///
/// Nothing is checked at this stage; [`crate::GrantSet`] validates records
/// into [`Grant`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawGrant {
    /// Grant identifier, generated when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// `application`, `organization`, `project` or `feed`
    pub level: String,

    /// Owning organization
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,

    /// Target project
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Target feed source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_id: Option<String>,

    /// Permission-type tokens, in order
    #[serde(default)]
    pub types: Vec<PermissionType>,

    /// Feed scope of the `view-feed` token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feed_scope: Option<Vec<String>>,
}

impl RawGrant {
    fn at(level: GrantLevel) -> Self {
        Self {
            level: level.as_str().to_string(),
            ..Self::default()
        }
    }

    /// Administer-application grant.
    #[must_use]
    pub fn application() -> Self {
        Self::at(GrantLevel::Application).with_types([PermissionType::AdministerApplication])
    }

    /// Organization-level grant with no tokens yet.
    #[must_use]
    pub fn organization(organization_id: impl Into<String>) -> Self {
        Self {
            organization_id: Some(organization_id.into()),
            ..Self::at(GrantLevel::Organization)
        }
    }

    /// Project-level grant with no tokens yet.
    #[must_use]
    pub fn project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            ..Self::at(GrantLevel::Project)
        }
    }

    /// Feed-level grant with no tokens yet.
    #[must_use]
    pub fn feed(project_id: impl Into<String>, feed_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            feed_id: Some(feed_id.into()),
            ..Self::at(GrantLevel::Feed)
        }
    }

    /// Set the grant id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the owning organization.
    #[must_use]
    pub fn in_organization(mut self, organization_id: impl Into<String>) -> Self {
        self.organization_id = Some(organization_id.into());
        self
    }

    /// Replace the permission types.
    #[must_use]
    pub fn with_types(mut self, types: impl IntoIterator<Item = PermissionType>) -> Self {
        self.types = types.into_iter().collect();
        self
    }

    /// Set the feed scope entries.
    #[must_use]
    pub fn with_feed_scope<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.feed_scope = Some(entries.into_iter().map(Into::into).collect());
        self
    }
}

/// How a project grant gives access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectAccess {
    /// `administer-project`: everything inside the project
    Admin,

    /// A restricted set of tokens. `view-feed` is always among `types` and
    /// `feed_scope` says which feeds it reaches; the other tokens apply to the
    /// whole project.
    Custom {
        /// Tokens in input order, duplicates removed
        types: Vec<PermissionType>,
        /// Feeds covered by `view-feed`
        feed_scope: FeedScope,
    },
}

/// A validated grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
    /// Administer-application grant
    Application {
        /// Grant identifier
        id: GrantId,
    },

    /// Membership in, or administration of, an organization
    Organization {
        /// Grant identifier
        id: GrantId,
        /// Target organization
        organization_id: OrganizationId,
        /// Tokens in input order; may be empty for plain membership
        types: Vec<PermissionType>,
    },

    /// Access to a project
    Project {
        /// Grant identifier
        id: GrantId,
        /// Owning organization, absent for organization-less projects
        organization_id: Option<OrganizationId>,
        /// Target project
        project_id: ProjectId,
        /// Admin or custom access
        access: ProjectAccess,
    },

    /// Tokens on a single feed source
    Feed {
        /// Grant identifier
        id: GrantId,
        /// Owning organization of the project, if known
        organization_id: Option<OrganizationId>,
        /// Project containing the feed
        project_id: ProjectId,
        /// Target feed source
        feed_id: FeedId,
        /// Tokens in input order, never empty
        types: Vec<PermissionType>,
    },
}

impl Grant {
    /// Validate one raw record. `index` is its position in the input list and
    /// is reported in errors.
    ///
    /// Cross-grant rules (duplicate application admins, chain consistency) are
    /// checked by [`crate::GrantSet`].
    pub fn from_raw(index: usize, raw: &RawGrant) -> Result<Self, ValidationError> {
        let level: GrantLevel =
            raw.level
                .parse()
                .map_err(|level| ValidationError::UnknownLevel { index, level })?;

        let checker = FieldChecker { index, level, raw };
        let id = raw
            .id
            .as_ref()
            .map_or_else(GrantId::generate, |id| GrantId::new(id.clone()));
        let types = dedup(&raw.types);
        checker.reject_foreign_tokens(&types)?;

        match level {
            GrantLevel::Application => {
                checker.forbid("organizationId", raw.organization_id.is_some())?;
                checker.forbid("projectId", raw.project_id.is_some())?;
                checker.forbid("feedId", raw.feed_id.is_some())?;
                checker.forbid("feedScope", raw.feed_scope.is_some())?;
                if !types.contains(&PermissionType::AdministerApplication) {
                    return Err(ValidationError::MissingField {
                        index,
                        level,
                        field: "types",
                    });
                }
                if let Some(token) = types
                    .iter()
                    .find(|t| **t != PermissionType::AdministerApplication)
                {
                    return Err(ValidationError::UnsupportedToken {
                        index,
                        level,
                        token: token.clone(),
                    });
                }
                Ok(Self::Application { id })
            }
            GrantLevel::Organization => {
                checker.forbid("projectId", raw.project_id.is_some())?;
                checker.forbid("feedId", raw.feed_id.is_some())?;
                checker.forbid("feedScope", raw.feed_scope.is_some())?;
                Ok(Self::Organization {
                    id,
                    organization_id: checker.require_id(
                        "organizationId",
                        raw.organization_id.as_deref(),
                        OrganizationId::new,
                    )?,
                    types,
                })
            }
            GrantLevel::Project => {
                checker.forbid("feedId", raw.feed_id.is_some())?;
                let organization_id = checker.optional_id(
                    "organizationId",
                    raw.organization_id.as_deref(),
                    OrganizationId::new,
                )?;
                let project_id =
                    checker.require_id("projectId", raw.project_id.as_deref(), ProjectId::new)?;
                let access = checker.project_access(&project_id, types)?;
                Ok(Self::Project {
                    id,
                    organization_id,
                    project_id,
                    access,
                })
            }
            GrantLevel::Feed => {
                checker.forbid("feedScope", raw.feed_scope.is_some())?;
                let organization_id = checker.optional_id(
                    "organizationId",
                    raw.organization_id.as_deref(),
                    OrganizationId::new,
                )?;
                let project_id =
                    checker.require_id("projectId", raw.project_id.as_deref(), ProjectId::new)?;
                let feed_id = checker.require_id("feedId", raw.feed_id.as_deref(), FeedId::new)?;
                if types.is_empty() {
                    return Err(ValidationError::EmptyTypes { index, level });
                }
                Ok(Self::Feed {
                    id,
                    organization_id,
                    project_id,
                    feed_id,
                    types,
                })
            }
        }
    }

    /// Level of this grant.
    #[must_use]
    pub fn level(&self) -> GrantLevel {
        match self {
            Self::Application { .. } => GrantLevel::Application,
            Self::Organization { .. } => GrantLevel::Organization,
            Self::Project { .. } => GrantLevel::Project,
            Self::Feed { .. } => GrantLevel::Feed,
        }
    }

    /// Grant identifier.
    #[must_use]
    pub fn id(&self) -> &GrantId {
        match self {
            Self::Application { id }
            | Self::Organization { id, .. }
            | Self::Project { id, .. }
            | Self::Feed { id, .. } => id,
        }
    }

    /// Organization this grant names, if any.
    #[must_use]
    pub fn organization_id(&self) -> Option<&OrganizationId> {
        match self {
            Self::Application { .. } => None,
            Self::Organization {
                organization_id, ..
            } => Some(organization_id),
            Self::Project {
                organization_id, ..
            }
            | Self::Feed {
                organization_id, ..
            } => organization_id.as_ref(),
        }
    }

    /// Project this grant names, if any.
    #[must_use]
    pub fn project_id(&self) -> Option<&ProjectId> {
        match self {
            Self::Project { project_id, .. } | Self::Feed { project_id, .. } => Some(project_id),
            Self::Application { .. } | Self::Organization { .. } => None,
        }
    }

    /// Feed this grant names, if any.
    #[must_use]
    pub fn feed_id(&self) -> Option<&FeedId> {
        match self {
            Self::Feed { feed_id, .. } => Some(feed_id),
            _ => None,
        }
    }

    /// Lookup key of this grant.
    #[must_use]
    pub fn key(&self) -> GrantKey {
        GrantKey {
            level: self.level(),
            organization_id: self.organization_id().cloned(),
            project_id: self.project_id().cloned(),
            feed_id: self.feed_id().cloned(),
        }
    }

    /// Whether this grant carries the administer token of its own level.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        match self {
            Self::Application { .. } => true,
            Self::Organization { types, .. } => {
                types.contains(&PermissionType::AdministerOrganization)
            }
            Self::Project { access, .. } => matches!(access, ProjectAccess::Admin),
            Self::Feed { .. } => false,
        }
    }

    /// Convert back into the raw record shape.
    #[must_use]
    pub fn to_raw(&self) -> RawGrant {
        let mut raw = RawGrant {
            id: Some(self.id().to_string()),
            level: self.level().as_str().to_string(),
            organization_id: self.organization_id().map(ToString::to_string),
            project_id: self.project_id().map(ToString::to_string),
            feed_id: self.feed_id().map(ToString::to_string),
            ..RawGrant::default()
        };
        match self {
            Self::Application { .. } => {
                raw.types = vec![PermissionType::AdministerApplication];
            }
            Self::Organization { types, .. } | Self::Feed { types, .. } => {
                raw.types.clone_from(types);
            }
            Self::Project { access, .. } => match access {
                ProjectAccess::Admin => raw.types = vec![PermissionType::AdministerProject],
                ProjectAccess::Custom { types, feed_scope } => {
                    raw.types.clone_from(types);
                    raw.feed_scope = Some(feed_scope.to_entries());
                }
            },
        }
        raw
    }
}

/// Full lookup key of a grant: `(level, organization, project, feed)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GrantKey {
    /// Grant level
    pub level: GrantLevel,
    /// Organization named by the grant
    pub organization_id: Option<OrganizationId>,
    /// Project named by the grant
    pub project_id: Option<ProjectId>,
    /// Feed named by the grant
    pub feed_id: Option<FeedId>,
}

/// Per-record field checks sharing the record's index and level.
struct FieldChecker<'a> {
    index: usize,
    level: GrantLevel,
    raw: &'a RawGrant,
}

impl FieldChecker<'_> {
    fn forbid(&self, field: &'static str, present: bool) -> Result<(), ValidationError> {
        if present {
            Err(ValidationError::UnexpectedField {
                index: self.index,
                level: self.level,
                field,
            })
        } else {
            Ok(())
        }
    }

    fn require_id<T, E: fmt::Display>(
        &self,
        field: &'static str,
        value: Option<&str>,
        parse: impl Fn(String) -> Result<T, E>,
    ) -> Result<T, ValidationError> {
        let value = value.ok_or(ValidationError::MissingField {
            index: self.index,
            level: self.level,
            field,
        })?;
        parse(value.to_string()).map_err(|e| ValidationError::InvalidId {
            index: self.index,
            field,
            reason: e.to_string(),
        })
    }

    fn optional_id<T, E: fmt::Display>(
        &self,
        field: &'static str,
        value: Option<&str>,
        parse: impl Fn(String) -> Result<T, E>,
    ) -> Result<Option<T>, ValidationError> {
        value
            .map(|_| self.require_id(field, value, parse))
            .transpose()
    }

    /// Administer tokens are only meaningful at the level they administer.
    fn reject_foreign_tokens(&self, types: &[PermissionType]) -> Result<(), ValidationError> {
        match types.iter().find(|token| {
            token
                .administered_level()
                .is_some_and(|administered| administered != self.level)
        }) {
            Some(token) => Err(ValidationError::UnsupportedToken {
                index: self.index,
                level: self.level,
                token: token.clone(),
            }),
            None => Ok(()),
        }
    }

    fn project_access(
        &self,
        project_id: &ProjectId,
        types: Vec<PermissionType>,
    ) -> Result<ProjectAccess, ValidationError> {
        let has_view = types.contains(&PermissionType::ViewFeed);
        let scope = self.raw.feed_scope.as_ref();

        if scope.is_some() && !has_view {
            return Err(ValidationError::UnexpectedField {
                index: self.index,
                level: self.level,
                field: "feedScope",
            });
        }

        if types.contains(&PermissionType::AdministerProject) {
            return Ok(ProjectAccess::Admin);
        }

        let Some(entries) = scope else {
            return Err(ValidationError::MissingFeedScope {
                index: self.index,
                project_id: project_id.to_string(),
            });
        };

        let feed_scope =
            FeedScope::parse(entries).map_err(|source| ValidationError::InvalidFeedScope {
                index: self.index,
                source,
            })?;

        Ok(ProjectAccess::Custom { types, feed_scope })
    }
}

/// Drop repeated tokens, keeping first occurrences in order.
fn dedup(types: &[PermissionType]) -> Vec<PermissionType> {
    let mut out: Vec<PermissionType> = Vec::with_capacity(types.len());
    for token in types {
        if !out.contains(token) {
            out.push(token.clone());
        }
    }
    out
}
