//! Editable draft of a principal's access, used when an administrator edits
//! another user.
//!
//! A draft is read from a [`PermissionEvaluator`] and the catalog, changed
//! through the setters below, and written back as a grant list with
//! [`UserSettings::to_grants`]. The output always passes
//! [`crate::GrantSet`] validation.
//!
//! The draft holds one organization and one entry per catalog project, so
//! feed-level grants, grants on projects outside the catalog and memberships
//! of other organizations are dropped when a draft is read. Each dropped grant
//! is logged and listed by [`UserSettings::dropped_grants`].

use crate::evaluator::PermissionEvaluator;
use crate::grant::{Grant, GrantId, RawGrant};
use crate::scope::FeedScope;
use crate::PermissionType;
use datatools_core::{Catalog, FeedId, OrganizationId, Project, ProjectId};
use serde::{Deserialize, Serialize};
use std::iter;
use tracing::{debug, warn};

/// Access a principal has to one project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    /// No access
    None,
    /// `administer-project`
    Admin,
    /// Restricted tokens with a default feed scope
    Custom,
}

/// Draft access to one catalog project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSettings {
    /// Project being edited
    pub project_id: ProjectId,
    /// Owning organization from the catalog
    pub organization_id: Option<OrganizationId>,
    /// Kind of access
    pub access: AccessLevel,
    /// Feeds reached by `view-feed` when access is custom
    pub default_feeds: FeedScope,
    /// Custom tokens other than `view-feed`
    pub permissions: Vec<PermissionType>,
}

impl ProjectSettings {
    fn no_access(project: &Project) -> Self {
        Self {
            project_id: project.id.clone(),
            organization_id: project.organization_id.clone(),
            access: AccessLevel::None,
            default_feeds: FeedScope::none(),
            permissions: Vec::new(),
        }
    }

    fn to_grant(&self) -> Option<RawGrant> {
        let mut grant = RawGrant::project(self.project_id.as_str());
        if let Some(org) = &self.organization_id {
            grant = grant.in_organization(org.as_str());
        }

        match self.access {
            AccessLevel::None => None,
            AccessLevel::Admin => Some(grant.with_types([PermissionType::AdministerProject])),
            // View access is always explicit, even when it reaches every feed.
            AccessLevel::Custom => Some(
                grant
                    .with_types(
                        iter::once(PermissionType::ViewFeed).chain(self.permissions.iter().cloned()),
                    )
                    .with_feed_scope(self.default_feeds.to_entries()),
            ),
        }
    }
}

/// Draft of one principal's application, organization and project access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSettings {
    application_admin: bool,
    organization: Option<OrganizationId>,
    organization_admin: bool,
    projects: Vec<ProjectSettings>,
    #[serde(skip)]
    dropped: Vec<GrantId>,
}

impl UserSettings {
    /// Read the current access of the principal behind `evaluator`, one entry
    /// per catalog project.
    #[must_use]
    pub fn from_evaluator(evaluator: &PermissionEvaluator, catalog: &Catalog) -> Self {
        let application_admin = evaluator.is_application_admin();

        let organization = if application_admin {
            None
        } else {
            catalog
                .organizations()
                .iter()
                .rev()
                .find(|org| evaluator.has_organization(org.id.as_str()))
                .map(|org| org.id.clone())
        };
        let dropped = unrepresentable(evaluator, catalog, organization.as_ref());
        let organization_admin = organization
            .as_ref()
            .is_some_and(|org| evaluator.is_organization_admin(org.as_str()));

        let projects = catalog
            .projects()
            .iter()
            .map(|project| {
                let mut settings = ProjectSettings::no_access(project);
                let owner = project.organization_id.as_ref().map(OrganizationId::as_str);

                if evaluator.is_project_admin(project.id.as_str(), owner) {
                    settings.access = AccessLevel::Admin;
                } else if evaluator.has_project(project.id.as_str(), owner) {
                    settings.access = AccessLevel::Custom;
                    settings.default_feeds = evaluator.project_default_feeds(project.id.as_str());
                    settings.permissions = evaluator
                        .project_permissions(project.id.as_str())
                        .into_iter()
                        .filter(|token| *token != PermissionType::ViewFeed)
                        .collect();
                }
                settings
            })
            .collect();

        Self {
            application_admin,
            organization,
            organization_admin,
            projects,
            dropped,
        }
    }

    /// Empty draft for a user being created by `creator`. The organization
    /// defaults to the creator's own when the catalog knows it.
    #[must_use]
    pub fn for_new_user(creator: &PermissionEvaluator, catalog: &Catalog) -> Self {
        let organization = creator
            .organization_id()
            .filter(|org| catalog.organization(org.as_str()).is_some())
            .cloned();

        Self {
            application_admin: false,
            organization,
            organization_admin: false,
            projects: catalog
                .projects()
                .iter()
                .map(ProjectSettings::no_access)
                .collect(),
            dropped: Vec::new(),
        }
    }

    /// Grants of the source principal the draft could not represent.
    #[must_use]
    pub fn dropped_grants(&self) -> &[GrantId] {
        &self.dropped
    }

    /// Whether the draft grants application admin.
    #[must_use]
    pub fn is_application_admin(&self) -> bool {
        self.application_admin
    }

    /// Selected organization.
    #[must_use]
    pub fn organization(&self) -> Option<&OrganizationId> {
        self.organization.as_ref()
    }

    /// Whether the draft administers the selected organization.
    #[must_use]
    pub fn is_organization_admin(&self) -> bool {
        self.organization_admin
    }

    /// Per-project drafts in catalog order.
    #[must_use]
    pub fn projects(&self) -> &[ProjectSettings] {
        &self.projects
    }

    /// Draft for one project.
    #[must_use]
    pub fn project(&self, project_id: &str) -> Option<&ProjectSettings> {
        self.projects
            .iter()
            .find(|p| p.project_id.as_str() == project_id)
    }

    /// Toggle application admin. Turning it on drops the organization
    /// selection and organization admin.
    pub fn set_application_admin(&mut self, checked: bool) {
        self.application_admin = checked;
        if checked {
            self.organization = None;
            self.organization_admin = false;
        }
    }

    /// Change the selected organization. Organization admin is cleared and
    /// every project goes back to no access.
    pub fn select_organization(&mut self, organization: Option<OrganizationId>) {
        debug!(organization = ?organization.as_ref().map(OrganizationId::as_str), "organization selected");
        self.organization = organization;
        self.organization_admin = false;
        for project in &mut self.projects {
            project.access = AccessLevel::None;
            project.default_feeds = FeedScope::none();
            project.permissions.clear();
        }
    }

    /// Toggle organization admin. Ignored while no organization is selected.
    pub fn set_organization_admin(&mut self, checked: bool) {
        if self.organization.is_none() {
            debug!("no organization selected, ignoring organization admin toggle");
            return;
        }
        self.organization_admin = checked;
    }

    /// Change the access kind of a project. Entering custom access from
    /// another kind starts from every feed and no extra tokens.
    pub fn set_project_access(&mut self, project_id: &str, access: AccessLevel) {
        let Some(project) = self.project_mut(project_id) else {
            return;
        };
        if access == AccessLevel::Custom && project.access != AccessLevel::Custom {
            project.default_feeds = FeedScope::All;
            project.permissions.clear();
        }
        project.access = access;
    }

    /// Add or remove one feed from a project's default feeds.
    ///
    /// A single feed cannot be removed from the wildcard; doing so resets the
    /// scope to no feeds.
    pub fn set_project_feed(&mut self, project_id: &str, feed: FeedId, include: bool) {
        let Some(project) = self.project_mut(project_id) else {
            return;
        };
        if include {
            project.default_feeds.insert(feed);
        } else if project.default_feeds.is_all() {
            warn!(
                project = project_id,
                feed = feed.as_str(),
                "cannot exclude one feed from all feeds, resetting default feeds to none"
            );
            project.default_feeds = FeedScope::none();
        } else {
            project.default_feeds.remove(feed.as_str());
        }
    }

    /// Replace a project's default feeds.
    pub fn set_project_feeds(&mut self, project_id: &str, scope: FeedScope) {
        if let Some(project) = self.project_mut(project_id) {
            project.default_feeds = scope;
        }
    }

    /// Add or remove one custom token on a project.
    ///
    /// `view-feed` is governed by the default feeds and administer tokens are
    /// not custom tokens; both are ignored here.
    pub fn set_project_permission(
        &mut self,
        project_id: &str,
        permission: PermissionType,
        include: bool,
    ) {
        if permission == PermissionType::ViewFeed || permission.is_administer() {
            warn!(
                token = permission.as_str(),
                "token is not a custom project permission, ignoring"
            );
            return;
        }
        let Some(project) = self.project_mut(project_id) else {
            return;
        };
        let present = project.permissions.contains(&permission);
        if include && !present {
            project.permissions.push(permission);
        } else if !include {
            project.permissions.retain(|token| *token != permission);
        }
    }

    /// Catalog projects offered for editing under the selected organization:
    /// those without an organization plus those of the selected one.
    #[must_use]
    pub fn visible_projects<'a>(&'a self, catalog: &'a Catalog) -> Vec<&'a Project> {
        catalog
            .projects_visible_to(self.organization.as_ref().map(OrganizationId::as_str))
            .collect()
    }

    /// Serialize the draft as a grant list.
    ///
    /// Application admin short-circuits to a single grant. Otherwise the list
    /// holds at most one organization grant followed by one grant per project
    /// with access.
    ///
    /// Grants listed by [`Self::dropped_grants`] are not part of the output,
    /// so a principal holding any of them answers differently once the
    /// output replaces their grants.
    #[must_use]
    pub fn to_grants(&self) -> Vec<RawGrant> {
        if self.application_admin {
            return vec![RawGrant::application()];
        }

        let organization = self.organization.as_ref().map(|org| {
            let grant = RawGrant::organization(org.as_str());
            if self.organization_admin {
                grant.with_types([PermissionType::AdministerOrganization])
            } else {
                grant
            }
        });

        organization
            .into_iter()
            .chain(self.projects.iter().filter_map(ProjectSettings::to_grant))
            .collect()
    }

    fn project_mut(&mut self, project_id: &str) -> Option<&mut ProjectSettings> {
        let project = self
            .projects
            .iter_mut()
            .find(|p| p.project_id.as_str() == project_id);
        if project.is_none() {
            warn!(project = project_id, "project not in catalog, ignoring edit");
        }
        project
    }
}

/// Grants a draft cannot hold, logged one by one.
fn unrepresentable(
    evaluator: &PermissionEvaluator,
    catalog: &Catalog,
    organization: Option<&OrganizationId>,
) -> Vec<GrantId> {
    if evaluator.is_application_admin() {
        return Vec::new();
    }

    evaluator
        .grants()
        .iter()
        .filter(|grant| {
            let reason = match grant {
                Grant::Feed { .. } => Some("feed-level grant"),
                Grant::Project { project_id, .. }
                    if catalog.project(project_id.as_str()).is_none() =>
                {
                    Some("project not in catalog")
                }
                Grant::Organization {
                    organization_id, ..
                } if Some(organization_id) != organization => Some("organization not selected"),
                _ => None,
            };
            if let Some(reason) = reason {
                warn!(
                    grant = grant.id().as_str(),
                    level = %grant.level(),
                    reason,
                    "grant cannot be represented in user settings, dropping"
                );
            }
            reason.is_some()
        })
        .map(|grant| grant.id().clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant_set::GrantSet;
    use datatools_core::Organization;

    fn catalog() -> Catalog {
        Catalog::new(
            vec![
                Organization::new("org1", "Metro").expect("valid org"),
                Organization::new("org2", "Rail").expect("valid org"),
            ],
            vec![
                Project::new("p1", Some("org1"), "Bus").expect("valid project"),
                Project::new("p2", Some("org2"), "Rail").expect("valid project"),
                Project::new("p3", None, "Shared").expect("valid project"),
            ],
        )
        .expect("valid catalog")
    }

    fn settings_for(raw: &[RawGrant]) -> UserSettings {
        let eval = PermissionEvaluator::from_raw(raw).expect("valid grants");
        UserSettings::from_evaluator(&eval, &catalog())
    }

    fn feed(id: &str) -> FeedId {
        FeedId::new(id).expect("valid feed id")
    }

    #[test]
    fn test_from_empty_evaluator() {
        let settings = settings_for(&[]);
        assert!(!settings.is_application_admin());
        assert!(settings.organization().is_none());
        assert!(settings
            .projects()
            .iter()
            .all(|p| p.access == AccessLevel::None));
        assert!(settings.to_grants().is_empty());
    }

    #[test]
    fn test_from_custom_grants() {
        let settings = settings_for(&[
            RawGrant::organization("org1"),
            RawGrant::project("p1")
                .in_organization("org1")
                .with_types([PermissionType::ViewFeed, PermissionType::EditGtfs])
                .with_feed_scope(["f1"]),
        ]);

        assert_eq!(settings.organization().map(OrganizationId::as_str), Some("org1"));
        assert!(!settings.is_organization_admin());

        let p1 = settings.project("p1").expect("p1 in catalog");
        assert_eq!(p1.access, AccessLevel::Custom);
        assert_eq!(p1.permissions, vec![PermissionType::EditGtfs]);
        assert_eq!(p1.default_feeds.to_entries(), vec!["f1"]);

        assert_eq!(
            settings.project("p3").map(|p| p.access),
            Some(AccessLevel::None)
        );
    }

    #[test]
    fn test_application_admin_serialization() {
        let mut settings = settings_for(&[RawGrant::organization("org1")]);
        settings.set_application_admin(true);

        assert!(settings.organization().is_none());
        let grants = settings.to_grants();
        assert_eq!(grants, vec![RawGrant::application()]);
    }

    #[test]
    fn test_select_organization_resets_projects() {
        let mut settings = settings_for(&[
            RawGrant::organization("org1").with_types([PermissionType::AdministerOrganization])
        ]);
        assert!(settings.is_organization_admin());
        assert_eq!(settings.project("p1").map(|p| p.access), Some(AccessLevel::Admin));

        settings.select_organization(Some(OrganizationId::new("org2").expect("valid id")));
        assert!(!settings.is_organization_admin());
        assert!(settings
            .projects()
            .iter()
            .all(|p| p.access == AccessLevel::None));

        let catalog = catalog();
        let visible: Vec<&str> = settings
            .visible_projects(&catalog)
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(visible, vec!["p2", "p3"]);
    }

    #[test]
    fn test_organization_admin_requires_selection() {
        let mut settings = settings_for(&[]);
        settings.set_organization_admin(true);
        assert!(!settings.is_organization_admin());
    }

    #[test]
    fn test_custom_access_starts_with_all_feeds() {
        let mut settings = settings_for(&[]);
        settings.set_project_access("p3", AccessLevel::Custom);

        let grants = settings.to_grants();
        assert_eq!(grants.len(), 1);
        assert_eq!(grants[0].types, vec![PermissionType::ViewFeed]);
        assert_eq!(grants[0].feed_scope, Some(vec!["*".to_string()]));
    }

    #[test]
    fn test_feed_and_permission_edits() {
        let mut settings = settings_for(&[]);
        settings.set_project_access("p3", AccessLevel::Custom);
        settings.set_project_feeds("p3", FeedScope::none());
        settings.set_project_feed("p3", feed("f1"), true);
        settings.set_project_feed("p3", feed("f2"), true);
        settings.set_project_feed("p3", feed("f1"), false);
        settings.set_project_permission("p3", PermissionType::ManageFeed, true);
        settings.set_project_permission("p3", PermissionType::ManageFeed, true);
        settings.set_project_permission("p3", PermissionType::ViewFeed, false);
        settings.set_project_permission("p3", PermissionType::AdministerProject, true);

        let p3 = settings.project("p3").expect("p3 in catalog");
        assert_eq!(p3.default_feeds.to_entries(), vec!["f2"]);
        assert_eq!(p3.permissions, vec![PermissionType::ManageFeed]);

        settings.set_project_permission("p3", PermissionType::ManageFeed, false);
        assert!(settings.project("p3").expect("p3").permissions.is_empty());
    }

    #[test]
    fn test_exclude_from_wildcard_resets_scope() {
        let mut settings = settings_for(&[]);
        settings.set_project_access("p3", AccessLevel::Custom);
        settings.set_project_feed("p3", feed("f1"), false);

        assert!(settings.project("p3").expect("p3").default_feeds.is_empty());
    }

    #[test]
    fn test_unknown_project_edit_ignored() {
        let mut settings = settings_for(&[]);
        let before = settings.clone();
        settings.set_project_access("nope", AccessLevel::Admin);
        assert_eq!(settings, before);
    }

    #[test]
    fn test_serialized_grants_validate() {
        let mut settings = settings_for(&[]);
        settings.select_organization(Some(OrganizationId::new("org1").expect("valid id")));
        settings.set_organization_admin(true);
        settings.set_project_access("p1", AccessLevel::Admin);
        settings.set_project_access("p3", AccessLevel::Custom);
        settings.set_project_permission("p3", PermissionType::EditGtfs, true);

        let grants = settings.to_grants();
        assert_eq!(grants.len(), 3);
        assert_eq!(grants[0].level, "organization");
        assert_eq!(
            grants[0].types,
            vec![PermissionType::AdministerOrganization]
        );
        assert_eq!(grants[1].organization_id.as_deref(), Some("org1"));

        let set = GrantSet::with_catalog(&grants, &catalog()).expect("serialized grants validate");
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_last_organization_selected() {
        let settings = settings_for(&[
            RawGrant::organization("org1").with_types([PermissionType::AdministerOrganization]),
            RawGrant::organization("org2"),
        ]);

        assert_eq!(settings.organization().map(OrganizationId::as_str), Some("org2"));
        assert!(!settings.is_organization_admin());
        assert_eq!(settings.dropped_grants().len(), 1);
        // Projects of the other administered organization keep admin access.
        assert_eq!(settings.project("p1").map(|p| p.access), Some(AccessLevel::Admin));
    }

    #[test]
    fn test_unrepresentable_grants_reported() {
        let settings = settings_for(&[
            RawGrant::organization("org1").with_id("membership"),
            RawGrant::feed("p1", "f1")
                .with_id("feed-grant")
                .with_types([PermissionType::ManageFeed]),
            RawGrant::project("outside")
                .with_id("outside-grant")
                .with_types([PermissionType::AdministerProject]),
        ]);

        let dropped: Vec<&str> = settings
            .dropped_grants()
            .iter()
            .map(GrantId::as_str)
            .collect();
        assert_eq!(dropped, vec!["feed-grant", "outside-grant"]);
        assert_eq!(
            settings.to_grants(),
            vec![RawGrant::organization("org1")]
        );
    }

    #[test]
    fn test_application_admin_drops_nothing() {
        let settings = settings_for(&[
            RawGrant::application(),
            RawGrant::feed("p1", "f1").with_types([PermissionType::EditGtfs]),
        ]);
        assert!(settings.dropped_grants().is_empty());
        assert_eq!(settings.to_grants(), vec![RawGrant::application()]);
    }

    #[test]
    fn test_new_user_defaults_to_creator_organization() {
        let catalog = catalog();
        let creator = PermissionEvaluator::from_raw(&[
            RawGrant::organization("org2").with_types([PermissionType::AdministerOrganization])
        ])
        .expect("valid grants");

        let settings = UserSettings::for_new_user(&creator, &catalog);
        assert_eq!(settings.organization().map(OrganizationId::as_str), Some("org2"));
        assert!(!settings.is_organization_admin());
        assert!(!settings.is_application_admin());
        assert_eq!(settings.projects().len(), 3);
        assert!(settings
            .projects()
            .iter()
            .all(|p| p.access == AccessLevel::None));
        assert_eq!(settings.to_grants(), vec![RawGrant::organization("org2")]);

        let app_admin = PermissionEvaluator::from_raw(&[RawGrant::application()])
            .expect("valid grants");
        assert!(UserSettings::for_new_user(&app_admin, &catalog)
            .organization()
            .is_none());

        let stranger = PermissionEvaluator::from_raw(&[RawGrant::organization("elsewhere")])
            .expect("valid grants");
        assert!(UserSettings::for_new_user(&stranger, &catalog)
            .organization()
            .is_none());
    }
}
