//! Query surface over a [`GrantSet`].
//!
//! Precedence, applied by every query:
//!
//! | Holder | Effect |
//! |--------|--------|
//! | application admin | every query is true |
//! | organization admin | every project/feed query inside that organization is true |
//! | project admin | every feed query inside that project is true |
//! | custom project grant | listed tokens on the whole project; `view-feed` only inside its feed scope |
//! | feed grant | listed tokens on that one feed |
//!
//! Queries take plain `&str` ids and never fail: an id nobody granted
//! anything on simply has no access.

use crate::grant::{Grant, GrantLevel, ProjectAccess, RawGrant};
use crate::grant_set::GrantSet;
use crate::scope::FeedScope;
use crate::{PermissionType, ValidationError};
use datatools_core::{Catalog, OrganizationId, Project};
use std::sync::Arc;

/// Answers authorization questions for one principal.
///
/// Immutable and cheap to query; share it behind an `Arc` and build a new one
/// when the grants change.
#[derive(Debug, Clone, Default)]
pub struct PermissionEvaluator {
    grants: GrantSet,
    catalog: Option<Arc<Catalog>>,
}

impl PermissionEvaluator {
    /// Evaluator over `grants`.
    #[must_use]
    pub fn new(grants: GrantSet) -> Self {
        Self {
            grants,
            catalog: None,
        }
    }

    /// Evaluator that also consults `catalog` to find the organization of a
    /// project when the caller does not pass one.
    #[must_use]
    pub fn with_catalog(grants: GrantSet, catalog: Arc<Catalog>) -> Self {
        Self {
            grants,
            catalog: Some(catalog),
        }
    }

    /// Validate `raw` and wrap it.
    pub fn from_raw(raw: &[RawGrant]) -> Result<Self, ValidationError> {
        Ok(Self::new(GrantSet::new(raw)?))
    }

    /// Validate `raw` against `catalog` and wrap both.
    pub fn from_raw_with_catalog(
        raw: &[RawGrant],
        catalog: Arc<Catalog>,
    ) -> Result<Self, ValidationError> {
        let grants = GrantSet::with_catalog(raw, &catalog)?;
        Ok(Self::with_catalog(grants, catalog))
    }

    /// The underlying grants.
    #[must_use]
    pub fn grants(&self) -> &GrantSet {
        &self.grants
    }

    /// The catalog used for organization lookups, if any.
    #[must_use]
    pub fn catalog(&self) -> Option<&Catalog> {
        self.catalog.as_deref()
    }

    /// True iff the principal holds an administer-application grant.
    #[must_use]
    pub fn is_application_admin(&self) -> bool {
        self.grants.application_admin().is_some()
    }

    /// True if the principal belongs to `organization_id`, as member or admin.
    #[must_use]
    pub fn has_organization(&self, organization_id: &str) -> bool {
        self.is_application_admin()
            || self
                .grants
                .organization_grants(organization_id)
                .next()
                .is_some()
    }

    /// True if the principal administers `organization_id`.
    #[must_use]
    pub fn is_organization_admin(&self, organization_id: &str) -> bool {
        self.is_application_admin()
            || self
                .grants
                .organization_grants(organization_id)
                .any(Grant::is_admin)
    }

    /// True if the principal has any access to `project_id`.
    ///
    /// `organization_id` is the project's owner when the caller knows it.
    #[must_use]
    pub fn has_project(&self, project_id: &str, organization_id: Option<&str>) -> bool {
        self.administers_owner(project_id, organization_id)
            || self.grants.project_grants(project_id).next().is_some()
    }

    /// True if the principal administers `project_id`, directly or through
    /// its organization or the application.
    #[must_use]
    pub fn is_project_admin(&self, project_id: &str, organization_id: Option<&str>) -> bool {
        self.administers_owner(project_id, organization_id)
            || self.grants.project_grants(project_id).any(Grant::is_admin)
    }

    /// Custom tokens granted on `project_id`, in grant order.
    ///
    /// Empty when there is no project grant and also when access comes from
    /// an admin grant: admin implies every token, so callers check
    /// [`Self::is_project_admin`] first.
    #[must_use]
    pub fn project_permissions(&self, project_id: &str) -> Vec<PermissionType> {
        if self.is_project_admin(project_id, None) {
            return Vec::new();
        }

        let mut tokens: Vec<PermissionType> = Vec::new();
        for (types, _) in self.custom_access(project_id) {
            for token in types {
                if !tokens.contains(token) {
                    tokens.push(token.clone());
                }
            }
        }
        tokens
    }

    /// Feeds of `project_id` the principal sees by default.
    ///
    /// Admin access of any kind yields [`FeedScope::All`]; no access yields
    /// the empty scope.
    #[must_use]
    pub fn project_default_feeds(&self, project_id: &str) -> FeedScope {
        if self.is_project_admin(project_id, None) {
            return FeedScope::All;
        }

        self.custom_access(project_id)
            .fold(FeedScope::none(), |scope, (_, feed_scope)| {
                scope.union(feed_scope)
            })
    }

    /// True if the principal may exercise `permission` on one feed.
    ///
    /// `view-feed` is checked against the feed scope of the project grant;
    /// any other custom token covers every feed of the project once granted.
    /// Feed-level grants add tokens on their single feed.
    #[must_use]
    pub fn has_feed_permission(
        &self,
        organization_id: Option<&str>,
        project_id: &str,
        feed_id: &str,
        permission: &PermissionType,
    ) -> bool {
        if self.is_project_admin(project_id, organization_id) {
            return true;
        }

        let project_wide = self
            .custom_access(project_id)
            .any(|(types, feed_scope)| {
                types.contains(permission)
                    && (*permission != PermissionType::ViewFeed || feed_scope.matches(feed_id))
            });

        project_wide
            || self
                .grants
                .feed_grants(project_id, feed_id)
                .any(|grant| match grant {
                    Grant::Feed { types, .. } => types.contains(permission),
                    _ => false,
                })
    }

    /// Organization of the principal's first organization-level grant.
    #[must_use]
    pub fn organization_id(&self) -> Option<&OrganizationId> {
        self.grants
            .find_by_level(GrantLevel::Organization)
            .find_map(Grant::organization_id)
    }

    /// Catalog projects the principal can open, in catalog order.
    #[must_use]
    pub fn accessible_projects<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Project> {
        catalog
            .projects()
            .iter()
            .filter(|project| {
                self.has_project(
                    project.id.as_str(),
                    project.organization_id.as_ref().map(OrganizationId::as_str),
                )
            })
            .collect()
    }

    /// Application admin, or admin of the organization owning the project.
    fn administers_owner(&self, project_id: &str, organization_id: Option<&str>) -> bool {
        if self.is_application_admin() {
            return true;
        }
        self.resolve_organization(project_id, organization_id)
            .is_some_and(|owner| self.is_organization_admin(owner))
    }

    /// Owner of a project: the caller's value, else the catalog's, else the
    /// one declared by the principal's own grants.
    fn resolve_organization<'a>(
        &'a self,
        project_id: &str,
        organization_id: Option<&'a str>,
    ) -> Option<&'a str> {
        organization_id
            .or_else(|| {
                self.catalog
                    .as_deref()
                    .and_then(|catalog| catalog.organization_of(project_id))
                    .map(OrganizationId::as_str)
            })
            .or_else(|| {
                self.grants
                    .declared_organization(project_id)
                    .map(OrganizationId::as_str)
            })
    }

    /// Custom project grants for `project_id` as `(types, feed_scope)` pairs.
    fn custom_access<'a>(
        &'a self,
        project_id: &str,
    ) -> impl Iterator<Item = (&'a [PermissionType], &'a FeedScope)> + 'a {
        self.grants
            .project_grants(project_id)
            .filter_map(|grant| match grant {
                Grant::Project {
                    access: ProjectAccess::Custom { types, feed_scope },
                    ..
                } => Some((types.as_slice(), feed_scope)),
                _ => None,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datatools_core::Organization;

    fn evaluator(raw: &[RawGrant]) -> PermissionEvaluator {
        PermissionEvaluator::from_raw(raw).expect("valid grants")
    }

    fn view(project: &str, scope: &[&str]) -> RawGrant {
        RawGrant::project(project)
            .with_types([PermissionType::ViewFeed])
            .with_feed_scope(scope.iter().copied())
    }

    #[test]
    fn test_application_admin_overrides_everything() {
        let eval = evaluator(&[RawGrant::application()]);

        assert!(eval.is_application_admin());
        assert!(eval.has_organization("any-org"));
        assert!(eval.is_organization_admin("any-org"));
        assert!(eval.has_project("any-project", None));
        assert!(eval.is_project_admin("any-project", Some("any-org")));
        assert!(eval.has_feed_permission(
            None,
            "any-project",
            "any-feed",
            &PermissionType::ApproveGtfs
        ));
        assert!(eval.project_default_feeds("any-project").is_all());
        assert!(eval.project_permissions("any-project").is_empty());
    }

    #[test]
    fn test_organization_member_is_not_admin() {
        let eval = evaluator(&[RawGrant::organization("org1")]);

        assert!(eval.has_organization("org1"));
        assert!(!eval.is_organization_admin("org1"));
        assert!(!eval.has_organization("org2"));
        assert!(!eval.has_project("p1", Some("org1")));
        assert_eq!(
            eval.organization_id().map(OrganizationId::as_str),
            Some("org1")
        );
    }

    #[test]
    fn test_organization_admin_scoped_to_its_organization() {
        let eval = evaluator(&[
            RawGrant::organization("org1").with_types([PermissionType::AdministerOrganization])
        ]);

        assert!(eval.is_project_admin("p1", Some("org1")));
        assert!(!eval.is_project_admin("p1", Some("org2")));
        assert!(!eval.is_project_admin("p1", None));
        assert!(eval.has_feed_permission(Some("org1"), "p1", "f1", &PermissionType::EditGtfs));
        assert!(!eval.has_feed_permission(Some("org2"), "p1", "f1", &PermissionType::EditGtfs));
    }

    #[test]
    fn test_organization_resolved_from_catalog() {
        let catalog = Arc::new(
            Catalog::new(
                vec![Organization::new("org1", "Metro").expect("valid org")],
                vec![Project::new("p1", Some("org1"), "Bus").expect("valid project")],
            )
            .expect("valid catalog"),
        );
        let eval = PermissionEvaluator::from_raw_with_catalog(
            &[RawGrant::organization("org1").with_types([PermissionType::AdministerOrganization])],
            catalog,
        )
        .expect("valid grants");

        assert!(eval.is_project_admin("p1", None));
        assert!(eval.project_default_feeds("p1").is_all());
        assert!(!eval.is_project_admin("p2", None));
    }

    #[test]
    fn test_organization_resolved_from_declared_grants() {
        let eval = evaluator(&[
            RawGrant::organization("org1").with_types([PermissionType::AdministerOrganization]),
            RawGrant::feed("p5", "f1")
                .in_organization("org1")
                .with_types([PermissionType::ManageFeed]),
        ]);

        assert!(eval.is_project_admin("p5", None));
    }

    #[test]
    fn test_custom_project_access() {
        let eval = evaluator(&[RawGrant::project("p1")
            .with_types([PermissionType::ViewFeed, PermissionType::EditGtfs])
            .with_feed_scope(["f1"])]);

        assert!(eval.has_project("p1", None));
        assert!(!eval.is_project_admin("p1", None));
        assert_eq!(
            eval.project_permissions("p1"),
            vec![PermissionType::ViewFeed, PermissionType::EditGtfs]
        );
        assert_eq!(eval.project_default_feeds("p1").to_entries(), vec!["f1"]);

        // view-feed is scope-gated
        assert!(eval.has_feed_permission(None, "p1", "f1", &PermissionType::ViewFeed));
        assert!(!eval.has_feed_permission(None, "p1", "f2", &PermissionType::ViewFeed));

        // other tokens are project-wide
        assert!(eval.has_feed_permission(None, "p1", "f2", &PermissionType::EditGtfs));
        assert!(!eval.has_feed_permission(None, "p1", "f1", &PermissionType::ManageFeed));
    }

    #[test]
    fn test_multiple_project_grants_merge() {
        let eval = evaluator(&[
            view("p1", &["f1"]),
            RawGrant::project("p1")
                .with_types([PermissionType::ViewFeed, PermissionType::ManageFeed])
                .with_feed_scope(["f2"]),
        ]);

        assert_eq!(
            eval.project_permissions("p1"),
            vec![PermissionType::ViewFeed, PermissionType::ManageFeed]
        );
        assert_eq!(
            eval.project_default_feeds("p1").to_entries(),
            vec!["f1", "f2"]
        );
        assert!(eval.has_feed_permission(None, "p1", "f2", &PermissionType::ViewFeed));
    }

    #[test]
    fn test_admin_grant_dominates_custom_grant() {
        let eval = evaluator(&[
            view("p1", &["f1"]),
            RawGrant::project("p1").with_types([PermissionType::AdministerProject]),
        ]);

        assert!(eval.is_project_admin("p1", None));
        assert!(eval.project_permissions("p1").is_empty());
        assert!(eval.project_default_feeds("p1").is_all());
        assert!(eval.has_feed_permission(None, "p1", "f9", &PermissionType::ViewFeed));
    }

    #[test]
    fn test_feed_level_grant() {
        let eval = evaluator(&[RawGrant::feed("p1", "f1").with_types([PermissionType::ManageFeed])]);

        assert!(eval.has_feed_permission(None, "p1", "f1", &PermissionType::ManageFeed));
        assert!(!eval.has_feed_permission(None, "p1", "f2", &PermissionType::ManageFeed));
        assert!(!eval.has_feed_permission(None, "p1", "f1", &PermissionType::EditGtfs));
        assert!(!eval.has_project("p1", None));
    }

    #[test]
    fn test_unknown_token_behaves_as_custom() {
        let token = PermissionType::from("publish-deployment");
        let eval = evaluator(&[RawGrant::project("p1")
            .with_types([PermissionType::ViewFeed, token.clone()])
            .with_feed_scope(["*"])]);

        assert!(eval.has_feed_permission(None, "p1", "f1", &token));
    }

    #[test]
    fn test_accessible_projects() {
        let catalog = Catalog::new(
            vec![Organization::new("org1", "Metro").expect("valid org")],
            vec![
                Project::new("p1", Some("org1"), "Bus").expect("valid project"),
                Project::new("p2", None, "Shared").expect("valid project"),
                Project::new("p3", None, "Private").expect("valid project"),
            ],
        )
        .expect("valid catalog");
        let eval = evaluator(&[view("p2", &["*"])]);

        let ids: Vec<&str> = eval
            .accessible_projects(&catalog)
            .into_iter()
            .map(|p| p.id.as_str())
            .collect();
        assert_eq!(ids, vec!["p2"]);
    }

    #[test]
    fn test_unknown_ids_have_no_access() {
        let eval = evaluator(&[view("p1", &["f1"])]);

        assert!(!eval.has_organization(""));
        assert!(!eval.has_project("no such project", None));
        assert!(eval.project_permissions("*").is_empty());
        assert!(eval.project_default_feeds("ghost").is_empty());
        assert!(!eval.has_feed_permission(Some("x"), "ghost", "f1", &PermissionType::ViewFeed));
    }
}
