//! Validated, indexed, immutable collection of one principal's grants.

use crate::grant::{Grant, GrantKey, GrantLevel, RawGrant};
use crate::{Result, ValidationError};
use datatools_core::{Catalog, FeedId, OrganizationId, ProjectId};
use std::collections::HashMap;
use tracing::{debug, warn};

/// The grants of one principal.
///
/// Construction is the only fallible step. Once built, a `GrantSet` never
/// changes: a new grant list means a new `GrantSet`. Grants keep their input
/// order for iteration; every lookup goes through a hash index.
#[derive(Debug, Clone, Default)]
pub struct GrantSet {
    grants: Vec<Grant>,
    by_key: HashMap<GrantKey, Vec<usize>>,
    by_level: HashMap<GrantLevel, Vec<usize>>,
    application_admin: Option<usize>,
    by_organization: HashMap<OrganizationId, Vec<usize>>,
    by_project: HashMap<ProjectId, Vec<usize>>,
    by_feed: HashMap<ProjectId, HashMap<FeedId, Vec<usize>>>,
    project_organizations: HashMap<ProjectId, OrganizationId>,
}

impl GrantSet {
    /// A set with no grants: every query answers "no access".
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Validate and index a raw grant list.
    ///
    /// # Errors
    /// Returns the first [`ValidationError`] found, in input order.
    pub fn new(raw: &[RawGrant]) -> std::result::Result<Self, ValidationError> {
        Self::build(raw, None)
    }

    /// Like [`GrantSet::new`], additionally checking every declared
    /// project → organization link against the catalog.
    pub fn with_catalog(
        raw: &[RawGrant],
        catalog: &Catalog,
    ) -> std::result::Result<Self, ValidationError> {
        Self::build(raw, Some(catalog))
    }

    /// Parse a JSON array of grant records and validate it.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: Vec<RawGrant> = serde_json::from_str(json)?;
        Ok(Self::new(&raw)?)
    }

    fn build(
        raw: &[RawGrant],
        catalog: Option<&Catalog>,
    ) -> std::result::Result<Self, ValidationError> {
        let result = Self::index(raw, catalog);
        match &result {
            Ok(set) => debug!(
                grants = set.len(),
                application = set.level_count(GrantLevel::Application),
                organization = set.level_count(GrantLevel::Organization),
                project = set.level_count(GrantLevel::Project),
                feed = set.level_count(GrantLevel::Feed),
                "grant set constructed"
            ),
            Err(err) => warn!(error = %err, "rejecting grant list"),
        }
        result
    }

    fn index(
        raw: &[RawGrant],
        catalog: Option<&Catalog>,
    ) -> std::result::Result<Self, ValidationError> {
        let mut set = Self {
            grants: Vec::with_capacity(raw.len()),
            ..Self::default()
        };

        for (index, record) in raw.iter().enumerate() {
            let grant = Grant::from_raw(index, record)?;

            if let Grant::Application { .. } = grant {
                if let Some(first) = set.application_admin {
                    return Err(ValidationError::DuplicateApplicationAdmin {
                        first,
                        second: index,
                    });
                }
                set.application_admin = Some(index);
            }

            set.check_chain(index, &grant, catalog)?;

            match &grant {
                Grant::Application { .. } => {}
                Grant::Organization {
                    organization_id, ..
                } => push(&mut set.by_organization, organization_id.clone(), index),
                Grant::Project { project_id, .. } => {
                    push(&mut set.by_project, project_id.clone(), index);
                }
                Grant::Feed {
                    project_id,
                    feed_id,
                    ..
                } => push(
                    set.by_feed.entry(project_id.clone()).or_default(),
                    feed_id.clone(),
                    index,
                ),
            }
            push(&mut set.by_key, grant.key(), index);
            push(&mut set.by_level, grant.level(), index);
            set.grants.push(grant);
        }

        Ok(set)
    }

    /// Every grant naming a project must agree on its organization, with the
    /// catalog and with earlier grants, whenever both sides are known.
    fn check_chain(
        &mut self,
        index: usize,
        grant: &Grant,
        catalog: Option<&Catalog>,
    ) -> std::result::Result<(), ValidationError> {
        let (Some(project_id), Some(declared)) = (grant.project_id(), grant.organization_id())
        else {
            return Ok(());
        };

        let known = catalog
            .and_then(|catalog| catalog.organization_of(project_id.as_str()))
            .or_else(|| self.project_organizations.get(project_id));

        if let Some(expected) = known {
            if expected != declared {
                return Err(ValidationError::InconsistentChain {
                    index,
                    project_id: project_id.to_string(),
                    declared: declared.to_string(),
                    expected: expected.to_string(),
                });
            }
        }

        self.project_organizations
            .entry(project_id.clone())
            .or_insert_with(|| declared.clone());
        Ok(())
    }

    /// Number of grants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Whether the set holds no grants.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    /// All grants in input order.
    pub fn iter(&self) -> impl Iterator<Item = &Grant> {
        self.grants.iter()
    }

    /// Grants at `level`, in input order.
    pub fn find_by_level(&self, level: GrantLevel) -> impl Iterator<Item = &Grant> {
        self.resolve(self.by_level.get(&level))
    }

    /// Grants with exactly this `(level, organization, project, feed)` key.
    pub fn find(&self, key: &GrantKey) -> impl Iterator<Item = &Grant> {
        self.resolve(self.by_key.get(key))
    }

    /// The administer-application grant, if present.
    #[must_use]
    pub fn application_admin(&self) -> Option<&Grant> {
        self.application_admin.map(|i| &self.grants[i])
    }

    /// Organization-level grants for `organization_id`.
    pub fn organization_grants(&self, organization_id: &str) -> impl Iterator<Item = &Grant> {
        self.resolve(self.by_organization.get(organization_id))
    }

    /// Project-level grants for `project_id`.
    pub fn project_grants(&self, project_id: &str) -> impl Iterator<Item = &Grant> {
        self.resolve(self.by_project.get(project_id))
    }

    /// Feed-level grants for one feed of a project.
    pub fn feed_grants(&self, project_id: &str, feed_id: &str) -> impl Iterator<Item = &Grant> {
        self.resolve(
            self.by_feed
                .get(project_id)
                .and_then(|feeds| feeds.get(feed_id)),
        )
    }

    /// Organization the grants declare for `project_id`, if any grant does.
    #[must_use]
    pub fn declared_organization(&self, project_id: &str) -> Option<&OrganizationId> {
        self.project_organizations.get(project_id)
    }

    fn level_count(&self, level: GrantLevel) -> usize {
        self.by_level.get(&level).map_or(0, Vec::len)
    }

    fn resolve<'a>(&'a self, indices: Option<&'a Vec<usize>>) -> impl Iterator<Item = &'a Grant> {
        indices
            .into_iter()
            .flatten()
            .map(move |&i| &self.grants[i])
    }
}

fn push<K: std::hash::Hash + Eq>(map: &mut HashMap<K, Vec<usize>>, key: K, index: usize) {
    map.entry(key).or_default().push(index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PermissionError, PermissionType};
    use datatools_core::{Organization, Project};

    fn custom(project: &str, scope: &[&str]) -> RawGrant {
        RawGrant::project(project)
            .with_types([PermissionType::ViewFeed])
            .with_feed_scope(scope.iter().copied())
    }

    #[test]
    fn test_empty_set() {
        let set = GrantSet::new(&[]).expect("empty list is valid");
        assert!(set.is_empty());
        assert!(set.application_admin().is_none());
        assert_eq!(set.find_by_level(GrantLevel::Project).count(), 0);
    }

    #[test]
    fn test_find_by_level_preserves_order() {
        let set = GrantSet::new(&[
            custom("p2", &["*"]),
            RawGrant::organization("org1"),
            custom("p1", &["f1"]),
        ])
        .expect("valid grants");

        let projects: Vec<&str> = set
            .find_by_level(GrantLevel::Project)
            .filter_map(|g| g.project_id().map(ProjectId::as_str))
            .collect();
        assert_eq!(projects, vec!["p2", "p1"]);
        assert_eq!(set.find_by_level(GrantLevel::Organization).count(), 1);
        assert_eq!(set.find_by_level(GrantLevel::Feed).count(), 0);
    }

    #[test]
    fn test_find_by_key() {
        let set = GrantSet::new(&[
            RawGrant::feed("p1", "f1")
                .in_organization("org1")
                .with_types([PermissionType::ManageFeed]),
            RawGrant::feed("p1", "f2")
                .in_organization("org1")
                .with_types([PermissionType::ViewFeed]),
        ])
        .expect("valid grants");

        let key = GrantKey {
            level: GrantLevel::Feed,
            organization_id: Some(OrganizationId::new("org1").expect("valid id")),
            project_id: Some(ProjectId::new("p1").expect("valid id")),
            feed_id: Some(FeedId::new("f2").expect("valid id")),
        };
        let found: Vec<&Grant> = set.find(&key).collect();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].feed_id().map(FeedId::as_str), Some("f2"));

        assert_eq!(set.feed_grants("p1", "f1").count(), 1);
        assert_eq!(set.feed_grants("p1", "f3").count(), 0);
        assert_eq!(set.feed_grants("p9", "f1").count(), 0);
    }

    #[test]
    fn test_duplicate_application_admin_rejected() {
        let result = GrantSet::new(&[
            RawGrant::application(),
            RawGrant::organization("org1"),
            RawGrant::application(),
        ]);
        assert_eq!(
            result.expect_err("two application admins"),
            ValidationError::DuplicateApplicationAdmin {
                first: 0,
                second: 2
            }
        );
    }

    #[test]
    fn test_inconsistent_chain_between_grants() {
        let result = GrantSet::new(&[
            custom("p1", &["*"]).in_organization("org1"),
            RawGrant::feed("p1", "f1")
                .in_organization("org2")
                .with_types([PermissionType::EditGtfs]),
        ]);
        assert!(matches!(
            result,
            Err(ValidationError::InconsistentChain { index: 1, .. })
        ));
    }

    #[test]
    fn test_undeclared_organization_is_consistent() {
        let set = GrantSet::new(&[
            custom("p1", &["*"]).in_organization("org1"),
            RawGrant::feed("p1", "f1").with_types([PermissionType::EditGtfs]),
        ])
        .expect("omitted organization is not a conflict");
        assert_eq!(
            set.declared_organization("p1").map(OrganizationId::as_str),
            Some("org1")
        );
    }

    #[test]
    fn test_inconsistent_chain_against_catalog() {
        let catalog = Catalog::new(
            vec![
                Organization::new("org1", "Metro").expect("valid org"),
                Organization::new("org2", "Rail").expect("valid org"),
            ],
            vec![Project::new("p1", Some("org1"), "Bus").expect("valid project")],
        )
        .expect("valid catalog");

        let grants = [custom("p1", &["*"]).in_organization("org2")];
        let err = GrantSet::with_catalog(&grants, &catalog).expect_err("catalog disagrees");
        assert_eq!(
            err,
            ValidationError::InconsistentChain {
                index: 0,
                project_id: "p1".to_string(),
                declared: "org2".to_string(),
                expected: "org1".to_string(),
            }
        );

        // Without a catalog there is nothing to contradict.
        assert!(GrantSet::new(&grants).is_ok());
    }

    #[test]
    fn test_first_error_wins() {
        let result = GrantSet::new(&[
            RawGrant::organization("org1"),
            RawGrant::project("p1").with_types([PermissionType::EditGtfs]),
            RawGrant {
                level: "galaxy".to_string(),
                ..RawGrant::default()
            },
        ]);
        assert!(matches!(
            result,
            Err(ValidationError::MissingFeedScope { index: 1, .. })
        ));
    }

    #[test]
    fn test_from_json() {
        let json = r#"[
            {"level": "organization", "organizationId": "org1", "types": ["administer-organization"]},
            {"level": "project", "projectId": "p1", "types": ["view-feed"], "feedScope": ["f1"]}
        ]"#;
        let set = GrantSet::from_json(json).expect("valid grant json");
        assert_eq!(set.len(), 2);
        assert_eq!(set.organization_grants("org1").count(), 1);
        assert_eq!(set.project_grants("p1").count(), 1);
    }

    #[test]
    fn test_from_json_errors() {
        assert!(matches!(
            GrantSet::from_json("{not json"),
            Err(PermissionError::Serialization(_))
        ));
        assert!(matches!(
            GrantSet::from_json(r#"[{"level": "team"}]"#),
            Err(PermissionError::Validation(ValidationError::UnknownLevel { .. }))
        ));
    }
}
