//! Read-only catalog of organizations and projects.
//!
//! The catalog is reference data: it answers "which organization owns this
//! project" for callers that do not carry the owning organization around, and
//! lists the projects an organization can see.

use crate::error::DatatoolsError;
use crate::types::{OrganizationId, ProjectId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An organization as known to the console.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    /// Organization identifier
    pub id: OrganizationId,
    /// Display name
    pub name: String,
}

impl Organization {
    /// Create an organization entry.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, DatatoolsError> {
        Ok(Self {
            id: OrganizationId::new(id)?,
            name: name.into(),
        })
    }
}

/// A project, optionally owned by an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Project identifier
    pub id: ProjectId,
    /// Owning organization, if any
    #[serde(default)]
    pub organization_id: Option<OrganizationId>,
    /// Display name
    pub name: String,
}

impl Project {
    /// Create a project entry.
    pub fn new(
        id: impl Into<String>,
        organization_id: Option<&str>,
        name: impl Into<String>,
    ) -> Result<Self, DatatoolsError> {
        Ok(Self {
            id: ProjectId::new(id)?,
            organization_id: organization_id.map(OrganizationId::new).transpose()?,
            name: name.into(),
        })
    }
}

/// Serialized shape of a catalog.
#[derive(Debug, Default, Deserialize)]
struct CatalogData {
    #[serde(default)]
    organizations: Vec<Organization>,
    #[serde(default)]
    projects: Vec<Project>,
}

/// Organizations and projects, indexed by id.
///
/// Entries keep their input order, which is also the order used when
/// listing projects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "CatalogData")]
pub struct Catalog {
    organizations: Vec<Organization>,
    projects: Vec<Project>,
    #[serde(skip)]
    organization_index: HashMap<OrganizationId, usize>,
    #[serde(skip)]
    project_index: HashMap<ProjectId, usize>,
}

impl Catalog {
    /// Build a catalog.
    ///
    /// # Errors
    /// Returns `DatatoolsError::Catalog` if an id appears twice or a project
    /// names an organization that is not in the catalog.
    pub fn new(
        organizations: Vec<Organization>,
        projects: Vec<Project>,
    ) -> Result<Self, DatatoolsError> {
        let mut organization_index = HashMap::with_capacity(organizations.len());
        for (i, org) in organizations.iter().enumerate() {
            if organization_index.insert(org.id.clone(), i).is_some() {
                return Err(DatatoolsError::Catalog(format!(
                    "duplicate organization '{}'",
                    org.id
                )));
            }
        }

        let mut project_index = HashMap::with_capacity(projects.len());
        for (i, project) in projects.iter().enumerate() {
            if let Some(org_id) = &project.organization_id {
                if !organization_index.contains_key(org_id) {
                    return Err(DatatoolsError::Catalog(format!(
                        "project '{}' belongs to unknown organization '{org_id}'",
                        project.id
                    )));
                }
            }
            if project_index.insert(project.id.clone(), i).is_some() {
                return Err(DatatoolsError::Catalog(format!(
                    "duplicate project '{}'",
                    project.id
                )));
            }
        }

        tracing::debug!(
            organizations = organizations.len(),
            projects = projects.len(),
            "catalog loaded"
        );

        Ok(Self {
            organizations,
            projects,
            organization_index,
            project_index,
        })
    }

    /// All organizations in input order.
    #[must_use]
    pub fn organizations(&self) -> &[Organization] {
        &self.organizations
    }

    /// All projects in input order.
    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Look up an organization by id.
    #[must_use]
    pub fn organization(&self, id: &str) -> Option<&Organization> {
        self.organization_index
            .get(id)
            .map(|&i| &self.organizations[i])
    }

    /// Look up a project by id.
    #[must_use]
    pub fn project(&self, id: &str) -> Option<&Project> {
        self.project_index.get(id).map(|&i| &self.projects[i])
    }

    /// Organization owning a project, if the project is known and owned.
    #[must_use]
    pub fn organization_of(&self, project_id: &str) -> Option<&OrganizationId> {
        self.project(project_id)
            .and_then(|project| project.organization_id.as_ref())
    }

    /// Projects visible under an organization selection: those without an
    /// organization, plus those owned by `organization_id` when given.
    pub fn projects_visible_to<'a>(
        &'a self,
        organization_id: Option<&'a str>,
    ) -> impl Iterator<Item = &'a Project> + 'a {
        self.projects
            .iter()
            .filter(move |project| match &project.organization_id {
                None => true,
                Some(owner) => organization_id == Some(owner.as_str()),
            })
    }
}

impl TryFrom<CatalogData> for Catalog {
    type Error = DatatoolsError;

    fn try_from(data: CatalogData) -> Result<Self, Self::Error> {
        Self::new(data.organizations, data.projects)
    }
}
