//! CLI commands

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use datatools_core::{AppConfig, Catalog, OrganizationId};
use datatools_permissions::{
    GrantLevel, PermissionEvaluator, PermissionSession, PermissionType, UserSettings,
};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Inputs shared by every command.
pub struct Context {
    pub config: AppConfig,
    pub catalog: Option<Arc<Catalog>>,
}

impl Context {
    fn session(&self) -> PermissionSession {
        match &self.catalog {
            Some(catalog) => PermissionSession::with_catalog(Arc::clone(catalog)),
            None => PermissionSession::new(),
        }
    }

    fn require_catalog(&self) -> Result<&Catalog> {
        self.catalog
            .as_deref()
            .context("this command needs a catalog (--catalog or [catalog] path)")
    }

    /// Load and validate a grant list, falling back to the configured path.
    fn load(&self, grants: Option<&Path>) -> Result<Arc<PermissionEvaluator>> {
        let path = grants
            .or(self.config.session.grants_path.as_deref())
            .context("no grant list given and [session] grants_path is not set")?;

        debug!("Loading grants from {}", path.display());
        let json = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;

        let session = self.session();
        session
            .load_json(&json)
            .with_context(|| format!("invalid grant list {}", path.display()))?;
        Ok(session.snapshot())
    }
}

/// Read a JSON catalog of organizations and projects.
pub fn load_catalog(path: &Path) -> Result<Catalog> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let catalog: Catalog = serde_json::from_str(&json)
        .with_context(|| format!("invalid catalog {}", path.display()))?;
    info!(
        organizations = catalog.organizations().len(),
        projects = catalog.projects().len(),
        "catalog loaded"
    );
    Ok(catalog)
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a grant list and summarize it by level
    Check {
        /// Grant list (JSON array); defaults to [session] grants_path
        grants: Option<PathBuf>,
    },

    /// Answer one permission question for a grant list
    Query {
        /// Grant list (JSON array); defaults to [session] grants_path
        grants: Option<PathBuf>,

        #[command(subcommand)]
        question: Question,
    },

    /// Load a grant list into the settings editor and print it back as grants
    Settings {
        /// Grant list (JSON array); defaults to [session] grants_path
        grants: Option<PathBuf>,

        /// Print the editable draft instead of the serialized grants
        #[arg(long)]
        draft: bool,
    },

    /// List the custom project tokens the settings editor offers
    Tokens,

    /// Write a default configuration file
    InitConfig {
        /// Destination; defaults to the platform config path
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum Question {
    /// Whether the principal administers the application
    ApplicationAdmin,

    /// Whether the principal belongs to an organization
    HasOrganization { organization: String },

    /// Whether the principal administers an organization
    OrganizationAdmin { organization: String },

    /// Whether the principal has any access to a project
    HasProject {
        project: String,

        /// Owning organization, when known
        #[arg(long)]
        organization: Option<String>,
    },

    /// Whether the principal administers a project
    ProjectAdmin {
        project: String,

        /// Owning organization, when known
        #[arg(long)]
        organization: Option<String>,
    },

    /// Custom tokens granted on a project
    Permissions { project: String },

    /// Feeds of a project visible by default
    DefaultFeeds { project: String },

    /// Whether the principal holds a token on one feed
    FeedPermission {
        project: String,
        feed: String,
        permission: String,

        /// Owning organization, when known
        #[arg(long)]
        organization: Option<String>,
    },

    /// Organization of the principal's first organization grant
    Organization,

    /// Catalog projects the principal can open
    Projects,
}

impl Commands {
    /// Run the command and return what it prints.
    pub fn execute(&self, ctx: &Context) -> Result<String> {
        match self {
            Self::Check { grants } => {
                let evaluator = ctx.load(grants.as_deref())?;
                Ok(summarize(&evaluator))
            }
            Self::Query { grants, question } => {
                let evaluator = ctx.load(grants.as_deref())?;
                question.answer(&evaluator, ctx.catalog.as_deref())
            }
            Self::Settings { grants, draft } => {
                let catalog = ctx.require_catalog()?;
                let evaluator = ctx.load(grants.as_deref())?;
                let settings = UserSettings::from_evaluator(&evaluator, catalog);
                if !settings.dropped_grants().is_empty() {
                    warn!(
                        dropped = settings.dropped_grants().len(),
                        "some grants have no settings equivalent and were left out"
                    );
                }
                let json = if *draft {
                    serde_json::to_string_pretty(&settings)?
                } else {
                    serde_json::to_string_pretty(&settings.to_grants())?
                };
                Ok(json)
            }
            Self::Tokens => Ok(PermissionType::project_tokens()
                .iter()
                .map(|token| format!("{}\t{}", token.as_str(), token.display_name()))
                .collect::<Vec<_>>()
                .join("\n")),
            Self::InitConfig { output } => {
                let path = match output {
                    Some(path) => path.clone(),
                    None => AppConfig::config_path()?,
                };
                if path.exists() {
                    bail!("{} already exists", path.display());
                }
                match output {
                    Some(path) => AppConfig::default().save_to(path)?,
                    None => AppConfig::default().save()?,
                }
                info!("Wrote default config to {}", path.display());
                Ok(path.display().to_string())
            }
        }
    }
}

impl Question {
    fn answer(&self, evaluator: &PermissionEvaluator, catalog: Option<&Catalog>) -> Result<String> {
        let answer = match self {
            Self::ApplicationAdmin => evaluator.is_application_admin().to_string(),
            Self::HasOrganization { organization } => {
                evaluator.has_organization(organization).to_string()
            }
            Self::OrganizationAdmin { organization } => {
                evaluator.is_organization_admin(organization).to_string()
            }
            Self::HasProject {
                project,
                organization,
            } => evaluator
                .has_project(project, organization.as_deref())
                .to_string(),
            Self::ProjectAdmin {
                project,
                organization,
            } => evaluator
                .is_project_admin(project, organization.as_deref())
                .to_string(),
            Self::Permissions { project } => evaluator
                .project_permissions(project)
                .iter()
                .map(PermissionType::as_str)
                .collect::<Vec<_>>()
                .join("\n"),
            Self::DefaultFeeds { project } => evaluator
                .project_default_feeds(project)
                .to_entries()
                .join("\n"),
            Self::FeedPermission {
                project,
                feed,
                permission,
                organization,
            } => evaluator
                .has_feed_permission(
                    organization.as_deref(),
                    project,
                    feed,
                    &PermissionType::from(permission.as_str()),
                )
                .to_string(),
            Self::Organization => evaluator
                .organization_id()
                .map(OrganizationId::to_string)
                .unwrap_or_default(),
            Self::Projects => {
                let Some(catalog) = catalog else {
                    bail!("listing projects needs a catalog (--catalog or [catalog] path)");
                };
                evaluator
                    .accessible_projects(catalog)
                    .iter()
                    .map(|project| format!("{}\t{}", project.id, project.name))
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        };
        Ok(answer)
    }
}

fn summarize(evaluator: &PermissionEvaluator) -> String {
    let grants = evaluator.grants();
    let mut out = format!("{} grant(s)\n", grants.len());
    for level in GrantLevel::ALL {
        let _ = writeln!(out, "  {level}: {}", grants.find_by_level(level).count());
    }
    if let Some(organization) = evaluator.organization_id() {
        let _ = writeln!(out, "organization: {organization}");
    }
    let _ = write!(
        out,
        "application admin: {}",
        evaluator.is_application_admin()
    );
    out
}
