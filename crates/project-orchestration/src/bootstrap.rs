//! Startup reconciliation between the repository and the store.
//!
//! On a cold store every repository folder is imported. Afterwards the
//! baseline projects are ensured one by one: each is looked up by id and
//! only created, seeded and committed when missing. The store's lookup is the
//! only synchronization needed, so running the pass again after a partial
//! failure never duplicates anything.

use crate::orchestrator::ProjectOrchestrator;
use crate::properties::{APPLICATION_PROPERTIES_FILENAME, ProjectProperties};
use crate::repository::RepositoryEntry;
use crate::{Error, Result};
use chrono::Utc;
use project_store::{Project, ProjectFile, ProjectType, validate_name};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Exponential backoff for repeated bootstrap attempts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Delay after the first failed attempt
    pub initial_delay_ms: u64,
    /// Upper bound for any delay
    pub max_delay_ms: u64,
    /// Total attempts, unbounded when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1_000,
            max_delay_ms: 30_000,
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u64
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u64::MAX);
        let millis = self
            .initial_delay_ms
            .saturating_mul(factor)
            .min(self.max_delay_ms);
        Duration::from_millis(millis)
    }

    /// Whether another attempt may follow failed attempt number `attempt`
    pub fn allows_retry(&self, attempt: u32) -> bool {
        self.max_attempts.is_none_or(|max| attempt < max)
    }
}

/// Outcome of ensuring one baseline project
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaselineOutcome {
    /// The project was already in the store
    AlreadyPresent,
    /// The project was created, seeded and committed
    Created,
    /// Creation failed; the message describes why
    Failed(String),
}

/// What one bootstrap pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Whether the store was empty and a full import ran
    pub full_import: bool,
    /// Number of repository folders imported
    pub imported: usize,
    /// Outcome per baseline project, in ensure order
    pub baselines: Vec<(ProjectType, BaselineOutcome)>,
}

impl BootstrapReport {
    /// Outcome for one baseline type
    pub fn outcome(&self, project_type: ProjectType) -> Option<&BaselineOutcome> {
        self.baselines
            .iter()
            .find(|(ty, _)| *ty == project_type)
            .map(|(_, outcome)| outcome)
    }
}

/// Derive the store project for a repository folder
///
/// Baseline folders map onto their fixed baseline project; any other folder
/// takes its metadata from `application.properties`.
pub(crate) fn project_from_entry(entry: &RepositoryEntry) -> Project {
    let project = match ProjectType::baseline_for_folder(&entry.name) {
        Some(project_type) => Project::baseline(project_type),
        None => {
            let properties = entry
                .file(APPLICATION_PROPERTIES_FILENAME)
                .map(|file| ProjectProperties::parse(&file.body))
                .unwrap_or_default();
            Project::new(
                &entry.name,
                properties.name,
                properties.description,
                properties.runtime,
            )
        }
    };
    project.with_commit(&entry.commit_id, entry.last_commit_timestamp)
}

impl ProjectOrchestrator {
    /// Run the bootstrap pass once
    ///
    /// Fails with [`Error::NotReady`] while the store or the repository is
    /// unavailable; the readiness gate then stays closed. Otherwise the gate
    /// is opened, even if individual baseline steps failed.
    pub async fn try_start(&self) -> Result<BootstrapReport> {
        if !self.store.is_ready() {
            return Err(Error::NotReady("project store is not ready".to_string()));
        }
        if !self.repository.check_reachable().await {
            return Err(Error::NotReady("repository is not reachable".to_string()));
        }

        let mut report = BootstrapReport::default();
        if self.store.list_projects().await?.is_empty() {
            info!("Project store is empty, importing all projects from the repository");
            report.full_import = true;
            report.imported = self.import_all_projects().await;
        } else {
            debug!("Project store is populated, skipping full import");
        }

        for project_type in ProjectType::BASELINE {
            let outcome = match self.ensure_baseline(project_type).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!("Error during {} project creation: {}", project_type, e);
                    BaselineOutcome::Failed(e.to_string())
                }
            };
            report.baselines.push((project_type, outcome));
        }

        if self.readiness.mark_ready() {
            info!("Projects are ready");
        }
        Ok(report)
    }

    /// Run the bootstrap pass until it succeeds or the policy gives up
    pub async fn start_with_retry(&self, policy: &RetryPolicy) -> Result<BootstrapReport> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.try_start().await {
                Ok(report) => return Ok(report),
                Err(e) if policy.allows_retry(attempt) => {
                    let delay = policy.delay_for(attempt);
                    warn!(
                        "Bootstrap attempt {} failed: {}; retrying in {:?}",
                        attempt, e, delay
                    );
                    smol::Timer::after(delay).await;
                }
                Err(e) => {
                    error!("Bootstrap gave up after {} attempt(s): {}", attempt, e);
                    return Err(e);
                }
            }
        }
    }

    /// Import every repository folder; returns how many were imported
    async fn import_all_projects(&self) -> usize {
        let entries = match self.repository.list_importable_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error during project import: {}", e);
                return 0;
            }
        };

        let mut imported = 0;
        for entry in &entries {
            match self.import_entry(entry).await {
                Ok(project) => {
                    debug!("Imported project {}", project.id);
                    imported += 1;
                }
                Err(e) => error!("Error importing project {}: {}", entry.name, e),
            }
        }
        info!("Imported {} of {} project(s)", imported, entries.len());
        imported
    }

    /// Persist the project derived from an entry together with its files
    ///
    /// Nothing is persisted when the folder or any of its file names is not
    /// a plain name.
    pub(crate) async fn import_entry(&self, entry: &RepositoryEntry) -> Result<Project> {
        validate_name("project id", &entry.name)?;
        for file in &entry.files {
            validate_name("file name", &file.name)?;
        }

        let project = project_from_entry(entry);
        self.store.save_project(&project).await?;
        for file in entry.project_files() {
            self.store.save_project_file(&file).await?;
        }
        Ok(project)
    }

    /// Create a baseline project unless it exists
    async fn ensure_baseline(&self, project_type: ProjectType) -> Result<BaselineOutcome> {
        let id = project_type.as_str();
        if self.store.get_project(id).await?.is_some() {
            debug!("Baseline project {} already exists", id);
            return Ok(BaselineOutcome::AlreadyPresent);
        }

        info!("Adding {} project", id);
        let project = Project::baseline(project_type);
        self.store.save_project(&project).await?;

        let (files, message) = match project_type {
            ProjectType::Templates => (self.templates.template_files().await?, "Add default templates"),
            ProjectType::Services => (self.templates.service_files().await?, "Add services"),
            _ => (BTreeMap::new(), "Add custom kamelets"),
        };
        let timestamp = Utc::now().timestamp_millis();
        for (name, code) in files {
            self.store
                .save_project_file(&ProjectFile::new(name, code, id, timestamp))
                .await?;
        }

        self.commit_and_push(id, message).await?;
        Ok(BaselineOutcome::Created)
    }
}
