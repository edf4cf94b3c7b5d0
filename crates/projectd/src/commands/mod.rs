//! Subcommand implementations
//!
//! Every subcommand is a one-shot process working on the persistent store
//! named in the configuration. The store is locked while a command runs, so
//! commands against the same store run one at a time.

pub mod bootstrap;
pub mod projects;
pub mod runtime;

use anyhow::{Context, Result, bail};
use project_orchestration::{OrchestratorBuilder, OrchestratorConfig, Project, ProjectOrchestrator};
use std::path::Path;

/// Load the configuration file
pub async fn load_config(config_path: &Path) -> Result<OrchestratorConfig> {
    OrchestratorConfig::from_file(config_path)
        .await
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))
}

/// Configuration and orchestrator builder over the configured persistent store
pub async fn builder(config_path: &Path) -> Result<(OrchestratorConfig, OrchestratorBuilder)> {
    let config = load_config(config_path).await?;
    let Some(store_path) = config.store.path.clone() else {
        bail!("store.path must be set in {}", config_path.display());
    };

    let builder = OrchestratorBuilder::from_config(&config)
        .await
        .with_context(|| {
            format!(
                "Failed to open the project store at {} (is another projectd command running?)",
                store_path.display()
            )
        })?;
    Ok((config, builder))
}

/// Orchestrator over the store as it is, without a bootstrap pass
pub async fn orchestrator(config_path: &Path) -> Result<ProjectOrchestrator> {
    let (_, builder) = builder(config_path).await?;
    Ok(builder.build())
}

/// Finish a builder and run one bootstrap pass
pub async fn ready(builder: OrchestratorBuilder) -> Result<ProjectOrchestrator> {
    let orchestrator = builder.build();
    orchestrator
        .try_start()
        .await
        .context("Projects are not ready, run `projectd bootstrap` to wait for the repository")?;
    Ok(orchestrator)
}

/// Orchestrator that has completed a bootstrap pass
pub async fn ready_orchestrator(config_path: &Path) -> Result<ProjectOrchestrator> {
    let (_, builder) = builder(config_path).await?;
    ready(builder).await
}

/// Project from the store, an error if it does not exist
pub async fn project(orchestrator: &ProjectOrchestrator, project_id: &str) -> Result<Project> {
    orchestrator
        .store()
        .get_project(project_id)
        .await?
        .with_context(|| format!("Project {project_id} not found"))
}
