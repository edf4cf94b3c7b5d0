use super::builder;
use anyhow::{Context, Result};
use project_orchestration::BaselineOutcome;
use std::path::Path;
use tracing::{info, warn};

pub async fn run(config_path: &Path) -> Result<()> {
    let (config, builder) = builder(config_path).await?;
    let orchestrator = builder.build();

    let report = orchestrator
        .start_with_retry(&config.bootstrap)
        .await
        .context("Bootstrap failed")?;

    if report.full_import {
        info!("Imported {} project(s) from the repository", report.imported);
    }
    for (project_type, outcome) in &report.baselines {
        match outcome {
            BaselineOutcome::Failed(reason) => {
                warn!("Baseline project {} failed: {}", project_type, reason)
            }
            outcome => info!("Baseline project {}: {:?}", project_type, outcome),
        }
    }

    let health = orchestrator.health();
    println!(
        "{} {} in environment {}",
        health.name,
        if health.up { "ready" } else { "not ready" },
        orchestrator.environment()
    );
    Ok(())
}
