use super::{orchestrator, ready_orchestrator};
use anyhow::{Result, bail};
use comfy_table::{Cell, Table};
use project_orchestration::ProjectType;
use std::path::Path;

pub async fn list(config_path: &Path, project_type: Option<ProjectType>, format: &str) -> Result<()> {
    if format != "table" && format != "json" {
        bail!("Invalid format: {}. Must be 'table' or 'json'", format);
    }

    let orchestrator = orchestrator(config_path).await?;
    let projects = orchestrator.list_projects(project_type).await?;

    if format == "json" {
        println!("{}", serde_json::to_string_pretty(&projects)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["ID", "Name", "Type", "Runtime", "Last commit"]);
    for project in &projects {
        let commit = project.last_commit.get(..8).unwrap_or(project.last_commit.as_str());
        table.add_row(vec![
            Cell::new(&project.id),
            Cell::new(&project.name),
            Cell::new(project.project_type),
            Cell::new(&project.runtime),
            Cell::new(commit),
        ]);
    }
    println!("{table}");
    Ok(())
}

pub async fn import(config_path: &Path, project_id: &str) -> Result<()> {
    let orchestrator = ready_orchestrator(config_path).await?;

    match orchestrator.import_project(project_id).await {
        Some(project) => println!("Imported {} ({})", project.id, project.name),
        None => bail!("Failed to import {project_id}, see the log for details"),
    }
    Ok(())
}

pub async fn commit(config_path: &Path, project_id: &str, message: &str) -> Result<()> {
    let orchestrator = ready_orchestrator(config_path).await?;

    let project = orchestrator.commit_and_push(project_id, message).await?;
    println!("Committed {} as {}", project.id, project.last_commit);
    Ok(())
}

pub async fn set_image(
    config_path: &Path,
    project_id: &str,
    image: &str,
    commit: bool,
    message: &str,
) -> Result<()> {
    let orchestrator = ready_orchestrator(config_path).await?;

    if orchestrator.get_descriptor(project_id).await?.is_none() {
        bail!("Project {project_id} has no runtime descriptor");
    }
    orchestrator.set_image(project_id, image, commit, message).await?;
    println!("Set image of {project_id} to {image}");
    Ok(())
}

pub async fn port(config_path: &Path, project_id: &str) -> Result<()> {
    let orchestrator = orchestrator(config_path).await?;

    match orchestrator.get_port(project_id).await? {
        Some(port) => println!("{port}"),
        None => bail!("Project {project_id} exposes no host port"),
    }
    Ok(())
}
