use super::{builder, orchestrator, project, ready, ready_orchestrator};
use anyhow::Result;
use project_orchestration::ChannelPublisher;
use std::path::Path;
use std::sync::Arc;

pub async fn run(config_path: &Path, project_id: &str, options: &str) -> Result<()> {
    let (_, builder) = builder(config_path).await?;
    let publisher = Arc::new(ChannelPublisher::new());
    let events = publisher.subscribe();
    let orchestrator = ready(builder.publisher(publisher)).await?;
    let project = project(&orchestrator, project_id).await?;

    let started = orchestrator.run_dev_mode(&project, options).await;
    while let Ok(status) = events.try_recv() {
        println!("{}", serde_json::to_string(&status)?);
    }

    match started? {
        Some(id) => println!("Started dev-mode container for {id}"),
        None => println!("Dev-mode container for {project_id} is already running or starting"),
    }
    Ok(())
}

pub async fn build(config_path: &Path, project_id: &str, tag: Option<&str>) -> Result<()> {
    let orchestrator = ready_orchestrator(config_path).await?;
    let project = project(&orchestrator, project_id).await?;

    let tag = orchestrator.build(&project, tag).await?;
    println!("Started build of {project_id} with tag {tag}");
    Ok(())
}

pub async fn status(config_path: &Path, project_id: &str) -> Result<()> {
    let orchestrator = orchestrator(config_path).await?;

    match orchestrator.container_status(project_id).await? {
        Some(status) => println!("{}", serde_json::to_string_pretty(&status)?),
        None => println!("No container status for {project_id}"),
    }
    Ok(())
}
