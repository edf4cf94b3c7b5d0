//! Execution backends for dev-mode containers and builds.
//!
//! Exactly one backend is active per process, chosen from the deployment
//! mode at startup. The cluster variant only needs the project: pods fetch
//! what they need themselves. The local variant receives the staged files,
//! port mapping and volumes from the orchestrator.

mod docker;
mod kubectl;

pub use docker::DockerBackend;
pub use kubectl::KubectlBackend;

use crate::command::Command;
use crate::{Error, Result};
use async_trait::async_trait;
use project_store::{Project, ProjectFile};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Label key carrying the project id on containers and pods
pub(crate) const PROJECT_LABEL: &str = "projectd.project";
/// Label key carrying the container type on containers and pods
pub(crate) const TYPE_LABEL: &str = "projectd.type";

/// Backend running containers on a cluster orchestrator
#[async_trait]
pub trait ClusterBackend: Send + Sync {
    /// Start the dev-mode container of a project
    async fn run_dev_mode_container(&self, project: &Project, options: &str) -> Result<()>;

    /// Start a build of a project
    async fn run_build(
        &self,
        project: &Project,
        script: &str,
        env: &[String],
        tag: &str,
    ) -> Result<()>;
}

/// Backend running containers on a local container engine
#[async_trait]
pub trait LocalBackend: Send + Sync {
    /// Start the dev-mode container of a project
    ///
    /// `ports` maps host ports to container ports, `volumes` host paths to
    /// container paths.
    async fn run_dev_mode_container(
        &self,
        project_id: &str,
        options: &str,
        ports: &BTreeMap<u16, u16>,
        files: &[ProjectFile],
        volumes: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Start a build of a project
    async fn run_build(
        &self,
        project: &Project,
        script: &str,
        env: &[String],
        volumes: &BTreeMap<String, String>,
        tag: &str,
    ) -> Result<()>;
}

/// The active execution backend
#[derive(Clone)]
pub enum ExecutionBackend {
    /// Cluster orchestrator
    Cluster(Arc<dyn ClusterBackend>),
    /// Local container engine
    Local(Arc<dyn LocalBackend>),
}

impl ExecutionBackend {
    /// Whether the local engine is active
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// Short name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Cluster(_) => "cluster",
            Self::Local(_) => "local",
        }
    }
}

/// Run a backend tool, mapping a non-zero exit to a backend error
pub(crate) async fn run_tool(cmd: &Command) -> Result<String> {
    let output = cmd.output().await.map_err(|e| {
        Error::Backend(format!(
            "failed to launch {}: {e}",
            cmd.get_program().to_string_lossy()
        ))
    })?;
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(Error::Backend(format!(
            "{} {} failed: {}",
            cmd.get_program().to_string_lossy(),
            cmd.get_args()
                .first()
                .map(|a| a.to_string_lossy().into_owned())
                .unwrap_or_default(),
            output.stderr.trim()
        )))
    }
}
