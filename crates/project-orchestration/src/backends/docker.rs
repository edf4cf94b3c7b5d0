//! Local container engine backend driving the `docker` CLI.

use super::{LocalBackend, PROJECT_LABEL, TYPE_LABEL, run_tool};
use crate::command::Command;
use crate::config::LocalSettings;
use crate::{Error, Result};
use async_trait::async_trait;
use project_store::{Project, ProjectFile, validate_name};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where project files are mounted inside dev-mode containers
pub const CONTAINER_CODE_DIR: &str = "/code";
/// Where the build script is mounted inside build containers
pub const CONTAINER_SCRIPT_PATH: &str = "/scripts/builder.sh";

/// Existing container found by name
#[derive(Debug)]
struct ExistingContainer {
    id: String,
    is_running: bool,
}

/// Backend for a local Docker engine
///
/// Dev-mode containers are named after the project. Project files are
/// staged under the configured work directory and bind-mounted read-only.
pub struct DockerBackend {
    settings: LocalSettings,
}

impl DockerBackend {
    /// Create a backend from local engine settings
    pub fn new(settings: LocalSettings) -> Self {
        Self { settings }
    }

    fn docker() -> Command {
        Command::new("docker")
    }

    /// Look up a container by exact name
    async fn detect_existing_container(&self, name: &str) -> Result<Option<ExistingContainer>> {
        let mut ps_cmd = Self::docker();
        ps_cmd.args([
            "ps",
            "-a",
            "--filter",
            &format!("name=^{name}$"),
            "--format",
            "{{.ID}}|{{.State}}",
        ]);

        let output = run_tool(&ps_cmd).await?;
        Ok(output
            .lines()
            .next()
            .and_then(|line| line.trim().split_once('|'))
            .map(|(id, state)| ExistingContainer {
                id: id.to_string(),
                is_running: state == "running",
            }))
    }

    async fn remove_container(&self, name: &str) {
        let mut rm_cmd = Self::docker();
        rm_cmd.args(["rm", "-f", name]);
        if let Err(e) = run_tool(&rm_cmd).await {
            warn!("Failed to remove container {}: {}", name, e);
        }
    }

    /// Replace the staging directory of `name` with the given files
    ///
    /// The staging folder and every file name must be plain names; nothing
    /// is removed or written otherwise.
    async fn stage(&self, name: &str, files: &[(&str, &str)]) -> Result<PathBuf> {
        validate_name("staging folder", name)
            .and_then(|()| {
                files
                    .iter()
                    .try_for_each(|(file_name, _)| validate_name("file name", file_name))
            })
            .map_err(|e| Error::Backend(e.to_string()))?;

        let dir = self.settings.work_dir.join(name);
        match async_fs::remove_dir_all(&dir).await {
            Err(e) if e.kind() != ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        async_fs::create_dir_all(&dir).await?;

        for (file_name, code) in files {
            async_fs::write(dir.join(file_name), code).await?;
        }
        debug!("Staged {} file(s) in {:?}", files.len(), dir);
        Ok(dir)
    }

    fn common_args(&self, name: &str, project_id: &str, container_type: &str) -> Vec<String> {
        let mut args = vec![
            "run".to_string(),
            "-d".to_string(),
            "--name".to_string(),
            name.to_string(),
            "--label".to_string(),
            format!("{PROJECT_LABEL}={project_id}"),
            "--label".to_string(),
            format!("{TYPE_LABEL}={container_type}"),
        ];
        if let Some(network) = &self.settings.network {
            args.extend(["--network".to_string(), network.clone()]);
        }
        args
    }

    /// Arguments of `docker run` for a dev-mode container
    fn dev_mode_args(
        &self,
        project_id: &str,
        options: &str,
        ports: &BTreeMap<u16, u16>,
        code_dir: &Path,
        volumes: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let mut args = self.common_args(project_id, project_id, "devmode");

        args.extend(["-e".to_string(), format!("PROJECT_ID={project_id}")]);
        if !options.trim().is_empty() {
            args.extend(["-e".to_string(), format!("JBANG_OPTIONS={}", options.trim())]);
        }
        for (host, container) in ports {
            args.extend(["-p".to_string(), format!("{host}:{container}")]);
        }
        args.extend([
            "-v".to_string(),
            format!("{}:{CONTAINER_CODE_DIR}:ro", code_dir.display()),
        ]);
        for (host, container) in volumes {
            args.extend(["-v".to_string(), format!("{host}:{container}")]);
        }

        args.push(self.settings.devmode_image.clone());
        args
    }

    /// Arguments of `docker run` for a build container
    fn build_args(
        &self,
        project: &Project,
        name: &str,
        build_dir: &Path,
        volumes: &BTreeMap<String, String>,
    ) -> Vec<String> {
        let mut args = self.common_args(name, &project.id, "build");

        // Environment goes through a file so credentials stay off the command line
        args.extend([
            "--env-file".to_string(),
            build_dir.join("build.env").display().to_string(),
            "-v".to_string(),
            format!(
                "{}:{CONTAINER_SCRIPT_PATH}:ro",
                build_dir.join("builder.sh").display()
            ),
        ]);
        for (host, container) in volumes {
            args.extend(["-v".to_string(), format!("{host}:{container}")]);
        }

        args.extend([
            "--entrypoint".to_string(),
            "/bin/bash".to_string(),
            self.settings.builder_image.clone(),
            CONTAINER_SCRIPT_PATH.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl LocalBackend for DockerBackend {
    async fn run_dev_mode_container(
        &self,
        project_id: &str,
        options: &str,
        ports: &BTreeMap<u16, u16>,
        files: &[ProjectFile],
        volumes: &BTreeMap<String, String>,
    ) -> Result<()> {
        info!("Starting dev-mode container for {}", project_id);

        if let Some(existing) = self.detect_existing_container(project_id).await? {
            if existing.is_running {
                info!(
                    "Container {} is already running as {}, keeping it",
                    project_id, existing.id
                );
                return Ok(());
            }
            info!("Removing stopped container {} ({})", project_id, existing.id);
            self.remove_container(project_id).await;
        }

        let staged: Vec<(&str, &str)> = files
            .iter()
            .map(|f| (f.name.as_str(), f.code.as_str()))
            .collect();
        let code_dir = self.stage(project_id, &staged).await?;

        let mut cmd = Self::docker();
        cmd.args(self.dev_mode_args(project_id, options, ports, &code_dir, volumes));
        let container_id = run_tool(&cmd).await?;

        info!(
            "Started dev-mode container {} with id {}",
            project_id,
            container_id.trim()
        );
        Ok(())
    }

    async fn run_build(
        &self,
        project: &Project,
        script: &str,
        env: &[String],
        volumes: &BTreeMap<String, String>,
        tag: &str,
    ) -> Result<()> {
        let name = format!("{}-build", project.id);
        info!("Starting build {} of {} with tag {}", name, project.id, tag);

        self.remove_container(&name).await;

        let env_file = env.join("\n");
        let build_dir = self
            .stage(&name, &[("builder.sh", script), ("build.env", env_file.as_str())])
            .await?;

        let mut cmd = Self::docker();
        cmd.args(self.build_args(project, &name, &build_dir, volumes));
        let container_id = run_tool(&cmd).await?;

        info!("Started build container {} with id {}", name, container_id.trim());
        Ok(())
    }
}
