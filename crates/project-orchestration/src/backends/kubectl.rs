//! Cluster backend driving the `kubectl` CLI.

use super::{ClusterBackend, PROJECT_LABEL, TYPE_LABEL, run_tool};
use crate::command::Command;
use crate::config::ClusterSettings;
use crate::Result;
use async_trait::async_trait;
use project_store::Project;
use tracing::info;

/// Backend creating bare pods in one namespace
pub struct KubectlBackend {
    settings: ClusterSettings,
}

/// Pod names must be lowercase DNS labels
fn pod_name(parts: &[&str]) -> String {
    parts
        .join("-")
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '-' })
        .collect()
}

impl KubectlBackend {
    /// Create a backend from cluster settings
    pub fn new(settings: ClusterSettings) -> Self {
        Self { settings }
    }

    fn kubectl(&self) -> Command {
        let mut cmd = Command::new("kubectl");
        cmd.args(["--namespace", &self.settings.namespace]);
        cmd
    }

    async fn delete_pod(&self, name: &str) -> Result<()> {
        let mut cmd = self.kubectl();
        cmd.args(["delete", "pod", name, "--ignore-not-found", "--wait=true"]);
        run_tool(&cmd).await?;
        Ok(())
    }

    /// Arguments of `kubectl run` after the namespace
    fn run_args(
        &self,
        pod: &str,
        project_id: &str,
        container_type: &str,
        image: &str,
    ) -> Vec<String> {
        vec![
            "run".to_string(),
            pod.to_string(),
            format!("--image={image}"),
            "--restart=Never".to_string(),
            format!("--labels={PROJECT_LABEL}={project_id},{TYPE_LABEL}={container_type}"),
        ]
    }

    /// `kubectl run` for a pod, environment entries kept out of logs
    fn run_command(
        &self,
        pod: &str,
        project_id: &str,
        container_type: &str,
        image: &str,
        env: &[String],
    ) -> Command {
        let mut cmd = self.kubectl();
        cmd.args(self.run_args(pod, project_id, container_type, image));
        for entry in env {
            cmd.masked_arg(format!("--env={entry}"));
        }
        cmd
    }
}

#[async_trait]
impl ClusterBackend for KubectlBackend {
    async fn run_dev_mode_container(&self, project: &Project, options: &str) -> Result<()> {
        let pod = pod_name(&[&project.id]);
        info!("Starting dev-mode pod {} in {}", pod, self.settings.namespace);

        self.delete_pod(&pod).await?;

        let mut env = vec![format!("PROJECT_ID={}", project.id)];
        if !options.trim().is_empty() {
            env.push(format!("JBANG_OPTIONS={}", options.trim()));
        }

        let cmd = self.run_command(
            &pod,
            &project.id,
            "devmode",
            &self.settings.devmode_image,
            &env,
        );
        run_tool(&cmd).await?;
        Ok(())
    }

    async fn run_build(
        &self,
        project: &Project,
        script: &str,
        env: &[String],
        tag: &str,
    ) -> Result<()> {
        let pod = pod_name(&[&project.id, "build", tag]);
        info!("Starting build pod {} in {}", pod, self.settings.namespace);

        self.delete_pod(&pod).await?;

        let mut cmd = self.run_command(
            &pod,
            &project.id,
            "build",
            &self.settings.builder_image,
            env,
        );
        cmd.args(["--command", "--", "/bin/bash", "-c", script]);
        run_tool(&cmd).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pod_name() {
        assert_eq!(
            pod_name(&["Orders", "build", "2024-01-01T10-00-00"]),
            "orders-build-2024-01-01t10-00-00"
        );
        assert_eq!(pod_name(&["my_project"]), "my-project");
    }

    #[test]
    fn test_run_args() {
        let backend = KubectlBackend::new(ClusterSettings::default());
        let args = backend.run_args("orders", "orders", "devmode", "devmode:1");

        assert_eq!(
            args,
            vec![
                "run",
                "orders",
                "--image=devmode:1",
                "--restart=Never",
                "--labels=projectd.project=orders,projectd.type=devmode",
            ]
        );
        assert_eq!(
            backend.kubectl().get_args(),
            ["--namespace", "default"].map(std::ffi::OsString::from)
        );
    }

    #[test]
    fn test_run_command_masks_env() {
        let backend = KubectlBackend::new(ClusterSettings::default());
        let cmd = backend.run_command(
            "orders-build",
            "orders",
            "build",
            "builder:1",
            &["GIT_PASSWORD=s3cret".to_string()],
        );

        assert!(
            cmd.get_args()
                .iter()
                .any(|a| a == "--env=GIT_PASSWORD=s3cret")
        );
        assert!(!cmd.display().contains("s3cret"));
    }
}
