//! Orchestrator configuration.
//!
//! Configuration is read from YAML (or JSON, chosen by file extension).
//! Before parsing, `${VAR}` and `${VAR:-default}` references are replaced
//! with values from the process environment so that credentials never have
//! to be written into the file itself.

use crate::{Error, Result, bootstrap::RetryPolicy, repository::GitConfig};
use project_store::StoreConfig;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration of the orchestrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    /// Environment name container statuses are recorded under
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Which execution backend is active
    #[serde(default)]
    pub mode: DeploymentMode,

    /// Host directory mounted as the build cache, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_path: Option<String>,

    /// Project store settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Git repository settings
    pub git: GitSettings,

    /// Image registry settings passed to builds
    #[serde(default)]
    pub registry: RegistrySettings,

    /// Local container engine settings
    #[serde(default)]
    pub local: LocalSettings,

    /// Cluster settings
    #[serde(default)]
    pub cluster: ClusterSettings,

    /// Directory whose files override the built-in templates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub templates_dir: Option<PathBuf>,

    /// Retry policy for the bootstrap pass
    #[serde(default)]
    pub bootstrap: RetryPolicy,

    /// Seconds after which an unconfirmed dev-mode start no longer blocks a new one
    #[serde(default = "default_start_timeout_secs")]
    pub start_timeout_secs: u64,
}

/// Execution backend selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    /// Local container engine
    #[default]
    Local,
    /// Cluster orchestrator
    Cluster,
}

/// Git repository settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitSettings {
    /// Remote repository URI
    pub uri: String,
    /// Username for http(s) remotes
    #[serde(default)]
    pub username: String,
    /// Password or token for http(s) remotes
    #[serde(default)]
    pub password: String,
    /// Branch holding the projects
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Local working copy location
    #[serde(default = "default_git_work_dir")]
    pub work_dir: PathBuf,
}

impl GitSettings {
    /// Credentials and coordinates handed to build containers
    pub fn build_config(&self) -> GitConfig {
        GitConfig {
            uri: self.uri.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            branch: self.branch.clone(),
        }
    }
}

/// Image registry settings
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RegistrySettings {
    /// Registry host, e.g. `registry:5000`
    #[serde(default)]
    pub url: String,
    /// Image group (namespace) inside the registry
    #[serde(default)]
    pub group: String,
    /// Registry username
    #[serde(default)]
    pub username: String,
    /// Registry password
    #[serde(default)]
    pub password: String,
}

/// Local container engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocalSettings {
    /// Image running dev-mode containers
    #[serde(default = "default_devmode_image")]
    pub devmode_image: String,
    /// Image running builds
    #[serde(default = "default_builder_image")]
    pub builder_image: String,
    /// Directory where project files are staged for mounting
    #[serde(default = "default_local_work_dir")]
    pub work_dir: PathBuf,
    /// Container network to attach containers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
}

impl Default for LocalSettings {
    fn default() -> Self {
        Self {
            devmode_image: default_devmode_image(),
            builder_image: default_builder_image(),
            work_dir: default_local_work_dir(),
            network: None,
        }
    }
}

/// Cluster settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClusterSettings {
    /// Namespace pods are created in
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Image running dev-mode pods
    #[serde(default = "default_devmode_image")]
    pub devmode_image: String,
    /// Image running build pods
    #[serde(default = "default_builder_image")]
    pub builder_image: String,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            devmode_image: default_devmode_image(),
            builder_image: default_builder_image(),
        }
    }
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_start_timeout_secs() -> u64 {
    300
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_devmode_image() -> String {
    "ghcr.io/project-orchestrator/devmode:latest".to_string()
}

fn default_builder_image() -> String {
    "ghcr.io/project-orchestrator/builder:latest".to_string()
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("project-orchestrator")
}

fn default_git_work_dir() -> PathBuf {
    data_dir().join("repository")
}

fn default_local_work_dir() -> PathBuf {
    data_dir().join("staging")
}

impl OrchestratorConfig {
    /// Load configuration from file, resolving environment references
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = async_fs::read_to_string(path).await?;
        let env_vars: HashMap<String, String> = std::env::vars().collect();
        let resolved = resolve_env_vars(&contents, &env_vars)?;

        let config: Self = match path.extension().and_then(|s| s.to_str()) {
            Some("json") => serde_json::from_str(&resolved)?,
            _ => serde_yaml::from_str(&resolved)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse YAML text, resolving references against the given variables
    pub fn from_yaml_str(contents: &str, env_vars: &HashMap<String, String>) -> Result<Self> {
        let resolved = resolve_env_vars(contents, env_vars)?;
        let config: Self = serde_yaml::from_str(&resolved)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot
    pub fn validate(&self) -> Result<()> {
        if self.environment.trim().is_empty() {
            return Err(Error::Config("environment must not be empty".to_string()));
        }
        if self.git.uri.trim().is_empty() {
            return Err(Error::Config("git.uri must not be empty".to_string()));
        }
        if self.git.branch.trim().is_empty() {
            return Err(Error::Config("git.branch must not be empty".to_string()));
        }
        if self.start_timeout_secs == 0 {
            return Err(Error::Config(
                "start_timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.mode == DeploymentMode::Cluster && self.cluster.namespace.trim().is_empty() {
            return Err(Error::Config(
                "cluster.namespace must not be empty in cluster mode".to_string(),
            ));
        }
        Ok(())
    }

    /// How long an unconfirmed dev-mode start blocks a new one
    pub fn start_timeout(&self) -> Duration {
        Duration::from_secs(self.start_timeout_secs)
    }

    /// Cache volume mapping for the local engine: cache path to the in-container cache
    pub fn cache_volumes(&self) -> BTreeMap<String, String> {
        self.cache_path
            .iter()
            .filter(|path| !path.trim().is_empty())
            .map(|path| (path.clone(), CONTAINER_CACHE_PATH.to_string()))
            .collect()
    }
}

/// Path the build cache is mounted at inside containers
pub const CONTAINER_CACHE_PATH: &str = "/root/.m2";

/// Replace `${VAR}` and `${VAR:-default}` references
fn resolve_env_vars(input: &str, env_vars: &HashMap<String, String>) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| Error::Config(e.to_string()))?;
    let mut missing = Vec::new();

    let resolved = re.replace_all(input, |cap: &regex::Captures<'_>| {
        let var_expr = &cap[1];

        // Handle default values: ${VAR:-default}
        let (var_name, default_value) = match var_expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (var_expr, None),
        };

        match (env_vars.get(var_name), default_value) {
            (Some(value), _) => value.clone(),
            (None, Some(default)) => default.to_string(),
            (None, None) => {
                missing.push(var_name.to_string());
                String::new()
            }
        }
    });

    if !missing.is_empty() {
        return Err(Error::Config(format!(
            "Environment variable not found: {}",
            missing.join(", ")
        )));
    }

    Ok(resolved.into_owned())
}
