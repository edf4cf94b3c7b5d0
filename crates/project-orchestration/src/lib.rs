//! # Project Orchestration
//!
//! Lifecycle orchestration for development projects.
//!
//! This crate decides, for every project held in the [`ProjectStore`],
//! whether it exists, whether its dev-mode container is running, how it is
//! built into an image, and how it is kept in sync with the git repository
//! that backs it. The store is the read path of record; the repository is the
//! source of truth on cold start and the write target on every commit.
//!
//! Execution happens on one of two mutually exclusive backends selected once
//! at startup: a cluster orchestrator ([`ClusterBackend`]) or a local
//! container engine ([`LocalBackend`]).
//!
//! ## Example
//!
//! ```no_run
//! use project_orchestration::{OrchestratorConfig, ProjectOrchestrator, RetryPolicy};
//!
//! # async fn example() -> project_orchestration::Result<()> {
//! let config = OrchestratorConfig::from_file("orchestrator.yaml").await?;
//! let orchestrator = ProjectOrchestrator::from_config(&config).await?;
//!
//! orchestrator.start_with_retry(&RetryPolicy::default()).await?;
//! assert!(orchestrator.is_ready());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

mod backends;
mod bootstrap;
mod command;
mod config;
mod descriptor;
mod locks;
mod orchestrator;
mod properties;
mod publisher;
mod readiness;
mod registry;
mod repository;
mod templates;

pub use backends::{
    ClusterBackend, DockerBackend, ExecutionBackend, KubectlBackend, LocalBackend,
};
pub use bootstrap::{BaselineOutcome, BootstrapReport, RetryPolicy};
pub use command::{Command, CommandOutput};
pub use config::{
    ClusterSettings, DeploymentMode, GitSettings, LocalSettings, OrchestratorConfig,
    RegistrySettings,
};
pub use descriptor::{ComposeCodec, DescriptorCodec, RuntimeDescriptor};
pub use locks::KeyedLocks;
pub use orchestrator::{
    DEV_SERVICES_FILENAME, INTERNAL_PORT, OrchestratorBuilder, PROJECT_COMPOSE_FILENAME,
    ProjectOrchestrator,
};
pub use properties::{APPLICATION_PROPERTIES_FILENAME, ProjectProperties};
pub use publisher::{ChannelPublisher, StatusPublisher};
pub use readiness::{HealthReport, Readiness};
pub use registry::{ConfiguredRegistry, RegistryInfo};
pub use repository::{
    CommitInfo, GitConfig, GitRepository, Repository, RepositoryEntry, RepositoryFile,
};
pub use templates::{BuiltinTemplates, TemplateProvider};

pub use project_store::{
    ContainerState, ContainerStatus, Project, ProjectFile, ProjectStore, ProjectType,
};

/// Error types for orchestration operations
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Project store errors
    #[error("Project store error: {0}")]
    Store(#[from] project_store::Error),

    /// Bootstrap preconditions are not met
    #[error("Projects are not ready: {0}")]
    NotReady(String),

    /// Project not found
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// Template not found
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    /// Runtime descriptor could not be decoded or encoded
    #[error("Descriptor error: {0}")]
    Descriptor(String),

    /// Repository operation failed
    #[error("Repository error: {0}")]
    Repository(String),

    /// Execution backend operation failed
    #[error("Backend error: {0}")]
    Backend(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
