//! The project orchestrator and its builder.

use crate::backends::{DockerBackend, ExecutionBackend, KubectlBackend};
use crate::config::{DeploymentMode, OrchestratorConfig};
use crate::descriptor::{ComposeCodec, DescriptorCodec, RuntimeDescriptor};
use crate::locks::KeyedLocks;
use crate::properties::APPLICATION_PROPERTIES_FILENAME;
use crate::publisher::{ChannelPublisher, StatusPublisher};
use crate::readiness::{HealthReport, Readiness};
use crate::registry::{ConfiguredRegistry, RegistryInfo};
use crate::repository::{GitRepository, Repository};
use crate::templates::{BuiltinTemplates, TemplateProvider, builder_script_name};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use project_store::{
    ContainerStatus, Project, ProjectFile, ProjectStore, ProjectType, validate_name,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// File name of a project's runtime descriptor
pub const PROJECT_COMPOSE_FILENAME: &str = "docker-compose.yaml";
/// File name of the dev services descriptor in the `services` project
pub const DEV_SERVICES_FILENAME: &str = "devservices.docker-compose.yaml";
/// Port the project runtime listens on inside its container
pub const INTERNAL_PORT: u16 = 8080;

/// Lowest host port handed out to new projects
const FIRST_HOST_PORT: u16 = 8081;

/// Default time an unconfirmed dev-mode start blocks a new one
const DEFAULT_START_TIMEOUT: Duration = Duration::from_secs(300);

/// Image tag for a build started at `now`: `YYYY-MM-DDTHH-MM-SS`
pub(crate) fn build_tag(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H-%M-%S").to_string()
}

/// Lifecycle orchestrator for the projects in a [`ProjectStore`]
///
/// Meant to be created once and shared behind an `Arc`.
pub struct ProjectOrchestrator {
    pub(crate) store: ProjectStore,
    pub(crate) repository: Arc<dyn Repository>,
    pub(crate) backend: ExecutionBackend,
    pub(crate) codec: Arc<dyn DescriptorCodec>,
    pub(crate) templates: Arc<dyn TemplateProvider>,
    pub(crate) publisher: Arc<dyn StatusPublisher>,
    pub(crate) registry: Arc<dyn RegistryInfo>,
    pub(crate) readiness: Readiness,
    pub(crate) locks: KeyedLocks,
    pub(crate) environment: String,
    pub(crate) cache_volumes: BTreeMap<String, String>,
    pub(crate) start_timeout: Duration,
}

/// Builder for [`ProjectOrchestrator`]
///
/// Store, repository and backend are required. The other collaborators
/// default to [`ComposeCodec`], [`BuiltinTemplates`], [`ChannelPublisher`]
/// and an empty [`ConfiguredRegistry`].
pub struct OrchestratorBuilder {
    store: ProjectStore,
    repository: Arc<dyn Repository>,
    backend: ExecutionBackend,
    codec: Arc<dyn DescriptorCodec>,
    templates: Arc<dyn TemplateProvider>,
    publisher: Arc<dyn StatusPublisher>,
    registry: Arc<dyn RegistryInfo>,
    environment: String,
    cache_volumes: BTreeMap<String, String>,
    start_timeout: Duration,
}

impl OrchestratorBuilder {
    /// Start a builder from the required collaborators
    pub fn new(
        store: ProjectStore,
        repository: Arc<dyn Repository>,
        backend: ExecutionBackend,
    ) -> Self {
        Self {
            store,
            repository,
            backend,
            codec: Arc::new(ComposeCodec),
            templates: Arc::new(BuiltinTemplates::new()),
            publisher: Arc::new(ChannelPublisher::new()),
            registry: Arc::new(ConfiguredRegistry::default()),
            environment: "dev".to_string(),
            cache_volumes: BTreeMap::new(),
            start_timeout: DEFAULT_START_TIMEOUT,
        }
    }

    /// Start a builder with every collaborator created from configuration
    pub async fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        config.validate()?;

        let store = ProjectStore::from_config(&config.store).await?;
        let repository = Arc::new(GitRepository::new(config.git.clone()));
        let backend = match config.mode {
            DeploymentMode::Local => {
                ExecutionBackend::Local(Arc::new(DockerBackend::new(config.local.clone())))
            }
            DeploymentMode::Cluster => {
                ExecutionBackend::Cluster(Arc::new(KubectlBackend::new(config.cluster.clone())))
            }
        };
        let templates = match &config.templates_dir {
            Some(dir) => BuiltinTemplates::with_override_dir(dir),
            None => BuiltinTemplates::new(),
        };

        Ok(Self::new(store, repository, backend)
            .templates(Arc::new(templates))
            .registry(Arc::new(ConfiguredRegistry::new(config.registry.clone())))
            .environment(&config.environment)
            .cache_volumes(config.cache_volumes())
            .start_timeout(config.start_timeout()))
    }

    /// Use a different descriptor codec
    pub fn codec(mut self, codec: Arc<dyn DescriptorCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Use a different template provider
    pub fn templates(mut self, templates: Arc<dyn TemplateProvider>) -> Self {
        self.templates = templates;
        self
    }

    /// Use a different status publisher
    pub fn publisher(mut self, publisher: Arc<dyn StatusPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// Use a different registry source
    pub fn registry(mut self, registry: Arc<dyn RegistryInfo>) -> Self {
        self.registry = registry;
        self
    }

    /// Environment container statuses are recorded under
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// Volumes mounted into local containers, host path to container path
    pub fn cache_volumes(mut self, volumes: BTreeMap<String, String>) -> Self {
        self.cache_volumes = volumes;
        self
    }

    /// How long an unconfirmed dev-mode start blocks a new one
    pub fn start_timeout(mut self, timeout: Duration) -> Self {
        self.start_timeout = timeout;
        self
    }

    /// Finish the orchestrator; its readiness gate starts closed
    pub fn build(self) -> ProjectOrchestrator {
        info!(
            "Creating project orchestrator for environment {} on the {} backend",
            self.environment,
            self.backend.kind()
        );
        ProjectOrchestrator {
            store: self.store,
            repository: self.repository,
            backend: self.backend,
            codec: self.codec,
            templates: self.templates,
            publisher: self.publisher,
            registry: self.registry,
            readiness: Readiness::new(),
            locks: KeyedLocks::new(),
            environment: self.environment,
            cache_volumes: self.cache_volumes,
            start_timeout: self.start_timeout,
        }
    }
}

impl ProjectOrchestrator {
    /// Orchestrator with every collaborator created from configuration
    pub async fn from_config(config: &OrchestratorConfig) -> Result<Self> {
        Ok(OrchestratorBuilder::from_config(config).await?.build())
    }

    /// The underlying store
    pub fn store(&self) -> &ProjectStore {
        &self.store
    }

    /// Environment container statuses are recorded under
    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Whether bootstrap has completed
    pub fn is_ready(&self) -> bool {
        self.readiness.is_ready()
    }

    /// A handle on the readiness gate
    pub fn readiness(&self) -> Readiness {
        self.readiness.clone()
    }

    /// Health check view of the readiness gate
    pub fn health(&self) -> HealthReport {
        self.readiness.report()
    }

    /// Start the dev-mode container of a project
    ///
    /// Returns the project id when a start was dispatched and `None` when
    /// the container is already running or a start is outstanding. A start
    /// older than the start timeout is no longer outstanding. Start requests
    /// for the same project and environment are serialized.
    pub async fn run_dev_mode(&self, project: &Project, options: &str) -> Result<Option<String>> {
        validate_name("project id", &project.id)?;
        let _guard = self.locks.lock(&project.id, &self.environment).await;

        let mut status = self
            .store
            .get_container_status(&project.id, &self.environment)
            .await?
            .unwrap_or_else(|| ContainerStatus::dev_mode(&project.id, &self.environment));

        let timeout_ms = i64::try_from(self.start_timeout.as_millis()).unwrap_or(i64::MAX);
        if status.blocks_start(Utc::now().timestamp_millis(), timeout_ms) {
            info!(
                "Dev-mode container of {} is {:?} (in transit: {}), not starting it",
                project.id, status.state, status.in_transit
            );
            return Ok(None);
        }
        if status.in_transit {
            warn!(
                "Start of {} is unconfirmed after {:?}, starting it again",
                project.id, self.start_timeout
            );
        }

        status.mark_starting();
        self.store.save_container_status(&status).await?;
        self.publisher.publish(&status).await;

        if let Err(e) = self.dispatch_dev_mode(project, options).await {
            error!("Failed to start dev-mode container of {}: {}", project.id, e);
            status.mark_stopped();
            if let Err(save_error) = self.store.save_container_status(&status).await {
                warn!(
                    "Failed to reset container status of {}: {}",
                    project.id, save_error
                );
            }
            self.publisher.publish(&status).await;
            return Err(e);
        }

        info!("Dispatched dev-mode container of {}", project.id);
        Ok(Some(project.id.clone()))
    }

    async fn dispatch_dev_mode(&self, project: &Project, options: &str) -> Result<()> {
        match &self.backend {
            ExecutionBackend::Cluster(backend) => {
                backend.run_dev_mode_container(project, options).await
            }
            ExecutionBackend::Local(backend) => {
                let files: Vec<ProjectFile> = self
                    .store
                    .get_project_files(&project.id)
                    .await?
                    .into_iter()
                    .filter(|file| file.name != PROJECT_COMPOSE_FILENAME)
                    .collect();
                let ports = self
                    .get_descriptor(&project.id)
                    .await?
                    .map(|descriptor| descriptor.ports_map)
                    .unwrap_or_default();

                backend
                    .run_dev_mode_container(
                        &project.id,
                        options,
                        &ports,
                        &files,
                        &self.cache_volumes,
                    )
                    .await
            }
        }
    }

    /// Start a build of a project; returns the image tag used
    ///
    /// A blank tag is replaced by one generated from the current time.
    pub async fn build(&self, project: &Project, tag: Option<&str>) -> Result<String> {
        let tag = match tag {
            Some(tag) if !tag.trim().is_empty() => tag.to_string(),
            _ => build_tag(Utc::now()),
        };

        let script = self.builder_script(&project.runtime).await?;
        let env = self.build_env(project, &tag);

        info!("Building {} with tag {}", project.id, tag);
        match &self.backend {
            ExecutionBackend::Cluster(backend) => {
                backend.run_build(project, &script, &env, &tag).await?
            }
            ExecutionBackend::Local(backend) => {
                backend
                    .run_build(project, &script, &env, &self.cache_volumes, &tag)
                    .await?
            }
        }
        Ok(tag)
    }

    /// Build script for a runtime: the `templates` project first, then the provider
    async fn builder_script(&self, runtime: &str) -> Result<String> {
        let name = builder_script_name(runtime);

        if let Some(file) = self
            .store
            .get_project_file(ProjectType::Templates.as_str(), &name)
            .await?
        {
            debug!("Using build script {} from the templates project", name);
            return Ok(file.code);
        }

        self.templates
            .builder_script(runtime)
            .await?
            .ok_or(Error::TemplateNotFound(name))
    }

    /// Ordered `KEY=VALUE` environment of a build
    fn build_env(&self, project: &Project, tag: &str) -> Vec<String> {
        let git = self.repository.build_config();

        let mut env = self.registry.env_for_build();
        env.extend([
            format!("GIT_REPOSITORY={}", git.uri),
            format!("GIT_USERNAME={}", git.username),
            format!("GIT_PASSWORD={}", git.password),
            format!("GIT_BRANCH={}", git.branch),
            format!("PROJECT_ID={}", project.id),
            "JBANG_REPO=~/.m2".to_string(),
            format!("TAG={tag}"),
        ]);
        env
    }

    /// All projects sorted by id, optionally of one type
    ///
    /// Empty while the store is not ready.
    pub async fn list_projects(&self, project_type: Option<ProjectType>) -> Result<Vec<Project>> {
        if !self.store.is_ready() {
            return Ok(Vec::new());
        }

        let mut projects: Vec<Project> = self
            .store
            .list_projects()
            .await?
            .into_iter()
            .filter(|project| project_type.is_none_or(|ty| project.project_type == ty))
            .collect();
        projects.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(projects)
    }

    /// Persist a project
    ///
    /// A new project also gets an initial `application.properties` and, on
    /// the local backend, an initial runtime descriptor.
    pub async fn save(&self, project: Project) -> Result<Project> {
        let is_new = self.store.get_project(&project.id).await?.is_none();
        self.store.save_project(&project).await?;

        if is_new {
            let timestamp = Utc::now().timestamp_millis();

            let properties = self.templates.application_properties(&project).await?;
            self.store
                .save_project_file(&ProjectFile::new(
                    APPLICATION_PROPERTIES_FILENAME,
                    properties,
                    &project.id,
                    timestamp,
                ))
                .await?;

            if self.backend.is_local() {
                let compose = self.initial_compose(&project).await?;
                self.store
                    .save_project_file(&ProjectFile::new(
                        PROJECT_COMPOSE_FILENAME,
                        compose,
                        &project.id,
                        timestamp,
                    ))
                    .await?;
            }
            info!("Created project {}", project.id);
        }
        Ok(project)
    }

    /// Initial runtime descriptor with a host port no other project uses
    async fn initial_compose(&self, project: &Project) -> Result<String> {
        let template = self.templates.project_compose(project).await?;
        let mut descriptor = self.codec.decode(&template, &project.id)?;

        let taken = self
            .store
            .get_project_files_by_name(PROJECT_COMPOSE_FILENAME)
            .await?
            .into_iter()
            .filter(|file| file.project_id != project.id)
            .filter_map(|file| self.codec.decode(&file.code, &file.project_id).ok())
            .filter_map(|descriptor| descriptor.ports_map.keys().max().copied())
            .max();
        let port = taken
            .map_or(FIRST_HOST_PORT, |max| max.saturating_add(1))
            .max(FIRST_HOST_PORT);

        descriptor
            .ports_map
            .retain(|_, container| *container != INTERNAL_PORT);
        descriptor.ports_map.insert(port, INTERNAL_PORT);
        self.codec.encode(&descriptor)
    }

    /// Host port mapped to [`INTERNAL_PORT`] in the project's runtime descriptor
    pub async fn get_port(&self, project_id: &str) -> Result<Option<u16>> {
        Ok(self
            .get_descriptor(project_id)
            .await?
            .and_then(|descriptor| descriptor.host_port_for(INTERNAL_PORT)))
    }

    /// Decoded runtime descriptor, `None` if the project has none
    pub async fn get_descriptor(&self, project_id: &str) -> Result<Option<RuntimeDescriptor>> {
        self.store
            .get_project_file(project_id, PROJECT_COMPOSE_FILENAME)
            .await?
            .map(|file| self.codec.decode(&file.code, project_id))
            .transpose()
    }

    /// Point the runtime descriptor at a new image, optionally committing
    ///
    /// Does nothing when the project has no runtime descriptor.
    pub async fn set_image(
        &self,
        project_id: &str,
        image: &str,
        commit: bool,
        message: &str,
    ) -> Result<()> {
        let Some(mut file) = self
            .store
            .get_project_file(project_id, PROJECT_COMPOSE_FILENAME)
            .await?
        else {
            debug!("Project {} has no runtime descriptor, image unchanged", project_id);
            return Ok(());
        };

        let mut descriptor = self.codec.decode(&file.code, project_id)?;
        descriptor.image = image.to_string();
        file.code = self.codec.encode(&descriptor)?;
        self.store.save_project_file(&file).await?;
        info!("Set image of {} to {}", project_id, image);

        if commit {
            self.commit_and_push(project_id, message).await?;
        }
        Ok(())
    }

    /// Commit and push the store's copy of a project
    ///
    /// Commit metadata is only written back once the push succeeded.
    pub async fn commit_and_push(&self, project_id: &str, message: &str) -> Result<Project> {
        let project = self
            .store
            .get_project(project_id)
            .await?
            .ok_or_else(|| Error::ProjectNotFound(project_id.to_string()))?;
        let files = self.store.get_project_files(project_id).await?;

        let commit = self
            .repository
            .commit_and_push(&project, &files, message)
            .await?;

        let project = project.with_commit(commit.commit_id, commit.commit_time_seconds * 1000);
        self.store.save_project(&project).await?;
        info!("Committed {} as {}", project.id, project.last_commit);
        Ok(project)
    }

    /// Import one project folder from the repository
    ///
    /// Failures are logged and yield `None`.
    pub async fn import_project(&self, project_id: &str) -> Option<Project> {
        info!("Importing project {} from the repository", project_id);
        let imported = match validate_name("project id", project_id) {
            Ok(()) => match self.repository.read_entry(project_id).await {
                Ok(entry) => self.import_entry(&entry).await,
                Err(e) => Err(e),
            },
            Err(e) => Err(e.into()),
        };
        match imported {
            Ok(project) => Some(project),
            Err(e) => {
                error!("Error importing project {}: {}", project_id, e);
                None
            }
        }
    }

    /// Code of the dev services descriptor, `None` if missing
    pub async fn dev_services_code(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get_project_file(ProjectType::Services.as_str(), DEV_SERVICES_FILENAME)
            .await?
            .map(|file| file.code))
    }

    /// Container status of a project in this orchestrator's environment
    pub async fn container_status(&self, project_id: &str) -> Result<Option<ContainerStatus>> {
        Ok(self
            .store
            .get_container_status(project_id, &self.environment)
            .await?)
    }
}
