//! Core project store implementation

use crate::{
    backend::{StoreBackend, memory::MemoryBackend, sled::SledBackend},
    config::StoreConfig,
    error::{Error, Result},
    models::*,
};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Project store with pluggable backend
///
/// Reads go straight to the backend so that every caller observes any prior
/// successful write, including writes made before a process restart when a
/// persistent backend is used.
#[derive(Clone)]
pub struct ProjectStore {
    /// Storage backend
    backend: Arc<dyn StoreBackend>,
    /// Set once the backend has been initialized
    ready: Arc<AtomicBool>,
}

impl ProjectStore {
    /// Create a store over an arbitrary backend; call [`ProjectStore::init`] before use
    pub fn with_backend(backend: impl StoreBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create an initialized in-memory store
    pub async fn in_memory() -> Result<Self> {
        let store = Self::with_backend(MemoryBackend::new());
        store.init().await?;
        Ok(store)
    }

    /// Open an initialized store persisted at `path`
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading project store from {:?}", path);

        let store = Self::with_backend(SledBackend::new(path).await?);
        store.init().await?;
        Ok(store)
    }

    /// Open the store described by a configuration
    pub async fn from_config(config: &StoreConfig) -> Result<Self> {
        match &config.path {
            Some(path) => Self::open(path).await,
            None => Self::in_memory().await,
        }
    }

    /// Initialize the backend and mark the store ready
    pub async fn init(&self) -> Result<()> {
        self.backend.init().await?;
        self.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Whether the store has been initialized
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    fn ensure_ready(&self) -> Result<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(Error::NotReady)
        }
    }

    /// Get a project by id
    pub async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.ensure_ready()?;
        self.backend.get_project(id).await
    }

    /// Store a project
    pub async fn save_project(&self, project: &Project) -> Result<()> {
        self.ensure_ready()?;
        validate_name("project id", &project.id)?;
        debug!("Saving project {} ({})", project.id, project.project_type);
        self.backend.put_project(project).await
    }

    /// List all projects in no particular order
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.ensure_ready()?;
        self.backend.list_projects().await
    }

    /// Get one file of a project
    pub async fn get_project_file(&self, project_id: &str, name: &str) -> Result<Option<ProjectFile>> {
        self.ensure_ready()?;
        self.backend.get_file(project_id, name).await
    }

    /// Get all files of a project
    pub async fn get_project_files(&self, project_id: &str) -> Result<Vec<ProjectFile>> {
        self.ensure_ready()?;
        self.backend.list_files(project_id).await
    }

    /// Get files with a given name across all projects
    pub async fn get_project_files_by_name(&self, name: &str) -> Result<Vec<ProjectFile>> {
        self.ensure_ready()?;
        self.backend.list_files_by_name(name).await
    }

    /// Store a project file
    pub async fn save_project_file(&self, file: &ProjectFile) -> Result<()> {
        self.ensure_ready()?;
        validate_name("project id", &file.project_id)?;
        validate_name("file name", &file.name)?;
        debug!("Saving file {} of project {}", file.name, file.project_id);
        self.backend.put_file(file).await
    }

    /// Get the container status of a project in an environment
    pub async fn get_container_status(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Option<ContainerStatus>> {
        self.ensure_ready()?;
        self.backend.get_status(project_id, environment).await
    }

    /// Store a container status
    pub async fn save_container_status(&self, status: &ContainerStatus) -> Result<()> {
        self.ensure_ready()?;
        validate_name("project id", &status.project_id)?;
        self.backend.put_status(status).await
    }

    /// List all container statuses
    pub async fn list_container_statuses(&self) -> Result<Vec<ContainerStatus>> {
        self.ensure_ready()?;
        self.backend.list_statuses().await
    }
}
