//! Sled database backend for the project store

use super::{StoreBackend, composite_key, composite_prefix};
use crate::{error::Result, models::*};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::path::Path;
use tracing::{debug, error, info};

/// Sled-based store backend
pub struct SledBackend {
    /// Database instance
    db: sled::Db,
    /// Projects tree, keyed by project id
    projects: sled::Tree,
    /// Files tree, keyed by project id and file name
    files: sled::Tree,
    /// Status tree, keyed by project id and environment
    statuses: sled::Tree,
}

impl SledBackend {
    /// Create a new sled backend
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure the directory exists
        if let Some(parent) = path.parent() {
            async_fs::create_dir_all(parent).await?;
        }

        info!("Opening sled database at {:?}", path);
        let db = sled::open(path)?;
        Self::with_db(db)
    }

    /// Create an in-memory sled backend (for testing)
    pub async fn in_memory() -> Result<Self> {
        info!("Creating in-memory sled database");
        let db = sled::Config::new().temporary(true).open()?;
        Self::with_db(db)
    }

    fn with_db(db: sled::Db) -> Result<Self> {
        let projects = db.open_tree("projects")?;
        let files = db.open_tree("project_files")?;
        let statuses = db.open_tree("container_statuses")?;

        Ok(Self {
            db,
            projects,
            files,
            statuses,
        })
    }

    async fn put<T: serde::Serialize + Sync>(tree: &sled::Tree, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        tree.insert(key.as_bytes(), bytes)?;
        tree.flush_async().await?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(tree: &sled::Tree, key: &str) -> Result<Option<T>> {
        match tree.get(key.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn collect<T: DeserializeOwned>(
        iter: impl Iterator<Item = sled::Result<(sled::IVec, sled::IVec)>>,
    ) -> Result<Vec<T>> {
        let mut values = Vec::new();
        for result in iter {
            let (_, value) = result?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl StoreBackend for SledBackend {
    async fn init(&self) -> Result<()> {
        // Flush to ensure database is ready
        self.db.flush_async().await?;
        Ok(())
    }

    async fn put_project(&self, project: &Project) -> Result<()> {
        debug!("Storing project: {}", project.id);
        Self::put(&self.projects, &project.id, project).await
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        debug!("Getting project: {}", id);
        Self::get(&self.projects, id)
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        debug!("Listing all projects");
        Self::collect(self.projects.iter())
    }

    async fn put_file(&self, file: &ProjectFile) -> Result<()> {
        debug!("Storing file {} of project {}", file.name, file.project_id);
        let key = composite_key(&file.project_id, &file.name);
        Self::put(&self.files, &key, file).await
    }

    async fn get_file(&self, project_id: &str, name: &str) -> Result<Option<ProjectFile>> {
        Self::get(&self.files, &composite_key(project_id, name))
    }

    async fn list_files(&self, project_id: &str) -> Result<Vec<ProjectFile>> {
        let prefix = composite_prefix(project_id);
        Self::collect(self.files.scan_prefix(prefix.as_bytes()))
    }

    async fn list_files_by_name(&self, name: &str) -> Result<Vec<ProjectFile>> {
        let files: Vec<ProjectFile> = Self::collect(self.files.iter())?;
        Ok(files.into_iter().filter(|f| f.name == name).collect())
    }

    async fn put_status(&self, status: &ContainerStatus) -> Result<()> {
        debug!(
            "Storing status of {} in {}: {:?}",
            status.project_id, status.environment, status.state
        );
        let key = composite_key(&status.project_id, &status.environment);
        Self::put(&self.statuses, &key, status).await
    }

    async fn get_status(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Option<ContainerStatus>> {
        Self::get(&self.statuses, &composite_key(project_id, environment))
    }

    async fn list_statuses(&self) -> Result<Vec<ContainerStatus>> {
        Self::collect(self.statuses.iter())
    }
}

impl Drop for SledBackend {
    fn drop(&mut self) {
        // Attempt to flush on drop
        if let Err(e) = self.db.flush() {
            error!("Failed to flush database on drop: {}", e);
        }
    }
}
