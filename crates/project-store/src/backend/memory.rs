//! In-memory backend for the project store

use super::StoreBackend;
use crate::{error::Result, models::*};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

type PairKey = (String, String);

/// In-memory store backend
pub struct MemoryBackend {
    /// Projects by id
    projects: RwLock<HashMap<String, Project>>,
    /// Files by (project id, file name)
    files: RwLock<HashMap<PairKey, ProjectFile>>,
    /// Statuses by (project id, environment)
    statuses: RwLock<HashMap<PairKey, ContainerStatus>>,
}

impl MemoryBackend {
    /// Create a new in-memory backend
    pub fn new() -> Self {
        Self {
            projects: RwLock::new(HashMap::new()),
            files: RwLock::new(HashMap::new()),
            statuses: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn init(&self) -> Result<()> {
        // No initialization needed for in-memory backend
        Ok(())
    }

    async fn put_project(&self, project: &Project) -> Result<()> {
        write(&self.projects).insert(project.id.clone(), project.clone());
        Ok(())
    }

    async fn get_project(&self, id: &str) -> Result<Option<Project>> {
        Ok(read(&self.projects).get(id).cloned())
    }

    async fn list_projects(&self) -> Result<Vec<Project>> {
        Ok(read(&self.projects).values().cloned().collect())
    }

    async fn put_file(&self, file: &ProjectFile) -> Result<()> {
        let key = (file.project_id.clone(), file.name.clone());
        write(&self.files).insert(key, file.clone());
        Ok(())
    }

    async fn get_file(&self, project_id: &str, name: &str) -> Result<Option<ProjectFile>> {
        let key = (project_id.to_string(), name.to_string());
        Ok(read(&self.files).get(&key).cloned())
    }

    async fn list_files(&self, project_id: &str) -> Result<Vec<ProjectFile>> {
        Ok(read(&self.files)
            .values()
            .filter(|f| f.project_id == project_id)
            .cloned()
            .collect())
    }

    async fn list_files_by_name(&self, name: &str) -> Result<Vec<ProjectFile>> {
        Ok(read(&self.files)
            .values()
            .filter(|f| f.name == name)
            .cloned()
            .collect())
    }

    async fn put_status(&self, status: &ContainerStatus) -> Result<()> {
        let key = (status.project_id.clone(), status.environment.clone());
        write(&self.statuses).insert(key, status.clone());
        Ok(())
    }

    async fn get_status(
        &self,
        project_id: &str,
        environment: &str,
    ) -> Result<Option<ContainerStatus>> {
        let key = (project_id.to_string(), environment.to_string());
        Ok(read(&self.statuses).get(&key).cloned())
    }

    async fn list_statuses(&self) -> Result<Vec<ContainerStatus>> {
        Ok(read(&self.statuses).values().cloned().collect())
    }
}
