//! Store backend implementations

pub mod memory;
pub mod sled;

use crate::{error::Result, models::*};
use async_trait::async_trait;

/// Trait for project storage backends
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Initialize the backend
    async fn init(&self) -> Result<()>;

    /// Store a project, replacing any previous record with the same id
    async fn put_project(&self, project: &Project) -> Result<()>;

    /// Get a project by id
    async fn get_project(&self, id: &str) -> Result<Option<Project>>;

    /// List all projects
    async fn list_projects(&self) -> Result<Vec<Project>>;

    /// Store a project file, keyed by `(project_id, name)`
    async fn put_file(&self, file: &ProjectFile) -> Result<()>;

    /// Get one file of a project
    async fn get_file(&self, project_id: &str, name: &str) -> Result<Option<ProjectFile>>;

    /// List all files of a project
    async fn list_files(&self, project_id: &str) -> Result<Vec<ProjectFile>>;

    /// List files with the given name across all projects
    async fn list_files_by_name(&self, name: &str) -> Result<Vec<ProjectFile>>;

    /// Store a container status, keyed by `(project_id, environment)`
    async fn put_status(&self, status: &ContainerStatus) -> Result<()>;

    /// Get the container status of a project in an environment
    async fn get_status(&self, project_id: &str, environment: &str)
    -> Result<Option<ContainerStatus>>;

    /// List all container statuses
    async fn list_statuses(&self) -> Result<Vec<ContainerStatus>>;
}

/// Separator between the two parts of a composite key
///
/// Project ids are folder names and never contain a NUL byte.
pub(crate) const KEY_SEPARATOR: char = '\u{0}';

/// Build the composite key for a `(owner, name)` pair
pub(crate) fn composite_key(owner: &str, name: &str) -> String {
    format!("{owner}{KEY_SEPARATOR}{name}")
}

/// Prefix matching every composite key owned by `owner`
pub(crate) fn composite_prefix(owner: &str) -> String {
    format!("{owner}{KEY_SEPARATOR}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_key_prefix() {
        let key = composite_key("orders", "routes.yaml");
        assert!(key.starts_with(&composite_prefix("orders")));
        assert!(!key.starts_with(&composite_prefix("order")));
    }
}
