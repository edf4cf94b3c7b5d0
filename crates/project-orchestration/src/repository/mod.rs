//! Version-controlled project repository.
//!
//! The repository holds one folder per project. On cold start it is the
//! source of truth the store is filled from; afterwards every commit writes
//! the store's copy of a project back to it.

mod git;

pub use git::GitRepository;

use crate::Result;
use async_trait::async_trait;
use project_store::{Project, ProjectFile};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Repository coordinates handed to build containers
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Remote URI
    pub uri: String,
    /// Username for http(s) remotes
    pub username: String,
    /// Password or token for http(s) remotes
    pub password: String,
    /// Branch holding the projects
    pub branch: String,
}

impl fmt::Debug for GitConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitConfig")
            .field("uri", &self.uri)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("branch", &self.branch)
            .finish()
    }
}

/// A file read from a repository folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryFile {
    /// File name inside the folder
    pub name: String,
    /// Text content
    pub body: String,
    /// Time of the last commit touching the file, epoch milliseconds
    pub last_commit_timestamp: i64,
}

/// A project folder read from the repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryEntry {
    /// Folder name, used as project id
    pub name: String,
    /// Latest commit touching the folder, empty if never committed
    pub commit_id: String,
    /// Time of that commit, epoch milliseconds
    pub last_commit_timestamp: i64,
    /// Files of the folder
    pub files: Vec<RepositoryFile>,
}

impl RepositoryEntry {
    /// File with the given name
    pub fn file(&self, name: &str) -> Option<&RepositoryFile> {
        self.files.iter().find(|file| file.name == name)
    }

    /// Store records for every file of the entry
    pub fn project_files(&self) -> Vec<ProjectFile> {
        self.files
            .iter()
            .map(|file| {
                ProjectFile::new(
                    &file.name,
                    &file.body,
                    &self.name,
                    file.last_commit_timestamp,
                )
            })
            .collect()
    }
}

/// Result of a commit-and-push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    /// New commit id
    pub commit_id: String,
    /// Commit time, epoch seconds
    pub commit_time_seconds: i64,
}

/// Version-controlled store of project folders
#[async_trait]
pub trait Repository: Send + Sync {
    /// Whether the remote answers
    async fn check_reachable(&self) -> bool;

    /// Every readable project folder of the repository
    ///
    /// Folders that cannot be read are skipped, as are files that are not text.
    async fn list_importable_entries(&self) -> Result<Vec<RepositoryEntry>>;

    /// One project folder; an error if it does not exist
    async fn read_entry(&self, project_id: &str) -> Result<RepositoryEntry>;

    /// Write the files into the project's folder, commit and push
    async fn commit_and_push(
        &self,
        project: &Project,
        files: &[ProjectFile],
        message: &str,
    ) -> Result<CommitInfo>;

    /// Coordinates handed to build containers
    fn build_config(&self) -> GitConfig;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_config_debug_hides_password() {
        let config = GitConfig {
            uri: "https://git.example.com/projects.git".to_string(),
            username: "builder".to_string(),
            password: "s3cret".to_string(),
            branch: "main".to_string(),
        };
        let debug = format!("{config:?}");
        assert!(debug.contains("builder"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_entry_project_files() {
        let entry = RepositoryEntry {
            name: "orders".to_string(),
            commit_id: "abc".to_string(),
            last_commit_timestamp: 2_000,
            files: vec![RepositoryFile {
                name: "route.camel.yaml".to_string(),
                body: "- from: {}".to_string(),
                last_commit_timestamp: 1_000,
            }],
        };

        assert!(entry.file("route.camel.yaml").is_some());
        assert!(entry.file("missing").is_none());

        let files = entry.project_files();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].project_id, "orders");
        assert_eq!(files[0].last_commit_timestamp, 1_000);
    }
}
