//! Data models for the project store

use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Check that a project id or file name is a single plain path component
///
/// Ids double as repository folder names and file names as file names inside
/// them, so neither may be empty, `.` or `..`, or contain a path separator.
pub fn validate_name(kind: &str, name: &str) -> Result<()> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\', '\0'])
        || std::path::Path::new(name).is_absolute();
    if invalid {
        return Err(Error::InvalidKey(format!("{kind} {name:?} is not a plain name")));
    }
    Ok(())
}

/// Classification of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProjectType {
    /// A regular user project
    #[default]
    Normal,
    /// Holds user-editable templates (builder scripts, property templates)
    Templates,
    /// Holds custom kamelets
    Kamelets,
    /// Holds development service descriptors
    Services,
}

impl ProjectType {
    /// Baseline types that always exist once bootstrap has run, in ensure order
    pub const BASELINE: [ProjectType; 3] = [
        ProjectType::Kamelets,
        ProjectType::Templates,
        ProjectType::Services,
    ];

    /// Name of the type as stored and as used for baseline folder names
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectType::Normal => "normal",
            ProjectType::Templates => "templates",
            ProjectType::Kamelets => "kamelets",
            ProjectType::Services => "services",
        }
    }

    /// Baseline type whose id matches a repository folder name
    pub fn baseline_for_folder(folder: &str) -> Option<ProjectType> {
        Self::BASELINE
            .into_iter()
            .find(|ty| ty.as_str() == folder)
    }
}

impl fmt::Display for ProjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "normal" => Ok(ProjectType::Normal),
            "templates" => Ok(ProjectType::Templates),
            "kamelets" => Ok(ProjectType::Kamelets),
            "services" => Ok(ProjectType::Services),
            other => Err(format!("unknown project type: {other}")),
        }
    }
}

/// A project: a named bundle of source files plus metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Unique, stable identifier; doubles as the repository folder name
    pub id: String,

    /// Display name
    pub name: String,

    /// Free-form description
    pub description: String,

    /// Runtime tag used to pick the builder script
    pub runtime: String,

    /// Hash of the last commit, empty if never committed
    pub last_commit: String,

    /// Time of the last commit in epoch milliseconds
    pub last_commit_timestamp: i64,

    /// Project classification
    #[serde(rename = "type")]
    pub project_type: ProjectType,
}

impl Project {
    /// Create a normal project with empty commit metadata
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        runtime: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            runtime: runtime.into(),
            last_commit: String::new(),
            last_commit_timestamp: 0,
            project_type: ProjectType::Normal,
        }
    }

    /// Create the baseline project of the given type
    ///
    /// Baseline projects carry no runtime and start with empty commit
    /// metadata. `Normal` is not a baseline type and yields a plain project
    /// named after its id.
    pub fn baseline(project_type: ProjectType) -> Self {
        let (name, description) = match project_type {
            ProjectType::Templates => ("Templates", "Templates"),
            ProjectType::Kamelets => ("Custom Kamelets", "Custom Kamelets"),
            ProjectType::Services => ("Services", "Development Services"),
            ProjectType::Normal => ("normal", ""),
        };
        Self {
            id: project_type.as_str().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            runtime: String::new(),
            last_commit: String::new(),
            last_commit_timestamp: Utc::now().timestamp_millis(),
            project_type,
        }
    }

    /// Set commit metadata
    pub fn with_commit(mut self, commit_id: impl Into<String>, timestamp_millis: i64) -> Self {
        self.last_commit = commit_id.into();
        self.last_commit_timestamp = timestamp_millis;
        self
    }
}

/// A single file belonging to a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectFile {
    /// File name, unique within the project
    pub name: String,

    /// Text content
    pub code: String,

    /// Owning project id
    pub project_id: String,

    /// Time of the last commit touching this file, epoch milliseconds
    pub last_commit_timestamp: i64,
}

impl ProjectFile {
    /// Create a new project file
    pub fn new(
        name: impl Into<String>,
        code: impl Into<String>,
        project_id: impl Into<String>,
        last_commit_timestamp: i64,
    ) -> Self {
        Self {
            name: name.into(),
            code: code.into(),
            project_id: project_id.into(),
            last_commit_timestamp,
        }
    }
}

/// Lifecycle state of a dev-mode container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// No container is running
    #[default]
    Stopped,
    /// A start has been requested
    Starting,
    /// Container is running
    Running,
}

/// Kind of container a status describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContainerType {
    /// Fast-iteration dev-mode container
    #[default]
    Devmode,
    /// Image build container
    Build,
}

/// Status of a project's container in one environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStatus {
    /// Project the container runs
    pub project_id: String,

    /// Environment name (e.g. "dev")
    pub environment: String,

    /// Container name as given to the backend
    pub container_name: String,

    /// Container kind
    #[serde(rename = "type")]
    pub container_type: ContainerType,

    /// Current state
    pub state: ContainerState,

    /// Whether a start request is outstanding
    pub in_transit: bool,

    /// Last modification time in epoch milliseconds
    pub last_updated: i64,
}

impl ContainerStatus {
    /// Fresh `stopped` status for a dev-mode container
    pub fn dev_mode(project_id: impl Into<String>, environment: impl Into<String>) -> Self {
        let project_id = project_id.into();
        Self {
            container_name: project_id.clone(),
            project_id,
            environment: environment.into(),
            container_type: ContainerType::Devmode,
            state: ContainerState::Stopped,
            in_transit: false,
            last_updated: Utc::now().timestamp_millis(),
        }
    }

    /// Whether a new start request must be skipped at `now_millis`
    ///
    /// A start that has been outstanding for `start_timeout_ms` or longer is
    /// considered lost and no longer blocks.
    pub fn blocks_start(&self, now_millis: i64, start_timeout_ms: i64) -> bool {
        self.state == ContainerState::Running
            || (self.in_transit && now_millis.saturating_sub(self.last_updated) < start_timeout_ms)
    }

    /// Mark a start request as outstanding
    pub fn mark_starting(&mut self) {
        self.state = ContainerState::Starting;
        self.in_transit = true;
        self.last_updated = Utc::now().timestamp_millis();
    }

    /// Reset after a failed start request
    pub fn mark_stopped(&mut self) {
        self.state = ContainerState::Stopped;
        self.in_transit = false;
        self.last_updated = Utc::now().timestamp_millis();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_serialization_uses_type_key() {
        let project = Project::baseline(ProjectType::Kamelets);
        let json = serde_json::to_value(&project).unwrap();

        assert_eq!(json["type"], "kamelets");
        assert_eq!(json["id"], "kamelets");
        assert_eq!(json["lastCommit"], "");

        let back: Project = serde_json::from_value(json).unwrap();
        assert_eq!(back, project);
    }

    #[test]
    fn test_baseline_for_folder() {
        assert_eq!(
            ProjectType::baseline_for_folder("templates"),
            Some(ProjectType::Templates)
        );
        assert_eq!(
            ProjectType::baseline_for_folder("services"),
            Some(ProjectType::Services)
        );
        assert_eq!(ProjectType::baseline_for_folder("normal"), None);
        assert_eq!(ProjectType::baseline_for_folder("orders"), None);
    }

    #[test]
    fn test_container_status_transitions() {
        let mut status = ContainerStatus::dev_mode("orders", "dev");
        assert_eq!(status.state, ContainerState::Stopped);
        assert!(!status.blocks_start(status.last_updated, 60_000));

        status.mark_starting();
        assert_eq!(status.state, ContainerState::Starting);
        assert!(status.in_transit);
        assert!(status.blocks_start(status.last_updated + 59_999, 60_000));
        assert!(!status.blocks_start(status.last_updated + 60_000, 60_000));

        status.mark_stopped();
        assert!(!status.blocks_start(status.last_updated, 60_000));

        status.state = ContainerState::Running;
        assert!(status.blocks_start(status.last_updated + 3_600_000, 60_000));
    }

    #[test]
    fn test_validate_name() {
        for name in ["orders", "application.properties", ".env", "my project"] {
            assert!(validate_name("file name", name).is_ok(), "{name}");
        }
        for name in ["", ".", "..", "../escape", "a/b", "a\\b", "/etc/passwd"] {
            assert!(
                matches!(validate_name("file name", name), Err(Error::InvalidKey(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn test_project_type_from_str() {
        assert_eq!("services".parse::<ProjectType>(), Ok(ProjectType::Services));
        assert!("unknown".parse::<ProjectType>().is_err());
    }
}
