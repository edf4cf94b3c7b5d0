//! Fakes shared by the orchestration integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use project_orchestration::{
    ClusterBackend, CommitInfo, ConfiguredRegistry, ContainerStatus, Error, ExecutionBackend,
    GitConfig, LocalBackend, OrchestratorBuilder, Project, ProjectFile, ProjectOrchestrator,
    ProjectStore, RegistrySettings, Repository, RepositoryEntry, RepositoryFile, Result,
    StatusPublisher,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Repository serving entries from memory and recording commits
#[derive(Default)]
pub struct FakeRepository {
    pub unreachable: AtomicBool,
    pub fail_listing: AtomicBool,
    pub fail_commit: AtomicBool,
    pub list_calls: AtomicUsize,
    pub entries: Mutex<Vec<RepositoryEntry>>,
    pub commits: Mutex<Vec<RecordedCommit>>,
}

/// One recorded commit-and-push
#[derive(Debug, Clone)]
pub struct RecordedCommit {
    pub project_id: String,
    pub file_names: Vec<String>,
    pub message: String,
}

impl FakeRepository {
    pub fn with_entries(entries: Vec<RepositoryEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            ..Self::default()
        }
    }

    pub fn commits(&self) -> Vec<RecordedCommit> {
        self.commits.lock().unwrap().clone()
    }

    pub fn commits_for(&self, project_id: &str) -> usize {
        self.commits()
            .iter()
            .filter(|c| c.project_id == project_id)
            .count()
    }
}

/// Repository folder with the given files, committed at a fixed time
pub fn entry(name: &str, files: &[(&str, &str)]) -> RepositoryEntry {
    RepositoryEntry {
        name: name.to_string(),
        commit_id: format!("{name}-head"),
        last_commit_timestamp: 1_700_000_000_000,
        files: files
            .iter()
            .map(|(file, body)| RepositoryFile {
                name: file.to_string(),
                body: body.to_string(),
                last_commit_timestamp: 1_700_000_000_000,
            })
            .collect(),
    }
}

#[async_trait]
impl Repository for FakeRepository {
    async fn check_reachable(&self) -> bool {
        !self.unreachable.load(Ordering::SeqCst)
    }

    async fn list_importable_entries(&self) -> Result<Vec<RepositoryEntry>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(Error::Repository("listing failed".to_string()));
        }
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn read_entry(&self, project_id: &str) -> Result<RepositoryEntry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .find(|entry| entry.name == project_id)
            .cloned()
            .ok_or_else(|| Error::Repository(format!("{project_id} not found")))
    }

    async fn commit_and_push(
        &self,
        project: &Project,
        files: &[ProjectFile],
        message: &str,
    ) -> Result<CommitInfo> {
        if self.fail_commit.load(Ordering::SeqCst) {
            return Err(Error::Repository("push rejected".to_string()));
        }
        let mut commits = self.commits.lock().unwrap();
        commits.push(RecordedCommit {
            project_id: project.id.clone(),
            file_names: files.iter().map(|f| f.name.clone()).collect(),
            message: message.to_string(),
        });
        let n = commits.len() as i64;
        Ok(CommitInfo {
            commit_id: format!("commit-{n}"),
            commit_time_seconds: 1_700_000_000 + n,
        })
    }

    fn build_config(&self) -> GitConfig {
        GitConfig {
            uri: "https://git.example.com/projects.git".to_string(),
            username: "builder".to_string(),
            password: "s3cret".to_string(),
            branch: "main".to_string(),
        }
    }
}

/// A call received by a recording backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    DevMode {
        project_id: String,
        options: String,
        ports: BTreeMap<u16, u16>,
        file_names: Vec<String>,
        volumes: BTreeMap<String, String>,
    },
    Build {
        project_id: String,
        script: String,
        env: Vec<String>,
        volumes: BTreeMap<String, String>,
        tag: String,
    },
}

/// Backend recording every dispatch, usable as either variant
#[derive(Default)]
pub struct RecordingBackend {
    pub calls: Mutex<Vec<BackendCall>>,
    pub fail: AtomicBool,
    /// Delay inside each dispatch, to widen race windows
    pub delay_ms: AtomicUsize,
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: BackendCall) -> Result<()> {
        let delay = self.delay_ms.load(Ordering::SeqCst) as u64;
        if delay > 0 {
            smol::Timer::after(Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::Backend("engine unavailable".to_string()));
        }
        self.calls.lock().unwrap().push(call);
        Ok(())
    }
}

#[async_trait]
impl LocalBackend for RecordingBackend {
    async fn run_dev_mode_container(
        &self,
        project_id: &str,
        options: &str,
        ports: &BTreeMap<u16, u16>,
        files: &[ProjectFile],
        volumes: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.record(BackendCall::DevMode {
            project_id: project_id.to_string(),
            options: options.to_string(),
            ports: ports.clone(),
            file_names: files.iter().map(|f| f.name.clone()).collect(),
            volumes: volumes.clone(),
        })
        .await
    }

    async fn run_build(
        &self,
        project: &Project,
        script: &str,
        env: &[String],
        volumes: &BTreeMap<String, String>,
        tag: &str,
    ) -> Result<()> {
        self.record(BackendCall::Build {
            project_id: project.id.clone(),
            script: script.to_string(),
            env: env.to_vec(),
            volumes: volumes.clone(),
            tag: tag.to_string(),
        })
        .await
    }
}

#[async_trait]
impl ClusterBackend for RecordingBackend {
    async fn run_dev_mode_container(&self, project: &Project, options: &str) -> Result<()> {
        self.record(BackendCall::DevMode {
            project_id: project.id.clone(),
            options: options.to_string(),
            ports: BTreeMap::new(),
            file_names: Vec::new(),
            volumes: BTreeMap::new(),
        })
        .await
    }

    async fn run_build(
        &self,
        project: &Project,
        script: &str,
        env: &[String],
        tag: &str,
    ) -> Result<()> {
        self.record(BackendCall::Build {
            project_id: project.id.clone(),
            script: script.to_string(),
            env: env.to_vec(),
            volumes: BTreeMap::new(),
            tag: tag.to_string(),
        })
        .await
    }
}

/// Publisher keeping every status it receives
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<ContainerStatus>>,
}

impl RecordingPublisher {
    pub fn published(&self) -> Vec<ContainerStatus> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusPublisher for RecordingPublisher {
    async fn publish(&self, status: &ContainerStatus) {
        self.published.lock().unwrap().push(status.clone());
    }
}

/// Orchestrator wired to fakes, with handles on every fake
pub struct Harness {
    pub orchestrator: Arc<ProjectOrchestrator>,
    pub store: ProjectStore,
    pub repository: Arc<FakeRepository>,
    pub backend: Arc<RecordingBackend>,
    pub publisher: Arc<RecordingPublisher>,
}

/// Which backend variant a harness uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Local,
    Cluster,
}

impl Harness {
    pub async fn new(mode: Mode, repository: FakeRepository) -> Self {
        let store = ProjectStore::in_memory().await.unwrap();
        Self::with_store(mode, repository, store)
    }

    pub fn with_store(mode: Mode, repository: FakeRepository, store: ProjectStore) -> Self {
        let repository = Arc::new(repository);
        let backend = Arc::new(RecordingBackend::default());
        let publisher = Arc::new(RecordingPublisher::default());

        let execution = match mode {
            Mode::Local => ExecutionBackend::Local(backend.clone()),
            Mode::Cluster => ExecutionBackend::Cluster(backend.clone()),
        };
        let registry = ConfiguredRegistry::new(RegistrySettings {
            url: "registry:5000".to_string(),
            group: "projects".to_string(),
            ..Default::default()
        });

        let orchestrator = OrchestratorBuilder::new(store.clone(), repository.clone(), execution)
            .publisher(publisher.clone())
            .registry(Arc::new(registry))
            .environment("dev")
            .cache_volumes(BTreeMap::from([(
                "/var/cache/m2".to_string(),
                "/root/.m2".to_string(),
            )]))
            .build();

        Self {
            orchestrator: Arc::new(orchestrator),
            store,
            repository,
            backend,
            publisher,
        }
    }
}
