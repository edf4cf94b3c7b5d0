//! Repository backed by the `git` command line.

use super::{CommitInfo, GitConfig, Repository, RepositoryEntry, RepositoryFile};
use crate::command::Command;
use crate::config::GitSettings;
use crate::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use futures::lock::Mutex;
use project_store::{Project, ProjectFile, validate_name};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const AUTHOR_NAME: &str = "projectd";
const AUTHOR_EMAIL: &str = "projectd@localhost";

/// Credential helper answering from the environment of the git process
const CREDENTIAL_HELPER: &str =
    "credential.helper=!f() { echo \"username=${GIT_USERNAME}\"; echo \"password=${GIT_PASSWORD}\"; }; f";

/// Git repository with a local working copy
///
/// Every operation first brings the working copy in line with
/// `origin/<branch>`. Operations on the working copy are serialized.
pub struct GitRepository {
    settings: GitSettings,
    work_copy: Mutex<()>,
}

impl GitRepository {
    /// Create a repository from settings; nothing is cloned until first use
    pub fn new(settings: GitSettings) -> Self {
        Self {
            settings,
            work_copy: Mutex::new(()),
        }
    }

    /// Local working copy location
    pub fn work_dir(&self) -> &Path {
        &self.settings.work_dir
    }

    /// `git` invocation with credentials and author identity attached
    fn git(&self) -> Command {
        let mut cmd = Command::new("git");
        if !self.settings.username.is_empty() {
            cmd.args(["-c", "credential.helper=", "-c", CREDENTIAL_HELPER]);
            cmd.env("GIT_USERNAME", &self.settings.username);
            cmd.env("GIT_PASSWORD", &self.settings.password);
        }
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_AUTHOR_NAME", AUTHOR_NAME)
            .env("GIT_AUTHOR_EMAIL", AUTHOR_EMAIL)
            .env("GIT_COMMITTER_NAME", AUTHOR_NAME)
            .env("GIT_COMMITTER_EMAIL", AUTHOR_EMAIL);
        cmd
    }

    /// Run git in the working copy and return its standard output
    async fn run(&self, args: &[&str]) -> Result<String> {
        let mut cmd = self.git();
        cmd.args(args).current_dir(self.work_dir());
        run_checked(&cmd, args).await
    }

    /// Bring the working copy in line with the remote branch
    async fn sync(&self) -> Result<()> {
        let branch = self.settings.branch.as_str();

        if self.work_dir().join(".git").is_dir() {
            self.run(&["remote", "set-url", "origin", &self.settings.uri])
                .await?;
        } else {
            info!("Initializing working copy in {:?}", self.work_dir());
            async_fs::create_dir_all(self.work_dir()).await?;
            self.run(&["init", "--quiet"]).await?;
            self.run(&["remote", "add", "origin", &self.settings.uri])
                .await?;
        }

        let heads = self
            .run(&["ls-remote", "--heads", "origin", branch])
            .await?;
        if heads.trim().is_empty() {
            // Empty remote: the first push creates the branch
            debug!("Branch {} does not exist on the remote yet", branch);
            self.run(&["symbolic-ref", "HEAD", &format!("refs/heads/{branch}")])
                .await?;
            return Ok(());
        }

        let remote_branch = format!("origin/{branch}");
        self.run(&["fetch", "--quiet", "origin", branch]).await?;
        self.run(&["checkout", "--quiet", "-B", branch, &remote_branch])
            .await?;
        self.run(&["reset", "--quiet", "--hard", &remote_branch])
            .await?;
        Ok(())
    }

    /// Latest commit touching `path`, if any
    async fn last_commit(&self, path: &str) -> Result<Option<CommitInfo>> {
        // No commits yet on an unborn branch
        if !self.has_commits().await {
            return Ok(None);
        }
        let line = self
            .run(&["log", "-1", "--format=%H|%ct", "--", path])
            .await?;
        Ok(parse_commit_line(&line))
    }

    async fn has_commits(&self) -> bool {
        self.run(&["rev-parse", "--verify", "--quiet", "HEAD"])
            .await
            .is_ok()
    }

    /// Read one folder of the (already synced) working copy
    ///
    /// Files that are not valid UTF-8 are skipped.
    async fn read_folder(&self, name: &str) -> Result<RepositoryEntry> {
        let folder = self.work_dir().join(name);
        let commit = self.last_commit(name).await?;

        let mut files = Vec::new();
        for file_name in list_dir(&folder, false).await? {
            let bytes = async_fs::read(folder.join(&file_name)).await?;
            let Ok(body) = String::from_utf8(bytes) else {
                warn!("Skipping non-text file {} in {}", file_name, name);
                continue;
            };
            let last_commit_timestamp = self
                .last_commit(&format!("{name}/{file_name}"))
                .await?
                .map(|c| c.commit_time_seconds * 1000)
                .unwrap_or_default();
            files.push(RepositoryFile {
                name: file_name,
                body,
                last_commit_timestamp,
            });
        }

        Ok(RepositoryEntry {
            name: name.to_string(),
            commit_id: commit
                .as_ref()
                .map(|c| c.commit_id.clone())
                .unwrap_or_default(),
            last_commit_timestamp: commit
                .map(|c| c.commit_time_seconds * 1000)
                .unwrap_or_default(),
            files,
        })
    }
}

/// Run a prepared command, mapping a non-zero exit to a repository error
async fn run_checked(cmd: &Command, args: &[&str]) -> Result<String> {
    let output = cmd.output().await?;
    if output.success() {
        Ok(output.stdout)
    } else {
        Err(Error::Repository(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            output.stderr.trim()
        )))
    }
}

/// Names of the non-hidden entries of `dir`; directories or regular files
async fn list_dir(dir: &Path, directories: bool) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = async_fs::read_dir(dir).await?;
    while let Some(entry) = entries.next().await {
        let entry = entry?;
        let file_type = entry.file_type().await?;
        let wanted = if directories {
            file_type.is_dir()
        } else {
            file_type.is_file()
        };
        match entry.file_name().into_string() {
            Ok(name) if wanted && !name.starts_with('.') => names.push(name),
            Ok(_) => {}
            Err(name) => warn!("Skipping non UTF-8 entry {:?} in {:?}", name, dir),
        }
    }
    names.sort();
    Ok(names)
}

/// Reject a project id or file name that would leave the project folder
fn check_names(project: &Project, files: &[ProjectFile]) -> Result<()> {
    validate_name("project id", &project.id)
        .and_then(|()| {
            files
                .iter()
                .try_for_each(|file| validate_name("file name", &file.name))
        })
        .map_err(|e| Error::Repository(e.to_string()))
}

/// Parse `<hash>|<epoch seconds>` as printed by `git log --format=%H|%ct`
fn parse_commit_line(line: &str) -> Option<CommitInfo> {
    let (commit_id, seconds) = line.trim().split_once('|')?;
    Some(CommitInfo {
        commit_id: commit_id.to_string(),
        commit_time_seconds: seconds.parse().ok()?,
    })
}

#[async_trait]
impl Repository for GitRepository {
    async fn check_reachable(&self) -> bool {
        let args = ["ls-remote", "--heads", self.settings.uri.as_str()];
        let mut cmd = self.git();
        cmd.args(args);
        match run_checked(&cmd, &args).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Repository {} is not reachable: {}", self.settings.uri, e);
                false
            }
        }
    }

    async fn list_importable_entries(&self) -> Result<Vec<RepositoryEntry>> {
        let _guard = self.work_copy.lock().await;
        self.sync().await?;

        let mut entries = Vec::new();
        for name in list_dir(self.work_dir(), true).await? {
            match self.read_folder(&name).await {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping folder {} of the repository: {}", name, e),
            }
        }
        info!("Found {} project folder(s) in the repository", entries.len());
        Ok(entries)
    }

    async fn read_entry(&self, project_id: &str) -> Result<RepositoryEntry> {
        validate_name("project id", project_id).map_err(|e| Error::Repository(e.to_string()))?;
        let _guard = self.work_copy.lock().await;
        self.sync().await?;

        if !self.work_dir().join(project_id).is_dir() {
            return Err(Error::Repository(format!(
                "folder {project_id} does not exist in the repository"
            )));
        }
        self.read_folder(project_id).await
    }

    async fn commit_and_push(
        &self,
        project: &Project,
        files: &[ProjectFile],
        message: &str,
    ) -> Result<CommitInfo> {
        check_names(project, files)?;
        let _guard = self.work_copy.lock().await;
        self.sync().await?;

        let folder: PathBuf = self.work_dir().join(&project.id);
        async_fs::create_dir_all(&folder).await?;
        for file in files {
            async_fs::write(folder.join(&file.name), &file.code).await?;
        }

        let branch = self.settings.branch.as_str();
        self.run(&["add", "-A"]).await?;
        self.run(&["commit", "--quiet", "--allow-empty", "-m", message])
            .await?;
        self.run(&["push", "--quiet", "origin", &format!("HEAD:refs/heads/{branch}")])
            .await?;

        let line = self.run(&["log", "-1", "--format=%H|%ct"]).await?;
        let commit = parse_commit_line(&line).ok_or_else(|| {
            Error::Repository(format!("unexpected git log output: {}", line.trim()))
        })?;
        info!(
            "Pushed {} file(s) of {} as {}",
            files.len(),
            project.id,
            commit.commit_id
        );
        Ok(commit)
    }

    fn build_config(&self) -> GitConfig {
        self.settings.build_config()
    }
}
