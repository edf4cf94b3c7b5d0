//! Command type for the external tools the collaborators drive (`git`,
//! `docker`, `kubectl`).

use async_process::{Command as AsyncCommand, Stdio};
use std::collections::{BTreeMap, BTreeSet};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A command to be executed
///
/// This is a builder that converts to an `async_process::Command` when run.
/// Unlike `AsyncCommand`, this type is `Clone`, comparable and can be
/// inspected, which lets tests assert on the exact invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    program: OsString,
    args: Vec<OsString>,
    env: BTreeMap<OsString, OsString>,
    current_dir: Option<PathBuf>,
    /// Indices of arguments hidden from [`Command::display`]
    masked: BTreeSet<usize>,
}

/// Captured result of a finished command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal
    pub code: Option<i32>,
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl CommandOutput {
    /// Whether the command exited with status zero
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl Command {
    /// Create a new command for the given program
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: BTreeMap::new(),
            current_dir: None,
            masked: BTreeSet::new(),
        }
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Add an argument that is passed as-is but never logged
    pub fn masked_arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.masked.insert(self.args.len());
        self.arg(arg)
    }

    /// Set an environment variable
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env
            .insert(key.as_ref().to_owned(), val.as_ref().to_owned());
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Get the program name
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// Get the arguments
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Render the command line for logs; environment values and masked
    /// arguments are left out
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.to_string_lossy().into_owned()];
        parts.extend(self.args.iter().enumerate().map(|(i, a)| {
            if self.masked.contains(&i) {
                "***".to_string()
            } else {
                a.to_string_lossy().into_owned()
            }
        }));
        parts.join(" ")
    }

    /// Prepare this command for execution by converting to an `async_process::Command`
    fn prepare(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        cmd.args(&self.args);
        for (key, val) in &self.env {
            cmd.env(key, val);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null());
        cmd
    }

    /// Run the command to completion and capture its output
    pub async fn output(&self) -> std::io::Result<CommandOutput> {
        debug!("Running: {}", self.display());
        let output = self.prepare().output().await?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let mut cmd = Command::new("docker");
        cmd.args(["run", "-d"]).arg("--name").arg("orders");
        cmd.env("TAG", "latest");

        assert_eq!(cmd.get_program(), "docker");
        assert_eq!(cmd.get_args().len(), 4);
        assert_eq!(cmd.display(), "docker run -d --name orders");
    }

    #[test]
    fn test_masked_args_are_hidden_from_display() {
        let mut cmd = Command::new("kubectl");
        cmd.arg("run").masked_arg("--env=GIT_PASSWORD=s3cret").arg("orders");

        assert_eq!(cmd.get_args().len(), 3);
        assert_eq!(cmd.get_args()[1], "--env=GIT_PASSWORD=s3cret");
        assert_eq!(cmd.display(), "kubectl run *** orders");
    }

    #[smol_potat::test]
    async fn test_command_output_captures_stdout() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "echo hello; exit 3"]);

        let output = cmd.output().await.unwrap();
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.code, Some(3));
        assert!(!output.success());
    }
}
