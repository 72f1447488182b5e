// src/mirror/git.rs

//! Git-backed content store
//!
//! Drives the `git` executable rather than linking a git implementation.
//! Every invocation runs non-interactively (stdin nulled, terminal prompts
//! disabled) under a timeout, and its stderr is carried into the error.

use super::{CommitAuthor, ContentStore, StoreError};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::debug;

/// Content store implemented with the `git` command line
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
    timeout: Duration,
}

impl GitCli {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: PathBuf::from("git"),
            timeout,
        }
    }

    /// Use a specific git binary
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// True if the git binary can be executed
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    fn run(&self, operation: &str, cwd: Option<&Path>, args: &[&str]) -> Result<String, StoreError> {
        debug!("git {}", args.join(" "));

        let mut command = Command::new(&self.program);
        command
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(cwd) = cwd {
            command.current_dir(cwd);
        }

        let mut child = command
            .spawn()
            .map_err(|e| StoreError::new(operation, format!("failed to run git: {}", e)))?;

        let output = crate::process::wait_with_timeout(&mut child, self.timeout)
            .map_err(|e| StoreError::new(operation, e.to_string()))?;
        match output {
            Some(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
            Some(output) => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(StoreError::new(
                    operation,
                    format!(
                        "git exited with {}: {}",
                        output.status.code().unwrap_or(-1),
                        stderr.trim()
                    ),
                ))
            }
            None => Err(StoreError::new(
                operation,
                format!("git timed out after {}s", self.timeout.as_secs()),
            )),
        }
    }
}

fn path_arg(path: &Path) -> Result<&str, StoreError> {
    path.to_str()
        .ok_or_else(|| StoreError::new("path", format!("non UTF-8 path {}", path.display())))
}

impl ContentStore for GitCli {
    fn clone_shallow(&self, remote_url: &str, branch: &str, dest: &Path) -> Result<(), StoreError> {
        let dest = path_arg(dest)?;
        self.run(
            "clone",
            None,
            &[
                "clone",
                "--quiet",
                "--depth",
                "1",
                "--single-branch",
                "--branch",
                branch,
                remote_url,
                dest,
            ],
        )?;
        Ok(())
    }

    fn fetch(&self, repo: &Path, branch: &str) -> Result<(), StoreError> {
        self.run("fetch", Some(repo), &["fetch", "--quiet", "origin", branch])?;
        Ok(())
    }

    fn pull(&self, repo: &Path, branch: &str) -> Result<(), StoreError> {
        self.run(
            "pull",
            Some(repo),
            &["pull", "--quiet", "--ff-only", "origin", branch],
        )?;
        Ok(())
    }

    fn head_commit(&self, repo: &Path) -> Result<String, StoreError> {
        self.run("rev-parse", Some(repo), &["rev-parse", "HEAD"])
    }

    fn remote_url(&self, repo: &Path) -> Result<String, StoreError> {
        self.run(
            "config",
            Some(repo),
            &["config", "--get", "remote.origin.url"],
        )
    }

    fn commit_paths(
        &self,
        repo: &Path,
        paths: &[&Path],
        message: &str,
        author: &CommitAuthor,
    ) -> Result<String, StoreError> {
        let mut add_args = vec!["add", "--"];
        for path in paths {
            add_args.push(path_arg(path)?);
        }
        self.run("add", Some(repo), &add_args)?;

        let name = format!("user.name={}", author.name);
        let email = format!("user.email={}", author.email);
        self.run(
            "commit",
            Some(repo),
            &["-c", &name, "-c", &email, "commit", "--quiet", "-m", message],
        )?;
        self.head_commit(repo)
    }
}
