// src/install/script.rs

//! Package script execution
//!
//! Install and uninstall scripts from package metadata are written to a
//! temporary file and run through the system shell with the package
//! directory as working directory. A non-zero exit is reported to the
//! caller, which logs it; only a failure to run the script at all is an
//! error.
//!
//! # Safety
//!
//! - Scripts run with stdin nulled so an interactive prompt cannot hang
//!   the install
//! - Execution is bounded by a timeout; the process is killed on expiry

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Shells probed in order; the first that exists is used
const SHELL_CANDIDATES: [&str; 2] = ["/system/bin/sh", "/bin/sh"];

/// Path of the shell used for package scripts and wrapper shims
pub fn shell_path() -> PathBuf {
    SHELL_CANDIDATES
        .iter()
        .map(Path::new)
        .find(|p| p.exists())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("sh"))
}

/// When a script runs relative to the package lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptPhase {
    PostInstall,
    PreRemove,
}

impl ScriptPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScriptPhase::PostInstall => "post-install",
            ScriptPhase::PreRemove => "pre-remove",
        }
    }
}

/// Runs package scripts for one package
pub struct ScriptRunner<'a> {
    package_id: &'a str,
    package_version: &'a str,
    package_dir: &'a Path,
    timeout: Duration,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(
        package_id: &'a str,
        package_version: &'a str,
        package_dir: &'a Path,
        timeout: Duration,
    ) -> Self {
        Self {
            package_id,
            package_version,
            package_dir,
            timeout,
        }
    }

    /// Run `content`, returning the script's exit code
    pub fn run(&self, phase: ScriptPhase, content: &str) -> Result<i32> {
        let phase_name = phase.as_str();
        info!(
            "Running {} script for {} {}",
            phase_name, self.package_id, self.package_version
        );

        if !self.package_dir.is_dir() {
            return Err(Error::ScriptError(format!(
                "package directory {} does not exist",
                self.package_dir.display()
            )));
        }

        let temp_dir = TempDir::new()?;
        let script_path = prepare_script(temp_dir.path(), phase_name, content)?;
        let shell = shell_path();
        debug!("Executing {} {}", shell.display(), script_path.display());

        let mut child = Command::new(&shell)
            .arg(&script_path)
            .current_dir(self.package_dir)
            .env("BOUNTU_PACKAGE_ID", self.package_id)
            .env("BOUNTU_PACKAGE_VERSION", self.package_version)
            .env("BOUNTU_PACKAGE_DIR", self.package_dir)
            .env("BOUNTU_PHASE", phase_name)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::ScriptError(format!("Failed to spawn {} script: {}", phase_name, e)))?;

        match crate::process::wait_with_timeout(&mut child, self.timeout)? {
            Some(output) => {
                for line in String::from_utf8_lossy(&output.stdout).lines() {
                    info!("[{}] {}", phase_name, line);
                }
                for line in String::from_utf8_lossy(&output.stderr).lines() {
                    warn!("[{}] {}", phase_name, line);
                }

                let code = output.status.code().unwrap_or(-1);
                if output.status.success() {
                    info!("{} script completed", phase_name);
                } else {
                    warn!("{} script exited with code {}", phase_name, code);
                }
                Ok(code)
            }
            None => Err(Error::ScriptError(format!(
                "{} script timed out after {} seconds",
                phase_name,
                self.timeout.as_secs()
            ))),
        }
    }
}

fn prepare_script(temp_dir: &Path, phase: &str, content: &str) -> Result<PathBuf> {
    let script_path = temp_dir.join(format!("{phase}.sh"));
    let mut file = File::create(&script_path)?;
    file.write_all(content.as_bytes())?;
    if !content.ends_with('\n') {
        file.write_all(b"\n")?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&script_path)?.permissions();
        perms.set_mode(0o700);
        fs::set_permissions(&script_path, perms)?;
    }

    Ok(script_path)
}
