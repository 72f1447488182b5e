// src/install/mod.rs

//! Package installation
//!
//! The [`Installer`] drives a package through a fixed pipeline:
//!
//! ```text
//! download -> verify -> extract -> permissions -> post-install -> links -> record
//!   0-40%     40-50%    50-80%       80-90%         90-95%       95-100%
//! ```
//!
//! Dependency and conflict checks run before anything touches the
//! filesystem. Dependencies are advisory: missing ones are reported, never
//! installed automatically.
//!
//! Archives are extracted into a staging directory next to the package
//! directory and moved into place only once extraction succeeded. A failed
//! download, verification or extraction therefore leaves nothing behind on
//! install and the previous version intact on update. Once the new tree is
//! swapped in there is no rollback: a later failure leaves the new files in
//! place while the record still names the previous version, and `repair`
//! redeploys it. The downloaded artifact is always deleted.

mod links;
mod script;

pub use links::{EnvironmentFile, create_shims, mark_bin_executable, remove_shims};
pub use script::{ScriptPhase, ScriptRunner, shell_path};

use crate::archive;
use crate::catalog::{Catalog, PackageDescriptor};
use crate::config::EngineConfig;
use crate::db::models::InstalledRecord;
use crate::db::{self, SharedConnection};
use crate::error::{Error, Result};
use crate::fetch::ArtifactFetcher;
use crate::filesystem::{remove_dir_best_effort, remove_file_best_effort, sanitize_filename};
use crate::hash::{self, ChecksumMismatch};
use crate::progress::{LogProgress, ProgressReporter, StageProgress};
use crate::version;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Pipeline stage, used for progress and failure reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStage {
    Idle,
    Downloading,
    Verifying,
    Extracting,
    SettingPermissions,
    RunningPostInstall,
    CreatingLinks,
    Registered,
    Failed,
}

impl InstallStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallStage::Idle => "idle",
            InstallStage::Downloading => "downloading",
            InstallStage::Verifying => "verifying",
            InstallStage::Extracting => "extracting",
            InstallStage::SettingPermissions => "setting permissions",
            InstallStage::RunningPostInstall => "running post-install",
            InstallStage::CreatingLinks => "creating links",
            InstallStage::Registered => "registered",
            InstallStage::Failed => "failed",
        }
    }
}

impl fmt::Display for InstallStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("{0} is already installed")]
    AlreadyInstalled(String),

    #[error("{0} is not installed")]
    NotInstalled(String),

    #[error("{0} has no pending update")]
    NoPendingUpdate(String),

    #[error("{id} cannot be installed: {reason}")]
    NotInstallable { id: String, reason: String },

    #[error("{id} requires packages that are not installed: {}", missing.join(", "))]
    MissingDependencies { id: String, missing: Vec<String> },

    #[error("{id} conflicts with installed packages: {}", conflicts.join(", "))]
    HasConflicts { id: String, conflicts: Vec<String> },

    #[error("{id}: {stage} failed: {cause}")]
    StageFailed {
        id: String,
        stage: InstallStage,
        #[source]
        cause: Box<Error>,
    },
}

impl InstallError {
    fn stage(id: &str, stage: InstallStage, cause: impl Into<Error>) -> Self {
        Self::StageFailed {
            id: id.to_string(),
            stage,
            cause: Box::new(cause.into()),
        }
    }
}

/// What a successful install, update or repair produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub id: String,
    pub version: String,
    pub install_path: PathBuf,
    pub shims: Vec<PathBuf>,
    /// Exit code of the post-install script, if one ran
    pub script_exit_code: Option<i32>,
}

/// How a deployed package gets recorded
#[derive(Clone, Copy, PartialEq, Eq)]
enum RecordMode {
    Insert,
    Replace,
}

/// Installs, updates and removes packages under the data directory
pub struct Installer {
    packages_dir: PathBuf,
    bin_dir: PathBuf,
    cache_dir: PathBuf,
    env: EnvironmentFile,
    db: SharedConnection,
    fetcher: ArtifactFetcher,
    require_checksum: bool,
    script_timeout: Duration,
    op_lock: Mutex<()>,
}

impl Installer {
    pub fn new(config: &EngineConfig, db: SharedConnection, fetcher: ArtifactFetcher) -> Result<Self> {
        Ok(Self {
            packages_dir: config.packages_dir(),
            bin_dir: config.bin_dir(),
            cache_dir: config.cache_dir(),
            env: EnvironmentFile::new(config.env_file()),
            db,
            fetcher,
            require_checksum: config.install.require_checksum,
            script_timeout: config.script_timeout()?,
            op_lock: Mutex::new(()),
        })
    }

    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    pub fn bin_dir(&self) -> &Path {
        &self.bin_dir
    }

    pub fn environment_file(&self) -> &Path {
        self.env.path()
    }

    pub fn fetcher(&self) -> &ArtifactFetcher {
        &self.fetcher
    }

    /// Directory a package is installed into
    pub fn package_dir(&self, id: &str) -> Result<PathBuf> {
        Ok(self.packages_dir.join(sanitize_filename(id)?))
    }

    fn lock_ops(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.op_lock
            .lock()
            .map_err(|_| Error::InitError("installer lock poisoned".to_string()))
    }

    /// Every installed package record
    pub fn installed(&self) -> Result<Vec<InstalledRecord>> {
        let conn = db::lock(&self.db)?;
        InstalledRecord::list_all(&conn)
    }

    pub fn record(&self, id: &str) -> Result<Option<InstalledRecord>> {
        let conn = db::lock(&self.db)?;
        InstalledRecord::find_by_id(&conn, id)
    }

    /// Persist the catalog's update/maintenance flags for installed packages
    ///
    /// Runs in one transaction; returns how many records changed.
    pub fn record_catalog_flags(&self, catalog: &Catalog) -> Result<usize> {
        let mut conn = db::lock(&self.db)?;
        db::transaction(&mut conn, |tx| {
            let mut changed = 0;
            for record in InstalledRecord::list_all(tx)? {
                let Some(package) = catalog.get(&record.id) else {
                    continue;
                };
                let status = &package.status;
                if status.needs_maintenance == record.needs_maintenance
                    && status.needs_update == record.needs_update
                {
                    continue;
                }
                debug!("Updating flags for {}", record.id);
                InstalledRecord::set_flags(
                    tx,
                    &record.id,
                    status.needs_update,
                    status.needs_maintenance,
                    status.maintenance_reason.as_deref(),
                )?;
                changed += 1;
            }
            Ok(changed)
        })
    }

    /// Install a package that is not yet installed
    pub fn install(
        &self,
        descriptor: &PackageDescriptor,
        progress: &dyn ProgressReporter,
    ) -> Result<InstallOutcome> {
        let _ops = self.lock_ops()?;
        let id = descriptor.id.as_str();
        info!("Installing {} {}", id, descriptor.version);

        let installed = {
            let conn = db::lock(&self.db)?;
            if InstalledRecord::find_by_id(&conn, id)?.is_some() {
                return Err(InstallError::AlreadyInstalled(id.to_string()).into());
            }
            InstalledRecord::installed_ids(&conn)?
        };

        check_installable(descriptor)?;

        let missing: Vec<String> = descriptor
            .dependencies
            .iter()
            .filter(|dep| !installed.contains(dep.as_str()))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(InstallError::MissingDependencies {
                id: id.to_string(),
                missing,
            }
            .into());
        }

        let conflicts: Vec<String> = descriptor
            .conflicts
            .iter()
            .filter(|c| installed.contains(c.as_str()))
            .cloned()
            .collect();
        if !conflicts.is_empty() {
            return Err(InstallError::HasConflicts {
                id: id.to_string(),
                conflicts,
            }
            .into());
        }

        self.deploy(descriptor, progress, RecordMode::Insert)
    }

    /// Install the catalog's version of an installed package over the old one
    ///
    /// Fails unless the package is installed and has a pending update
    /// (flagged on its record, or the catalog version is newer).
    pub fn update(
        &self,
        descriptor: &PackageDescriptor,
        progress: &dyn ProgressReporter,
    ) -> Result<InstallOutcome> {
        let _ops = self.lock_ops()?;
        let id = descriptor.id.as_str();

        let record = self
            .record(id)?
            .ok_or_else(|| InstallError::NotInstalled(id.to_string()))?;
        let pending = record.needs_update
            || version::is_newer(&descriptor.version, &record.installed_version);
        if !pending {
            return Err(InstallError::NoPendingUpdate(id.to_string()).into());
        }
        check_installable(descriptor)?;

        info!(
            "Updating {} {} -> {}",
            id, record.installed_version, descriptor.version
        );
        self.deploy(descriptor, progress, RecordMode::Replace)
    }

    /// Reinstall an installed package in place, clearing its flags
    pub fn repair(
        &self,
        descriptor: &PackageDescriptor,
        progress: &dyn ProgressReporter,
    ) -> Result<InstallOutcome> {
        let _ops = self.lock_ops()?;
        let id = descriptor.id.as_str();

        let record = self
            .record(id)?
            .ok_or_else(|| InstallError::NotInstalled(id.to_string()))?;
        if !record.needs_maintenance {
            debug!("{} is not flagged for maintenance, reinstalling anyway", id);
        }
        check_installable(descriptor)?;

        info!("Repairing {} {}", id, descriptor.version);
        self.deploy(descriptor, progress, RecordMode::Replace)
    }

    /// Update every installed package in `catalog` with a pending update
    ///
    /// Failures do not stop the run; each package gets its own result.
    pub fn update_all(&self, catalog: &Catalog) -> Vec<(String, Result<InstallOutcome>)> {
        let mut results = Vec::new();
        for package in catalog.iter() {
            if package.is_installed() && package.status.needs_update {
                let progress = LogProgress::new(format!("Updating {}", package.id));
                let result = self.update(package, &progress);
                if let Err(e) = &result {
                    warn!("Update of {} failed: {}", package.id, e);
                }
                results.push((package.id.clone(), result));
            }
        }
        info!("Processed {} pending updates", results.len());
        results
    }

    /// Remove an installed package
    pub fn uninstall(&self, descriptor: &PackageDescriptor) -> Result<()> {
        self.uninstall_package(&descriptor.id, descriptor.uninstall_script.as_deref())
    }

    /// Remove an installed package by id, running `uninstall_script` first
    ///
    /// Usable for packages that have disappeared from the catalog.
    pub fn uninstall_package(&self, id: &str, uninstall_script: Option<&str>) -> Result<()> {
        let _ops = self.lock_ops()?;
        let record = self
            .record(id)?
            .ok_or_else(|| InstallError::NotInstalled(id.to_string()))?;
        let package_dir = self.package_dir(id)?;
        info!("Removing {} {}", id, record.installed_version);

        if let Some(content) = uninstall_script
            && package_dir.is_dir()
        {
            let runner = ScriptRunner::new(
                id,
                &record.installed_version,
                &package_dir,
                self.script_timeout,
            );
            if let Err(e) = runner.run(ScriptPhase::PreRemove, content) {
                warn!("Uninstall script for {} failed: {}", id, e);
            }
        }

        if package_dir.exists() {
            fs::remove_dir_all(&package_dir)?;
        }
        remove_shims(&self.bin_dir, id)?;
        if let Err(e) = self.env.remove_package(&package_dir) {
            warn!("Failed to update {}: {}", self.env.path().display(), e);
        }

        let conn = db::lock(&self.db)?;
        InstalledRecord::delete(&conn, id)?;
        info!("Removed {}", id);
        Ok(())
    }

    /// Download, verify, extract and register `descriptor`
    fn deploy(
        &self,
        descriptor: &PackageDescriptor,
        progress: &dyn ProgressReporter,
        mode: RecordMode,
    ) -> Result<InstallOutcome> {
        let id = descriptor.id.as_str();
        let package_dir = self.package_dir(id)?;
        progress.report(0.0);

        // Download
        let artifact = {
            let stage = StageProgress::new(progress, 0.0, 0.4);
            fs::create_dir_all(&self.cache_dir)
                .map_err(|e| InstallError::stage(id, InstallStage::Downloading, e))?;
            self.fetcher
                .download_with_fallback(descriptor, &self.cache_dir, &stage)
                .map_err(|e| InstallError::stage(id, InstallStage::Downloading, e))?
        };

        let result = self.deploy_artifact(descriptor, &artifact, &package_dir, progress, mode);
        remove_file_best_effort(&artifact);

        match &result {
            Ok(outcome) => info!("Installed {} {} into {}", id, outcome.version, package_dir.display()),
            Err(e) => warn!("Installing {} failed: {}", id, e),
        }
        result
    }

    fn deploy_artifact(
        &self,
        descriptor: &PackageDescriptor,
        artifact: &Path,
        package_dir: &Path,
        progress: &dyn ProgressReporter,
        mode: RecordMode,
    ) -> Result<InstallOutcome> {
        let id = descriptor.id.as_str();

        // Verify
        progress.report(0.4);
        self.verify_artifact(artifact, &descriptor.checksum_sha256)
            .map_err(|e| InstallError::stage(id, InstallStage::Verifying, e))?;
        progress.report(0.5);

        // Extract into staging, then swap into place
        {
            let stage = StageProgress::new(progress, 0.5, 0.8);
            let staging = self.packages_dir.join(format!(".staging-{id}"));
            if staging.exists() {
                fs::remove_dir_all(&staging)
                    .map_err(|e| InstallError::stage(id, InstallStage::Extracting, e))?;
            }
            if let Err(e) = archive::extract(artifact, &staging, &stage) {
                remove_dir_best_effort(&staging);
                return Err(InstallError::stage(id, InstallStage::Extracting, e).into());
            }
            if let Err(e) = replace_dir(&staging, package_dir) {
                remove_dir_best_effort(&staging);
                return Err(InstallError::stage(id, InstallStage::Extracting, e).into());
            }
        }

        // Permissions
        progress.report(0.8);
        mark_bin_executable(package_dir)
            .map_err(|e| InstallError::stage(id, InstallStage::SettingPermissions, e))?;

        // Post-install script
        progress.report(0.9);
        let script_exit_code = match &descriptor.install_script {
            Some(content) => {
                let runner =
                    ScriptRunner::new(id, &descriptor.version, package_dir, self.script_timeout);
                match runner.run(ScriptPhase::PostInstall, content) {
                    Ok(code) => Some(code),
                    Err(e) => {
                        warn!("Post-install script for {} failed: {}", id, e);
                        None
                    }
                }
            }
            None => None,
        };

        // Links
        progress.report(0.95);
        if mode == RecordMode::Replace {
            // Commands dropped by the new version must not keep a shim
            remove_shims(&self.bin_dir, id)
                .map_err(|e| InstallError::stage(id, InstallStage::CreatingLinks, e))?;
        }
        let shims = create_shims(&self.bin_dir, package_dir, id)
            .map_err(|e| InstallError::stage(id, InstallStage::CreatingLinks, e))?;
        self.env
            .add_package(package_dir)
            .map_err(|e| InstallError::stage(id, InstallStage::CreatingLinks, e))?;

        // Record
        let mut record = InstalledRecord::new(
            id.to_string(),
            descriptor.version.clone(),
            package_dir.display().to_string(),
        );
        record.size_bytes = directory_size(package_dir);
        {
            let conn = db::lock(&self.db)?;
            let written = match mode {
                RecordMode::Insert => record.insert(&conn),
                RecordMode::Replace => record.update(&conn),
            };
            written.map_err(|e| InstallError::stage(id, InstallStage::Registered, e))?;
        }
        progress.report(1.0);

        Ok(InstallOutcome {
            id: id.to_string(),
            version: descriptor.version.clone(),
            install_path: package_dir.to_path_buf(),
            shims,
            script_exit_code,
        })
    }

    fn verify_artifact(&self, artifact: &Path, expected: &str) -> Result<()> {
        if expected.trim().is_empty() {
            if self.require_checksum {
                return Err(ChecksumMismatch {
                    path: artifact.to_path_buf(),
                    expected: String::new(),
                    actual: hash::sha256_file(artifact)?,
                }
                .into());
            }
            warn!(
                "No checksum published for {}, skipping verification",
                artifact.display()
            );
            return Ok(());
        }

        hash::verify_file_sha256(artifact, expected)??;
        debug!("Checksum verified for {}", artifact.display());
        Ok(())
    }
}

fn check_installable(descriptor: &PackageDescriptor) -> Result<()> {
    match descriptor.installability.reason() {
        Some(reason) => Err(InstallError::NotInstallable {
            id: descriptor.id.clone(),
            reason: reason.to_string(),
        }
        .into()),
        None => Ok(()),
    }
}

/// Move `staging` to `target`, replacing whatever is there
fn replace_dir(staging: &Path, target: &Path) -> Result<()> {
    if target.exists() {
        fs::remove_dir_all(target)?;
    }
    fs::rename(staging, target)?;
    Ok(())
}

/// Total size of regular files under `dir`
fn directory_size(dir: &Path) -> u64 {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| entry.metadata().ok())
        .map(|meta| meta.len())
        .sum()
}
