// src/install/links.rs

//! PATH integration for installed packages
//!
//! Symlinks are unreliable on the filesystems packages land on, so every
//! executable in `<package>/bin` is exposed through a wrapper shim in the
//! shared bin directory:
//!
//! ```text
//! #!/system/bin/sh
//! # bountu-package: curl
//! exec "/data/.../packages/curl/bin/curl" "$@"
//! ```
//!
//! The marker line identifies the owning package on uninstall. Library
//! and bin directories are also exported through a shared
//! `environment.sh` that shells source.

use super::script::shell_path;
use crate::error::{Error, Result};
use crate::filesystem::{remove_file_best_effort, set_executable};
use fs2::FileExt;
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const SHIM_MARKER: &str = "# bountu-package:";

/// Mark every regular file under `<package_dir>/bin` executable
pub fn mark_bin_executable(package_dir: &Path) -> Result<usize> {
    let bin = package_dir.join("bin");
    if !bin.is_dir() {
        return Ok(0);
    }

    let mut count = 0;
    for entry in WalkDir::new(&bin).follow_links(false) {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {}", bin.display(), e)))?;
        if entry.file_type().is_file() {
            set_executable(entry.path())?;
            count += 1;
        }
    }
    debug!("Marked {} files executable in {}", count, bin.display());
    Ok(count)
}

fn shim_text(package_id: &str, target: &Path) -> String {
    format!(
        "#!{}\n{} {}\nexec \"{}\" \"$@\"\n",
        shell_path().display(),
        SHIM_MARKER,
        package_id,
        target.display()
    )
}

/// Owning package recorded in a shim, if `text` is one of ours
fn shim_owner(text: &str) -> Option<&str> {
    text.lines()
        .find_map(|line| line.strip_prefix(SHIM_MARKER))
        .map(str::trim)
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use crate::filesystem::is_executable_mode;
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && is_executable_mode(m.permissions().mode()))
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    path.is_file()
}

/// Create a shim in `bin_dir` for each executable directly in `<package_dir>/bin`
///
/// An existing shim owned by another package (or a file that is not a
/// shim) is left in place.
pub fn create_shims(bin_dir: &Path, package_dir: &Path, package_id: &str) -> Result<Vec<PathBuf>> {
    let pkg_bin = package_dir.join("bin");
    if !pkg_bin.is_dir() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(bin_dir)?;

    let mut created = Vec::new();
    for entry in WalkDir::new(&pkg_bin).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::IoError(format!("Failed to walk {}: {}", pkg_bin.display(), e)))?;
        if !is_executable_file(entry.path()) {
            continue;
        }

        let shim = bin_dir.join(entry.file_name());
        if shim.exists() {
            let existing = fs::read_to_string(&shim).unwrap_or_default();
            match shim_owner(&existing) {
                Some(owner) if owner == package_id => {}
                Some(owner) => {
                    warn!("{} is provided by {}, not replacing", shim.display(), owner);
                    continue;
                }
                None => {
                    warn!("{} exists and is not a shim, not replacing", shim.display());
                    continue;
                }
            }
        }

        let target = fs::canonicalize(entry.path()).unwrap_or_else(|_| entry.path().to_path_buf());
        fs::write(&shim, shim_text(package_id, &target))?;
        set_executable(&shim)?;
        debug!("Created shim {}", shim.display());
        created.push(shim);
    }

    info!("Created {} shims for {}", created.len(), package_id);
    Ok(created)
}

/// Delete every shim in `bin_dir` owned by `package_id`
pub fn remove_shims(bin_dir: &Path, package_id: &str) -> Result<usize> {
    if !bin_dir.is_dir() {
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(bin_dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        if shim_owner(&text) == Some(package_id) {
            remove_file_best_effort(&path);
            removed += 1;
        }
    }
    debug!("Removed {} shims for {}", removed, package_id);
    Ok(removed)
}

/// Shared shell environment file exporting package directories
pub struct EnvironmentFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl EnvironmentFile {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Export lines for a package's `bin` and `lib` directories
    pub fn entries_for(package_dir: &Path) -> [String; 2] {
        [
            format!(
                "export PATH=\"{}:$PATH\"",
                package_dir.join("bin").display()
            ),
            format!(
                "export LD_LIBRARY_PATH=\"{}:$LD_LIBRARY_PATH\"",
                package_dir.join("lib").display()
            ),
        ]
    }

    /// Append the package's export lines that are not already present
    ///
    /// The in-process mutex and an exclusive file lock make the
    /// check-then-append atomic against other installers.
    pub fn add_package(&self, package_dir: &Path) -> Result<usize> {
        self.rewrite(|content| {
            let mut added = 0;
            for line in Self::entries_for(package_dir) {
                if !content.lines().any(|existing| existing == line) {
                    if !content.is_empty() && !content.ends_with('\n') {
                        content.push('\n');
                    }
                    content.push_str(&line);
                    content.push('\n');
                    added += 1;
                }
            }
            added
        })
    }

    /// Drop the package's export lines
    pub fn remove_package(&self, package_dir: &Path) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }
        self.rewrite(|content| {
            let entries = Self::entries_for(package_dir);
            let before = content.lines().count();
            let kept: Vec<&str> = content
                .lines()
                .filter(|line| !entries.iter().any(|e| e == line))
                .collect();
            let removed = before - kept.len();
            if removed > 0 {
                let mut rebuilt = kept.join("\n");
                rebuilt.push('\n');
                *content = rebuilt;
            }
            removed
        })
    }

    /// Read-modify-write under both locks; writes only when `edit` changed something
    fn rewrite<F>(&self, edit: F) -> Result<usize>
    where
        F: FnOnce(&mut String) -> usize,
    {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::IoError("environment file lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        file.lock_exclusive()?;

        let result = (|| -> Result<usize> {
            let mut content = String::new();
            file.read_to_string(&mut content)?;
            if content.is_empty() {
                content = format!("#!{}\n", shell_path().display());
            }
            let original_len = content.len();

            let changed = edit(&mut content);
            if changed > 0 || content.len() != original_len {
                file.set_len(0)?;
                file.seek(SeekFrom::Start(0))?;
                file.write_all(content.as_bytes())?;
                file.flush()?;
            }
            Ok(changed)
        })();

        if let Err(e) = FileExt::unlock(&file) {
            warn!("Failed to unlock {}: {}", self.path.display(), e);
        }
        result
    }
}
