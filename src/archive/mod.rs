// src/archive/mod.rs

//! Archive extraction for downloaded artifacts
//!
//! [`extract`] is the single entry point. It dispatches purely on the file
//! name suffix; there is no content sniffing, so an artifact with an
//! unrecognized suffix is rejected outright.
//!
//! | Suffix                | Handling                                        |
//! |-----------------------|-------------------------------------------------|
//! | `.zip`                | sequential entries, progress every few entries  |
//! | `.tar.gz`, `.tgz`     | gzip then tar                                   |
//! | `.tar.xz`, `.txz`     | xz then tar                                     |
//! | `.tar.zst`, `.tzst`   | zstd then tar                                   |
//! | `.tar`                | plain tar                                       |
//! | `.deb`                | AR container, only the `data.tar*` member       |
//!
//! Tar progress is cumulative bytes written divided by the size of the
//! archive file on disk. For compressed archives that is an approximation
//! which can reach 1.0 early; it is clamped rather than corrected.
//!
//! Every entry path is sanitized before anything is written; an entry that
//! would land outside the destination makes the whole archive corrupt.
//! Sanitizing only sees the entry name, so each target's nearest existing
//! ancestor is also resolved on disk. That catches chains of symlinks
//! planted by earlier entries of the same archive.

mod deb;
mod tarball;
mod zipfile;

use crate::filesystem::sanitize_path;
use crate::progress::ProgressReporter;
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Chunk size for streaming entry contents to disk
const COPY_BUFFER_SIZE: usize = 8192;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported archive format: {0}")]
    UnsupportedFormat(String),

    #[error("Corrupt archive {}: {reason}", path.display())]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("No data.tar member in {}", .0.display())]
    NoDataMember(PathBuf),

    #[error("Failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExtractError {
    pub(crate) fn corrupt(path: &Path, reason: impl std::fmt::Display) -> Self {
        Self::CorruptArchive {
            path: path.to_path_buf(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Archive formats recognized by suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
    TarXz,
    TarZst,
    Tar,
    Deb,
}

impl ArchiveFormat {
    /// Detect the format from a file name
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name.to_ascii_lowercase();
        if name.ends_with(".zip") {
            Some(Self::Zip)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            Some(Self::TarZst)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".deb") {
            Some(Self::Deb)
        } else {
            None
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.file_name()
            .and_then(|n| n.to_str())
            .and_then(Self::from_file_name)
    }
}

/// Extract `file_path` into `dest_dir`
///
/// `dest_dir` is created if needed. On error the destination may hold a
/// partial extraction; callers own the cleanup policy.
pub fn extract(
    file_path: &Path,
    dest_dir: &Path,
    progress: &dyn ProgressReporter,
) -> Result<(), ExtractError> {
    let format = ArchiveFormat::from_path(file_path).ok_or_else(|| {
        ExtractError::UnsupportedFormat(
            file_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file_path.display().to_string()),
        )
    })?;

    info!(
        "Extracting {} ({:?}) into {}",
        file_path.display(),
        format,
        dest_dir.display()
    );
    fs::create_dir_all(dest_dir).map_err(|e| ExtractError::io(dest_dir, e))?;

    progress.report(0.0);
    extract_as(format, file_path, dest_dir, progress)?;
    progress.report(1.0);
    Ok(())
}

pub(crate) fn extract_as(
    format: ArchiveFormat,
    file_path: &Path,
    dest_dir: &Path,
    progress: &dyn ProgressReporter,
) -> Result<(), ExtractError> {
    match format {
        ArchiveFormat::Zip => zipfile::extract_zip(file_path, dest_dir, progress),
        ArchiveFormat::Deb => deb::extract_deb(file_path, dest_dir, progress),
        tar_format => tarball::extract_tar_file(tar_format, file_path, dest_dir, progress),
    }
}

/// Resolve an archive entry name to a path under `dest_dir`
///
/// Returns `Ok(None)` for entries that name the archive root itself
/// (`./`), which carry nothing to extract.
pub(crate) fn entry_target(
    archive: &Path,
    dest_dir: &Path,
    entry_name: &Path,
) -> Result<Option<PathBuf>, ExtractError> {
    match sanitize_path(entry_name) {
        Ok(relative) => {
            let target = dest_dir.join(relative);
            ensure_contained(archive, dest_dir, &target)?;
            Ok(Some(target))
        }
        Err(crate::Error::InvalidPath(_)) => {
            debug!("Skipping root entry {:?} in {}", entry_name, archive.display());
            Ok(None)
        }
        Err(e) => Err(ExtractError::corrupt(archive, e)),
    }
}

/// Require the nearest existing ancestor of `target` to resolve inside `dest_dir`
pub(crate) fn ensure_contained(
    archive: &Path,
    dest_dir: &Path,
    target: &Path,
) -> Result<(), ExtractError> {
    let root = dest_dir
        .canonicalize()
        .map_err(|e| ExtractError::io(dest_dir, e))?;
    let Some(parent) = target.parent() else {
        return Ok(());
    };

    let Some(existing) = parent
        .ancestors()
        .find(|ancestor| fs::symlink_metadata(ancestor).is_ok())
    else {
        return Ok(());
    };
    match existing.canonicalize() {
        Ok(resolved) if resolved.starts_with(&root) => Ok(()),
        Ok(resolved) => Err(ExtractError::corrupt(
            archive,
            format!(
                "{} resolves outside the destination ({})",
                target.display(),
                resolved.display()
            ),
        )),
        Err(e) => Err(ExtractError::corrupt(
            archive,
            format!("{} does not resolve: {}", existing.display(), e),
        )),
    }
}

pub(crate) fn create_parent(target: &Path) -> Result<(), ExtractError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(|e| ExtractError::io(parent, e))?;
    }
    Ok(())
}

/// Stream one entry's contents to `target`, returning bytes written
///
/// Read failures mean the archive is damaged; write failures are local I/O.
pub(crate) fn write_entry<R: Read>(
    archive: &Path,
    reader: &mut R,
    target: &Path,
) -> Result<u64, ExtractError> {
    create_parent(target)?;
    // Replace an earlier symlink rather than writing through it
    if let Ok(meta) = fs::symlink_metadata(target)
        && meta.file_type().is_symlink()
    {
        fs::remove_file(target).map_err(|e| ExtractError::io(target, e))?;
    }
    let mut file = fs::File::create(target).map_err(|e| ExtractError::io(target, e))?;

    let mut written = 0u64;
    let mut buffer = [0u8; COPY_BUFFER_SIZE];
    loop {
        let n = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ExtractError::corrupt(archive, e)),
        };
        file.write_all(&buffer[..n])
            .map_err(|e| ExtractError::io(target, e))?;
        written += n as u64;
    }
    file.flush().map_err(|e| ExtractError::io(target, e))?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::SilentProgress;

    #[test]
    fn test_format_detection() {
        assert_eq!(ArchiveFormat::from_file_name("curl.zip"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::from_file_name("curl-8.5.tar.gz"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("CURL.TGZ"), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::from_file_name("x.tar.xz"), Some(ArchiveFormat::TarXz));
        assert_eq!(ArchiveFormat::from_file_name("x.tar.zst"), Some(ArchiveFormat::TarZst));
        assert_eq!(ArchiveFormat::from_file_name("x.tar"), Some(ArchiveFormat::Tar));
        assert_eq!(ArchiveFormat::from_file_name("curl_8.5_aarch64.deb"), Some(ArchiveFormat::Deb));
        assert_eq!(ArchiveFormat::from_file_name("curl.rpm"), None);
        assert_eq!(ArchiveFormat::from_file_name("curl.gz"), None);
    }

    #[test]
    fn test_unsupported_suffix_is_rejected_without_sniffing() {
        let dir = tempfile::tempdir().unwrap();
        // A perfectly good zip with the wrong name is still refused
        let file = dir.path().join("payload.bin");
        fs::write(&file, b"PK\x03\x04").unwrap();

        let err = extract(&file, &dir.path().join("out"), &SilentProgress).unwrap_err();
        assert!(matches!(err, ExtractError::UnsupportedFormat(name) if name == "payload.bin"));
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_entry_target_rejects_escape() {
        let dir = tempfile::tempdir().unwrap();
        let archive = Path::new("a.tar");
        let dest = dir.path();
        assert_eq!(
            entry_target(archive, dest, Path::new("./bin/x")).unwrap(),
            Some(dest.join("bin/x"))
        );
        assert_eq!(entry_target(archive, dest, Path::new("./")).unwrap(), None);
        assert!(matches!(
            entry_target(archive, dest, Path::new("../x")),
            Err(ExtractError::CorruptArchive { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_entry_under_outward_symlink_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("out");
        fs::create_dir_all(&dest).unwrap();
        std::os::unix::fs::symlink(dir.path(), dest.join("up")).unwrap();

        assert!(matches!(
            entry_target(Path::new("a.tar"), &dest, Path::new("up/x.txt")),
            Err(ExtractError::CorruptArchive { .. })
        ));
        assert!(entry_target(Path::new("a.tar"), &dest, Path::new("up")).is_ok());
    }
}
