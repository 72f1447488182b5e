// src/archive/tarball.rs

//! Tar extraction, plain or behind gzip/xz/zstd

use super::{ArchiveFormat, ExtractError, create_parent, entry_target, write_entry};
use crate::filesystem::{is_executable_mode, set_executable};
use crate::progress::ProgressReporter;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use tar::{Archive, EntryType};
use tracing::{debug, warn};
use xz2::read::XzDecoder;

/// Open `file_path` with the decoder its format calls for and extract it
pub(super) fn extract_tar_file(
    format: ArchiveFormat,
    file_path: &Path,
    dest_dir: &Path,
    progress: &dyn ProgressReporter,
) -> Result<(), ExtractError> {
    let file = File::open(file_path).map_err(|e| ExtractError::io(file_path, e))?;
    let archive_size = file
        .metadata()
        .map_err(|e| ExtractError::io(file_path, e))?
        .len();
    let reader = BufReader::new(file);

    match format {
        ArchiveFormat::TarGz => {
            extract_tar(GzDecoder::new(reader), file_path, dest_dir, archive_size, progress)
        }
        ArchiveFormat::TarXz => {
            extract_tar(XzDecoder::new(reader), file_path, dest_dir, archive_size, progress)
        }
        ArchiveFormat::TarZst => {
            let decoder = zstd::stream::read::Decoder::new(reader)
                .map_err(|e| ExtractError::corrupt(file_path, e))?;
            extract_tar(decoder, file_path, dest_dir, archive_size, progress)
        }
        ArchiveFormat::Tar => extract_tar(reader, file_path, dest_dir, archive_size, progress),
        other => Err(ExtractError::UnsupportedFormat(format!(
            "{:?} is not a tar format",
            other
        ))),
    }
}

/// Demultiplex a tar stream into `dest_dir`
///
/// Progress is bytes written over `archive_size` (the on-disk size of the
/// possibly compressed archive), clamped to 1.0.
fn extract_tar<R: Read>(
    reader: R,
    archive_path: &Path,
    dest_dir: &Path,
    archive_size: u64,
    progress: &dyn ProgressReporter,
) -> Result<(), ExtractError> {
    let mut archive = Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| ExtractError::corrupt(archive_path, e))?;

    let mut written_total = 0u64;
    let mut file_count = 0usize;

    for entry in entries {
        let mut entry = entry.map_err(|e| ExtractError::corrupt(archive_path, e))?;
        let entry_path = entry
            .path()
            .map_err(|e| ExtractError::corrupt(archive_path, e))?
            .into_owned();

        let Some(target) = entry_target(archive_path, dest_dir, &entry_path)? else {
            continue;
        };

        let entry_type = entry.header().entry_type();
        match entry_type {
            EntryType::Directory => {
                fs::create_dir_all(&target).map_err(|e| ExtractError::io(&target, e))?;
            }
            EntryType::Regular | EntryType::Continuous | EntryType::GNUSparse => {
                let mode = entry
                    .header()
                    .mode()
                    .map_err(|e| ExtractError::corrupt(archive_path, e))?;
                written_total += write_entry(archive_path, &mut entry, &target)?;
                if is_executable_mode(mode) {
                    set_executable(&target).map_err(|e| ExtractError::io(&target, e))?;
                }
                file_count += 1;
            }
            EntryType::Symlink => {
                let link_target = entry
                    .link_name()
                    .map_err(|e| ExtractError::corrupt(archive_path, e))?
                    .map(|p| p.into_owned());
                if let Some(link_target) = link_target {
                    create_symlink(archive_path, dest_dir, &target, &link_target)?;
                }
            }
            EntryType::Link => {
                let source = entry
                    .link_name()
                    .map_err(|e| ExtractError::corrupt(archive_path, e))?
                    .map(|p| p.into_owned());
                if let Some(source) = source
                    && let Some(source) = entry_target(archive_path, dest_dir, &source)?
                {
                    ensure_resolves_inside(archive_path, dest_dir, &source)?;
                    create_parent(&target)?;
                    fs::copy(&source, &target).map_err(|e| ExtractError::io(&target, e))?;
                    file_count += 1;
                }
            }
            other => {
                debug!("Skipping {:?} entry {}", other, entry_path.display());
            }
        }

        if archive_size > 0 {
            progress.report((written_total as f64 / archive_size as f64).min(1.0) as f32);
        }
    }

    debug!(
        "Extracted {} files ({} bytes) from {}",
        file_count,
        written_total,
        archive_path.display()
    );
    Ok(())
}

/// Recreate a symlink whose target stays inside `dest_dir`
#[cfg(unix)]
fn create_symlink(
    archive_path: &Path,
    dest_dir: &Path,
    link: &Path,
    link_target: &Path,
) -> Result<(), ExtractError> {
    let resolved = match link.parent() {
        Some(parent) if link_target.is_relative() => parent.join(link_target),
        _ => {
            warn!(
                "Skipping absolute symlink {} -> {}",
                link.display(),
                link_target.display()
            );
            return Ok(());
        }
    };

    let relative = resolved.strip_prefix(dest_dir).unwrap_or(&resolved);
    if escapes_root(relative) {
        return Err(ExtractError::corrupt(
            archive_path,
            format!("symlink {} escapes the destination", link.display()),
        ));
    }

    create_parent(link)?;
    if fs::symlink_metadata(link).is_ok() {
        fs::remove_file(link).map_err(|e| ExtractError::io(link, e))?;
    }
    std::os::unix::fs::symlink(link_target, link).map_err(|e| ExtractError::io(link, e))?;

    // The text can look contained while an earlier link redirects it
    if let Err(e) = ensure_resolves_inside(archive_path, dest_dir, link) {
        let _ = fs::remove_file(link);
        return Err(e);
    }
    Ok(())
}

/// Fail if `path` exists and resolves outside `dest_dir`; dangling paths pass
fn ensure_resolves_inside(
    archive_path: &Path,
    dest_dir: &Path,
    path: &Path,
) -> Result<(), ExtractError> {
    let root = dest_dir
        .canonicalize()
        .map_err(|e| ExtractError::io(dest_dir, e))?;
    match path.canonicalize() {
        Ok(resolved) if !resolved.starts_with(&root) => Err(ExtractError::corrupt(
            archive_path,
            format!("{} resolves outside the destination", path.display()),
        )),
        _ => Ok(()),
    }
}

/// Lexically walk `relative`, reporting whether `..` climbs above its start
#[cfg(unix)]
fn escapes_root(relative: &Path) -> bool {
    use std::path::Component;

    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
            }
            Component::RootDir | Component::Prefix(_) => return true,
        }
    }
    false
}

#[cfg(not(unix))]
fn create_symlink(
    _archive_path: &Path,
    _dest_dir: &Path,
    link: &Path,
    _link_target: &Path,
) -> Result<(), ExtractError> {
    warn!("Symlinks are not supported here, skipping {}", link.display());
    Ok(())
}
