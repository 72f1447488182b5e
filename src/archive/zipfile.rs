// src/archive/zipfile.rs

//! Zip extraction

use super::{ExtractError, entry_target, write_entry};
use crate::filesystem::{is_executable_mode, set_executable};
use crate::progress::ProgressReporter;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;
use tracing::debug;
use zip::ZipArchive;

/// Progress is reported once per this many entries
const PROGRESS_ENTRY_INTERVAL: usize = 10;

pub(super) fn extract_zip(
    file_path: &Path,
    dest_dir: &Path,
    progress: &dyn ProgressReporter,
) -> Result<(), ExtractError> {
    let file = File::open(file_path).map_err(|e| ExtractError::io(file_path, e))?;
    let mut archive =
        ZipArchive::new(BufReader::new(file)).map_err(|e| ExtractError::corrupt(file_path, e))?;

    let total = archive.len();
    for index in 0..total {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ExtractError::corrupt(file_path, e))?;

        // enclosed_name() is None for names that would escape the root
        let Some(name) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(ExtractError::corrupt(
                file_path,
                format!("entry '{}' escapes the destination", entry.name()),
            ));
        };
        let Some(target) = entry_target(file_path, dest_dir, &name)? else {
            continue;
        };

        if entry.is_dir() {
            fs::create_dir_all(&target).map_err(|e| ExtractError::io(&target, e))?;
        } else {
            write_entry(file_path, &mut entry, &target)?;
            if entry.unix_mode().is_some_and(is_executable_mode) {
                set_executable(&target).map_err(|e| ExtractError::io(&target, e))?;
            }
        }

        let done = index + 1;
        if done % PROGRESS_ENTRY_INTERVAL == 0 || done == total {
            progress.report(done as f32 / total as f32);
        }
    }

    debug!("Extracted {} zip entries from {}", total, file_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::extract;
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;
    use zip::write::FileOptions;

    fn write_zip(path: &Path, entries: &[(&str, u32, &[u8])]) {
        let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
        for (name, mode, data) in entries {
            let options = FileOptions::default().unix_permissions(*mode);
            writer.start_file(*name, options).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn test_zip_extracts_files_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("tool.zip");
        write_zip(
            &archive,
            &[
                ("bin/tool", 0o755, b"#!/bin/sh\n"),
                ("README.md", 0o644, b"readme"),
            ],
        );

        let dest = dir.path().join("out");
        extract(&archive, &dest, &crate::progress::SilentProgress).unwrap();

        assert_eq!(fs::read(dest.join("README.md")).unwrap(), b"readme");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dest.join("bin/tool")).unwrap().permissions().mode();
            assert!(is_executable_mode(mode));
        }
    }

    #[test]
    fn test_zip_progress_is_entry_based() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("many.zip");
        let names: Vec<String> = (0..25).map(|i| format!("f{i}.txt")).collect();
        let entries: Vec<(&str, u32, &[u8])> =
            names.iter().map(|n| (n.as_str(), 0o644, &b"x"[..])).collect();
        write_zip(&archive, &entries);

        let seen = Mutex::new(Vec::new());
        extract(&archive, &dir.path().join("out"), &|f: f32| {
            seen.lock().unwrap().push(f)
        })
        .unwrap();

        // start, entries 10 and 20, entry 25, then completion
        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 5);
        assert!((seen[1] - 0.4).abs() < 1e-6);
        assert!((seen[2] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_not_a_zip_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("fake.zip");
        fs::write(&archive, b"definitely not a zip").unwrap();

        let err = extract(&archive, &dir.path().join("out"), &crate::progress::SilentProgress)
            .unwrap_err();
        assert!(matches!(err, ExtractError::CorruptArchive { .. }));
    }
}
