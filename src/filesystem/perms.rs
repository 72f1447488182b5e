// src/filesystem/perms.rs

//! Executable bits and best-effort cleanup

use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

/// Any of the owner/group/other execute bits
const EXECUTE_BITS: u32 = 0o111;

/// True when a unix mode carries any execute bit
pub fn is_executable_mode(mode: u32) -> bool {
    mode & EXECUTE_BITS != 0
}

/// Add execute permission (`u+x,g+x,o+x`) to a file
#[cfg(unix)]
pub fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)?.permissions();
    let mode = perms.mode();
    if mode & EXECUTE_BITS != EXECUTE_BITS {
        perms.set_mode(mode | EXECUTE_BITS);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Remove a file, logging instead of failing
pub fn remove_file_best_effort(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}

/// Remove a directory tree, logging instead of failing
pub fn remove_dir_best_effort(path: &Path) {
    match fs::remove_dir_all(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
    }
}
