// src/filesystem/path.rs

//! Path sanitization for untrusted input
//!
//! Archive entry names, package ids and mirror-relative paths all come from
//! remote data. Anything that would resolve outside its intended root is
//! rejected before it touches the filesystem.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Normalize an untrusted relative path
///
/// `.` components are dropped and leading `/` is stripped, so the result is
/// always relative. Any `..` component is a traversal attempt and an empty
/// result is invalid.
///
/// ```
/// use bountu::filesystem::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("./bin/curl").unwrap(), PathBuf::from("bin/curl"));
/// assert_eq!(sanitize_path("/lib/libz.so").unwrap(), PathBuf::from("lib/libz.so"));
/// assert!(sanitize_path("bin/../../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();
    let relative = path_str.trim_start_matches('/');

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(path_str.to_string())),
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!(
            "'{}' is empty after sanitization",
            path_str
        )));
    }

    Ok(normalized)
}

/// Join an untrusted path onto `root` without escaping it
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let joined = root.join(sanitize_path(path.as_ref())?);

    // Existing symlinks inside root could still point outside it
    if let (Ok(canonical_root), Ok(canonical_joined)) = (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "{} escapes {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

/// Validate a single path component such as a package id
pub fn sanitize_filename(name: &str) -> Result<String> {
    if name.contains('/') || name.contains('\\') {
        return Err(Error::PathTraversal(format!(
            "'{}' contains a path separator",
            name
        )));
    }
    if name == ".." || name == "." {
        return Err(Error::PathTraversal(format!("'{}' is not a file name", name)));
    }
    if name.trim().is_empty() {
        return Err(Error::InvalidPath("empty file name".to_string()));
    }
    Ok(name.to_string())
}
