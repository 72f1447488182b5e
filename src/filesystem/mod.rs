// src/filesystem/mod.rs

//! Filesystem helpers shared by the mirror, extractor and installer
//!
//! - [`path`]: sanitizing untrusted paths from archives and remote metadata
//! - [`perms`]: executable-bit handling and best-effort cleanup

pub mod path;
pub mod perms;

pub use path::{safe_join, sanitize_filename, sanitize_path};
pub use perms::{is_executable_mode, remove_dir_best_effort, remove_file_best_effort, set_executable};
