// src/error.rs

//! Crate-wide error type
//!
//! Every component owns a typed error enum describing its own failure
//! modes. This module folds them into a single [`Error`] so that callers
//! which drive several components (the CLI, the package manager facade)
//! can propagate with `?` without losing the component-level variant.

use thiserror::Error;

use crate::archive::ExtractError;
use crate::catalog::CatalogError;
use crate::fetch::FetchError;
use crate::hash::ChecksumMismatch;
use crate::install::InstallError;
use crate::mirror::MirrorError;
use crate::sync::ConnectivityError;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Checksum(#[from] ChecksumMismatch),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Initialization error: {0}")]
    InitError(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    #[error("Path traversal attempt: {0}")]
    PathTraversal(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Script failed: {0}")]
    ScriptError(String),
}
