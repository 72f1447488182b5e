// src/lib.rs

//! Bountu package engine
//!
//! Client-side package acquisition and sync for a git-hosted package
//! catalog, installing prebuilt artifacts into a user-writable prefix.
//!
//! # Architecture
//!
//! - Mirror: a local git checkout of the metadata repository is the only
//!   source of package definitions
//! - Catalog: package metadata resolved against the runtime platform and
//!   the install database
//! - Fetch: candidate URL expansion with fallback mirrors, checksum gated
//! - Install: staged extraction, post-install scripts, shims and a shared
//!   shell environment file
//! - State: installed packages and mirror bookkeeping live in SQLite

pub mod archive;
pub mod catalog;
pub mod config;
pub mod db;
mod error;
pub mod fetch;
pub mod filesystem;
pub mod hash;
pub mod install;
pub mod manager;
pub mod mirror;
mod process;
pub mod progress;
pub mod sync;
pub mod version;

pub use catalog::{
    Catalog, CatalogResolver, Category, PackageDescriptor, PackageFilter, RuntimeTarget,
};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use fetch::ArtifactFetcher;
pub use install::{InstallOutcome, Installer};
pub use manager::{EngineStatus, PackageManager, APP_VERSION};
pub use mirror::{ContentStore, GitCli, RepositoryMirror};
pub use progress::{CliProgress, LogProgress, ProgressReporter, SilentProgress};
pub use sync::{SyncCoordinator, SyncResult};
