// src/catalog/mod.rs

//! Package catalog
//!
//! This module provides:
//! - Raw JSON document types read from the mirror (`metadata`)
//! - Normalized descriptors and the installable predicate (`descriptor`)
//! - Conjunctive filtering (`search`)
//! - The resolver that turns a mirror into a [`Catalog`] (`resolver`)

pub mod descriptor;
pub mod metadata;
mod resolver;
pub mod search;

pub use descriptor::{
    Architecture, Category, Installability, PackageDescriptor, PackageStatus, Platform,
    RuntimeTarget,
};
pub use metadata::{AppConfig, MaintenanceStatus, RawMetadata, parse_document};
pub use resolver::{
    APP_CONFIG_PATH, Catalog, CatalogResolver, CatalogStats, MAINTENANCE_PATH, PACKAGES_DIR,
};
pub use search::{PackageFilter, search};

use crate::mirror::MirrorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Package not found in catalog: {0}")]
    NotFound(String),

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Mirror(#[from] MirrorError),
}
