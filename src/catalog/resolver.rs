// src/catalog/resolver.rs

//! Catalog resolution from the local mirror
//!
//! The mirror layout is fixed:
//!
//! ```text
//! config/maintenance.json
//! config/app_config.json
//! packages/<id>/metadata.json
//! ```

use super::descriptor::{Category, PackageDescriptor, RuntimeTarget};
use super::metadata::{AppConfig, MaintenanceStatus, RawMetadata, parse_document};
use super::search::{PackageFilter, search};
use super::CatalogError;
use crate::db::models::InstalledRecord;
use crate::mirror::{MirrorError, RepositoryMirror};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const MAINTENANCE_PATH: &str = "config/maintenance.json";
pub const APP_CONFIG_PATH: &str = "config/app_config.json";
pub const PACKAGES_DIR: &str = "packages";

/// Reads catalog documents out of a [`RepositoryMirror`]
pub struct CatalogResolver {
    mirror: Arc<RepositoryMirror>,
    target: RuntimeTarget,
}

impl CatalogResolver {
    pub fn new(mirror: Arc<RepositoryMirror>, target: RuntimeTarget) -> Self {
        Self { mirror, target }
    }

    pub fn target(&self) -> &RuntimeTarget {
        &self.target
    }

    pub fn mirror(&self) -> &Arc<RepositoryMirror> {
        &self.mirror
    }

    /// Maintenance switch; disabled when the document is absent or unreadable
    pub fn load_maintenance_status(&self) -> MaintenanceStatus {
        self.load_config_document(MAINTENANCE_PATH)
    }

    /// Version policy; defaults when the document is absent or unreadable
    pub fn load_app_config(&self) -> AppConfig {
        self.load_config_document(APP_CONFIG_PATH)
    }

    fn load_config_document<T: DeserializeOwned + Default>(&self, path: &str) -> T {
        let text = match self.mirror.read_file(path) {
            Ok(text) => text,
            Err(MirrorError::NotFound(_)) => {
                debug!("{} not present, using defaults", path);
                return T::default();
            }
            Err(e) => {
                warn!("Failed to read {}: {}", path, e);
                return T::default();
            }
        };

        parse_document(&text).unwrap_or_else(|e| {
            warn!("Failed to parse {}: {}", path, e);
            T::default()
        })
    }

    /// Load `packages/<id>/metadata.json`
    pub fn load_package_metadata(&self, id: &str) -> Result<RawMetadata, CatalogError> {
        let path = format!("{}/{}/metadata.json", PACKAGES_DIR, id);
        let text = match self.mirror.read_file(&path) {
            Ok(text) => text,
            Err(MirrorError::NotFound(_)) => return Err(CatalogError::NotFound(id.to_string())),
            Err(e) => return Err(e.into()),
        };
        parse_document(&text).map_err(|source| CatalogError::Parse { path, source })
    }

    /// Every directory under `packages/`
    pub fn list_package_ids(&self) -> Result<Vec<String>, CatalogError> {
        Ok(self.mirror.list_directories(PACKAGES_DIR)?)
    }

    pub fn to_descriptor(&self, raw: RawMetadata) -> PackageDescriptor {
        PackageDescriptor::from_metadata(raw, &self.target)
    }

    /// Load one descriptor, annotated from `installed`
    pub fn load_descriptor(
        &self,
        id: &str,
        installed: Option<&InstalledRecord>,
    ) -> Result<PackageDescriptor, CatalogError> {
        let mut descriptor = self.to_descriptor(self.load_package_metadata(id)?);
        annotate_descriptor(&mut descriptor, installed);
        Ok(descriptor)
    }

    /// Build the full catalog
    ///
    /// Packages whose metadata fails to load are logged and left out.
    pub fn load_catalog(&self, installed: &[InstalledRecord]) -> Result<Catalog, CatalogError> {
        let ids = self.list_package_ids()?;
        let mut packages = Vec::with_capacity(ids.len());

        for id in &ids {
            match self.load_package_metadata(id) {
                Ok(raw) => packages.push(self.to_descriptor(raw)),
                Err(e) => warn!("Skipping package {}: {}", id, e),
            }
        }

        let mut catalog = Catalog::new(packages);
        catalog.annotate(installed);
        info!(
            "Loaded {} of {} packages from {}",
            catalog.len(),
            ids.len(),
            self.mirror.local_path().display()
        );
        Ok(catalog)
    }
}

/// Fold install state into `descriptor`
///
/// An installed package that is no longer installable here needs
/// maintenance even if its record is not flagged.
fn annotate_descriptor(descriptor: &mut PackageDescriptor, record: Option<&InstalledRecord>) {
    descriptor.annotate(record);
    if descriptor.is_installed()
        && !descriptor.status.needs_maintenance
        && let Some(reason) = descriptor.installability.reason()
    {
        descriptor.status.maintenance_reason = Some(reason.to_string());
        descriptor.status.needs_maintenance = true;
    }
}

/// Snapshot of every package known to the mirror, sorted by name
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    packages: Vec<PackageDescriptor>,
}

/// Aggregate counts for a [`Catalog`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStats {
    pub total: usize,
    pub installed: usize,
    pub updates_available: usize,
    pub needs_maintenance: usize,
    pub installed_size_bytes: u64,
}

impl Catalog {
    pub fn new(mut packages: Vec<PackageDescriptor>) -> Self {
        packages.sort_by(|a, b| {
            a.name
                .to_lowercase()
                .cmp(&b.name.to_lowercase())
                .then_with(|| a.id.cmp(&b.id))
        });
        Self { packages }
    }

    pub fn get(&self, id: &str) -> Option<&PackageDescriptor> {
        self.packages.iter().find(|p| p.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageDescriptor> {
        self.packages.iter()
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn search(&self, filter: &PackageFilter) -> Vec<&PackageDescriptor> {
        search(&self.packages, filter)
    }

    pub fn by_category(&self, category: Category) -> Vec<&PackageDescriptor> {
        self.search(&PackageFilter {
            category: Some(category),
            ..Default::default()
        })
    }

    /// Re-derive every descriptor's status from `installed`
    pub fn annotate(&mut self, installed: &[InstalledRecord]) {
        let by_id: HashMap<&str, &InstalledRecord> =
            installed.iter().map(|r| (r.id.as_str(), r)).collect();
        for package in &mut self.packages {
            annotate_descriptor(package, by_id.get(package.id.as_str()).copied());
        }
    }

    pub fn stats(&self) -> CatalogStats {
        let mut stats = CatalogStats {
            total: self.packages.len(),
            ..Default::default()
        };
        for package in &self.packages {
            if package.is_installed() {
                stats.installed += 1;
                stats.installed_size_bytes += package.size_bytes;
            }
            if package.status.needs_update {
                stats.updates_available += 1;
            }
            if package.status.needs_maintenance {
                stats.needs_maintenance += 1;
            }
        }
        stats
    }
}
