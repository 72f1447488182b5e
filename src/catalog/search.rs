// src/catalog/search.rs

//! Catalog filtering

use super::descriptor::{Category, PackageDescriptor, Platform};

/// Conjunctive package filter; unset fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageFilter {
    /// Case-insensitive substring over name, description and tags
    pub query: Option<String>,
    pub category: Option<Category>,
    /// Matches packages for this platform or for both
    pub platform: Option<Platform>,
    pub installed_only: bool,
    pub updates_only: bool,
    pub maintenance_only: bool,
}

impl PackageFilter {
    pub fn query(text: impl Into<String>) -> Self {
        Self {
            query: Some(text.into()),
            ..Default::default()
        }
    }

    pub fn matches(&self, package: &PackageDescriptor) -> bool {
        if let Some(query) = &self.query {
            let needle = query.trim().to_lowercase();
            if !needle.is_empty() {
                let hit = package.name.to_lowercase().contains(&needle)
                    || package.description.to_lowercase().contains(&needle)
                    || package
                        .tags
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&needle));
                if !hit {
                    return false;
                }
            }
        }

        if let Some(category) = self.category
            && package.category != category
        {
            return false;
        }

        if let Some(platform) = &self.platform
            && package.platform != *platform
            && package.platform != Platform::Both
        {
            return false;
        }

        if self.installed_only && !package.is_installed() {
            return false;
        }
        if self.updates_only && !package.status.needs_update {
            return false;
        }
        if self.maintenance_only && !package.status.needs_maintenance {
            return false;
        }

        true
    }
}

/// Descriptors from `packages` that pass `filter`, in input order
pub fn search<'a, I>(packages: I, filter: &PackageFilter) -> Vec<&'a PackageDescriptor>
where
    I: IntoIterator<Item = &'a PackageDescriptor>,
{
    packages.into_iter().filter(|p| filter.matches(p)).collect()
}
