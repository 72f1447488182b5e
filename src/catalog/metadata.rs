// src/catalog/metadata.rs

//! Raw JSON documents read from the metadata repository
//!
//! ```text
//! config/maintenance.json      -> MaintenanceStatus
//! config/app_config.json       -> AppConfig
//! packages/<id>/metadata.json  -> RawMetadata
//! ```
//!
//! Unknown fields are ignored. Upstream has shipped documents that were
//! JSON-encoded twice (the whole file is a quoted JSON string with escaped
//! quotes inside); [`parse_document`] unwraps one layer of quoting before
//! parsing so those files load like any other.

use crate::version;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Package record exactly as published in `metadata.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub category: String,
    pub size: u64,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub conflicts: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub download_url: String,

    #[serde(default, alias = "checksum", alias = "sha256")]
    pub checksum_sha256: String,

    #[serde(default)]
    pub platform: String,

    #[serde(default)]
    pub architecture: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_script: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall_script: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maintainer: Option<String>,
}

/// Remote kill switch for the whole catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceStatus {
    #[serde(default, alias = "isEnabled")]
    pub enabled: bool,

    #[serde(default = "default_maintenance_title")]
    pub title: String,

    #[serde(default = "default_maintenance_message")]
    pub message: String,

    #[serde(default = "default_estimated_time")]
    pub estimated_time: String,

    /// App versions still allowed to run during maintenance
    #[serde(default)]
    pub allowed_versions: Vec<String>,
}

impl Default for MaintenanceStatus {
    fn default() -> Self {
        Self {
            enabled: false,
            title: default_maintenance_title(),
            message: default_maintenance_message(),
            estimated_time: default_estimated_time(),
            allowed_versions: Vec::new(),
        }
    }
}

fn default_maintenance_title() -> String {
    "Maintenance Mode".to_string()
}

fn default_maintenance_message() -> String {
    "The app is currently under maintenance. Please try again later.".to_string()
}

fn default_estimated_time() -> String {
    "Unknown".to_string()
}

impl MaintenanceStatus {
    /// True when maintenance is on and `app_version` is not exempt
    pub fn blocks(&self, app_version: &str) -> bool {
        self.enabled && !self.allowed_versions.iter().any(|v| v == app_version)
    }
}

/// Client version policy published alongside the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default = "default_app_version")]
    pub min_version: String,

    #[serde(default = "default_app_version")]
    pub latest_version: String,

    #[serde(default)]
    pub force_update: bool,

    #[serde(default = "default_update_message", alias = "updateMessage")]
    pub message: String,

    #[serde(default)]
    pub enabled_features: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            min_version: default_app_version(),
            latest_version: default_app_version(),
            force_update: false,
            message: default_update_message(),
            enabled_features: Vec::new(),
        }
    }
}

fn default_app_version() -> String {
    "1.0".to_string()
}

fn default_update_message() -> String {
    "A new version is available. Please update.".to_string()
}

impl AppConfig {
    /// The running version is below the minimum, or an update is forced
    pub fn update_required(&self, current: &str) -> bool {
        version::is_newer(&self.min_version, current)
            || (self.force_update && self.update_available(current))
    }

    pub fn update_available(&self, current: &str) -> bool {
        version::is_newer(&self.latest_version, current)
    }

    pub fn feature_enabled(&self, feature: &str) -> bool {
        self.enabled_features.iter().any(|f| f == feature)
    }
}

/// Strip a byte-order mark and surrounding whitespace
pub fn clean_text(raw: &str) -> &str {
    raw.trim_start_matches('\u{feff}').trim()
}

/// Parse a metadata document, absorbing double encoding
///
/// A document that is itself a JSON string literal is decoded once and the
/// resulting text parsed. A document that contains escaped quotes but fails
/// to parse directly is unescaped by hand and retried, covering files that
/// lost their outer quotes but kept the escaping.
pub fn parse_document<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    let text = clean_text(raw);

    if text.starts_with('"') {
        let inner = match serde_json::from_str::<String>(text) {
            Ok(decoded) => decoded,
            Err(_) => manual_unescape(text.trim_matches('"')),
        };
        return serde_json::from_str(clean_text(&inner));
    }

    match serde_json::from_str(text) {
        Ok(value) => Ok(value),
        Err(err) if text.contains("\\\"") => {
            serde_json::from_str(&manual_unescape(text)).map_err(|_| err)
        }
        Err(err) => Err(err),
    }
}

fn manual_unescape(text: &str) -> String {
    text.replace("\\\"", "\"").replace("\\/", "/").replace("\\\\", "\\")
}
