// src/catalog/descriptor.rs

//! Normalized package descriptors
//!
//! A [`PackageDescriptor`] is built from [`RawMetadata`] for a specific
//! [`RuntimeTarget`]. Descriptors that cannot be installed here are kept
//! (they are still listed and searchable) but carry the reason in
//! [`Installability::Unavailable`].

use super::metadata::RawMetadata;
use crate::db::models::InstalledRecord;
use crate::version;
use serde::Serialize;
use std::fmt;

/// Fixed package categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    System,
    Network,
    Development,
    Editors,
    Shells,
    Compression,
    Security,
    Database,
    Web,
    ProgrammingLanguage,
    VersionControl,
    Multimedia,
    Documentation,
    Libraries,
    Utilities,
    Games,
    Education,
    Science,
}

impl Category {
    pub const ALL: [Category; 18] = [
        Category::System,
        Category::Network,
        Category::Development,
        Category::Editors,
        Category::Shells,
        Category::Compression,
        Category::Security,
        Category::Database,
        Category::Web,
        Category::ProgrammingLanguage,
        Category::VersionControl,
        Category::Multimedia,
        Category::Documentation,
        Category::Libraries,
        Category::Utilities,
        Category::Games,
        Category::Education,
        Category::Science,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::System => "system",
            Category::Network => "network",
            Category::Development => "development",
            Category::Editors => "editors",
            Category::Shells => "shells",
            Category::Compression => "compression",
            Category::Security => "security",
            Category::Database => "database",
            Category::Web => "web",
            Category::ProgrammingLanguage => "programming-language",
            Category::VersionControl => "version-control",
            Category::Multimedia => "multimedia",
            Category::Documentation => "documentation",
            Category::Libraries => "libraries",
            Category::Utilities => "utilities",
            Category::Games => "games",
            Category::Education => "education",
            Category::Science => "science",
        }
    }

    /// Parse a category name, or `None` if it is not recognized
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        let category = match normalized.as_str() {
            "system" => Category::System,
            "network" | "networking" => Category::Network,
            "development" | "dev" => Category::Development,
            "editors" | "editor" => Category::Editors,
            "shells" | "shell" => Category::Shells,
            "compression" => Category::Compression,
            "security" => Category::Security,
            "database" | "databases" => Category::Database,
            "web" => Category::Web,
            "programming-language" | "programming-languages" | "programming" | "languages" => {
                Category::ProgrammingLanguage
            }
            "version-control" | "vcs" => Category::VersionControl,
            "multimedia" | "media" => Category::Multimedia,
            "documentation" | "docs" => Category::Documentation,
            "libraries" | "library" | "libs" => Category::Libraries,
            "utilities" | "utility" | "utils" => Category::Utilities,
            "games" | "game" => Category::Games,
            "education" => Category::Education,
            "science" => Category::Science,
            _ => return None,
        };
        Some(category)
    }

    /// Parse leniently; unrecognized names land in utilities
    pub fn from_metadata(value: &str) -> Self {
        Self::parse(value).unwrap_or(Category::Utilities)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Platform a package targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Android,
    Windows,
    /// Either platform; also what an empty field means
    Both,
    Other(String),
}

impl Platform {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "android" | "linux" | "termux" => Platform::Android,
            "windows" | "win" | "win32" | "win64" => Platform::Windows,
            "" | "both" | "all" | "any" => Platform::Both,
            other => Platform::Other(other.to_string()),
        }
    }

    /// True when a package for `self` runs on `runtime`
    pub fn supports(&self, runtime: &Platform) -> bool {
        match self {
            Platform::Both => true,
            Platform::Other(_) => false,
            specific => specific == runtime,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Android => f.write_str("android"),
            Platform::Windows => f.write_str("windows"),
            Platform::Both => f.write_str("both"),
            Platform::Other(name) => f.write_str(name),
        }
    }
}

/// CPU architecture a package targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    Aarch64,
    Arm,
    X86_64,
    I686,
    /// Wildcard, written as an empty string in metadata
    Any,
    Other(String),
}

impl Architecture {
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "aarch64" | "arm64" | "arm64-v8a" => Architecture::Aarch64,
            "arm" | "armv7" | "armv7l" | "armeabi-v7a" => Architecture::Arm,
            "x86_64" | "amd64" | "x64" => Architecture::X86_64,
            "i686" | "i386" | "x86" => Architecture::I686,
            "" | "any" | "all" | "noarch" => Architecture::Any,
            other => Architecture::Other(other.to_string()),
        }
    }

    pub fn supports(&self, runtime: &Architecture) -> bool {
        match self {
            Architecture::Any => true,
            Architecture::Other(_) => false,
            specific => specific == runtime,
        }
    }

    /// Name used in Debian-style artifact file names
    pub fn as_str(&self) -> &str {
        match self {
            Architecture::Aarch64 => "aarch64",
            Architecture::Arm => "arm",
            Architecture::X86_64 => "x86_64",
            Architecture::I686 => "i686",
            Architecture::Any => "",
            Architecture::Other(name) => name,
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Architecture::Any => f.write_str("any"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Platform and architecture of the running process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeTarget {
    pub platform: Platform,
    pub architecture: Architecture,
}

impl RuntimeTarget {
    pub fn new(platform: Platform, architecture: Architecture) -> Self {
        Self {
            platform,
            architecture,
        }
    }

    /// Detect from the compile target
    ///
    /// Windows hosts map to [`Platform::Windows`]; every other host is
    /// treated as the Android/Linux userland.
    pub fn detect() -> Self {
        let platform = if cfg!(windows) {
            Platform::Windows
        } else {
            Platform::Android
        };
        let architecture = match std::env::consts::ARCH {
            "x86" => Architecture::I686,
            arch => Architecture::parse(arch),
        };
        Self {
            platform,
            architecture,
        }
    }
}

/// Whether a descriptor can be installed on the runtime target
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Installability {
    Installable,
    Unavailable(String),
}

impl Installability {
    /// Evaluate the installable predicate
    ///
    /// Depends only on the platform, architecture, download URL and
    /// checksum fields plus the runtime target.
    pub fn evaluate(
        platform: &Platform,
        architecture: &Architecture,
        download_url: &str,
        checksum_sha256: &str,
        target: &RuntimeTarget,
    ) -> Self {
        if !platform.supports(&target.platform) {
            return Installability::Unavailable(format!("Unsupported platform: {}", platform));
        }
        if !architecture.supports(&target.architecture) {
            return Installability::Unavailable(format!(
                "Unsupported architecture: {}",
                architecture
            ));
        }
        if download_url.trim().is_empty() {
            return Installability::Unavailable("Missing download URL".to_string());
        }
        if checksum_sha256.trim().is_empty() {
            return Installability::Unavailable("Missing SHA-256 checksum".to_string());
        }
        Installability::Installable
    }

    pub fn is_installable(&self) -> bool {
        matches!(self, Installability::Installable)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Installability::Installable => None,
            Installability::Unavailable(reason) => Some(reason),
        }
    }
}

/// Local install state folded into a descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackageStatus {
    pub installed_version: Option<String>,
    pub needs_update: bool,
    pub needs_maintenance: bool,
    pub maintenance_reason: Option<String>,
}

/// Normalized, filter-ready package record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageDescriptor {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub category: Category,
    pub size_bytes: u64,
    pub dependencies: Vec<String>,
    pub conflicts: Vec<String>,
    pub tags: Vec<String>,
    pub download_url: String,
    pub checksum_sha256: String,
    pub platform: Platform,
    pub architecture: Architecture,
    pub install_script: Option<String>,
    pub uninstall_script: Option<String>,
    pub homepage: Option<String>,
    pub license: Option<String>,
    pub installability: Installability,
    pub status: PackageStatus,
}

impl PackageDescriptor {
    /// Normalize raw metadata for `target`
    pub fn from_metadata(raw: RawMetadata, target: &RuntimeTarget) -> Self {
        let platform = Platform::parse(&raw.platform);
        let architecture = Architecture::parse(&raw.architecture);
        let download_url = raw.download_url.trim().to_string();
        let checksum_sha256 = raw.checksum_sha256.trim().to_ascii_lowercase();
        let installability = Installability::evaluate(
            &platform,
            &architecture,
            &download_url,
            &checksum_sha256,
            target,
        );

        Self {
            id: raw.id.trim().to_string(),
            name: raw.name,
            version: raw.version.trim().to_string(),
            description: raw.description,
            category: Category::from_metadata(&raw.category),
            size_bytes: raw.size,
            dependencies: clean_ids(raw.dependencies),
            conflicts: clean_ids(raw.conflicts),
            tags: raw.tags,
            download_url,
            checksum_sha256,
            platform,
            architecture,
            install_script: raw.install_script.filter(|s| !s.trim().is_empty()),
            uninstall_script: raw.uninstall_script.filter(|s| !s.trim().is_empty()),
            homepage: raw.homepage,
            license: raw.license,
            installability,
            status: PackageStatus::default(),
        }
    }

    pub fn is_installable(&self) -> bool {
        self.installability.is_installable()
    }

    pub fn is_installed(&self) -> bool {
        self.status.installed_version.is_some()
    }

    /// Fold an installed record (if any) into the descriptor's status
    ///
    /// An update is pending when the record is flagged or the catalog
    /// version is newer than the installed one.
    pub fn annotate(&mut self, record: Option<&InstalledRecord>) {
        self.status = match record {
            Some(record) => PackageStatus {
                installed_version: Some(record.installed_version.clone()),
                needs_update: record.needs_update
                    || version::is_newer(&self.version, &record.installed_version),
                needs_maintenance: record.needs_maintenance,
                maintenance_reason: record.maintenance_reason.clone(),
            },
            None => PackageStatus::default(),
        };
    }
}

fn clean_ids(ids: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(ids.len());
    for id in ids {
        let id = id.trim();
        if !id.is_empty() && !cleaned.iter().any(|existing| existing == id) {
            cleaned.push(id.to_string());
        }
    }
    cleaned
}
