// src/config.rs

//! Engine configuration
//!
//! Loaded from a TOML file with the following sections, all optional:
//! - `[repository]` - metadata remote, branch, mirror directory name
//! - `[paths]` - data directory holding the mirror, packages and database
//! - `[http]` - timeouts, user agent, redirect limit
//! - `[sync]` - retry policy, connectivity probe, staleness threshold
//! - `[install]` - checksum policy and script timeout
//! - `[target]` - platform/architecture override for cross-target testing
//! - `[author]` - identity used for custom-package commits
//!
//! Durations are human-readable strings such as `"30s"`, `"2s"` or `"1h"`.

use crate::catalog::{Architecture, Platform, RuntimeTarget};
use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Environment variable that points at an alternate config file
pub const CONFIG_ENV_VAR: &str = "BOUNTU_CONFIG";

/// Default metadata repository
pub const DEFAULT_REMOTE_URL: &str =
    "https://github.com/snmrdatobgstudioz9918-creator/bountu-packages-global.git";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub repository: RepositorySection,

    #[serde(default)]
    pub paths: PathsSection,

    #[serde(default)]
    pub http: HttpSection,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub install: InstallSection,

    #[serde(default)]
    pub target: TargetSection,

    #[serde(default)]
    pub author: AuthorSection,
}

/// Remote metadata repository
#[derive(Debug, Clone, Deserialize)]
pub struct RepositorySection {
    #[serde(default = "default_remote_url")]
    pub remote_url: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    /// Directory name of the mirror under the data directory
    #[serde(default = "default_mirror_dir")]
    pub mirror_dir: String,

    /// Timeout for a single git invocation
    #[serde(default = "default_git_timeout")]
    pub git_timeout: String,
}

impl Default for RepositorySection {
    fn default() -> Self {
        Self {
            remote_url: default_remote_url(),
            branch: default_branch(),
            mirror_dir: default_mirror_dir(),
            git_timeout: default_git_timeout(),
        }
    }
}

fn default_remote_url() -> String {
    DEFAULT_REMOTE_URL.to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_mirror_dir() -> String {
    "bountu-repo".to_string()
}

fn default_git_timeout() -> String {
    "5m".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsSection {
    /// Root for all engine state (defaults to the platform data dir)
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpSection {
    #[serde(default = "default_http_timeout")]
    pub connect_timeout: String,

    #[serde(default = "default_http_timeout")]
    pub read_timeout: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
}

impl Default for HttpSection {
    fn default() -> Self {
        Self {
            connect_timeout: default_http_timeout(),
            read_timeout: default_http_timeout(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
        }
    }
}

fn default_http_timeout() -> String {
    "30s".to_string()
}

fn default_user_agent() -> String {
    format!("Bountu/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_redirects() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncSection {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_retry_delay")]
    pub retry_delay: String,

    /// Host probed to detect general network reachability
    #[serde(default = "default_probe_address")]
    pub probe_address: String,

    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: String,

    /// Age after which the mirror is considered stale
    #[serde(default = "default_max_sync_age")]
    pub max_sync_age: String,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retry_delay: default_retry_delay(),
            probe_address: default_probe_address(),
            probe_timeout: default_probe_timeout(),
            max_sync_age: default_max_sync_age(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> String {
    "2s".to_string()
}

fn default_probe_address() -> String {
    "8.8.8.8:53".to_string()
}

fn default_probe_timeout() -> String {
    "5s".to_string()
}

fn default_max_sync_age() -> String {
    "1h".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct InstallSection {
    /// Treat an empty published checksum as a verification failure
    #[serde(default)]
    pub require_checksum: bool,

    #[serde(default = "default_script_timeout")]
    pub script_timeout: String,
}

impl Default for InstallSection {
    fn default() -> Self {
        Self {
            require_checksum: false,
            script_timeout: default_script_timeout(),
        }
    }
}

fn default_script_timeout() -> String {
    "5m".to_string()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetSection {
    #[serde(default)]
    pub platform: Option<String>,

    #[serde(default)]
    pub architecture: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthorSection {
    #[serde(default = "default_author_name")]
    pub name: String,

    #[serde(default = "default_author_email")]
    pub email: String,
}

impl Default for AuthorSection {
    fn default() -> Self {
        Self {
            name: default_author_name(),
            email: default_author_email(),
        }
    }
}

fn default_author_name() -> String {
    "Bountu".to_string()
}

fn default_author_email() -> String {
    "bountu@localhost".to_string()
}

impl EngineConfig {
    /// Load and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.display(), e)))
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig =
            toml::from_str(content).map_err(|e| Error::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the configuration for this process
    ///
    /// An explicit path must exist. Otherwise `$BOUNTU_CONFIG` and then
    /// `<config dir>/bountu/config.toml` are consulted, falling back to
    /// defaults when neither exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidate = std::env::var_os(CONFIG_ENV_VAR)
            .map(PathBuf::from)
            .or_else(|| dirs::config_dir().map(|d| d.join("bountu").join("config.toml")));

        match candidate {
            Some(path) if path.is_file() => {
                debug!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => {
                debug!("No configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Check value ranges and parse every duration once
    pub fn validate(&self) -> Result<()> {
        if self.repository.remote_url.trim().is_empty() {
            return Err(Error::ConfigError("repository.remote_url is empty".to_string()));
        }
        if self.repository.branch.trim().is_empty() {
            return Err(Error::ConfigError("repository.branch is empty".to_string()));
        }
        crate::filesystem::sanitize_filename(&self.repository.mirror_dir)
            .map_err(|e| Error::ConfigError(format!("repository.mirror_dir: {}", e)))?;

        if self.sync.max_attempts == 0 {
            return Err(Error::ConfigError("sync.max_attempts must be at least 1".to_string()));
        }
        if self.http.max_redirects == 0 {
            return Err(Error::ConfigError("http.max_redirects must be at least 1".to_string()));
        }

        for (key, value) in [
            ("repository.git_timeout", &self.repository.git_timeout),
            ("http.connect_timeout", &self.http.connect_timeout),
            ("http.read_timeout", &self.http.read_timeout),
            ("sync.probe_timeout", &self.sync.probe_timeout),
            ("install.script_timeout", &self.install.script_timeout),
            ("sync.max_sync_age", &self.sync.max_sync_age),
        ] {
            if parse_duration(value)?.is_zero() {
                return Err(Error::ConfigError(format!("{} must be greater than zero", key)));
            }
        }
        parse_duration(&self.sync.retry_delay)?;

        self.target()?;
        Ok(())
    }

    /// Root directory for all engine state
    pub fn data_dir(&self) -> PathBuf {
        self.paths.data_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|d| d.join("bountu"))
                .unwrap_or_else(|| PathBuf::from("bountu-data"))
        })
    }

    pub fn mirror_dir(&self) -> PathBuf {
        self.data_dir().join(&self.repository.mirror_dir)
    }

    /// Per-package install trees live under this directory
    pub fn packages_dir(&self) -> PathBuf {
        self.data_dir().join("packages")
    }

    /// Wrapper shims are written here; add it to PATH
    pub fn bin_dir(&self) -> PathBuf {
        self.data_dir().join("bin")
    }

    /// Staging area for downloads
    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir().join("cache")
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("bountu.db")
    }

    /// Shared environment-setup file sourced by shells
    pub fn env_file(&self) -> PathBuf {
        self.data_dir().join("environment.sh")
    }

    pub fn git_timeout(&self) -> Result<Duration> {
        parse_duration(&self.repository.git_timeout)
    }

    pub fn connect_timeout(&self) -> Result<Duration> {
        parse_duration(&self.http.connect_timeout)
    }

    pub fn read_timeout(&self) -> Result<Duration> {
        parse_duration(&self.http.read_timeout)
    }

    pub fn retry_delay(&self) -> Result<Duration> {
        parse_duration(&self.sync.retry_delay)
    }

    pub fn probe_timeout(&self) -> Result<Duration> {
        parse_duration(&self.sync.probe_timeout)
    }

    pub fn max_sync_age(&self) -> Result<Duration> {
        parse_duration(&self.sync.max_sync_age)
    }

    pub fn script_timeout(&self) -> Result<Duration> {
        parse_duration(&self.install.script_timeout)
    }

    /// Runtime target, honoring any `[target]` override
    pub fn target(&self) -> Result<RuntimeTarget> {
        let detected = RuntimeTarget::detect();

        let platform = match &self.target.platform {
            Some(value) => match Platform::parse(value) {
                Platform::Other(other) => {
                    return Err(Error::ConfigError(format!("Unknown target.platform '{}'", other)));
                }
                Platform::Both => {
                    return Err(Error::ConfigError(
                        "target.platform must name a single platform".to_string(),
                    ));
                }
                platform => platform,
            },
            None => detected.platform,
        };

        let architecture = match &self.target.architecture {
            Some(value) => match Architecture::parse(value) {
                Architecture::Other(other) => {
                    return Err(Error::ConfigError(format!(
                        "Unknown target.architecture '{}'",
                        other
                    )));
                }
                Architecture::Any => {
                    return Err(Error::ConfigError(
                        "target.architecture must name a single architecture".to_string(),
                    ));
                }
                arch => arch,
            },
            None => detected.architecture,
        };

        Ok(RuntimeTarget {
            platform,
            architecture,
        })
    }
}

/// Parse a human-readable duration (`"500ms"`, `"30s"`, `"5m"`, `"1h"`, `"1d"`)
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, unit_ms): (&str, u64) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1)
    } else if let Some(n) = s.strip_suffix('d') {
        (n, 24 * 60 * 60 * 1000)
    } else if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60 * 1000)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60 * 1000)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1000)
    } else {
        (s.as_str(), 1000)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .map_err(|_| Error::ConfigError(format!("Invalid duration: '{}'", s)))?;

    Ok(Duration::from_millis(num.saturating_mul(unit_ms)))
}
