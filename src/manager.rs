// src/manager.rs

//! Package manager facade
//!
//! [`PackageManager`] wires the components together from an
//! [`EngineConfig`]: one database connection, one mirror, one resolver,
//! one installer and one sync coordinator, all sharing state through
//! explicit handles. The catalog is never cached globally; callers get a
//! fresh [`Catalog`] value annotated with current install state.

use crate::catalog::{
    AppConfig, Catalog, CatalogError, CatalogResolver, CatalogStats, MaintenanceStatus,
    PackageDescriptor, RawMetadata,
};
use crate::config::EngineConfig;
use crate::db::models::MirrorState;
use crate::db::{self, SharedConnection};
use crate::error::Result;
use crate::fetch::ArtifactFetcher;
use crate::install::{InstallOutcome, Installer};
use crate::mirror::{
    CommitAuthor, ContentStore, GitCli, MirrorError, RepositoryMirror, SyncOutcome,
};
use crate::progress::ProgressReporter;
use crate::sync::{ConnectivityProbe, NetworkProbe, RetryPolicy, SyncCoordinator, SyncResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Version of this client, checked against the published app policy
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Everything `bountu status` reports
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub mirror: MirrorState,
    pub initialized: bool,
    pub maintenance: MaintenanceStatus,
    pub app_config: AppConfig,
    pub stats: Option<CatalogStats>,
    pub sync_age: Option<Duration>,
    pub sync_required: bool,
}

pub struct PackageManager {
    config: EngineConfig,
    db: SharedConnection,
    mirror: Arc<RepositoryMirror>,
    resolver: Arc<CatalogResolver>,
    installer: Installer,
    coordinator: SyncCoordinator,
}

impl PackageManager {
    /// Open the engine with the git CLI and a real network probe
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = Arc::new(GitCli::new(config.git_timeout()?));
        let probe = Box::new(NetworkProbe::new(
            config.sync.probe_address.clone(),
            config.probe_timeout()?,
            config.repository.remote_url.clone(),
        ));
        Self::with_components(config, store, probe)
    }

    /// Open the engine with a caller-supplied content store and probe
    pub fn with_components(
        config: EngineConfig,
        store: Arc<dyn ContentStore>,
        probe: Box<dyn ConnectivityProbe>,
    ) -> Result<Self> {
        config.validate()?;
        let target = config.target()?;
        debug!(
            "Runtime target {} / {}",
            target.platform, target.architecture
        );

        let db = db::shared(db::open_or_init(config.db_path())?);

        let author = CommitAuthor {
            name: config.author.name.clone(),
            email: config.author.email.clone(),
        };
        let mirror = Arc::new(
            RepositoryMirror::new(
                config.mirror_dir(),
                config.repository.branch.clone(),
                store,
                author,
            )
            .with_database(db.clone())?,
        );
        let resolver = Arc::new(CatalogResolver::new(Arc::clone(&mirror), target.clone()));

        let fetcher = ArtifactFetcher::new(&config, target.architecture.clone())?;
        let installer = Installer::new(&config, db.clone(), fetcher)?;

        let coordinator = SyncCoordinator::new(
            Arc::clone(&resolver),
            config.repository.remote_url.clone(),
            probe,
        )
        .with_policy(RetryPolicy {
            max_attempts: config.sync.max_attempts,
            delay: config.retry_delay()?,
        })
        .with_max_sync_age(config.max_sync_age()?);

        Ok(Self {
            config,
            db,
            mirror,
            resolver,
            installer,
            coordinator,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn database(&self) -> &SharedConnection {
        &self.db
    }

    pub fn mirror(&self) -> &RepositoryMirror {
        &self.mirror
    }

    pub fn resolver(&self) -> &CatalogResolver {
        &self.resolver
    }

    pub fn installer(&self) -> &Installer {
        &self.installer
    }

    pub fn coordinator(&self) -> &SyncCoordinator {
        &self.coordinator
    }

    /// Run the initial sync gate
    pub fn initial_sync(&self) -> SyncResult {
        self.coordinator.perform_initial_sync()
    }

    /// Fetch and fast-forward the existing mirror
    pub fn refresh(&self) -> Result<SyncOutcome> {
        self.coordinator.refresh()
    }

    fn require_mirror(&self) -> Result<()> {
        if !self.mirror.is_initialized() {
            return Err(MirrorError::NotInitialized(self.mirror.local_path().to_path_buf()).into());
        }
        Ok(())
    }

    /// Load the catalog and persist derived maintenance flags
    ///
    /// An installed package that the catalog marks as needing maintenance
    /// (for example, no longer available for this platform) gets its record
    /// flagged so the state survives until it is repaired or removed.
    pub fn catalog(&self) -> Result<Catalog> {
        self.require_mirror()?;
        let installed = self.installer.installed()?;
        let catalog = self.resolver.load_catalog(&installed)?;
        self.installer.record_catalog_flags(&catalog)?;
        Ok(catalog)
    }

    /// One package from the mirror, annotated with its install state
    pub fn package(&self, id: &str) -> Result<PackageDescriptor> {
        self.require_mirror()?;
        let record = self.installer.record(id)?;
        Ok(self.resolver.load_descriptor(id, record.as_ref())?)
    }

    pub fn install(&self, id: &str, progress: &dyn ProgressReporter) -> Result<InstallOutcome> {
        let descriptor = self.package(id)?;
        self.installer.install(&descriptor, progress)
    }

    /// Remove a package, even one that has left the catalog
    pub fn uninstall(&self, id: &str) -> Result<()> {
        match self.package(id) {
            Ok(descriptor) => self.installer.uninstall(&descriptor),
            Err(crate::Error::Catalog(CatalogError::NotFound(_))) => {
                info!("{} is no longer in the catalog, removing without script", id);
                self.installer.uninstall_package(id, None)
            }
            Err(e) => Err(e),
        }
    }

    pub fn update(&self, id: &str, progress: &dyn ProgressReporter) -> Result<InstallOutcome> {
        let descriptor = self.package(id)?;
        self.installer.update(&descriptor, progress)
    }

    pub fn update_all(&self) -> Result<Vec<(String, Result<InstallOutcome>)>> {
        let catalog = self.catalog()?;
        Ok(self.installer.update_all(&catalog))
    }

    pub fn repair(&self, id: &str, progress: &dyn ProgressReporter) -> Result<InstallOutcome> {
        let descriptor = self.package(id)?;
        self.installer.repair(&descriptor, progress)
    }

    /// Commit a locally authored package into the mirror
    pub fn create_custom_package(&self, metadata: &RawMetadata) -> Result<String> {
        self.require_mirror()?;
        Ok(self.mirror.create_custom_package(metadata)?)
    }

    pub fn status(&self) -> Result<EngineStatus> {
        let initialized = self.mirror.is_initialized();
        let stats = if initialized {
            Some(self.catalog()?.stats())
        } else {
            None
        };

        Ok(EngineStatus {
            mirror: self.mirror.info()?,
            initialized,
            maintenance: self.resolver.load_maintenance_status(),
            app_config: self.resolver.load_app_config(),
            stats,
            sync_age: self.coordinator.sync_age(),
            sync_required: self.coordinator.is_sync_required(),
        })
    }
}
