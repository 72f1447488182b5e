// src/sync/mod.rs

//! Initial sync gate
//!
//! Before the catalog can be used the local mirror must hold a complete,
//! non-empty clone. [`SyncCoordinator::perform_initial_sync`] gets it
//! there:
//!
//! 1. Probe connectivity. Any failure ends the sync immediately; there is
//!    no point retrying a clone without a network.
//! 2. Run up to `max_attempts` sync cycles, sleeping `delay` between them.
//!    A cycle is a forced re-clone, a mirror state check, and a package
//!    listing. An empty listing fails the cycle: a populated remote never
//!    yields zero packages, so it means the clone is broken.

mod connectivity;

pub use connectivity::{
    ConnectionQuality, ConnectivityError, ConnectivityProbe, NetworkProbe, ProbeReport,
};

use crate::catalog::CatalogResolver;
use crate::error::{Error, Result};
use crate::mirror::{MirrorError, RepositoryMirror, SyncOutcome};
use std::fmt;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Attempt budget for the sync loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Observable progress of the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Checking,
    Syncing { attempt: u32, max_attempts: u32 },
    Retrying { attempt: u32, max_attempts: u32 },
    Success,
    Failed(String),
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => f.write_str("idle"),
            SyncState::Checking => f.write_str("checking connectivity"),
            SyncState::Syncing {
                attempt,
                max_attempts,
            } => write!(f, "syncing (attempt {attempt}/{max_attempts})"),
            SyncState::Retrying {
                attempt,
                max_attempts,
            } => write!(f, "retrying after attempt {attempt}/{max_attempts}"),
            SyncState::Success => f.write_str("synced"),
            SyncState::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// One sync cycle as it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncAttempt {
    pub number: u32,
    pub error: Option<String>,
}

/// Why a sync ended without a usable mirror
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncFailure {
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),

    #[error("Sync failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    Success {
        package_count: usize,
        commit: Option<String>,
    },
    Failed(SyncFailure),
}

impl SyncResult {
    pub fn is_success(&self) -> bool {
        matches!(self, SyncResult::Success { .. })
    }
}

type StateObserver = Box<dyn Fn(&SyncState) + Send + Sync>;

/// Drives the mirror to a usable state and tracks sync freshness
pub struct SyncCoordinator {
    mirror: Arc<RepositoryMirror>,
    resolver: Arc<CatalogResolver>,
    remote_url: String,
    probe: Box<dyn ConnectivityProbe>,
    policy: RetryPolicy,
    max_sync_age: Duration,
    state: Mutex<SyncState>,
    attempts: Mutex<Vec<SyncAttempt>>,
    observer: Option<StateObserver>,
}

impl SyncCoordinator {
    pub fn new(
        resolver: Arc<CatalogResolver>,
        remote_url: impl Into<String>,
        probe: Box<dyn ConnectivityProbe>,
    ) -> Self {
        Self {
            mirror: Arc::clone(resolver.mirror()),
            resolver,
            remote_url: remote_url.into(),
            probe,
            policy: RetryPolicy::default(),
            max_sync_age: Duration::from_secs(60 * 60),
            state: Mutex::new(SyncState::Idle),
            attempts: Mutex::new(Vec::new()),
            observer: None,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_sync_age(mut self, max_age: Duration) -> Self {
        self.max_sync_age = max_age;
        self
    }

    /// Receive every state transition
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&SyncState) + Send + Sync + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn state(&self) -> SyncState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Cycles run by the most recent sync
    pub fn attempts(&self) -> Vec<SyncAttempt> {
        self.attempts
            .lock()
            .map(|a| a.clone())
            .unwrap_or_default()
    }

    fn set_state(&self, next: SyncState) {
        debug!("Sync state: {}", next);
        match self.state.lock() {
            Ok(mut state) => *state = next.clone(),
            Err(poisoned) => *poisoned.into_inner() = next.clone(),
        }
        if let Some(observer) = &self.observer {
            observer(&next);
        }
    }

    fn record_attempt(&self, attempt: SyncAttempt) {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.push(attempt);
        }
    }

    /// Probe, then clone with retries until the mirror is usable
    pub fn perform_initial_sync(&self) -> SyncResult {
        if let Ok(mut attempts) = self.attempts.lock() {
            attempts.clear();
        }

        self.set_state(SyncState::Checking);
        match self.probe.probe() {
            Ok(report) => info!(
                "Network OK ({}ms, {})",
                report.latency.as_millis(),
                report.quality
            ),
            Err(e) => {
                error!("Connectivity check failed: {}", e);
                self.set_state(SyncState::Failed(e.to_string()));
                return SyncResult::Failed(SyncFailure::Connectivity(e));
            }
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=max_attempts {
            self.set_state(SyncState::Syncing {
                attempt,
                max_attempts,
            });
            info!("Sync attempt {}/{}", attempt, max_attempts);

            match self.run_cycle() {
                Ok(package_count) => {
                    self.record_attempt(SyncAttempt {
                        number: attempt,
                        error: None,
                    });
                    if let Err(e) = self.mirror.mark_successful_sync() {
                        warn!("Failed to record sync time: {}", e);
                    }
                    let commit = self
                        .mirror
                        .info()
                        .ok()
                        .and_then(|state| state.current_commit_hash);
                    info!("Sync complete: {} packages available", package_count);
                    self.set_state(SyncState::Success);
                    return SyncResult::Success {
                        package_count,
                        commit,
                    };
                }
                Err(e) => {
                    warn!("Sync attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                    self.record_attempt(SyncAttempt {
                        number: attempt,
                        error: Some(last_error.clone()),
                    });
                    if attempt < max_attempts {
                        self.set_state(SyncState::Retrying {
                            attempt,
                            max_attempts,
                        });
                        thread::sleep(self.policy.delay);
                    }
                }
            }
        }

        error!("Sync failed after {} attempts", max_attempts);
        self.set_state(SyncState::Failed(last_error.clone()));
        SyncResult::Failed(SyncFailure::Exhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    /// Start over from the connectivity probe
    pub fn retry_sync(&self) -> SyncResult {
        info!("Retrying sync from scratch");
        self.perform_initial_sync()
    }

    /// One forced re-clone plus sanity checks; returns the package count
    fn run_cycle(&self) -> Result<usize> {
        self.mirror.initialize(&self.remote_url, true)?;

        let state = self.mirror.info()?;
        if state.current_commit_hash.is_none() {
            return Err(corrupt(&self.mirror, "no commit recorded after clone"));
        }

        let ids = self.resolver.list_package_ids()?;
        if ids.is_empty() {
            return Err(corrupt(&self.mirror, "no packages found"));
        }
        Ok(ids.len())
    }

    /// Fetch and fast-forward an existing mirror
    pub fn refresh(&self) -> Result<SyncOutcome> {
        let outcome = self.mirror.sync()?;
        self.mirror.mark_successful_sync()?;
        Ok(outcome)
    }

    /// Time since the last successful sync, if there was one
    pub fn sync_age(&self) -> Option<Duration> {
        let last = self.mirror.info().ok()?.last_successful_sync?;
        let at = chrono::DateTime::parse_from_rfc3339(&last).ok()?;
        let age = chrono::Utc::now().signed_duration_since(at);
        Some(age.to_std().unwrap_or(Duration::ZERO))
    }

    /// True when there is no successful sync younger than the max age
    pub fn is_sync_required(&self) -> bool {
        match self.sync_age() {
            Some(age) => age > self.max_sync_age,
            None => true,
        }
    }
}

fn corrupt(mirror: &RepositoryMirror, reason: &str) -> Error {
    MirrorError::CorruptRepository {
        path: mirror.local_path().to_path_buf(),
        reason: reason.to_string(),
    }
    .into()
}
