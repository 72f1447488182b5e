// src/mirror/mod.rs

//! Local mirror of the remote metadata repository
//!
//! [`RepositoryMirror`] owns one working copy on disk. It clones it (shallow,
//! single branch), refreshes it with fetch + pull, and serves files out of
//! the working tree. Version-control operations go through the
//! [`ContentStore`] trait; [`GitCli`] is the production implementation.
//!
//! Only one clone/fetch/pull runs against a mirror at a time: every mutating
//! operation holds the mirror's state lock for its whole duration.
//!
//! A mirror whose control directory (`.git`) is missing is corrupt and is
//! healed by deleting and re-cloning, never used as-is.

mod git;

pub use git::GitCli;

use crate::catalog::RawMetadata;
use crate::db::models::MirrorState;
use crate::db::{self, SharedConnection};
use crate::filesystem::{remove_dir_best_effort, safe_join, sanitize_filename};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure reported by a [`ContentStore`] operation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct StoreError {
    pub operation: String,
    pub message: String,
}

impl StoreError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Clone failed: {0}")]
    CloneFailed(String),

    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    #[error("Mirror at {} is corrupt: {reason}", path.display())]
    CorruptRepository { path: PathBuf, reason: String },

    #[error("Mirror at {} is not initialized", .0.display())]
    NotInitialized(PathBuf),

    #[error("File not found in mirror: {0}")]
    NotFound(String),

    #[error("Invalid mirror path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("Mirror file '{path}' is not valid UTF-8: {reason}")]
    InvalidEncoding { path: String, reason: String },

    #[error("Commit failed: {0}")]
    CommitFailed(String),

    #[error("Mirror I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to persist mirror state: {0}")]
    State(String),
}

impl MirrorError {
    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Identity recorded on locally authored commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
}

/// Version-controlled content store operations the mirror needs
pub trait ContentStore: Send + Sync {
    /// Shallow, single-branch clone of `remote_url` into `dest`
    fn clone_shallow(&self, remote_url: &str, branch: &str, dest: &Path) -> Result<(), StoreError>;

    fn fetch(&self, repo: &Path, branch: &str) -> Result<(), StoreError>;

    /// Fast-forward the working tree to the fetched branch
    fn pull(&self, repo: &Path, branch: &str) -> Result<(), StoreError>;

    /// Commit hash HEAD resolves to
    fn head_commit(&self, repo: &Path) -> Result<String, StoreError>;

    fn remote_url(&self, repo: &Path) -> Result<String, StoreError>;

    /// Stage `paths` and commit them, returning the new commit hash
    fn commit_paths(
        &self,
        repo: &Path,
        paths: &[&Path],
        message: &str,
        author: &CommitAuthor,
    ) -> Result<String, StoreError>;

    /// Directory whose presence marks a valid working copy
    fn control_dir(&self) -> &str {
        ".git"
    }
}

/// Result of a fetch + pull
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub has_updates: bool,
    pub previous_commit: Option<String>,
    pub current_commit: String,
}

/// The local working copy of the metadata repository
pub struct RepositoryMirror {
    local_path: PathBuf,
    branch: String,
    store: Arc<dyn ContentStore>,
    author: CommitAuthor,
    db: Option<SharedConnection>,
    state: Mutex<MirrorState>,
}

impl RepositoryMirror {
    pub fn new(
        local_path: PathBuf,
        branch: impl Into<String>,
        store: Arc<dyn ContentStore>,
        author: CommitAuthor,
    ) -> Self {
        let state = MirrorState::new(local_path.display().to_string(), String::new());
        Self {
            local_path,
            branch: branch.into(),
            store,
            author,
            db: None,
            state: Mutex::new(state),
        }
    }

    /// Persist mirror state through `conn`, restoring any saved state
    pub fn with_database(mut self, conn: SharedConnection) -> crate::Result<Self> {
        let key = self.local_path.display().to_string();
        let saved = {
            let guard = db::lock(&conn)?;
            MirrorState::find_by_path(&guard, &key)?
        };
        if let Some(saved) = saved {
            debug!("Restored mirror state for {}", key);
            self.state = Mutex::new(saved);
        }
        self.db = Some(conn);
        Ok(self)
    }

    pub fn local_path(&self) -> &Path {
        &self.local_path
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// True when the working copy exists and has its control directory
    pub fn is_initialized(&self) -> bool {
        self.control_path().is_dir()
    }

    fn control_path(&self) -> PathBuf {
        self.local_path.join(self.store.control_dir())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, MirrorState>, MirrorError> {
        self.state
            .lock()
            .map_err(|_| MirrorError::State("mirror lock poisoned".to_string()))
    }

    fn persist(&self, state: &MirrorState) -> Result<(), MirrorError> {
        if let Some(conn) = &self.db {
            let guard = db::lock(conn).map_err(|e| MirrorError::State(e.to_string()))?;
            state
                .save(&guard)
                .map_err(|e| MirrorError::State(e.to_string()))?;
        }
        Ok(())
    }

    /// Ensure a valid clone of `remote_url` exists
    ///
    /// A valid existing mirror is left alone unless `force_refresh` is set.
    /// A missing or corrupt one (no control directory) is deleted and
    /// cloned again.
    pub fn initialize(&self, remote_url: &str, force_refresh: bool) -> Result<(), MirrorError> {
        let mut state = self.lock_state()?;

        if self.is_initialized() && !force_refresh {
            debug!("Mirror at {} already initialized", self.local_path.display());
            if state.current_commit_hash.is_none() {
                self.adopt_existing(&mut state)?;
            } else if !state.remote_url.is_empty() && state.remote_url != remote_url {
                warn!(
                    "Mirror at {} tracks {}, not {}; force a refresh to switch",
                    self.local_path.display(),
                    state.remote_url,
                    remote_url
                );
            }
            return Ok(());
        }

        if self.local_path.exists() && !force_refresh {
            warn!(
                "Mirror at {} has no {} directory, re-cloning",
                self.local_path.display(),
                self.store.control_dir()
            );
        }

        self.clone_into_place(&mut state, remote_url)
    }

    /// Populate in-memory state from a working copy we did not clone
    fn adopt_existing(&self, state: &mut MirrorState) -> Result<(), MirrorError> {
        let head = self
            .store
            .head_commit(&self.local_path)
            .map_err(|e| self.corrupt(e.to_string()))?;
        let remote = self.store.remote_url(&self.local_path).unwrap_or_default();

        state.remote_url = remote;
        state.current_commit_hash = Some(head);
        self.persist(state)
    }

    fn corrupt(&self, reason: impl Into<String>) -> MirrorError {
        MirrorError::CorruptRepository {
            path: self.local_path.clone(),
            reason: reason.into(),
        }
    }

    /// Delete whatever is at the mirror path and clone afresh
    fn clone_into_place(&self, state: &mut MirrorState, remote_url: &str) -> Result<(), MirrorError> {
        if self.local_path.exists() {
            fs::remove_dir_all(&self.local_path)
                .map_err(|e| MirrorError::io(&self.local_path, e))?;
        }
        if let Some(parent) = self.local_path.parent() {
            fs::create_dir_all(parent).map_err(|e| MirrorError::io(parent, e))?;
        }

        info!(
            "Cloning {} (branch {}) into {}",
            remote_url,
            self.branch,
            self.local_path.display()
        );
        if let Err(e) = self
            .store
            .clone_shallow(remote_url, &self.branch, &self.local_path)
        {
            remove_dir_best_effort(&self.local_path);
            return Err(MirrorError::CloneFailed(e.to_string()));
        }

        if !self.is_initialized() {
            remove_dir_best_effort(&self.local_path);
            return Err(self.corrupt("clone produced no control directory"));
        }

        let head = self
            .store
            .head_commit(&self.local_path)
            .map_err(|e| self.corrupt(e.to_string()))?;

        state.remote_url = remote_url.to_string();
        state.current_commit_hash = Some(head);
        state.last_fetch_timestamp = Some(chrono::Utc::now().to_rfc3339());
        self.persist(state)?;

        info!("Mirror ready at {}", self.local_path.display());
        Ok(())
    }

    /// Fetch and fast-forward the mirror
    ///
    /// A corrupt mirror is re-cloned from its recorded remote first; if
    /// that is impossible the corruption is reported.
    pub fn sync(&self) -> Result<SyncOutcome, MirrorError> {
        let mut state = self.lock_state()?;

        if !self.local_path.exists() {
            return Err(MirrorError::NotInitialized(self.local_path.clone()));
        }

        if !self.is_initialized() {
            let remote = state.remote_url.clone();
            if remote.is_empty() {
                return Err(self.corrupt("control directory missing and remote unknown"));
            }
            warn!("Mirror at {} is corrupt, re-cloning", self.local_path.display());
            let previous = state.current_commit_hash.clone();
            self.clone_into_place(&mut state, &remote)
                .map_err(|e| self.corrupt(format!("re-clone failed: {}", e)))?;
            let current = state.current_commit_hash.clone().unwrap_or_default();
            return Ok(SyncOutcome {
                has_updates: previous.as_deref() != Some(current.as_str()),
                previous_commit: previous,
                current_commit: current,
            });
        }

        let before = self
            .store
            .head_commit(&self.local_path)
            .map_err(|e| self.corrupt(e.to_string()))?;

        self.store
            .fetch(&self.local_path, &self.branch)
            .map_err(|e| MirrorError::FetchFailed(e.to_string()))?;
        self.store
            .pull(&self.local_path, &self.branch)
            .map_err(|e| MirrorError::FetchFailed(e.to_string()))?;

        let after = self
            .store
            .head_commit(&self.local_path)
            .map_err(|e| self.corrupt(e.to_string()))?;

        if state.remote_url.is_empty() {
            state.remote_url = self.store.remote_url(&self.local_path).unwrap_or_default();
        }
        state.current_commit_hash = Some(after.clone());
        state.last_fetch_timestamp = Some(chrono::Utc::now().to_rfc3339());
        self.persist(&state)?;

        let has_updates = before != after;
        if has_updates {
            info!("Mirror updated {} -> {}", short(&before), short(&after));
        } else {
            debug!("Mirror already at {}", short(&after));
        }

        Ok(SyncOutcome {
            has_updates,
            previous_commit: Some(before),
            current_commit: after,
        })
    }

    /// Read a text file from the working tree
    ///
    /// A leading byte-order mark and surrounding whitespace are removed.
    pub fn read_file(&self, relative_path: &str) -> Result<String, MirrorError> {
        let path = safe_join(&self.local_path, relative_path).map_err(|e| MirrorError::InvalidPath {
            path: relative_path.to_string(),
            reason: e.to_string(),
        })?;

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(MirrorError::NotFound(relative_path.to_string()));
            }
            Err(e) => return Err(MirrorError::io(&path, e)),
        };

        let text = String::from_utf8(bytes).map_err(|e| MirrorError::InvalidEncoding {
            path: relative_path.to_string(),
            reason: e.utf8_error().to_string(),
        })?;
        Ok(text.trim_start_matches('\u{feff}').trim().to_string())
    }

    /// Names of the immediate subdirectories of `relative_path`, sorted
    ///
    /// A missing directory lists as empty. Hidden entries are skipped.
    pub fn list_directories(&self, relative_path: &str) -> Result<Vec<String>, MirrorError> {
        let dir = if relative_path.trim_matches('/').is_empty() {
            self.local_path.clone()
        } else {
            safe_join(&self.local_path, relative_path).map_err(|e| MirrorError::InvalidPath {
                path: relative_path.to_string(),
                reason: e.to_string(),
            })?
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(MirrorError::io(&dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| MirrorError::io(&dir, e))?;
            let is_dir = entry
                .file_type()
                .map_err(|e| MirrorError::io(&entry.path(), e))?
                .is_dir();
            let name = entry.file_name().to_string_lossy().into_owned();
            if is_dir && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Snapshot of the mirror's state
    pub fn info(&self) -> Result<MirrorState, MirrorError> {
        Ok(self.lock_state()?.clone())
    }

    /// Record that a full sync cycle (clone + catalog check) succeeded
    pub fn mark_successful_sync(&self) -> Result<(), MirrorError> {
        let mut state = self.lock_state()?;
        state.last_successful_sync = Some(chrono::Utc::now().to_rfc3339());
        self.persist(&state)
    }

    /// Write `packages/<id>/metadata.json` and commit it locally
    pub fn create_custom_package(&self, metadata: &RawMetadata) -> Result<String, MirrorError> {
        let _state = self.lock_state()?;
        if !self.is_initialized() {
            return Err(MirrorError::NotInitialized(self.local_path.clone()));
        }

        let id = sanitize_filename(&metadata.id).map_err(|e| MirrorError::InvalidPath {
            path: metadata.id.clone(),
            reason: e.to_string(),
        })?;
        let relative = Path::new("packages").join(&id).join("metadata.json");
        let path = self.local_path.join(&relative);
        let existed = path.is_file();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| MirrorError::io(parent, e))?;
        }

        let json = serde_json::to_string_pretty(metadata)
            .map_err(|e| MirrorError::CommitFailed(e.to_string()))?;
        fs::write(&path, json + "\n").map_err(|e| MirrorError::io(&path, e))?;

        let verb = if existed { "Update" } else { "Add" };
        let message = format!("{} custom package: {} {}", verb, id, metadata.version);
        let commit = self
            .store
            .commit_paths(&self.local_path, &[relative.as_path()], &message, &self.author)
            .map_err(|e| MirrorError::CommitFailed(e.to_string()))?;

        info!("Committed custom package {} as {}", id, short(&commit));
        Ok(commit)
    }
}

fn short(commit: &str) -> &str {
    commit.get(..10).unwrap_or(commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory store that materializes a fixed tree on clone
    struct FakeStore {
        clones: AtomicUsize,
        fetches: AtomicUsize,
        head: Mutex<String>,
        upstream: Mutex<Option<String>>,
        messages: Mutex<Vec<String>>,
        fail_clone: bool,
        skip_control_dir: bool,
    }

    impl FakeStore {
        fn new() -> Self {
            Self {
                clones: AtomicUsize::new(0),
                fetches: AtomicUsize::new(0),
                head: Mutex::new("aaaaaaaaaaaa".to_string()),
                upstream: Mutex::new(None),
                messages: Mutex::new(Vec::new()),
                fail_clone: false,
                skip_control_dir: false,
            }
        }
    }

    impl ContentStore for FakeStore {
        fn clone_shallow(&self, _remote: &str, _branch: &str, dest: &Path) -> Result<(), StoreError> {
            self.clones.fetch_add(1, Ordering::SeqCst);
            if self.fail_clone {
                fs::create_dir_all(dest).unwrap();
                return Err(StoreError::new("clone", "unreachable"));
            }
            if !self.skip_control_dir {
                fs::create_dir_all(dest.join(".git")).unwrap();
            }
            fs::create_dir_all(dest.join("packages/curl")).unwrap();
            fs::create_dir_all(dest.join("packages/.hidden")).unwrap();
            fs::write(dest.join("packages/README"), "not a dir").unwrap();
            fs::create_dir_all(dest.join("config")).unwrap();
            fs::write(
                dest.join("config/maintenance.json"),
                "\u{feff}  {\"isEnabled\": false}\n",
            )
            .unwrap();
            Ok(())
        }

        fn fetch(&self, _repo: &Path, _branch: &str) -> Result<(), StoreError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn pull(&self, _repo: &Path, _branch: &str) -> Result<(), StoreError> {
            if let Some(next) = self.upstream.lock().unwrap().take() {
                *self.head.lock().unwrap() = next;
            }
            Ok(())
        }

        fn head_commit(&self, _repo: &Path) -> Result<String, StoreError> {
            Ok(self.head.lock().unwrap().clone())
        }

        fn remote_url(&self, _repo: &Path) -> Result<String, StoreError> {
            Ok("file:///remote".to_string())
        }

        fn commit_paths(
            &self,
            _repo: &Path,
            _paths: &[&Path],
            message: &str,
            _author: &CommitAuthor,
        ) -> Result<String, StoreError> {
            self.messages.lock().unwrap().push(message.to_string());
            Ok("cccccccccccc".to_string())
        }
    }

    fn author() -> CommitAuthor {
        CommitAuthor {
            name: "Test".to_string(),
            email: "test@example.com".to_string(),
        }
    }

    fn mirror(dir: &Path, store: Arc<FakeStore>) -> RepositoryMirror {
        RepositoryMirror::new(dir.join("repo"), "main", store, author())
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        let mirror = mirror(dir.path(), store.clone());

        mirror.initialize("file:///remote", false).unwrap();
        let first = mirror.info().unwrap();
        mirror.initialize("file:///remote", false).unwrap();

        assert_eq!(store.clones.load(Ordering::SeqCst), 1);
        assert_eq!(mirror.info().unwrap(), first);
        assert_eq!(first.current_commit_hash.as_deref(), Some("aaaaaaaaaaaa"));
    }

    #[test]
    fn test_force_refresh_reclones() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        let mirror = mirror(dir.path(), store.clone());

        mirror.initialize("file:///remote", false).unwrap();
        fs::write(mirror.local_path().join("stray"), "x").unwrap();
        mirror.initialize("file:///remote", true).unwrap();

        assert_eq!(store.clones.load(Ordering::SeqCst), 2);
        assert!(!mirror.local_path().join("stray").exists());
    }

    #[test]
    fn test_corrupt_mirror_is_recloned_on_initialize() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        let mirror = mirror(dir.path(), store.clone());

        fs::create_dir_all(mirror.local_path().join("packages")).unwrap();
        mirror.initialize("file:///remote", false).unwrap();

        assert_eq!(store.clones.load(Ordering::SeqCst), 1);
        assert!(mirror.is_initialized());
    }

    #[test]
    fn test_clone_failure_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore {
            fail_clone: true,
            ..FakeStore::new()
        });
        let mirror = mirror(dir.path(), store);

        let err = mirror.initialize("file:///remote", true).unwrap_err();
        assert!(matches!(err, MirrorError::CloneFailed(_)));
        assert!(!mirror.local_path().exists());
    }

    #[test]
    fn test_clone_without_control_dir_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore {
            skip_control_dir: true,
            ..FakeStore::new()
        });
        let mirror = mirror(dir.path(), store);

        let err = mirror.initialize("file:///remote", true).unwrap_err();
        assert!(matches!(err, MirrorError::CorruptRepository { .. }));
    }

    #[test]
    fn test_sync_requires_initialization() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = mirror(dir.path(), Arc::new(FakeStore::new()));
        assert!(matches!(mirror.sync(), Err(MirrorError::NotInitialized(_))));
    }

    #[test]
    fn test_sync_reports_hash_change() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        let mirror = mirror(dir.path(), store.clone());
        mirror.initialize("file:///remote", false).unwrap();

        let outcome = mirror.sync().unwrap();
        assert!(!outcome.has_updates);

        *store.upstream.lock().unwrap() = Some("bbbbbbbbbbbb".to_string());
        let outcome = mirror.sync().unwrap();
        assert!(outcome.has_updates);
        assert_eq!(outcome.previous_commit.as_deref(), Some("aaaaaaaaaaaa"));
        assert_eq!(outcome.current_commit, "bbbbbbbbbbbb");
        assert_eq!(store.fetches.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_sync_heals_corrupt_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        let mirror = mirror(dir.path(), store.clone());
        mirror.initialize("file:///remote", false).unwrap();

        fs::remove_dir_all(mirror.local_path().join(".git")).unwrap();
        mirror.sync().unwrap();

        assert_eq!(store.clones.load(Ordering::SeqCst), 2);
        assert!(mirror.is_initialized());
    }

    #[test]
    fn test_read_file_and_list_directories() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = mirror(dir.path(), Arc::new(FakeStore::new()));
        mirror.initialize("file:///remote", false).unwrap();

        assert_eq!(
            mirror.read_file("config/maintenance.json").unwrap(),
            "{\"isEnabled\": false}"
        );
        assert!(matches!(
            mirror.read_file("config/missing.json"),
            Err(MirrorError::NotFound(_))
        ));
        assert!(matches!(
            mirror.read_file("../outside"),
            Err(MirrorError::InvalidPath { .. })
        ));

        assert_eq!(mirror.list_directories("packages").unwrap(), ["curl"]);
        assert!(mirror.list_directories("nope").unwrap().is_empty());
    }

    #[test]
    fn test_read_file_rejects_invalid_utf8() {
        let dir = tempfile::tempdir().unwrap();
        let mirror = mirror(dir.path(), Arc::new(FakeStore::new()));
        mirror.initialize("file:///remote", false).unwrap();
        fs::write(mirror.local_path().join("config/latin1.json"), b"{\"name\": \"caf\xe9\"}").unwrap();

        assert!(matches!(
            mirror.read_file("config/latin1.json"),
            Err(MirrorError::InvalidEncoding { path, .. }) if path == "config/latin1.json"
        ));
    }

    #[test]
    fn test_custom_package_commit_message_tracks_add_and_update() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(FakeStore::new());
        let mirror = mirror(dir.path(), store.clone());
        mirror.initialize("file:///remote", false).unwrap();

        let mut metadata: RawMetadata = serde_json::from_value(serde_json::json!({
            "id": "hello",
            "name": "Hello",
            "version": "0.1.0",
            "description": "",
            "category": "utilities",
            "size": 0,
            "downloadUrl": "https://example.invalid/hello.tar.gz"
        }))
        .unwrap();
        mirror.create_custom_package(&metadata).unwrap();
        metadata.version = "0.2.0".to_string();
        mirror.create_custom_package(&metadata).unwrap();

        assert_eq!(
            *store.messages.lock().unwrap(),
            [
                "Add custom package: hello 0.1.0",
                "Update custom package: hello 0.2.0"
            ]
        );
        assert!(mirror.read_file("packages/hello/metadata.json").unwrap().contains("0.2.0"));
    }

    #[test]
    fn test_state_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let conn = db::shared(db::open_in_memory().unwrap());

        let first = mirror(dir.path(), Arc::new(FakeStore::new()))
            .with_database(conn.clone())
            .unwrap();
        first.initialize("file:///remote", false).unwrap();
        first.mark_successful_sync().unwrap();

        let second = mirror(dir.path(), Arc::new(FakeStore::new()))
            .with_database(conn)
            .unwrap();
        let restored = second.info().unwrap();
        assert_eq!(restored.remote_url, "file:///remote");
        assert_eq!(restored.current_commit_hash.as_deref(), Some("aaaaaaaaaaaa"));
        assert!(restored.last_successful_sync.is_some());
    }
}
