// src/fetch/mod.rs

//! Artifact downloads
//!
//! [`ArtifactFetcher`] downloads package artifacts over HTTP(S). Redirects
//! are followed by hand (so the hop limit and the error are ours), bodies
//! are streamed to disk in fixed-size chunks, and a failing URL only aborts
//! that URL: [`ArtifactFetcher::download_with_fallback`] moves on to the next
//! candidate and reports every failure if none succeeds.

mod urls;

pub use urls::termux_name;

use crate::catalog::{Architecture, PackageDescriptor};
use crate::config::EngineConfig;
use crate::filesystem::{remove_file_best_effort, sanitize_filename};
use crate::hash;
use crate::progress::ProgressReporter;
use reqwest::blocking::{Client, Response};
use reqwest::header::LOCATION;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {code} from {url}")]
    HttpStatus { url: String, code: u16 },

    #[error("Too many redirects starting at {0}")]
    TooManyRedirects(String),

    #[error("Network failure for {url}: {message}")]
    NetworkFailure { url: String, message: String },

    #[error("I/O error writing {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Download of {0} was cancelled")]
    Cancelled(String),

    #[error("No download URL available for {0}")]
    NoCandidates(String),

    #[error("All {} download URLs failed for {id}", failures.len())]
    AllCandidatesFailed { id: String, failures: Vec<CandidateFailure> },
}

/// One failed candidate URL
#[derive(Debug)]
pub struct CandidateFailure {
    pub url: String,
    pub error: FetchError,
}

impl fmt::Display for CandidateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url, self.error)
    }
}

impl FetchError {
    fn network(url: &str, err: impl fmt::Display) -> Self {
        Self::NetworkFailure {
            url: url.to_string(),
            message: err.to_string(),
        }
    }

    fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Cooperative cancellation flag shared with a running download
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// HTTP downloader for package artifacts
pub struct ArtifactFetcher {
    client: Client,
    max_redirects: usize,
    architecture: Architecture,
    cancel: CancelToken,
}

impl ArtifactFetcher {
    /// Build a fetcher from the `[http]` settings
    ///
    /// `architecture` is the runtime architecture used to fill mirror URL
    /// templates for packages published as architecture-independent.
    pub fn new(config: &EngineConfig, architecture: Architecture) -> crate::Result<Self> {
        let client = Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout()?)
            .timeout(config.read_timeout()?)
            .user_agent(config.http.user_agent.clone())
            .build()
            .map_err(|e| crate::Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_redirects: config.http.max_redirects,
            architecture,
            cancel: CancelToken::new(),
        })
    }

    /// Share `token` with this fetcher; cancelling it aborts downloads
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Candidate URLs for `descriptor`, in the order they will be tried
    ///
    /// The descriptor's own URL comes first, then the mirror templates for
    /// well-known package ids. Duplicates are dropped, first one wins.
    pub fn resolve_candidate_urls(&self, descriptor: &PackageDescriptor) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        let own = descriptor.download_url.trim();
        let templated = urls::template_urls(descriptor, &self.architecture);

        for url in std::iter::once(own.to_string()).chain(templated) {
            if !url.is_empty() && !candidates.contains(&url) {
                candidates.push(url);
            }
        }
        candidates
    }

    /// Download `url` to `dest_path`
    ///
    /// The body is written to `<dest_path>.part` and renamed on success; the
    /// partial file is removed on any failure. Progress is reported after
    /// each chunk only when the server sent a content length.
    pub fn download(
        &self,
        url: &str,
        dest_path: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<(), FetchError> {
        let response = self.open(url)?;
        let total = response.content_length().filter(|len| *len > 0);

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;
        }
        let part_path = part_path(dest_path);

        let result = self
            .stream_to_file(response, url, &part_path, total, progress)
            .and_then(|written| {
                fs::rename(&part_path, dest_path).map_err(|e| FetchError::io(dest_path, e))?;
                Ok(written)
            });

        match result {
            Ok(written) => {
                debug!("Downloaded {} bytes from {}", written, url);
                Ok(())
            }
            Err(e) => {
                remove_file_best_effort(&part_path);
                Err(e)
            }
        }
    }

    /// Send a GET, following redirects manually
    fn open(&self, url: &str) -> Result<Response, FetchError> {
        let mut current =
            Url::parse(url).map_err(|e| FetchError::network(url, format!("invalid URL: {e}")))?;

        for hop in 0..=self.max_redirects {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled(url.to_string()));
            }

            debug!("GET {} (hop {})", current, hop);
            let response = self
                .client
                .get(current.clone())
                .header(reqwest::header::ACCEPT, "*/*")
                .send()
                .map_err(|e| FetchError::network(current.as_str(), e))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| FetchError::HttpStatus {
                        url: current.to_string(),
                        code: status.as_u16(),
                    })?;
                current = current
                    .join(location)
                    .map_err(|e| FetchError::network(location, format!("bad redirect: {e}")))?;
                continue;
            }

            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    url: current.to_string(),
                    code: status.as_u16(),
                });
            }
            return Ok(response);
        }

        Err(FetchError::TooManyRedirects(url.to_string()))
    }

    fn stream_to_file(
        &self,
        mut response: Response,
        url: &str,
        path: &Path,
        total: Option<u64>,
        progress: &dyn ProgressReporter,
    ) -> Result<u64, FetchError> {
        let mut file = File::create(path).map_err(|e| FetchError::io(path, e))?;
        let mut buffer = [0u8; STREAM_BUFFER_SIZE];
        let mut written: u64 = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled(url.to_string()));
            }

            let read = response
                .read(&mut buffer)
                .map_err(|e| FetchError::network(url, e))?;
            if read == 0 {
                break;
            }

            file.write_all(&buffer[..read])
                .map_err(|e| FetchError::io(path, e))?;
            written += read as u64;

            if let Some(total) = total {
                progress.report((written as f64 / total as f64).min(1.0) as f32);
            }
        }

        file.flush().map_err(|e| FetchError::io(path, e))?;
        Ok(written)
    }

    /// Try every candidate URL in order until one downloads
    ///
    /// The artifact keeps the file name from its URL so the archive suffix
    /// survives. Returns the path of the downloaded file in `dest_dir`.
    pub fn download_with_fallback(
        &self,
        descriptor: &PackageDescriptor,
        dest_dir: &Path,
        progress: &dyn ProgressReporter,
    ) -> Result<PathBuf, FetchError> {
        let candidates = self.resolve_candidate_urls(descriptor);
        if candidates.is_empty() {
            return Err(FetchError::NoCandidates(descriptor.id.clone()));
        }

        let mut failures = Vec::new();
        for url in candidates {
            let dest_path = dest_dir.join(artifact_file_name(&url, &descriptor.id));
            info!("Downloading {} from {}", descriptor.id, url);

            match self.download(&url, &dest_path, progress) {
                Ok(()) => return Ok(dest_path),
                Err(FetchError::Cancelled(u)) => return Err(FetchError::Cancelled(u)),
                Err(error) => {
                    warn!("Download from {} failed: {}", url, error);
                    failures.push(CandidateFailure { url, error });
                }
            }
        }

        Err(FetchError::AllCandidatesFailed {
            id: descriptor.id.clone(),
            failures,
        })
    }
}

/// Check `path` against a hex SHA-256
///
/// An empty `expected` skips verification and returns true. Read errors
/// count as a mismatch.
pub fn verify_checksum(path: &Path, expected: &str) -> bool {
    if expected.trim().is_empty() {
        warn!("No checksum provided for {}, skipping verification", path.display());
        return true;
    }

    match hash::verify_file_sha256(path, expected) {
        Ok(Ok(())) => true,
        Ok(Err(mismatch)) => {
            warn!("{}", mismatch);
            false
        }
        Err(e) => {
            warn!("Failed to hash {}: {}", path.display(), e);
            false
        }
    }
}

fn part_path(dest_path: &Path) -> PathBuf {
    let mut name = dest_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    dest_path.with_file_name(name)
}

/// File name for an artifact downloaded from `url`
fn artifact_file_name(url: &str, id: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .and_then(|name| sanitize_filename(&name).ok())
        .unwrap_or_else(|| format!("{id}.pkg"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Platform, RawMetadata, RuntimeTarget};

    fn descriptor(id: &str, url: &str, arch: &str) -> PackageDescriptor {
        let raw = RawMetadata {
            id: id.to_string(),
            name: id.to_string(),
            version: "8.5.0".to_string(),
            description: String::new(),
            category: "network".to_string(),
            size: 0,
            dependencies: vec![],
            conflicts: vec![],
            tags: vec![],
            download_url: url.to_string(),
            checksum_sha256: "00".to_string(),
            platform: String::new(),
            architecture: arch.to_string(),
            install_script: None,
            uninstall_script: None,
            homepage: None,
            license: None,
            maintainer: None,
        };
        PackageDescriptor::from_metadata(
            raw,
            &RuntimeTarget::new(Platform::Android, Architecture::Aarch64),
        )
    }

    fn fetcher() -> ArtifactFetcher {
        ArtifactFetcher::new(&EngineConfig::default(), Architecture::Aarch64).unwrap()
    }

    #[test]
    fn test_candidates_own_url_first_then_templates() {
        let urls = fetcher().resolve_candidate_urls(&descriptor(
            "curl",
            "https://example.com/curl.tar.gz",
            "",
        ));
        assert_eq!(urls.len(), 4);
        assert_eq!(urls[0], "https://example.com/curl.tar.gz");
        assert_eq!(
            urls[1],
            "https://packages-cf.termux.dev/apt/termux-main/binary-aarch64/curl_8.5.0_aarch64.deb"
        );
        assert!(urls[2].starts_with("https://grimler.se/"));
    }

    #[test]
    fn test_candidates_deduplicated() {
        let cdn = "https://packages-cf.termux.dev/apt/termux-main/binary-arm/python_8.5.0_arm.deb";
        let urls = fetcher().resolve_candidate_urls(&descriptor("python3", cdn, "arm"));
        assert_eq!(urls.len(), 3);
        assert_eq!(urls[0], cdn);
        assert!(urls[1].ends_with("/binary-arm/python_8.5.0_arm.deb"));
    }

    #[test]
    fn test_unknown_id_has_only_own_url() {
        let urls = fetcher().resolve_candidate_urls(&descriptor("my-tool", "", ""));
        assert!(urls.is_empty());

        let urls = fetcher().resolve_candidate_urls(&descriptor("my-tool", "https://h/t.zip", ""));
        assert_eq!(urls, ["https://h/t.zip"]);
    }

    #[test]
    fn test_fallback_without_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let err = fetcher()
            .download_with_fallback(
                &descriptor("my-tool", "", ""),
                dir.path(),
                &crate::progress::SilentProgress,
            )
            .unwrap_err();
        assert!(matches!(err, FetchError::NoCandidates(id) if id == "my-tool"));
    }

    #[test]
    fn test_artifact_file_name() {
        assert_eq!(
            artifact_file_name("https://h/dl/curl-8.5.tar.gz?token=1", "curl"),
            "curl-8.5.tar.gz"
        );
        assert_eq!(artifact_file_name("https://h/", "curl"), "curl.pkg");
        assert_eq!(artifact_file_name("not a url", "curl"), "curl.pkg");
    }

    #[test]
    fn test_part_path() {
        assert_eq!(
            part_path(Path::new("/tmp/x/a.tar.gz")),
            PathBuf::from("/tmp/x/a.tar.gz.part")
        );
    }

    #[test]
    fn test_verify_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("artifact");
        fs::write(&path, b"hello").unwrap();
        let digest = hash::sha256(b"hello");

        assert!(verify_checksum(&path, &digest));
        assert!(verify_checksum(&path, &digest.to_uppercase()));
        assert!(!verify_checksum(&path, &hash::sha256(b"other")));
        assert!(verify_checksum(&path, ""));
        assert!(!verify_checksum(&dir.path().join("missing"), &digest));
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let fetcher = fetcher().with_cancel_token(token.clone());
        assert!(!fetcher.cancel_token().is_cancelled());
        token.cancel();
        assert!(fetcher.cancel_token().is_cancelled());
    }
}
