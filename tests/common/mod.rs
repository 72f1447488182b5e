// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use bountu::config::EngineConfig;
use bountu::mirror::GitCli;
use bountu::sync::{ConnectivityError, ConnectivityProbe, ProbeReport};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::collections::HashMap;
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

// =============================================================================
// HTTP
// =============================================================================

/// Canned response for one path
#[derive(Clone)]
pub enum Route {
    Body(Vec<u8>),
    Redirect(String),
    Status(u16),
}

/// Minimal HTTP/1.1 responder on a loopback port
///
/// Unknown paths get a 404. Every request path is recorded.
pub struct TestServer {
    addr: String,
    routes: Arc<Mutex<HashMap<String, Route>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl TestServer {
    pub fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let routes: Arc<Mutex<HashMap<String, Route>>> = Arc::default();
        let requests: Arc<Mutex<Vec<String>>> = Arc::default();

        let thread_routes = Arc::clone(&routes);
        let thread_requests = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let routes = Arc::clone(&thread_routes);
                let requests = Arc::clone(&thread_requests);
                thread::spawn(move || handle(stream, &routes, &requests));
            }
        });

        Self {
            addr,
            routes,
            requests,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn route(&self, path: &str, route: Route) {
        self.routes.lock().unwrap().insert(path.to_string(), route);
    }

    pub fn serve(&self, path: &str, body: impl Into<Vec<u8>>) {
        self.route(path, Route::Body(body.into()));
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn handle(
    mut stream: TcpStream,
    routes: &Mutex<HashMap<String, Route>>,
    requests: &Mutex<Vec<String>>,
) {
    let mut reader = BufReader::new(stream.try_clone().unwrap());
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    loop {
        let mut header = String::new();
        match reader.read_line(&mut header) {
            Ok(0) => break,
            Ok(_) if header == "\r\n" || header == "\n" => break,
            Ok(_) => continue,
            Err(_) => return,
        }
    }

    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or("GET").to_string();
    let path = parts.next().unwrap_or("/").to_string();
    requests.lock().unwrap().push(path.clone());

    let route = routes.lock().unwrap().get(&path).cloned();
    let response = match route {
        Some(Route::Body(body)) => {
            let mut head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            )
            .into_bytes();
            if method != "HEAD" {
                head.extend_from_slice(&body);
            }
            head
        }
        Some(Route::Redirect(location)) => format!(
            "HTTP/1.1 302 Found\r\nLocation: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            location
        )
        .into_bytes(),
        Some(Route::Status(code)) => format!(
            "HTTP/1.1 {} Error\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            code
        )
        .into_bytes(),
        None => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
    };
    let _ = stream.write_all(&response);
    let _ = stream.flush();
}

// =============================================================================
// Connectivity
// =============================================================================

/// Probe with a fixed answer that counts how often it was asked
pub struct FixedProbe {
    result: Result<ProbeReport, ConnectivityError>,
    pub calls: Arc<AtomicUsize>,
}

impl FixedProbe {
    pub fn online() -> Self {
        Self {
            result: Ok(ProbeReport::new(Duration::from_millis(5))),
            calls: Arc::default(),
        }
    }

    pub fn offline() -> Self {
        Self {
            result: Err(ConnectivityError::NoNetwork),
            calls: Arc::default(),
        }
    }
}

impl ConnectivityProbe for FixedProbe {
    fn probe(&self) -> Result<ProbeReport, ConnectivityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

// =============================================================================
// Git
// =============================================================================

pub fn git_available() -> bool {
    GitCli::new(Duration::from_secs(10)).is_available()
}

/// Skip the calling test when `git` is not installed
#[macro_export]
macro_rules! require_git {
    () => {
        if !common::git_available() {
            eprintln!("git not available, skipping");
            return;
        }
    };
}

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args([
            "-c",
            "user.name=Test",
            "-c",
            "user.email=test@localhost",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success(), "git {:?} failed", args);
}

/// Upstream metadata repository on the local filesystem
pub struct UpstreamRepo {
    pub dir: TempDir,
}

impl UpstreamRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        git(dir.path(), &["init", "--quiet"]);
        git(dir.path(), &["symbolic-ref", "HEAD", "refs/heads/main"]);
        let repo = Self { dir };
        repo.write("config/maintenance.json", r#"{"enabled": false}"#);
        repo
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn url(&self) -> String {
        self.dir.path().to_string_lossy().into_owned()
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn add_package(&self, id: &str, metadata: serde_json::Value) {
        self.write(
            &format!("packages/{}/metadata.json", id),
            &serde_json::to_string_pretty(&metadata).unwrap(),
        );
    }

    pub fn commit(&self, message: &str) {
        git(self.path(), &["add", "-A"]);
        git(self.path(), &["commit", "--quiet", "-m", message]);
    }
}

/// Metadata for a package installable on android/aarch64
pub fn package_json(id: &str, version: &str, url: &str, checksum: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": id,
        "version": version,
        "description": format!("{} test package", id),
        "category": "network",
        "size": 1024,
        "dependencies": [],
        "conflicts": [],
        "tags": ["test"],
        "downloadUrl": url,
        "checksumSha256": checksum,
        "platform": "android",
        "architecture": "aarch64"
    })
}

// =============================================================================
// Engine
// =============================================================================

/// Engine configuration rooted in a fresh temp directory
pub fn test_config(data_dir: &Path, remote_url: &str) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.paths.data_dir = Some(data_dir.to_path_buf());
    config.repository.remote_url = remote_url.to_string();
    config.repository.branch = "main".to_string();
    config.target.platform = Some("android".to_string());
    config.target.architecture = Some("aarch64".to_string());
    config.sync.retry_delay = "10ms".to_string();
    config.http.connect_timeout = "5s".to_string();
    config.http.read_timeout = "5s".to_string();
    config
}

pub fn data_dir() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_path_buf();
    (dir, path)
}

// =============================================================================
// Archives
// =============================================================================

/// Entry for an archive builder: path, content, mode
pub type ArchiveEntry<'a> = (&'a str, &'a [u8], u32);

pub fn tar_bytes(entries: &[ArchiveEntry<'_>]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder.append_data(&mut header, path, *data).unwrap();
    }
    builder.into_inner().unwrap()
}

pub fn tar_gz(entries: &[ArchiveEntry<'_>]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&tar_bytes(entries)).unwrap();
    encoder.finish().unwrap()
}

/// `.deb` with a gzip data member
pub fn deb(entries: &[ArchiveEntry<'_>]) -> Vec<u8> {
    let control = tar_gz(&[("./control", b"Package: test\n", 0o644)]);
    let data = tar_gz(entries);

    let mut builder = ar::Builder::new(Vec::new());
    for (name, body) in [
        ("debian-binary", b"2.0\n".to_vec()),
        ("control.tar.gz", control),
        ("data.tar.gz", data),
    ] {
        let header = ar::Header::new(name.as_bytes().to_vec(), body.len() as u64);
        builder.append(&header, body.as_slice()).unwrap();
    }
    builder.into_inner().unwrap()
}
