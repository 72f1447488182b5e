// tests/install_flow.rs

//! Install, update and removal through the package manager, with artifacts
//! served over loopback HTTP and metadata from a local git remote.

#![cfg(unix)]

mod common;

use bountu::catalog::RawMetadata;
use bountu::install::InstallError;
use bountu::mirror::GitCli;
use bountu::{Error, PackageManager, SilentProgress};
use common::{FixedProbe, TestServer, UpstreamRepo, data_dir, deb, package_json, tar_gz, test_config};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

const CURL_BINARY: &[u8] = b"#!/bin/sh\necho curl 8.5.0\n";

struct Fixture {
    server: TestServer,
    upstream: UpstreamRepo,
    _data_guard: TempDir,
    data: PathBuf,
    manager: PackageManager,
}

impl Fixture {
    /// Serve a curl tarball and publish its metadata, then sync
    fn new(extra: impl FnOnce(&TestServer, &UpstreamRepo)) -> Self {
        let server = TestServer::start();
        let upstream = UpstreamRepo::new();

        let tarball = tar_gz(&[
            ("bin/curl", CURL_BINARY, 0o755),
            ("lib/libcurl.so", b"ELF", 0o644),
            ("share/doc/README", b"docs", 0o644),
        ]);
        server.serve("/curl-8.5.0.tar.gz", tarball.clone());
        let mut curl = package_json(
            "curl",
            "8.5.0",
            &server.url("/curl-8.5.0.tar.gz"),
            &bountu::hash::sha256(&tarball),
        );
        curl["installScript"] = "echo \"$BOUNTU_PACKAGE_ID $BOUNTU_PHASE\" > post-install.log".into();
        upstream.add_package("curl", curl);

        extra(&server, &upstream);
        upstream.commit("initial");

        let (guard, data) = data_dir();
        let manager = PackageManager::with_components(
            test_config(&data, &upstream.url()),
            Arc::new(GitCli::new(Duration::from_secs(30))),
            Box::new(FixedProbe::online()),
        )
        .unwrap();
        assert!(manager.initial_sync().is_success());

        Self {
            server,
            upstream,
            _data_guard: guard,
            data,
            manager,
        }
    }

    fn record(&self, id: &str) -> Option<bountu::db::models::InstalledRecord> {
        self.manager.installer().record(id).unwrap()
    }

    fn cache_is_empty(&self) -> bool {
        let cache = self.data.join("cache");
        !cache.exists() || fs::read_dir(cache).unwrap().next().is_none()
    }
}

fn install_error(result: bountu::Result<bountu::InstallOutcome>) -> InstallError {
    match result {
        Err(Error::Install(e)) => e,
        other => panic!("expected install error, got {:?}", other.map(|o| o.id)),
    }
}

fn mode(path: &Path) -> u32 {
    fs::metadata(path).unwrap().permissions().mode()
}

#[test]
fn test_install_curl_end_to_end() {
    require_git!();
    let fx = Fixture::new(|_, _| {});

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let progress = move |f: f32| sink.lock().unwrap().push(f);

    let outcome = fx.manager.install("curl", &progress).unwrap();
    assert_eq!(outcome.version, "8.5.0");
    assert_eq!(outcome.script_exit_code, Some(0));

    let pkg = fx.data.join("packages/curl");
    assert_eq!(outcome.install_path, pkg);
    assert_eq!(fs::read(pkg.join("bin/curl")).unwrap(), CURL_BINARY);
    assert_eq!(mode(&pkg.join("bin/curl")) & 0o111, 0o111);
    assert_eq!(
        fs::read_to_string(pkg.join("post-install.log")).unwrap().trim(),
        "curl post-install"
    );

    let shim = fx.data.join("bin/curl");
    assert_eq!(outcome.shims, [shim.clone()]);
    let shim_text = fs::read_to_string(&shim).unwrap();
    assert!(shim_text.contains("# bountu-package: curl"));
    assert!(shim_text.contains("packages/curl/bin/curl"));

    let env = fs::read_to_string(fx.data.join("environment.sh")).unwrap();
    assert!(env.contains(&format!("export PATH=\"{}:$PATH\"", pkg.join("bin").display())));
    assert!(env.contains("LD_LIBRARY_PATH"));

    let record = fx.record("curl").unwrap();
    assert_eq!(record.installed_version, "8.5.0");
    assert!(record.size_bytes > 0);
    assert!(!record.needs_update);

    assert!(fx.cache_is_empty(), "downloaded artifact must be removed");
    assert!(!fx.data.join("packages/.staging-curl").exists());

    let seen = seen.lock().unwrap();
    assert_eq!(seen.last().copied(), Some(1.0));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));

    let catalog = fx.manager.catalog().unwrap();
    let curl = catalog.get("curl").unwrap();
    assert_eq!(curl.status.installed_version.as_deref(), Some("8.5.0"));
    assert_eq!(catalog.stats().installed, 1);
}

#[test]
fn test_install_twice_is_rejected() {
    require_git!();
    let fx = Fixture::new(|_, _| {});
    fx.manager.install("curl", &SilentProgress).unwrap();

    let err = install_error(fx.manager.install("curl", &SilentProgress));
    assert!(matches!(err, InstallError::AlreadyInstalled(id) if id == "curl"));
}

#[test]
fn test_checksum_mismatch_leaves_nothing_behind() {
    require_git!();
    let fx = Fixture::new(|server, upstream| {
        let tarball = tar_gz(&[("bin/jq", b"jq", 0o755)]);
        server.serve("/jq-1.7.1.tar.gz", tarball);
        upstream.add_package(
            "jq",
            package_json("jq", "1.7.1", &server.url("/jq-1.7.1.tar.gz"), &"0".repeat(64)),
        );
    });

    let err = install_error(fx.manager.install("jq", &SilentProgress));
    assert!(matches!(err, InstallError::StageFailed { ref stage, .. } if stage.as_str() == "verifying"));

    assert!(!fx.data.join("packages/jq").exists());
    assert!(!fx.data.join("bin/jq").exists());
    assert!(fx.record("jq").is_none());
    assert!(fx.cache_is_empty());
}

#[test]
fn test_missing_dependency_blocks_before_download() {
    require_git!();
    let fx = Fixture::new(|server, upstream| {
        let mut git = package_json("git", "2.43.0", &server.url("/git-2.43.0.tar.gz"), &"a".repeat(64));
        git["dependencies"] = serde_json::json!(["curl", "openssl"]);
        upstream.add_package("git", git);
    });

    let err = install_error(fx.manager.install("git", &SilentProgress));
    match err {
        InstallError::MissingDependencies { id, missing } => {
            assert_eq!(id, "git");
            assert_eq!(missing, ["curl", "openssl"]);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(fx.server.requests().is_empty(), "nothing may be downloaded");
    assert!(!fx.data.join("packages/git").exists());
}

#[test]
fn test_conflict_blocks_install() {
    require_git!();
    let fx = Fixture::new(|server, upstream| {
        let tarball = tar_gz(&[("bin/wget", b"wget", 0o755)]);
        server.serve("/wget.tar.gz", tarball.clone());
        let mut wget = package_json("wget", "1.21", &server.url("/wget.tar.gz"), &bountu::hash::sha256(&tarball));
        wget["conflicts"] = serde_json::json!(["curl"]);
        upstream.add_package("wget", wget);
    });
    fx.manager.install("curl", &SilentProgress).unwrap();

    let err = install_error(fx.manager.install("wget", &SilentProgress));
    assert!(matches!(err, InstallError::HasConflicts { ref conflicts, .. } if conflicts == &["curl"]));
}

#[test]
fn test_unavailable_package_is_not_installable() {
    require_git!();
    let fx = Fixture::new(|server, upstream| {
        let mut win = package_json("notepad", "1.0", &server.url("/notepad.zip"), &"b".repeat(64));
        win["platform"] = "windows".into();
        upstream.add_package("notepad", win);
    });

    let err = install_error(fx.manager.install("notepad", &SilentProgress));
    assert!(matches!(err, InstallError::NotInstallable { .. }));
    assert!(fx.server.requests().is_empty());
}

#[test]
fn test_install_deb_artifact() {
    require_git!();
    let fx = Fixture::new(|server, upstream| {
        let package = deb(&[("./bin/tool", b"#!/bin/sh\necho tool\n", 0o644)]);
        server.serve("/tool_1.0_aarch64.deb", package.clone());
        upstream.add_package(
            "tool",
            package_json("tool", "1.0", &server.url("/tool_1.0_aarch64.deb"), &bountu::hash::sha256(&package)),
        );
    });

    let outcome = fx.manager.install("tool", &SilentProgress).unwrap();
    let binary = outcome.install_path.join("bin/tool");
    assert!(binary.is_file());
    assert_eq!(mode(&binary) & 0o111, 0o111, "bin/ entries are made executable");
    assert!(!outcome.install_path.join("control").exists());
    assert!(fx.data.join("bin/tool").is_file());
}

#[test]
fn test_download_follows_redirect() {
    require_git!();
    let fx = Fixture::new(|server, upstream| {
        let tarball = tar_gz(&[("bin/htop", b"htop", 0o755)]);
        server.serve("/files/htop-3.3.tar.gz", tarball.clone());
        server.route(
            "/htop-3.3.tar.gz",
            common::Route::Redirect("/files/htop-3.3.tar.gz".to_string()),
        );
        upstream.add_package(
            "htop",
            package_json("htop", "3.3", &server.url("/htop-3.3.tar.gz"), &bountu::hash::sha256(&tarball)),
        );
    });

    fx.manager.install("htop", &SilentProgress).unwrap();
    assert!(fx.data.join("packages/htop/bin/htop").is_file());
    assert_eq!(fx.server.requests(), ["/htop-3.3.tar.gz", "/files/htop-3.3.tar.gz"]);
}

#[test]
fn test_update_after_upstream_bump() {
    require_git!();
    let fx = Fixture::new(|_, _| {});
    fx.manager.install("curl", &SilentProgress).unwrap();

    let err = install_error(fx.manager.update("curl", &SilentProgress));
    assert!(matches!(err, InstallError::NoPendingUpdate(_)));

    let tarball = tar_gz(&[("bin/curl", b"#!/bin/sh\necho curl 8.6.0\n", 0o755)]);
    fx.server.serve("/curl-8.6.0.tar.gz", tarball.clone());
    fx.upstream.add_package(
        "curl",
        package_json("curl", "8.6.0", &fx.server.url("/curl-8.6.0.tar.gz"), &bountu::hash::sha256(&tarball)),
    );
    fx.upstream.commit("curl 8.6.0");
    assert!(fx.manager.refresh().unwrap().has_updates);

    let catalog = fx.manager.catalog().unwrap();
    assert!(catalog.get("curl").unwrap().status.needs_update);
    assert!(fx.record("curl").unwrap().needs_update, "flag is persisted");

    let results = fx.manager.update_all().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].1.as_ref().unwrap().version, "8.6.0");

    let record = fx.record("curl").unwrap();
    assert_eq!(record.installed_version, "8.6.0");
    assert!(!record.needs_update);
    assert!(
        fs::read_to_string(fx.data.join("packages/curl/bin/curl"))
            .unwrap()
            .contains("8.6.0")
    );
    assert!(!fx.data.join("packages/curl/lib/libcurl.so").exists(), "old tree is replaced");
}

#[test]
fn test_update_drops_shims_for_removed_commands() {
    require_git!();
    let fx = Fixture::new(|_, _| {});
    fx.manager.install("curl", &SilentProgress).unwrap();
    assert!(fx.data.join("bin/curl").is_file());

    let tarball = tar_gz(&[("bin/curl-ng", b"#!/bin/sh\necho curl-ng\n", 0o755)]);
    fx.server.serve("/curl-9.0.0.tar.gz", tarball.clone());
    fx.upstream.add_package(
        "curl",
        package_json("curl", "9.0.0", &fx.server.url("/curl-9.0.0.tar.gz"), &bountu::hash::sha256(&tarball)),
    );
    fx.upstream.commit("curl 9.0.0");
    fx.manager.refresh().unwrap();

    let outcome = fx.manager.update("curl", &SilentProgress).unwrap();
    assert_eq!(outcome.shims, [fx.data.join("bin/curl-ng")]);
    assert!(!fx.data.join("bin/curl").exists(), "stale shim is removed");
    assert!(fx.data.join("bin/curl-ng").is_file());
}

#[test]
fn test_uninstall_removes_files_shims_and_env() {
    require_git!();
    let fx = Fixture::new(|_, _| {});
    fx.manager.install("curl", &SilentProgress).unwrap();

    fx.manager.uninstall("curl").unwrap();

    assert!(!fx.data.join("packages/curl").exists());
    assert!(!fx.data.join("bin/curl").exists());
    assert!(fx.record("curl").is_none());
    let env = fs::read_to_string(fx.data.join("environment.sh")).unwrap();
    assert!(!env.contains("packages/curl"));

    let err = fx.manager.uninstall("curl").unwrap_err();
    assert!(matches!(err, Error::Install(InstallError::NotInstalled(_))));
}

#[test]
fn test_uninstall_package_that_left_catalog() {
    require_git!();
    let fx = Fixture::new(|_, _| {});
    fx.manager.install("curl", &SilentProgress).unwrap();

    fs::remove_dir_all(fx.upstream.path().join("packages/curl")).unwrap();
    fx.upstream.add_package("jq", package_json("jq", "1.7", "https://example.invalid/jq.tar.gz", ""));
    fx.upstream.commit("drop curl");
    fx.manager.refresh().unwrap();
    assert!(fx.manager.catalog().unwrap().get("curl").is_none());

    fx.manager.uninstall("curl").unwrap();
    assert!(fx.record("curl").is_none());
    assert!(!fx.data.join("packages/curl").exists());
}

#[test]
fn test_platform_change_flags_installed_package() {
    require_git!();
    let fx = Fixture::new(|_, _| {});
    fx.manager.install("curl", &SilentProgress).unwrap();

    let mut curl = package_json("curl", "8.5.0", "https://example.invalid/curl.zip", "");
    curl["platform"] = "windows".into();
    fx.upstream.add_package("curl", curl);
    fx.upstream.commit("curl is windows only now");
    fx.manager.refresh().unwrap();

    let catalog = fx.manager.catalog().unwrap();
    let status = &catalog.get("curl").unwrap().status;
    assert!(status.needs_maintenance);
    assert!(status.maintenance_reason.is_some());

    let record = fx.record("curl").unwrap();
    assert!(record.needs_maintenance);
    assert_eq!(catalog.stats().needs_maintenance, 1);
}

#[test]
fn test_create_custom_package_commits_to_mirror() {
    require_git!();
    let fx = Fixture::new(|_, _| {});
    let before = fx.manager.mirror().info().unwrap().current_commit_hash;

    let metadata = RawMetadata {
        id: "hello".to_string(),
        name: "Hello".to_string(),
        version: "0.1.0".to_string(),
        description: "Locally authored".to_string(),
        category: "utilities".to_string(),
        size: 10,
        dependencies: Vec::new(),
        conflicts: Vec::new(),
        tags: vec!["local".to_string()],
        download_url: "https://example.invalid/hello.tar.gz".to_string(),
        checksum_sha256: "c".repeat(64),
        platform: "android".to_string(),
        architecture: "aarch64".to_string(),
        install_script: None,
        uninstall_script: None,
        homepage: None,
        license: Some("MIT".to_string()),
        maintainer: None,
    };
    let commit = fx.manager.create_custom_package(&metadata).unwrap();
    assert_eq!(commit.len(), 40);
    assert_ne!(Some(commit), before);

    let hello = fx.manager.package("hello").unwrap();
    assert_eq!(hello.version, "0.1.0");
    assert!(hello.is_installable());
    assert_eq!(fx.manager.catalog().unwrap().len(), 2);
}
