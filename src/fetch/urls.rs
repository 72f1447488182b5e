// src/fetch/urls.rs

//! Fallback artifact URLs for well-known packages
//!
//! Packages that also exist in the Termux archive can be fetched from the
//! Termux CDN and its mirrors when the URL published in the catalog fails.
//! The table maps catalog ids to Termux package names where they differ.

use crate::catalog::{Architecture, PackageDescriptor};

const TERMUX_CDN: &str = "https://packages-cf.termux.dev/apt/termux-main";

const TERMUX_MIRRORS: [&str; 2] = [
    "https://grimler.se/termux-packages-24",
    "https://dl.bintray.com/termux/termux-packages-24",
];

/// Catalog id -> Termux package name
const KNOWN_PACKAGES: &[(&str, &str)] = &[
    // system
    ("busybox", "busybox"),
    ("coreutils", "coreutils"),
    ("findutils", "findutils"),
    ("grep", "grep"),
    ("sed", "sed"),
    ("gawk", "gawk"),
    // network
    ("curl", "curl"),
    ("wget", "wget"),
    ("netcat", "netcat-openbsd"),
    ("openssh", "openssh"),
    ("nmap", "nmap"),
    ("iputils", "iputils"),
    ("traceroute", "traceroute"),
    // development
    ("git", "git"),
    ("make", "make"),
    ("cmake", "cmake"),
    ("gcc", "gcc"),
    ("clang", "clang"),
    // editors
    ("vim", "vim"),
    ("nano", "nano"),
    ("emacs", "emacs"),
    // languages
    ("python3", "python"),
    ("nodejs", "nodejs"),
    ("ruby", "ruby"),
    ("golang", "golang"),
    ("rust", "rust"),
    ("openjdk", "openjdk-17"),
    // shells
    ("bash", "bash"),
    ("zsh", "zsh"),
    ("fish", "fish"),
    // compression
    ("gzip", "gzip"),
    ("bzip2", "bzip2"),
    ("xz", "xz-utils"),
    ("zip", "zip"),
    ("tar", "tar"),
    ("p7zip", "p7zip"),
    // web
    ("nginx", "nginx"),
    ("apache2", "apache2"),
    // databases
    ("sqlite3", "sqlite"),
    ("postgresql", "postgresql"),
    ("mariadb", "mariadb"),
    ("redis", "redis"),
    // security
    ("openssl", "openssl"),
    ("gnupg", "gnupg"),
    ("wireshark", "tshark"),
    // libraries
    ("libcurl", "libcurl"),
    ("libssl", "openssl"),
    ("zlib", "zlib"),
];

/// Termux package name for a catalog id, if the id is in the table
pub fn termux_name(id: &str) -> Option<&'static str> {
    KNOWN_PACKAGES
        .iter()
        .find(|(known, _)| *known == id)
        .map(|(_, name)| *name)
}

/// Archive arch component; `None` when no concrete architecture applies
fn arch_component<'a>(package: &'a Architecture, runtime: &'a Architecture) -> Option<&'a str> {
    let arch = match package {
        Architecture::Any => runtime,
        specific => specific,
    };
    match arch {
        Architecture::Any | Architecture::Other(_) => None,
        concrete => Some(concrete.as_str()),
    }
}

/// Template URLs for `descriptor`, primary CDN first
pub(crate) fn template_urls(descriptor: &PackageDescriptor, runtime: &Architecture) -> Vec<String> {
    let Some(name) = termux_name(&descriptor.id) else {
        return Vec::new();
    };
    let Some(arch) = arch_component(&descriptor.architecture, runtime) else {
        return Vec::new();
    };
    let version = descriptor.version.trim();
    if version.is_empty() {
        return Vec::new();
    }

    std::iter::once(TERMUX_CDN)
        .chain(TERMUX_MIRRORS)
        .map(|base| format!("{base}/binary-{arch}/{name}_{version}_{arch}.deb"))
        .collect()
}
