// src/hash.rs

//! SHA-256 hashing for artifact integrity
//!
//! Artifacts are hashed by streaming them through [`Sha256Hasher`] in
//! fixed-size chunks, so archives of any size can be verified without
//! loading them into memory. Expected digests come from remote metadata and
//! are compared case-insensitively.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Chunk size used when streaming files through the hasher
const HASH_BUFFER_SIZE: usize = 8192;

/// The digest of a file did not match the published checksum
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
pub struct ChecksumMismatch {
    pub path: PathBuf,
    pub expected: String,
    pub actual: String,
}

/// Incremental SHA-256 hasher producing lowercase hex
#[derive(Default)]
pub struct Sha256Hasher {
    inner: Sha256,
}

impl Sha256Hasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Finish hashing and return the lowercase hex digest
    pub fn finalize(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Compute the SHA-256 of an in-memory buffer
pub fn sha256(data: &[u8]) -> String {
    let mut hasher = Sha256Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Compute the SHA-256 of everything a reader yields
pub fn sha256_reader<R: Read>(reader: &mut R) -> io::Result<String> {
    let mut hasher = Sha256Hasher::new();
    let mut buffer = [0u8; HASH_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}

/// Compute the SHA-256 of a file
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    sha256_reader(&mut file)
}

/// Check that a file hashes to `expected`
///
/// `expected` is compared case-insensitively and surrounding whitespace is
/// ignored. The caller decides what an empty expected digest means; this
/// function always hashes and compares.
pub fn verify_file_sha256(path: &Path, expected: &str) -> io::Result<Result<(), ChecksumMismatch>> {
    let actual = sha256_file(path)?;
    let expected = expected.trim();

    if actual.eq_ignore_ascii_case(expected) {
        Ok(Ok(()))
    } else {
        Ok(Err(ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.to_lowercase(),
            actual,
        }))
    }
}
