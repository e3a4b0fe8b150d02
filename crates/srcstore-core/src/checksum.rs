//! Content digests over files on disk.
//!
//! SHA-256 names canonical store entries; SHA-1 is only computed for
//! legacy sources that must stay reachable by their older digest.

use crate::error::FetchError;
use sha2::Digest;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

const BUF_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    /// Weak digest, kept for backward-compatible aliases.
    Sha1,
    /// Canonical cache key.
    Sha256,
}

impl HashAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha1 => "SHA-1",
            Self::Sha256 => "SHA-256",
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            other => Err(format!("unknown hash algorithm '{}' (expected sha1 or sha256)", other)),
        }
    }
}

/// Compute the digest of a file and return it as lowercase hex.
/// Reads in chunks to keep memory use bounded; suitable for large files.
pub fn digest_path(path: &Path, algorithm: HashAlgorithm) -> Result<String, FetchError> {
    match algorithm {
        HashAlgorithm::Sha1 => digest_with::<sha1::Sha1>(path),
        HashAlgorithm::Sha256 => digest_with::<sha2::Sha256>(path),
    }
}

pub fn sha256_path(path: &Path) -> Result<String, FetchError> {
    digest_path(path, HashAlgorithm::Sha256)
}

pub fn sha1_path(path: &Path) -> Result<String, FetchError> {
    digest_path(path, HashAlgorithm::Sha1)
}

fn digest_with<D: Digest>(path: &Path) -> Result<String, FetchError> {
    let mut f = File::open(path).map_err(|e| FetchError::io(path, e))?;
    let mut hasher = D::new();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = f.read(&mut buf).map_err(|e| FetchError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
