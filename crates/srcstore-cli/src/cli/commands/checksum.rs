//! Checksum command: digest of a local file.

use anyhow::Result;
use srcstore_core::checksum::{self, HashAlgorithm};
use std::path::Path;

/// Print the digest in `sha256sum` format.
pub fn run_checksum(path: &Path, algorithm: HashAlgorithm) -> Result<()> {
    let digest = checksum::digest_path(path, algorithm)?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
