//! Hash-keyed source cache on disk.
//!
//! Layout under the content root:
//!
//! ```text
//! <root>/<sha256>/<file_name>     canonical entry, immutable once committed
//! <root>/<sha1> -> <sha256>       relative symlink, legacy sources only
//! ```
//!
//! Entries appear through a single rename from the staging area, so a reader
//! sees either no entry or a complete one.

mod staging;

pub use staging::{create_truncated, StagingArea, StagingLock};

use crate::checksum;
use crate::error::FetchError;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

/// Result of moving a staged file into the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Committed {
    pub sha256: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    root: PathBuf,
}

impl ContentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn canonical_path(&self, hash: &str, file_name: &str) -> PathBuf {
        self.root.join(hash).join(file_name)
    }

    /// True if `root/<hash>/<file_name>` is a file. Follows legacy alias links,
    /// so a SHA-1 hash finds the entry committed under its SHA-256.
    pub fn exists(&self, hash: &str, file_name: &str) -> bool {
        is_hash_like(hash) && self.canonical_path(hash, file_name).is_file()
    }

    pub fn lookup(&self, hash: &str, file_name: &str) -> Option<PathBuf> {
        if self.exists(hash, file_name) {
            Some(self.canonical_path(hash, file_name))
        } else {
            None
        }
    }

    /// Hash the staged file and rename it to `root/<sha256>/<file_name>`.
    ///
    /// A destination that already exists holds the same bytes (same hash),
    /// so it is kept and the staged copy dropped. Two committers racing past
    /// that check both rename identical content and the last one wins.
    ///
    /// When staging sits on another filesystem the file is copied into a
    /// temporary sibling of the destination and persisted over it, so the
    /// canonical name still only ever points at complete content.
    pub fn commit(&self, staged: &Path, file_name: &str) -> Result<Committed, FetchError> {
        let sha256 = checksum::sha256_path(staged)?;
        let dir = self.root.join(&sha256);
        fs::create_dir_all(&dir).map_err(|e| FetchError::io(&dir, e))?;

        let dest = dir.join(file_name);
        if dest.is_file() {
            // Same hash, same bytes: another fetch committed first.
            fs::remove_file(staged).map_err(|e| FetchError::io(staged, e))?;
            tracing::debug!(sha256 = %sha256, path = %dest.display(), "entry already committed");
            return Ok(Committed { sha256, path: dest });
        }
        match fs::rename(staged, &dest) {
            Ok(()) => {}
            Err(e) if is_cross_device(&e) => {
                tracing::debug!(
                    staged = %staged.display(),
                    "staging is on another filesystem, copying into store"
                );
                copy_into_place(staged, &dest)?;
            }
            Err(e) => return Err(FetchError::io(&dest, e)),
        }

        tracing::debug!(sha256 = %sha256, path = %dest.display(), "committed source");
        Ok(Committed { sha256, path: dest })
    }

    /// Fail with [`FetchError::AliasCollision`] if `root/<sha1>` is taken by
    /// anything other than a link to `primary`. Run before committing so a
    /// colliding legacy source leaves no canonical entry behind.
    pub fn check_alias(&self, sha1: &str, primary: &str) -> Result<(), FetchError> {
        let link = self.root.join(sha1);
        match fs::symlink_metadata(&link) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FetchError::io(&link, e)),
            Ok(_) => match self.existing_alias(&link, primary) {
                None => Ok(()),
                Some(err) => Err(err),
            },
        }
    }

    /// Make a committed entry reachable by its SHA-1 as well: `root/<sha1> -> <primary>`.
    ///
    /// An existing link with the same target is accepted (another fetch of
    /// the same legacy source got there first). Anything else at that path is
    /// an [`FetchError::AliasCollision`] and is left untouched.
    pub fn alias_legacy(&self, primary: &str, committed: &Path) -> Result<String, FetchError> {
        let sha1 = checksum::sha1_path(committed)?;
        let link = self.root.join(&sha1);

        match symlink_dir(Path::new(primary), &link) {
            Ok(()) => {
                tracing::debug!(sha1 = %sha1, sha256 = %primary, "created legacy alias");
                Ok(sha1)
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                match self.existing_alias(&link, primary) {
                    None => {
                        tracing::debug!(sha1 = %sha1, "legacy alias already present");
                        Ok(sha1)
                    }
                    Some(err) => Err(err),
                }
            }
            Err(e) => Err(FetchError::io(&link, e)),
        }
    }

    /// `None` when the entry at `link` is a symlink to `primary` (relative or
    /// absolute), otherwise the collision to report.
    fn existing_alias(&self, link: &Path, primary: &str) -> Option<FetchError> {
        match fs::read_link(link) {
            Ok(existing)
                if existing == Path::new(primary) || existing == self.root.join(primary) =>
            {
                None
            }
            Ok(existing) => Some(FetchError::AliasCollision {
                alias: link.to_path_buf(),
                existing: Some(existing),
                expected: primary.to_string(),
            }),
            Err(_) => Some(FetchError::AliasCollision {
                alias: link.to_path_buf(),
                existing: None,
                expected: primary.to_string(),
            }),
        }
    }
}

/// Store hashes are lowercase hex; anything else (empty, path separators)
/// never names an entry.
fn is_hash_like(hash: &str) -> bool {
    !hash.is_empty() && hash.chars().all(|c| c.is_ascii_hexdigit())
}

#[cfg(unix)]
fn is_cross_device(e: &io::Error) -> bool {
    e.raw_os_error() == Some(libc::EXDEV)
}

#[cfg(not(unix))]
fn is_cross_device(_e: &io::Error) -> bool {
    false
}

#[cfg(unix)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink_dir(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

fn copy_into_place(staged: &Path, dest: &Path) -> Result<(), FetchError> {
    let dir = dest.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| FetchError::io(dir, e))?;
    let mut src = File::open(staged).map_err(|e| FetchError::io(staged, e))?;
    io::copy(&mut src, tmp.as_file_mut()).map_err(|e| FetchError::io(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| FetchError::io(dest, e))?;
    tmp.persist(dest)
        .map_err(|e| FetchError::io(dest, e.error))?;
    fs::remove_file(staged).map_err(|e| FetchError::io(staged, e))?;
    Ok(())
}
