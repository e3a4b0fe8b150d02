//! Flat staging directory for in-flight downloads.

use crate::error::FetchError;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

/// Staging files are named exactly like the artifact they will become and
/// are only ever moved out by a commit. Nothing here deletes them: a failed
/// fetch leaves its partial file for inspection or for the next attempt to
/// overwrite.
///
/// A fetch holds the [`StagingLock`] for its file name from download to
/// commit, so two fetches never write the same staging file at once.
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

/// Exclusive claim on `staging/<file_name>`; released on drop.
#[derive(Debug)]
pub struct StagingLock {
    _file: File,
    path: PathBuf,
}

impl StagingLock {
    /// The lock file itself (`staging/.<file_name>.lock`).
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StagingArea {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the staging directory if missing.
    pub fn ensure(&self) -> Result<(), FetchError> {
        fs::create_dir_all(&self.dir).map_err(|e| FetchError::io(&self.dir, e))
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }

    /// Block until no other fetch (in this or another process) is staging
    /// `file_name`. The lock lives in a sibling dot-file so its inode stays
    /// put while the staged file is renamed into the store.
    pub fn lock(&self, file_name: &str) -> Result<StagingLock, FetchError> {
        let path = self.dir.join(format!(".{}.lock", file_name));
        let file = File::options()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| FetchError::io(&path, e))?;
        lock_exclusive(&file).map_err(|e| FetchError::io(&path, e))?;
        Ok(StagingLock { _file: file, path })
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> std::io::Result<()> {
    use std::os::unix::io::AsRawFd;
    loop {
        // SAFETY: the descriptor is owned by `file` and stays open for the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

// TODO: LockFileEx on Windows; until then fetches of one file name are not serialized there.
#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> std::io::Result<()> {
    Ok(())
}

/// Create (or truncate) a download destination.
pub fn create_truncated(path: &Path) -> Result<File, FetchError> {
    File::options()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| FetchError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn ensure_creates_nested_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("a/b/staging");
        let staging = StagingArea::new(&root);
        assert!(!root.exists());
        staging.ensure().unwrap();
        assert!(root.is_dir());
        staging.ensure().unwrap();
    }

    #[test]
    fn create_truncated_drops_previous_partial() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let path = staging.path_for("x.tar");
        std::fs::write(&path, b"stale partial content").unwrap();
        drop(create_truncated(&path).unwrap());
        assert_eq!(path, dir.path().join("x.tar"));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn lock_file_sits_beside_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let staging = StagingArea::new(dir.path());
        let lock = staging.lock("x.tar").unwrap();
        assert_eq!(lock.path(), dir.path().join(".x.tar.lock"));
        assert!(!staging.path_for("x.tar").exists());
    }

    #[cfg(unix)]
    #[test]
    fn lock_is_exclusive_per_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let staging = Arc::new(StagingArea::new(dir.path()));
        let held = staging.lock("x.tar").unwrap();
        // A different name is independent.
        drop(staging.lock("y.tar").unwrap());

        let acquired = Arc::new(AtomicBool::new(false));
        let waiter = {
            let staging = Arc::clone(&staging);
            let acquired = Arc::clone(&acquired);
            std::thread::spawn(move || {
                let _lock = staging.lock("x.tar").unwrap();
                acquired.store(true, Ordering::SeqCst);
            })
        };
        std::thread::sleep(Duration::from_millis(100));
        assert!(!acquired.load(Ordering::SeqCst), "second lock must wait");
        drop(held);
        waiter.join().unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }
}
