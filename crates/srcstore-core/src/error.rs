//! Error type shared by every stage of a fetch.
//!
//! Transfer failures are classified into connection, authentication and
//! timeout kinds so callers can decide on their own retry policy; nothing in
//! this crate retries.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Boxed lower-level error kept as the `source` of network failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Flat discriminant of [`FetchError`], convenient for matching in callers and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidUri,
    Io,
    Connection,
    Authentication,
    Timeout,
    HttpStatus,
    PartialTransfer,
    AmbiguousRemoteFile,
    AliasCollision,
    HashMismatch,
}

#[derive(Debug, Error)]
pub enum FetchError {
    /// The locator could not be parsed or has no usable file name.
    #[error("invalid source URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    /// Local filesystem failure (permissions, disk full, missing staging file).
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("connection to {url} failed: {source}")]
    Connection {
        url: String,
        #[source]
        source: BoxError,
    },

    #[error("login as '{user}' rejected by {url}: {source}")]
    Authentication {
        url: String,
        user: String,
        #[source]
        source: BoxError,
    },

    #[error("timed out talking to {url}: {source}")]
    Timeout {
        url: String,
        #[source]
        source: BoxError,
    },

    /// The server answered, but not with a 2xx status.
    #[error("GET {url} returned HTTP {code}")]
    HttpStatus { url: String, code: u32 },

    /// The transfer ended before the announced size was written.
    #[error("partial transfer: expected {expected} bytes, got {received}")]
    PartialTransfer { expected: u64, received: u64 },

    /// An FTP listing for the source path did not match exactly one entry.
    #[error("FTP expected 1 file at '{path}', found {found}")]
    AmbiguousRemoteFile { path: String, found: usize },

    /// Something other than the expected alias already occupies the legacy hash path.
    #[error(
        "legacy alias {} already exists and does not point at {expected} (found {})",
        alias.display(),
        existing.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "a non-link entry".to_string())
    )]
    AliasCollision {
        alias: PathBuf,
        existing: Option<PathBuf>,
        expected: String,
    },

    #[error("{algorithm} mismatch for {}: expected {expected}, got {actual}", path.display())]
    HashMismatch {
        path: PathBuf,
        algorithm: &'static str,
        expected: String,
        actual: String,
    },
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::InvalidUri { .. } => ErrorKind::InvalidUri,
            FetchError::Io { .. } => ErrorKind::Io,
            FetchError::Connection { .. } => ErrorKind::Connection,
            FetchError::Authentication { .. } => ErrorKind::Authentication,
            FetchError::Timeout { .. } => ErrorKind::Timeout,
            FetchError::HttpStatus { .. } => ErrorKind::HttpStatus,
            FetchError::PartialTransfer { .. } => ErrorKind::PartialTransfer,
            FetchError::AmbiguousRemoteFile { .. } => ErrorKind::AmbiguousRemoteFile,
            FetchError::AliasCollision { .. } => ErrorKind::AliasCollision,
            FetchError::HashMismatch { .. } => ErrorKind::HashMismatch,
        }
    }

    pub fn invalid_uri(uri: &str, reason: impl Into<String>) -> Self {
        FetchError::InvalidUri {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }

    pub fn io(path: &Path, source: io::Error) -> Self {
        FetchError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Classify a libcurl failure.
    pub fn from_curl(url: &str, e: curl::Error) -> Self {
        let url = url.to_string();
        if e.is_operation_timedout() {
            return FetchError::Timeout {
                url,
                source: Box::new(e),
            };
        }
        if e.is_url_malformed() {
            return FetchError::InvalidUri {
                uri: url,
                reason: e.to_string(),
            };
        }
        if e.is_login_denied() || e.is_remote_access_denied() {
            return FetchError::Authentication {
                url,
                user: String::new(),
                source: Box::new(e),
            };
        }
        FetchError::Connection {
            url,
            source: Box::new(e),
        }
    }

    /// Classify an FTP failure. `user` is set when the failing command was the login.
    pub fn from_ftp(url: &str, user: Option<&str>, e: suppaftp::FtpError) -> Self {
        let url = url.to_string();
        if let suppaftp::FtpError::ConnectionError(io_err) = &e {
            if matches!(
                io_err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ) {
                return FetchError::Timeout {
                    url,
                    source: Box::new(e),
                };
            }
            return FetchError::Connection {
                url,
                source: Box::new(e),
            };
        }
        match user {
            Some(user) => FetchError::Authentication {
                url,
                user: user.to_string(),
                source: Box::new(e),
            },
            None => FetchError::Connection {
                url,
                source: Box::new(e),
            },
        }
    }

    /// Classify a socket-level failure (address resolution, connect, stream copy).
    pub fn from_network_io(url: &str, e: io::Error) -> Self {
        let url = url.to_string();
        if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) {
            FetchError::Timeout {
                url,
                source: Box::new(e),
            }
        } else {
            FetchError::Connection {
                url,
                source: Box::new(e),
            }
        }
    }
}
