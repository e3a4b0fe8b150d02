//! Source descriptors: one upstream artifact named by URI and expected hash.
//!
//! Pure data. Parsing the URI up front means a malformed locator fails before
//! anything touches the staging directory or the network.

mod path;

pub use path::{decoded_path, file_name_from_url};

use crate::error::FetchError;
use std::path::{Path, PathBuf};
use url::Url;

/// Bind-mount pair handed to the build sandbox: mount `source` read-only at `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindConfiguration {
    pub source: PathBuf,
    pub target: PathBuf,
}

/// A tarball, patch or other file a package build needs, plus the hash it is cached under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceDescriptor {
    uri: String,
    file_name: String,
    validator: String,
    legacy: bool,
    url: Url,
}

impl SourceDescriptor {
    /// Parse `uri` and derive the artifact's file name.
    ///
    /// `validator` is the expected digest: SHA-256 for current sources, SHA-1
    /// when `legacy` is set. It may be empty when the hash is not yet known;
    /// otherwise it must be hex. It is stored lowercased, matching the names
    /// the content store creates.
    pub fn new(uri: &str, validator: &str, legacy: bool) -> Result<Self, FetchError> {
        let url = Url::parse(uri).map_err(|e| FetchError::invalid_uri(uri, e.to_string()))?;
        let file_name = file_name_from_url(&url)
            .ok_or_else(|| FetchError::invalid_uri(uri, "no file name in URI path"))?;

        let validator = validator.trim().to_ascii_lowercase();
        if !validator.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(FetchError::invalid_uri(
                uri,
                format!("validator '{}' is not a hex digest", validator),
            ));
        }

        Ok(Self {
            uri: uri.to_string(),
            file_name,
            validator,
            legacy,
            url,
        })
    }

    /// The raw URI; identifies the source in logs and comparisons.
    pub fn identifier(&self) -> &str {
        &self.uri
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn scheme(&self) -> &str {
        self.url.scheme()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn validator(&self) -> &str {
        &self.validator
    }

    pub fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// `root/<hash>/<file_name>`.
    pub fn cached_path(&self, root: &Path, hash: &str) -> PathBuf {
        root.join(hash).join(&self.file_name)
    }

    /// Where the build engine should bind this source inside `rootfs`.
    pub fn bind_configuration(&self, root: &Path, rootfs: &Path) -> BindConfiguration {
        BindConfiguration {
            source: self.cached_path(root, &self.validator),
            target: rootfs.join(&self.file_name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const SHA256: &str = "abc123abc123abc123abc123abc123abc123abc123abc123abc123abc123abcd";

    #[test]
    fn https_source_fields() {
        let s = SourceDescriptor::new("https://example.org/pkg/foo-1.2.tar.xz", SHA256, false).unwrap();
        assert_eq!(s.identifier(), "https://example.org/pkg/foo-1.2.tar.xz");
        assert_eq!(s.file_name(), "foo-1.2.tar.xz");
        assert_eq!(s.scheme(), "https");
        assert_eq!(s.validator(), SHA256);
        assert!(!s.is_legacy());
        assert_eq!(
            s.cached_path(Path::new("/cache/sources"), SHA256),
            Path::new("/cache/sources").join(SHA256).join("foo-1.2.tar.xz")
        );
    }

    #[test]
    fn ftp_source_with_user() {
        let s = SourceDescriptor::new("ftp://anonymous@mirror.example/pub/bar.tar.gz", "", true).unwrap();
        assert_eq!(s.scheme(), "ftp");
        assert_eq!(s.file_name(), "bar.tar.gz");
        assert_eq!(s.validator(), "");
        assert!(s.is_legacy());
    }

    #[test]
    fn validator_is_lowercased() {
        let s = SourceDescriptor::new("https://example.org/a.tar", "DEADBEEF", true).unwrap();
        assert_eq!(s.validator(), "deadbeef");
    }

    #[test]
    fn unparseable_uri_rejected() {
        let err = SourceDescriptor::new("not a uri", SHA256, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUri);
        let err = SourceDescriptor::new("/relative/path.tar", SHA256, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUri);
    }

    #[test]
    fn uri_without_file_name_rejected() {
        let err = SourceDescriptor::new("https://example.org/", SHA256, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUri);
    }

    #[test]
    fn non_hex_validator_rejected() {
        let err = SourceDescriptor::new("https://example.org/a.tar", "../../etc", false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUri);
    }

    #[test]
    fn bind_configuration_pair() {
        let s = SourceDescriptor::new("https://example.org/pkg/foo-1.2.tar.xz", SHA256, false).unwrap();
        let bind = s.bind_configuration(Path::new("/cache/sources"), Path::new("/build/root"));
        assert_eq!(
            bind.source,
            Path::new("/cache/sources").join(SHA256).join("foo-1.2.tar.xz")
        );
        assert_eq!(bind.target, Path::new("/build/root/foo-1.2.tar.xz"));
    }

    #[test]
    fn file_name_is_last_segment_for_many_uris() {
        let cases = [
            ("https://example.org/a/b/c.tar.gz", "c.tar.gz"),
            ("http://example.org/c.patch", "c.patch"),
            ("ftp://example.org/pub/gnu/x-1.0.tar.bz2", "x-1.0.tar.bz2"),
            ("file:///srv/mirror/y.zip", "y.zip"),
            ("https://example.org/v1.0/download?x=1", "download"),
        ];
        for (uri, expected) in cases {
            let s = SourceDescriptor::new(uri, "", false).unwrap();
            assert_eq!(s.file_name(), expected, "uri {}", uri);
        }
    }
}
