//! Fetch orchestration: cached check, stage, download, verify, commit, alias.
//!
//! A fetch either returns a committed store entry or fails with nothing
//! committed. Failures leave the staged file where it is.

use crate::checksum::{self, HashAlgorithm};
use crate::config::{StoreConfig, VerifyPolicy};
use crate::error::FetchError;
use crate::logging::FETCH_TARGET;
use crate::progress::{LogProgress, ProgressObserver};
use crate::source::SourceDescriptor;
use crate::store::{ContentStore, StagingArea};
use crate::transfer::{Backend, TransferOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Moves one source into a local file. The network path is [`NetworkTransport`];
/// anything else is a test double.
pub trait Transport: Send + Sync {
    fn transfer(
        &self,
        source: &SourceDescriptor,
        destination: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<u64, FetchError>;
}

/// Dispatches on the URI scheme to the curl or FTP backend.
#[derive(Debug, Clone, Default)]
pub struct NetworkTransport {
    options: TransferOptions,
}

impl NetworkTransport {
    pub fn new(options: TransferOptions) -> Self {
        Self { options }
    }
}

impl Transport for NetworkTransport {
    fn transfer(
        &self,
        source: &SourceDescriptor,
        destination: &Path,
        observer: &dyn ProgressObserver,
    ) -> Result<u64, FetchError> {
        let backend = Backend::select(source.scheme());
        tracing::debug!(
            backend = backend.name(),
            uri = %source.identifier(),
            dest = %destination.display(),
            "dispatching transfer"
        );
        backend.fetch(source.url(), destination, &self.options, observer)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Already in the store; nothing was transferred.
    Cached { path: PathBuf },
    Fetched {
        path: PathBuf,
        sha256: String,
        /// SHA-1 alias created for legacy sources.
        legacy_alias: Option<String>,
        bytes: u64,
    },
}

impl FetchOutcome {
    pub fn path(&self) -> &Path {
        match self {
            FetchOutcome::Cached { path } | FetchOutcome::Fetched { path, .. } => path,
        }
    }

    pub fn was_cached(&self) -> bool {
        matches!(self, FetchOutcome::Cached { .. })
    }
}

pub struct Fetcher<T: Transport = NetworkTransport> {
    store: ContentStore,
    staging: StagingArea,
    transport: T,
    verify: VerifyPolicy,
    observer: Arc<dyn ProgressObserver>,
}

impl Fetcher<NetworkTransport> {
    pub fn new(config: &StoreConfig) -> Self {
        let transport = NetworkTransport::new(TransferOptions::from(&config.transfer));
        Self::with_transport(config, transport)
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn with_transport(config: &StoreConfig, transport: T) -> Self {
        Self {
            store: ContentStore::new(&config.source_dir),
            staging: StagingArea::new(&config.staging_dir),
            transport,
            verify: config.verify,
            observer: Arc::new(LogProgress::default()),
        }
    }

    /// Replace the default tracing-based progress reporting.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Whether the source is already present under its validator.
    pub fn is_fetched(&self, source: &SourceDescriptor) -> bool {
        self.store.exists(source.validator(), source.file_name())
    }

    pub fn fetch(&self, source: &SourceDescriptor) -> Result<FetchOutcome, FetchError> {
        if let Some(outcome) = self.cached(source) {
            return Ok(outcome);
        }

        self.staging.ensure()?;
        let _lock = self.staging.lock(source.file_name())?;
        // Another fetch may have committed this source while we waited.
        if let Some(outcome) = self.cached(source) {
            return Ok(outcome);
        }

        let staged = self.staging.path_for(source.file_name());
        tracing::info!(
            target: FETCH_TARGET,
            uri = %source.identifier(),
            staged = %staged.display(),
            "fetching source"
        );

        let bytes = self
            .transport
            .transfer(source, &staged, self.observer.as_ref())?;

        self.verify(source, &staged)?;

        if source.is_legacy() {
            let sha1 = checksum::sha1_path(&staged)?;
            let sha256 = checksum::sha256_path(&staged)?;
            self.store.check_alias(&sha1, &sha256)?;
        }

        let committed = self.store.commit(&staged, source.file_name())?;
        let legacy_alias = if source.is_legacy() {
            Some(self.store.alias_legacy(&committed.sha256, &committed.path)?)
        } else {
            None
        };

        tracing::info!(
            target: FETCH_TARGET,
            uri = %source.identifier(),
            sha256 = %committed.sha256,
            bytes,
            path = %committed.path.display(),
            "source committed"
        );
        Ok(FetchOutcome::Fetched {
            path: committed.path,
            sha256: committed.sha256,
            legacy_alias,
            bytes,
        })
    }

    fn cached(&self, source: &SourceDescriptor) -> Option<FetchOutcome> {
        let path = self.store.lookup(source.validator(), source.file_name())?;
        tracing::info!(
            target: FETCH_TARGET,
            uri = %source.identifier(),
            path = %path.display(),
            "source already cached"
        );
        Some(FetchOutcome::Cached { path })
    }

    /// Compare the staged file with the validator in its algorithm. An empty
    /// validator means the hash is not known yet; nothing to compare.
    fn verify(&self, source: &SourceDescriptor, staged: &Path) -> Result<(), FetchError> {
        let expected = source.validator();
        if expected.is_empty() {
            tracing::debug!(uri = %source.identifier(), "no validator, skipping verification");
            return Ok(());
        }
        let algorithm = if source.is_legacy() {
            HashAlgorithm::Sha1
        } else {
            HashAlgorithm::Sha256
        };
        let actual = checksum::digest_path(staged, algorithm)?;
        if actual == expected {
            return Ok(());
        }

        match self.verify {
            VerifyPolicy::Strict => Err(FetchError::HashMismatch {
                path: staged.to_path_buf(),
                algorithm: algorithm.name(),
                expected: expected.to_string(),
                actual,
            }),
            VerifyPolicy::Warn => {
                tracing::warn!(
                    target: FETCH_TARGET,
                    uri = %source.identifier(),
                    algorithm = algorithm.name(),
                    %expected,
                    %actual,
                    "downloaded source does not match its validator; committing under the computed hash"
                );
                Ok(())
            }
        }
    }
}
