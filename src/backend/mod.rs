//! URI backends
//!
//! This module defines the UriBackend trait and its transport implementations.
//! A backend either resolves a URI to verified bytes or translates it to
//! another, content-addressed URI.

pub mod fixture;
pub mod github;
pub mod ipfs;
pub mod registry;

use crate::config::{BackendKind, Config};
use crate::hash::{hash_content, verify};
use crate::uri::IpfsUri;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Backend errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("cannot handle URI: {0}")]
    CannotHandle(String),

    #[error("content from {uri} does not match its hash (expected {expected}, got {actual})")]
    ContentMismatch {
        uri: String,
        expected: String,
        actual: String,
    },

    #[error("transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),

    #[error("{backend} returned HTTP {status}")]
    HttpStatus { backend: String, status: u16 },

    #[error("target path already exists: {}", .0.display())]
    TargetExists(PathBuf),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// What a fetch produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    /// Verified content bytes
    Content(Vec<u8>),
    /// A translated, content-addressed URI (not yet verified)
    Uri(String),
}

impl Fetched {
    /// Content bytes, or an error if this was a translation
    pub fn into_content(self, uri: &str) -> BackendResult<Vec<u8>> {
        match self {
            Fetched::Content(content) => Ok(content),
            Fetched::Uri(target) => Err(BackendError::CannotHandle(format!(
                "{} translates to {} and has no content of its own",
                uri, target
            ))),
        }
    }
}

/// URI backend trait - the core abstraction for transports
#[async_trait]
pub trait UriBackend: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Check the transport is reachable.
    /// Failures make the registry treat this backend as absent.
    async fn probe(&self) -> BackendResult<()> {
        Ok(())
    }

    /// Whether this backend can fetch the URI's content.
    /// Local parsing only, no I/O.
    fn can_resolve(&self, uri: &str) -> bool;

    /// Whether this backend can translate the URI to a content-addressed URI.
    /// Local parsing only, no I/O.
    fn can_translate(&self, uri: &str) -> bool;

    /// Fetch verified content, or a translated URI
    async fn fetch(&self, uri: &str) -> BackendResult<Fetched>;

    /// Write the URI's content to `target`, which must not exist
    async fn write_to_disk(&self, uri: &str, target: &Path) -> BackendResult<()> {
        if target.exists() {
            return Err(BackendError::TargetExists(target.to_path_buf()));
        }
        let content = self.fetch(uri).await?.into_content(uri)?;
        write_new_file(target, &content)
    }
}

/// Backends that can also publish content to IPFS
#[async_trait]
pub trait IpfsBackend: UriBackend {
    /// Pin a file, or every file in a directory, returning what was added
    async fn pin_assets(&self, path: &Path) -> BackendResult<Vec<PinnedAsset>>;
}

/// Result of adding one file to IPFS
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedAsset {
    #[serde(rename = "Hash")]
    pub hash: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Size")]
    pub size: String,
}

/// Build a shared HTTP client with the configured request timeout
pub fn http_client(config: &Config) -> BackendResult<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(config.resolver.request_timeout())
        .user_agent(concat!("cas-resolver/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Instantiate an IPFS backend of the given kind
pub fn ipfs_backend(
    kind: BackendKind,
    config: &Config,
    client: reqwest::Client,
) -> BackendResult<Box<dyn IpfsBackend>> {
    use self::ipfs::{IpfsFlavor, IpfsHttpBackend};

    let backend: Box<dyn IpfsBackend> = match kind {
        BackendKind::Local => Box::new(IpfsHttpBackend::new(
            IpfsFlavor::LocalNode,
            &config.ipfs.local_api,
            client,
        )?),
        BackendKind::Infura => Box::new(IpfsHttpBackend::new(
            IpfsFlavor::Infura,
            &config.ipfs.infura_api,
            client,
        )?),
        BackendKind::Gateway => Box::new(IpfsHttpBackend::new(
            IpfsFlavor::Gateway,
            &config.ipfs.gateway,
            client,
        )?),
        BackendKind::Fixture => Box::new(match &config.fixture.assets_dir {
            Some(dir) => fixture::FixtureBackend::from_dir(dir)?,
            None => fixture::FixtureBackend::new(),
        }),
        BackendKind::Github | BackendKind::Registry => {
            return Err(BackendError::CannotHandle(format!(
                "{} is not an IPFS backend",
                kind.as_str()
            )))
        }
    };
    Ok(backend)
}

/// Parse an `ipfs:` URI whose root content can be verified.
///
/// Content below a path is a different node than the root hash names, so
/// it cannot be checked against the URI and is refused.
pub(crate) fn verifiable_ipfs_uri(backend: &str, uri: &str) -> BackendResult<IpfsUri> {
    let parsed = IpfsUri::parse(uri)
        .ok_or_else(|| BackendError::CannotHandle(format!("{} cannot resolve {}", backend, uri)))?;
    if let Some(path) = parsed.path() {
        return Err(BackendError::CannotHandle(format!(
            "{} names path {} below {}, which cannot be verified against the root hash",
            uri,
            path,
            parsed.root()
        )));
    }
    Ok(parsed)
}

/// Fail with `ContentMismatch` unless `content` hashes to `expected`
pub(crate) fn ensure_hash(uri: &str, expected: &str, content: &[u8]) -> BackendResult<()> {
    if verify(content, expected) {
        return Ok(());
    }
    Err(BackendError::ContentMismatch {
        uri: uri.to_string(),
        expected: expected.to_string(),
        actual: hash_content(content).to_base58(),
    })
}

/// Files to pin for `path`: the file itself, or a directory's files by name
pub(crate) fn asset_files(path: &Path) -> BackendResult<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(BackendError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("{} is not a valid file or directory path", path.display()),
        )));
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(path)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Write `content` to `target` without ever overwriting it.
///
/// The bytes go to a temporary file next to the target first; the target is
/// either absent or complete. The temporary file is removed on any error.
pub fn write_new_file(target: &Path, content: &[u8]) -> BackendResult<()> {
    if target.exists() {
        return Err(BackendError::TargetExists(target.to_path_buf()));
    }

    let dir = match target.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;

    temp.persist_noclobber(target).map_err(|e| {
        if e.error.kind() == std::io::ErrorKind::AlreadyExists {
            BackendError::TargetExists(target.to_path_buf())
        } else {
            BackendError::Io(e.error)
        }
    })?;

    log::debug!("Wrote {} bytes to {:?}", content.len(), target);
    Ok(())
}
