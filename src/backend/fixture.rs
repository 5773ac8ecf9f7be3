//! In-memory fixture backend
//!
//! Serves content held in memory, keyed by its IPFS hash. Useful for tests
//! and offline work; pinning only computes hashes and never publishes.

use super::{
    asset_files, ensure_hash, verifiable_ipfs_uri, BackendError, BackendResult, Fetched,
    IpfsBackend, PinnedAsset, UriBackend,
};
use crate::hash::hash_content;
use crate::uri::{create_ipfs_uri, IpfsUri};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Content served from memory by hash
#[derive(Debug, Clone, Default)]
pub struct FixtureBackend {
    contents: Arc<HashMap<String, Vec<u8>>>,
}

impl FixtureBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every file below `dir`, recursively
    pub fn from_dir(dir: &Path) -> BackendResult<Self> {
        let mut backend = Self::new();
        let mut pending = vec![dir.to_path_buf()];
        while let Some(current) = pending.pop() {
            for entry in std::fs::read_dir(&current)? {
                let entry = entry?;
                let file_type = entry.file_type()?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if file_type.is_file() {
                    backend.insert(std::fs::read(entry.path())?);
                }
            }
        }
        log::debug!("Loaded {} fixtures from {:?}", backend.len(), dir);
        Ok(backend)
    }

    /// Add content, returning its `ipfs://` URI
    pub fn insert(&mut self, content: Vec<u8>) -> String {
        let hash = hash_content(&content).to_base58();
        let uri = create_ipfs_uri(&hash);
        Arc::make_mut(&mut self.contents).insert(hash, content);
        uri
    }

    /// Builder form of `insert`
    pub fn with_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.insert(content.into());
        self
    }

    /// URIs of all held content
    pub fn uris(&self) -> Vec<String> {
        let mut uris: Vec<String> = self.contents.keys().map(|h| create_ipfs_uri(h)).collect();
        uris.sort();
        uris
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }
}

#[async_trait]
impl UriBackend for FixtureBackend {
    fn name(&self) -> &str {
        "fixture"
    }

    fn can_resolve(&self, uri: &str) -> bool {
        match IpfsUri::parse(uri) {
            Some(parsed) => parsed.path().is_none() && self.contents.contains_key(parsed.root()),
            None => false,
        }
    }

    fn can_translate(&self, _uri: &str) -> bool {
        false
    }

    async fn fetch(&self, uri: &str) -> BackendResult<Fetched> {
        let target = verifiable_ipfs_uri(self.name(), uri)?;
        let content = self.contents.get(target.root()).ok_or_else(|| {
            BackendError::CannotHandle(format!("no fixture for {}", target.root()))
        })?;
        ensure_hash(uri, target.root(), content)?;
        Ok(Fetched::Content(content.clone()))
    }
}

#[async_trait]
impl IpfsBackend for FixtureBackend {
    async fn pin_assets(&self, path: &Path) -> BackendResult<Vec<PinnedAsset>> {
        let mut pinned = Vec::new();
        for file in asset_files(path)? {
            let content = tokio::fs::read(&file).await?;
            pinned.push(PinnedAsset {
                hash: hash_content(&content).to_base58(),
                name: file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                size: content.len().to_string(),
            });
        }
        Ok(pinned)
    }
}
