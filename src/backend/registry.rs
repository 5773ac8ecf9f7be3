//! Registry pointer backend
//!
//! Translates `erc1319:` pointers to the content-addressed URI of the release
//! manifest they name. Looking a release up is delegated to a ReleaseLookup;
//! without one the backend declines every URI.

use super::{BackendError, BackendResult, Fetched, UriBackend};
use crate::config::RegistryConfig;
use crate::uri::{ParsedUri, RegistryUri};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Source of release manifests for registry pointers
#[async_trait]
pub trait ReleaseLookup: Send + Sync {
    /// Manifest URI for a release
    async fn manifest_uri(&self, release: &RegistryUri) -> BackendResult<String>;
}

/// Releases known ahead of time, e.g. from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticReleases {
    releases: HashMap<RegistryUri, String>,
}

impl StaticReleases {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from the `[[registry.release]]` tables
    pub fn from_config(config: &RegistryConfig) -> BackendResult<Self> {
        let mut releases = Self::new();
        for release in &config.releases {
            releases.insert(&release.uri, &release.manifest_uri)?;
        }
        Ok(releases)
    }

    /// Record that `uri` points at `manifest_uri`
    pub fn insert(&mut self, uri: &str, manifest_uri: &str) -> BackendResult<()> {
        let release = RegistryUri::parse(uri).ok_or_else(|| {
            BackendError::CannotHandle(format!("{} is not a registry URI", uri))
        })?;
        self.releases.insert(release, manifest_uri.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

#[async_trait]
impl ReleaseLookup for StaticReleases {
    async fn manifest_uri(&self, release: &RegistryUri) -> BackendResult<String> {
        self.releases.get(release).cloned().ok_or_else(|| {
            BackendError::CannotHandle(format!(
                "no release of {} known on registry {}",
                release.package, release.registry
            ))
        })
    }
}

/// Backend translating registry pointers to manifest URIs
#[derive(Clone, Default)]
pub struct RegistryBackend {
    lookup: Option<Arc<dyn ReleaseLookup>>,
}

impl RegistryBackend {
    /// A backend with no lookup; it declines everything
    pub fn unconfigured() -> Self {
        Self { lookup: None }
    }

    /// A backend answering from `lookup`
    pub fn new(lookup: Arc<dyn ReleaseLookup>) -> Self {
        Self {
            lookup: Some(lookup),
        }
    }

    /// A backend over configured releases, unconfigured if there are none
    pub fn from_config(config: &RegistryConfig) -> BackendResult<Self> {
        let releases = StaticReleases::from_config(config)?;
        if releases.is_empty() {
            return Ok(Self::unconfigured());
        }
        Ok(Self::new(Arc::new(releases)))
    }
}

#[async_trait]
impl UriBackend for RegistryBackend {
    fn name(&self) -> &str {
        "registry"
    }

    fn can_resolve(&self, _uri: &str) -> bool {
        false
    }

    fn can_translate(&self, uri: &str) -> bool {
        self.lookup.is_some() && RegistryUri::parse(uri).is_some()
    }

    async fn fetch(&self, uri: &str) -> BackendResult<Fetched> {
        let release = RegistryUri::parse(uri).ok_or_else(|| {
            BackendError::CannotHandle(format!("{} is not a registry URI", uri))
        })?;
        let lookup = self.lookup.as_ref().ok_or_else(|| {
            BackendError::CannotHandle("no registry lookup configured".to_string())
        })?;

        let manifest_uri = lookup.manifest_uri(&release).await?;
        let content_addressed = ParsedUri::parse(&manifest_uri)
            .map(|parsed| parsed.scheme().is_content_addressed())
            .unwrap_or(false);
        if !content_addressed {
            return Err(BackendError::MalformedResponse(format!(
                "{} points at {}, which is not content-addressed",
                uri, manifest_uri
            )));
        }

        log::debug!("Registry pointer {} names {}", uri, manifest_uri);
        Ok(Fetched::Uri(manifest_uri))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const POINTER: &str = "erc1319://0x6b5da3ca4286baa7fbaf64eeee1834c7d430b729:1/owned?version=1.0.0";
    const MANIFEST: &str = "ipfs://QmUdxEGxvp71kqYLkA91mtNg9QRRSPBtA3UV6VuYhoP7DB";

    fn backend_with(manifest: &str) -> RegistryBackend {
        let mut releases = StaticReleases::new();
        releases.insert(POINTER, manifest).unwrap();
        RegistryBackend::new(Arc::new(releases))
    }

    #[test]
    fn test_unconfigured_declines() {
        let backend = RegistryBackend::unconfigured();
        assert!(!backend.can_translate(POINTER));
        assert!(!backend.can_resolve(POINTER));

        let empty = RegistryBackend::from_config(&RegistryConfig::default()).unwrap();
        assert!(!empty.can_translate(POINTER));
    }

    #[tokio::test]
    async fn test_translate_known_release() {
        let backend = backend_with(MANIFEST);
        assert!(backend.can_translate(POINTER));
        assert_eq!(
            backend.fetch(POINTER).await.unwrap(),
            Fetched::Uri(MANIFEST.to_string())
        );
    }

    #[tokio::test]
    async fn test_unknown_release() {
        let backend = backend_with(MANIFEST);
        let other = "erc1319://0x6b5da3ca4286baa7fbaf64eeee1834c7d430b729:1/owned?version=2.0.0";
        assert!(matches!(
            backend.fetch(other).await,
            Err(BackendError::CannotHandle(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_non_content_addressed_target() {
        let backend = backend_with("erc1319://packages.eth/owned");
        assert!(matches!(
            backend.fetch(POINTER).await,
            Err(BackendError::MalformedResponse(_))
        ));
    }
}
