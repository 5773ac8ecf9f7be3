//! IPFS over HTTP
//!
//! One backend type covers the three HTTP transports: a local node's API, the
//! Infura API, and a read-only public gateway. They differ in endpoint shape
//! and in what they support.

use super::{
    asset_files, ensure_hash, verifiable_ipfs_uri, BackendError, BackendResult, Fetched,
    IpfsBackend, PinnedAsset, UriBackend,
};
use crate::uri::IpfsUri;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use std::path::Path;
use url::Url;

/// Body Infura sends for hashes it will not serve
const INFURA_BAD_REQUEST: &[u8] = b"bad request\n";

/// Which HTTP transport a backend talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpfsFlavor {
    /// A node's API on this machine
    LocalNode,
    /// The Infura IPFS API
    Infura,
    /// A public gateway (read only)
    Gateway,
}

impl IpfsFlavor {
    fn name(self) -> &'static str {
        match self {
            IpfsFlavor::LocalNode => "local",
            IpfsFlavor::Infura => "infura",
            IpfsFlavor::Gateway => "gateway",
        }
    }
}

/// IPFS backend over HTTP
#[derive(Debug, Clone)]
pub struct IpfsHttpBackend {
    flavor: IpfsFlavor,
    base: Url,
    client: Client,
}

impl IpfsHttpBackend {
    /// Create a backend for `base`, sharing `client`'s connection pool
    pub fn new(flavor: IpfsFlavor, base: &str, client: Client) -> BackendResult<Self> {
        let base = Url::parse(base).map_err(|e| {
            BackendError::TransportUnavailable(format!("invalid endpoint {}: {}", base, e))
        })?;
        Ok(Self {
            flavor,
            base,
            client,
        })
    }

    /// Transport flavor
    pub fn flavor(&self) -> IpfsFlavor {
        self.flavor
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base.as_str().trim_end_matches('/'), path)
    }

    /// Raw bytes for a root hash, unverified
    async fn cat(&self, root: &str) -> BackendResult<Vec<u8>> {
        let response = match self.flavor {
            IpfsFlavor::Gateway => {
                self.client
                    .get(self.endpoint(&format!("ipfs/{}", root)))
                    .send()
                    .await?
            }
            IpfsFlavor::LocalNode | IpfsFlavor::Infura => {
                self.client
                    .post(self.endpoint("api/v0/cat"))
                    .query(&[("arg", root)])
                    .send()
                    .await?
            }
        };

        let status = response.status();
        let body = response.bytes().await?;

        if self.flavor == IpfsFlavor::Infura && &body[..] == INFURA_BAD_REQUEST {
            return Err(BackendError::CannotHandle(format!(
                "infura refused to serve {}",
                root
            )));
        }
        if !status.is_success() {
            return Err(self.status_error(status));
        }
        Ok(body.to_vec())
    }

    async fn add_file(&self, path: &Path) -> BackendResult<PinnedAsset> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let content = tokio::fs::read(path).await?;

        let form = Form::new().part("file", Part::bytes(content).file_name(name));
        let response = self
            .client
            .post(self.endpoint("api/v0/add"))
            .query(&[("pin", "true")])
            .multipart(form)
            .send()
            .await?;
        let response = self.check_status(response)?;

        let body = response.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|e| BackendError::MalformedResponse(format!("add response: {}", e)))
    }

    fn check_status(&self, response: Response) -> BackendResult<Response> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(self.status_error(status))
        }
    }

    fn status_error(&self, status: reqwest::StatusCode) -> BackendError {
        BackendError::HttpStatus {
            backend: self.flavor.name().to_string(),
            status: status.as_u16(),
        }
    }
}

#[async_trait]
impl UriBackend for IpfsHttpBackend {
    fn name(&self) -> &str {
        self.flavor.name()
    }

    async fn probe(&self) -> BackendResult<()> {
        if self.flavor != IpfsFlavor::LocalNode {
            return Ok(());
        }

        let unavailable = |reason: String| {
            BackendError::TransportUnavailable(format!(
                "no IPFS node at {}: {}",
                self.base, reason
            ))
        };
        let response = self
            .client
            .post(self.endpoint("api/v0/version"))
            .send()
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unavailable(format!("HTTP {}", response.status().as_u16())));
        }
        Ok(())
    }

    fn can_resolve(&self, uri: &str) -> bool {
        IpfsUri::parse(uri).is_some_and(|parsed| parsed.path().is_none())
    }

    fn can_translate(&self, _uri: &str) -> bool {
        false
    }

    async fn fetch(&self, uri: &str) -> BackendResult<Fetched> {
        let target = verifiable_ipfs_uri(self.name(), uri)?;
        log::debug!("Fetching {} from {} via {}", target.root(), self.base, self.name());

        let content = self.cat(target.root()).await?;
        ensure_hash(uri, target.root(), &content)?;
        Ok(Fetched::Content(content))
    }
}

#[async_trait]
impl IpfsBackend for IpfsHttpBackend {
    async fn pin_assets(&self, path: &Path) -> BackendResult<Vec<PinnedAsset>> {
        if self.flavor == IpfsFlavor::Gateway {
            return Err(BackendError::CannotHandle(
                "IPFS gateways are read only, use a different backend to pin assets".to_string(),
            ));
        }

        let mut pinned = Vec::new();
        for file in asset_files(path)? {
            let asset = self.add_file(&file).await?;
            log::info!("Pinned {:?} as {} via {}", file, asset.hash, self.name());
            pinned.push(asset);
        }
        Ok(pinned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend(flavor: IpfsFlavor, base: &str) -> IpfsHttpBackend {
        IpfsHttpBackend::new(flavor, base, Client::new()).unwrap()
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let local = backend(IpfsFlavor::LocalNode, "http://127.0.0.1:5001");
        assert_eq!(local.endpoint("api/v0/cat"), "http://127.0.0.1:5001/api/v0/cat");

        let gateway = backend(IpfsFlavor::Gateway, "https://ipfs.io/");
        assert_eq!(gateway.endpoint("ipfs/Qm"), "https://ipfs.io/ipfs/Qm");
    }

    #[test]
    fn test_invalid_endpoint() {
        let result = IpfsHttpBackend::new(IpfsFlavor::Gateway, "not a url", Client::new());
        assert!(matches!(result, Err(BackendError::TransportUnavailable(_))));
    }

    #[test]
    fn test_capabilities() {
        let gateway = backend(IpfsFlavor::Gateway, "https://ipfs.io");
        assert!(gateway.can_resolve("ipfs://QmUdxEGxvp71kqYLkA91mtNg9QRRSPBtA3UV6VuYhoP7DB"));
        assert!(!gateway.can_resolve("https://ipfs.io/ipfs/Qm"));
        assert!(!gateway.can_translate("ipfs://QmUdxEGxvp71kqYLkA91mtNg9QRRSPBtA3UV6VuYhoP7DB"));
        assert_eq!(gateway.name(), "gateway");
    }

    #[tokio::test]
    async fn test_gateway_refuses_pinning() {
        let gateway = backend(IpfsFlavor::Gateway, "https://ipfs.io");
        let result = gateway.pin_assets(Path::new(".")).await;
        assert!(matches!(result, Err(BackendError::CannotHandle(_))));
    }

    #[test]
    fn test_path_uris_are_not_resolvable() {
        let root = "ipfs://QmUdxEGxvp71kqYLkA91mtNg9QRRSPBtA3UV6VuYhoP7DB";
        for flavor in [IpfsFlavor::LocalNode, IpfsFlavor::Infura, IpfsFlavor::Gateway] {
            let http = backend(flavor, "http://127.0.0.1:5001");
            assert!(http.can_resolve(root));
            assert!(!http.can_resolve(&format!("{}/readme", root)));
            assert!(!http.can_resolve("ipfs:QmUdxEGxvp71kqYLkA91mtNg9QRRSPBtA3UV6VuYhoP7DB/a/b"));
        }
    }

    #[tokio::test]
    async fn test_path_uris_are_refused() {
        let gateway = backend(IpfsFlavor::Gateway, "http://127.0.0.1:9");
        let result = gateway
            .fetch("ipfs://QmUdxEGxvp71kqYLkA91mtNg9QRRSPBtA3UV6VuYhoP7DB/readme")
            .await;
        assert!(matches!(result, Err(BackendError::CannotHandle(_))));
    }
}
