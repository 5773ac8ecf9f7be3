//! GitHub blob backend
//!
//! Fetches blobs through the GitHub REST API. The blob id in the URI is the
//! git object hash of the content, so every response is checked against it.

use super::{BackendError, BackendResult, Fetched, UriBackend};
use crate::hash::git_blob_hash;
use crate::uri::GithubBlobUri;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::ACCEPT;
use reqwest::Client;
use serde::Deserialize;

/// The part of GitHub's blob response we use
#[derive(Debug, Deserialize)]
struct BlobEnvelope {
    content: String,
    encoding: String,
}

/// Backend for `https://api.github.com/repos/<o>/<r>/git/blobs/<sha>`
#[derive(Debug, Clone)]
pub struct GithubBlobBackend {
    api_base: String,
    client: Client,
}

impl GithubBlobBackend {
    /// Create a backend that sends requests to `api_base`
    pub fn new(api_base: &str, client: Client) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn decode(envelope: BlobEnvelope) -> BackendResult<Vec<u8>> {
        if envelope.encoding != "base64" {
            return Err(BackendError::MalformedResponse(format!(
                "expected base64 blob encoding, got {}",
                envelope.encoding
            )));
        }
        // GitHub wraps base64 content at 60 columns
        let packed: String = envelope
            .content
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        STANDARD
            .decode(packed)
            .map_err(|e| BackendError::MalformedResponse(format!("blob content: {}", e)))
    }
}

#[async_trait]
impl UriBackend for GithubBlobBackend {
    fn name(&self) -> &str {
        "github"
    }

    fn can_resolve(&self, uri: &str) -> bool {
        GithubBlobUri::parse(uri).is_some()
    }

    fn can_translate(&self, _uri: &str) -> bool {
        false
    }

    async fn fetch(&self, uri: &str) -> BackendResult<Fetched> {
        let blob = GithubBlobUri::parse(uri).ok_or_else(|| {
            BackendError::CannotHandle(format!("{} is not a GitHub blob URI", uri))
        })?;

        let url = format!("{}/{}", self.api_base, blob.api_path());
        log::debug!("Fetching {}", url);

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::HttpStatus {
                backend: self.name().to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let envelope: BlobEnvelope = serde_json::from_slice(&body)
            .map_err(|e| BackendError::MalformedResponse(format!("blob envelope: {}", e)))?;
        let content = Self::decode(envelope)?;

        let actual = git_blob_hash(&content);
        if actual != blob.blob_hash {
            return Err(BackendError::ContentMismatch {
                uri: uri.to_string(),
                expected: blob.blob_hash,
                actual,
            });
        }
        Ok(Fetched::Content(content))
    }
}
