//! Content-addressed GitHub blob URIs
//!
//! `https://api.github.com/repos/<owner>/<repo>/git/blobs/<sha1>`

use url::Url;

/// Host serving the GitHub REST API
pub const GITHUB_API_AUTHORITY: &str = "api.github.com";

/// A parsed GitHub blob URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubBlobUri {
    pub owner: String,
    pub repo: String,
    /// Git blob object id (40 lowercase hex chars)
    pub blob_hash: String,
}

impl GithubBlobUri {
    /// Parse a GitHub blob URI, returning `None` for anything else
    pub fn parse(uri: &str) -> Option<Self> {
        let url = Url::parse(uri).ok()?;
        if url.scheme() != "https" || url.host_str() != Some(GITHUB_API_AUTHORITY) {
            return None;
        }
        if url.query().is_some() || url.fragment().is_some() {
            return None;
        }

        let segments: Vec<&str> = url.path_segments()?.collect();
        match segments.as_slice() {
            ["repos", owner, repo, "git", "blobs", blob_hash]
                if !owner.is_empty() && !repo.is_empty() && is_git_hash(blob_hash) =>
            {
                Some(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                    blob_hash: blob_hash.to_string(),
                })
            }
            _ => None,
        }
    }

    /// API path for this blob, relative to the API root
    pub fn api_path(&self) -> String {
        format!(
            "repos/{}/{}/git/blobs/{}",
            self.owner, self.repo, self.blob_hash
        )
    }
}

/// Check whether `uri` is a content-addressed GitHub blob URI
pub fn is_valid_content_addressed_github_uri(uri: &str) -> bool {
    GithubBlobUri::parse(uri).is_some()
}

fn is_git_hash(value: &str) -> bool {
    value.len() == 40 && value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
