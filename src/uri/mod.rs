//! URI model
//!
//! Recognizes the URI schemes the resolver deals with. Parsing is pure and
//! total: anything unrecognized or malformed yields `None`.

pub mod blockchain;
pub mod github;
pub mod ipfs;
pub mod registry;

pub use blockchain::{is_block_uri, BlockchainUri, ResourceKind};
pub use github::{is_valid_content_addressed_github_uri, GithubBlobUri, GITHUB_API_AUTHORITY};
pub use ipfs::{create_ipfs_uri, extract_ipfs_path, is_ipfs_uri, IpfsUri};
pub use registry::{is_registry_uri, RegistryUri};

/// Scheme families
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// `ipfs:` content-addressed
    Ipfs,
    /// GitHub blob over HTTPS, content-addressed by git object id
    GithubBlob,
    /// Registry pointer, translation only
    Registry,
    /// BIP-122 blockchain resource
    Blockchain,
}

impl Scheme {
    /// Whether the locator itself names the expected content hash
    pub fn is_content_addressed(self) -> bool {
        matches!(self, Scheme::Ipfs | Scheme::GithubBlob)
    }
}

/// A URI decomposed by scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedUri {
    Ipfs(IpfsUri),
    GithubBlob(GithubBlobUri),
    Registry(RegistryUri),
    Blockchain(BlockchainUri),
}

impl ParsedUri {
    /// Parse any supported URI
    pub fn parse(uri: &str) -> Option<Self> {
        if let Some(parsed) = IpfsUri::parse(uri) {
            return Some(ParsedUri::Ipfs(parsed));
        }
        if let Some(parsed) = GithubBlobUri::parse(uri) {
            return Some(ParsedUri::GithubBlob(parsed));
        }
        if let Some(parsed) = RegistryUri::parse(uri) {
            return Some(ParsedUri::Registry(parsed));
        }
        BlockchainUri::parse(uri).map(ParsedUri::Blockchain)
    }

    /// Scheme family of this URI
    pub fn scheme(&self) -> Scheme {
        match self {
            ParsedUri::Ipfs(_) => Scheme::Ipfs,
            ParsedUri::GithubBlob(_) => Scheme::GithubBlob,
            ParsedUri::Registry(_) => Scheme::Registry,
            ParsedUri::Blockchain(_) => Scheme::Blockchain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dispatch() {
        let cases = [
            ("ipfs://QmTKB75Y73zhNbD3Y73xeXGjYrZHmaXXNxoZqGCagu7r8u", Scheme::Ipfs),
            (
                "https://api.github.com/repos/ethpm/py-ethpm/git/blobs/a7232a93f1e9e75d606f6c1da18aa16037e03480",
                Scheme::GithubBlob,
            ),
            (
                "erc1319://0x6b5da3ca4286baa7fbaf64eeee1834c7d430b729:1/owned?version=1.0.0",
                Scheme::Registry,
            ),
            (
                "blockchain://41941023680923e0fe4d74a34bdac8141f2540e3ae90623718e47d66d1ca4a2d/block/1e96de11320c83cca02e8b9caf3e489497e8e432befe5379f2f08599f8aecede",
                Scheme::Blockchain,
            ),
        ];

        for (uri, scheme) in cases {
            assert_eq!(ParsedUri::parse(uri).map(|p| p.scheme()), Some(scheme), "{}", uri);
        }
    }

    #[test]
    fn test_unrecognized() {
        assert!(ParsedUri::parse("https://example.com/file").is_none());
        assert!(ParsedUri::parse("ipfs//QmTKB75Y73zhNbD3Y73xeXGjYrZHmaXXNxoZqGCagu7r8u").is_none());
        assert!(ParsedUri::parse("").is_none());
    }

    #[test]
    fn test_content_addressed_schemes() {
        assert!(Scheme::Ipfs.is_content_addressed());
        assert!(Scheme::GithubBlob.is_content_addressed());
        assert!(!Scheme::Registry.is_content_addressed());
        assert!(!Scheme::Blockchain.is_content_addressed());
    }
}
