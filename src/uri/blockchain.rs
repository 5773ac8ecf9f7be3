//! BIP-122 blockchain resource URIs
//!
//! `blockchain://<chain_id>/<block|transaction>/<hash>`, where the chain id is
//! the 64-hex genesis block hash. Only parsed here; deployment matching
//! consumes them elsewhere.

use url::Url;

/// URI scheme for blockchain resources
pub const BLOCKCHAIN_SCHEME: &str = "blockchain";

/// Kind of resource a blockchain URI names
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Block,
    Transaction,
}

/// A parsed blockchain resource URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockchainUri {
    /// Genesis block hash (64 hex chars, no prefix)
    pub chain_id: String,
    pub kind: ResourceKind,
    /// Resource hash (64 hex chars, no prefix)
    pub resource_hash: String,
}

impl BlockchainUri {
    /// Parse a blockchain URI, returning `None` for anything malformed
    pub fn parse(uri: &str) -> Option<Self> {
        let url = Url::parse(uri).ok()?;
        if url.scheme() != BLOCKCHAIN_SCHEME || url.query().is_some() || url.fragment().is_some() {
            return None;
        }

        let chain_id = url.host_str()?;
        let segments: Vec<&str> = url.path_segments()?.collect();
        let (kind, resource_hash) = match segments.as_slice() {
            ["block", hash] => (ResourceKind::Block, *hash),
            ["transaction", hash] => (ResourceKind::Transaction, *hash),
            _ => return None,
        };

        if !is_hex_32(chain_id) || !is_hex_32(resource_hash) {
            return None;
        }

        Some(Self {
            chain_id: chain_id.to_string(),
            kind,
            resource_hash: resource_hash.to_string(),
        })
    }

    /// Render back to canonical text
    pub fn to_uri(&self) -> String {
        let kind = match self.kind {
            ResourceKind::Block => "block",
            ResourceKind::Transaction => "transaction",
        };
        format!(
            "{}://{}/{}/{}",
            BLOCKCHAIN_SCHEME, self.chain_id, kind, self.resource_hash
        )
    }
}

/// Check whether `uri` is a block URI
pub fn is_block_uri(uri: &str) -> bool {
    matches!(
        BlockchainUri::parse(uri),
        Some(BlockchainUri {
            kind: ResourceKind::Block,
            ..
        })
    )
}

fn is_hex_32(value: &str) -> bool {
    value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit())
}
