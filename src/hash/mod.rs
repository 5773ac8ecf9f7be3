//! Content hashing engine
//!
//! Reproduces the IPFS UnixFS/dag-pb CIDv0 hash: content is chunked,
//! wrapped in protobuf nodes, and the serialized root node is hashed into
//! a base58 sha2-256 multihash.

pub mod dag;
mod pb;

use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use dag::{
    assemble_branch, content_node, generate_links, hash_content, verify, ContentNode, Link,
    CHUNK_SIZE, LINK_OVERHEAD, MAX_LINKS_PER_NODE,
};

/// Multihash code for sha2-256
pub const SHA2_256: u8 = 0x12;

/// Digest length of sha2-256 in bytes
pub const DIGEST_LEN: usize = 32;

/// Hashing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HashError {
    #[error("cannot assemble a branch node without chunks")]
    EmptyBranch,

    #[error("interior chunk {index} has {len} bytes, expected {expected}")]
    ShortChunk {
        index: usize,
        len: usize,
        expected: usize,
    },

    #[error("final chunk is empty")]
    EmptyFinalChunk,

    #[error("chunk {index} has {len} bytes, exceeding the chunk size")]
    OversizedChunk { index: usize, len: usize },

    #[error("invalid multihash: {0}")]
    InvalidMultihash(String),
}

/// sha2-256 multihash of a serialized node
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Multihash([u8; DIGEST_LEN]);

impl Multihash {
    /// Hash serialized node bytes
    pub fn from_data(data: &[u8]) -> Self {
        Multihash(Sha256::digest(data).into())
    }

    /// Raw digest bytes
    pub fn digest(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Binary form: `code || length || digest`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(2 + DIGEST_LEN);
        bytes.push(SHA2_256);
        bytes.push(DIGEST_LEN as u8);
        bytes.extend_from_slice(&self.0);
        bytes
    }

    /// Base58 text form (`Qm...`)
    pub fn to_base58(&self) -> String {
        bs58::encode(self.to_bytes()).into_string()
    }

    /// Parse from base58 text
    pub fn from_base58(s: &str) -> Result<Self, HashError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|e| HashError::InvalidMultihash(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Parse from the binary `code || length || digest` form
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, HashError> {
        match bytes {
            [SHA2_256, len, digest @ ..]
                if *len as usize == DIGEST_LEN && digest.len() == DIGEST_LEN =>
            {
                let mut arr = [0u8; DIGEST_LEN];
                arr.copy_from_slice(digest);
                Ok(Multihash(arr))
            }
            [SHA2_256, ..] => Err(HashError::InvalidMultihash(format!(
                "expected {} byte digest",
                DIGEST_LEN
            ))),
            [code, ..] => Err(HashError::InvalidMultihash(format!(
                "unsupported hash function 0x{:02x}",
                code
            ))),
            [] => Err(HashError::InvalidMultihash("empty input".to_string())),
        }
    }
}

impl fmt::Debug for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Multihash({})", self.to_base58())
    }
}

impl fmt::Display for Multihash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl FromStr for Multihash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

/// Git blob object id: hex SHA-1 of `"blob <len>\0" || content`
pub fn git_blob_hash(content: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content);
    hex::encode(hasher.finalize())
}
