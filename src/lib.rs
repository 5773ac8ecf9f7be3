//! Content-addressed URI resolver
//!
//! Resolves `ipfs:`, GitHub blob and registry pointer URIs to bytes through
//! pluggable transport backends. Content is only returned after its hash has
//! been recomputed locally and matched against the URI.

pub mod backend;
pub mod config;
pub mod hash;
pub mod resolve;
pub mod uri;

pub use backend::{BackendError, Fetched, IpfsBackend, PinnedAsset, UriBackend};
pub use config::{BackendKind, Config, ConfigError};
pub use hash::{hash_content, verify, HashError, Multihash};
pub use resolve::{BackendRegistry, ResolveError};
