//! Package registry pointer URIs
//!
//! `erc1319://<registry>[:<chain_id>]/<package>[?version=<version>]`
//!
//! The registry is a `0x`-prefixed contract address or an ENS name. These
//! URIs carry no content hash and resolve only by translation.

/// URI scheme for registry pointers
pub const REGISTRY_SCHEME: &str = "erc1319";

/// Chain id assumed when the URI omits one (mainnet)
pub const DEFAULT_CHAIN_ID: u64 = 1;

/// A parsed registry pointer URI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryUri {
    /// Registry contract address or ENS name
    pub registry: String,
    pub chain_id: u64,
    pub package: String,
    pub version: Option<String>,
}

impl RegistryUri {
    /// Parse a registry URI, returning `None` for anything malformed
    pub fn parse(uri: &str) -> Option<Self> {
        let rest = uri
            .strip_prefix(REGISTRY_SCHEME)
            .and_then(|rest| rest.strip_prefix("://"))?;
        if rest.contains('#') {
            return None;
        }

        let (location, query) = match rest.split_once('?') {
            Some((location, query)) => (location, Some(query)),
            None => (rest, None),
        };
        let (authority, package) = location.split_once('/')?;

        let (registry, chain_id) = match authority.split_once(':') {
            Some((registry, chain_id)) => (registry, chain_id.parse::<u64>().ok()?),
            None => (authority, DEFAULT_CHAIN_ID),
        };
        if !is_registry_authority(registry) || chain_id == 0 {
            return None;
        }

        let package = package.trim_end_matches('/');
        if !is_package_name(package) {
            return None;
        }

        let version = match query {
            None => None,
            Some(query) => match query.split_once('=') {
                Some(("version", version)) if !version.is_empty() && !version.contains('&') => {
                    Some(version.to_string())
                }
                _ => return None,
            },
        };

        Some(Self {
            registry: registry.to_ascii_lowercase(),
            chain_id,
            package: package.to_string(),
            version,
        })
    }
}

/// Check whether `uri` is a well-formed registry pointer
pub fn is_registry_uri(uri: &str) -> bool {
    RegistryUri::parse(uri).is_some()
}

fn is_registry_authority(value: &str) -> bool {
    let is_address = value
        .strip_prefix("0x")
        .map(|hex| hex.len() == 40 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
        .unwrap_or(false);
    let is_ens = value.len() > 4
        && value.ends_with(".eth")
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.');
    is_address || is_ens
}

/// Package names: `^[a-z][-a-z0-9]{0,255}$`
fn is_package_name(value: &str) -> bool {
    let mut bytes = value.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }
    value.len() <= 256
        && bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
}
