//! `ipfs:` URIs
//!
//! Accepted forms (all normalize to the same locator):
//! `ipfs:<hash>[/path]`, `ipfs:/<hash>[/path]`, `ipfs://<hash>[/path]`,
//! each with an optional trailing slash.

/// URI scheme for IPFS content
pub const IPFS_SCHEME: &str = "ipfs";

/// A parsed `ipfs:` URI
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpfsUri {
    /// Root multihash (the expected content hash)
    root: String,
    /// Path below the root, without leading or trailing slashes
    path: Option<String>,
}

impl IpfsUri {
    /// Parse an `ipfs:` URI, returning `None` for anything malformed
    pub fn parse(uri: &str) -> Option<Self> {
        let (scheme, rest) = uri.split_once(':')?;
        if scheme != IPFS_SCHEME {
            return None;
        }

        // `//authority/path` or a bare path
        let locator = match rest.strip_prefix("//") {
            Some(authority_and_path) => {
                let (netloc, path) = match authority_and_path.find('/') {
                    Some(idx) => authority_and_path.split_at(idx),
                    None => (authority_and_path, ""),
                };
                if netloc.is_empty() {
                    path.trim_matches('/').to_string()
                } else {
                    format!("{}{}", netloc, path.trim_end_matches('/'))
                }
            }
            None => rest.trim_matches('/').to_string(),
        };

        if locator.is_empty() {
            return None;
        }

        let (root, path) = match locator.split_once('/') {
            Some((root, path)) if !path.is_empty() => (root.to_string(), Some(path.to_string())),
            Some((root, _)) => (root.to_string(), None),
            None => (locator, None),
        };
        if root.is_empty() {
            return None;
        }

        Some(Self { root, path })
    }

    /// Root hash segment
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Path below the root, if any
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Root plus path, as sent to a node or gateway
    pub fn locator(&self) -> String {
        match &self.path {
            Some(path) => format!("{}/{}", self.root, path),
            None => self.root.clone(),
        }
    }
}

/// Check whether `value` is a well-formed `ipfs:` URI
pub fn is_ipfs_uri(value: &str) -> bool {
    IpfsUri::parse(value).is_some()
}

/// Extract `hash[/path]` from an `ipfs:` URI
pub fn extract_ipfs_path(value: &str) -> Option<String> {
    IpfsUri::parse(value).map(|uri| uri.locator())
}

/// Build the canonical `ipfs://` URI for a hash
pub fn create_ipfs_uri(hash: &str) -> String {
    format!("{}://{}", IPFS_SCHEME, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "QmTKB75Y73zhNbD3Y73xeXGjYrZHmaXXNxoZqGCagu7r8u";

    #[test]
    fn test_extract_path_all_prefixes() {
        for prefix in ["ipfs:", "ipfs:/", "ipfs://"] {
            for suffix in ["", "/"] {
                let uri = format!("{}{}{}", prefix, HASH, suffix);
                assert_eq!(extract_ipfs_path(&uri).as_deref(), Some(HASH), "{}", uri);

                let uri = format!("{}{}/readme{}", prefix, HASH, suffix);
                assert_eq!(
                    extract_ipfs_path(&uri),
                    Some(format!("{}/readme", HASH)),
                    "{}",
                    uri
                );
            }
        }
    }

    #[test]
    fn test_root_and_path_split() {
        let root_only = IpfsUri::parse(&format!("ipfs://{}/", HASH)).unwrap();
        assert_eq!(root_only.root(), HASH);
        assert_eq!(root_only.path(), None);

        let nested = IpfsUri::parse(&format!("ipfs:{}/docs/readme/", HASH)).unwrap();
        assert_eq!(nested.root(), HASH);
        assert_eq!(nested.path(), Some("docs/readme"));
    }

    #[test]
    fn test_is_ipfs_uri() {
        assert!(is_ipfs_uri(&format!("ipfs:{}", HASH)));
        assert!(is_ipfs_uri(&format!("ipfs://{}/readme/", HASH)));

        let rejected = [
            format!("ipfs//{}/readme/", HASH),
            format!("ipfs/{}/readme/", HASH),
            format!("ipfs{}/readme/", HASH),
            format!("http://{}/readme", HASH),
            format!("https://{}/readme", HASH),
            "ipfs://".to_string(),
            "ipfs:".to_string(),
            "ipfs:/".to_string(),
        ];
        for uri in &rejected {
            assert!(!is_ipfs_uri(uri), "{}", uri);
        }
    }

    #[test]
    fn test_create_ipfs_uri() {
        let uri = create_ipfs_uri(HASH);
        assert_eq!(uri, format!("ipfs://{}", HASH));
        assert_eq!(IpfsUri::parse(&uri).unwrap().root(), HASH);
    }
}
