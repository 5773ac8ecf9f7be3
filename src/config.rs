//! Configuration file parsing
//!
//! Parses TOML configuration for the resolver. Every section is optional;
//! the default IPFS backend may also come from the environment.

use crate::uri::{ParsedUri, RegistryUri};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Environment variable selecting the default IPFS backend
pub const DEFAULT_BACKEND_ENV: &str = "CAS_RESOLVER_IPFS_BACKEND";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("no default IPFS backend: set [ipfs] default_backend or {}", DEFAULT_BACKEND_ENV)]
    MissingDefaultBackend,
}

/// Known backend implementations, in registry declaration order
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Infura pinning service API
    Infura,
    /// Public read-only gateway
    Gateway,
    /// In-memory fixtures for tests
    Fixture,
    /// Local IPFS node HTTP API
    Local,
    /// GitHub blob API
    Github,
    /// Registry pointer translation
    Registry,
}

impl BackendKind {
    /// Every kind in declaration order
    pub const ALL: [BackendKind; 6] = [
        BackendKind::Infura,
        BackendKind::Gateway,
        BackendKind::Fixture,
        BackendKind::Local,
        BackendKind::Github,
        BackendKind::Registry,
    ];

    /// Name used in config files and the environment
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Infura => "infura",
            BackendKind::Gateway => "gateway",
            BackendKind::Fixture => "fixture",
            BackendKind::Local => "local",
            BackendKind::Github => "github",
            BackendKind::Registry => "registry",
        }
    }

    /// Whether this kind serves `ipfs:` URIs
    pub fn is_ipfs(self) -> bool {
        matches!(
            self,
            BackendKind::Infura | BackendKind::Gateway | BackendKind::Fixture | BackendKind::Local
        )
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BackendKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::UnknownBackend(s.to_string()))
    }
}

/// Resolver configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// IPFS transport settings
    #[serde(default)]
    pub ipfs: IpfsConfig,

    /// GitHub API settings
    #[serde(default)]
    pub github: GithubConfig,

    /// Resolution behaviour
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Fixture backend settings
    #[serde(default)]
    pub fixture: FixtureConfig,

    /// Registry pointer translations
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// IPFS transport settings
#[derive(Debug, Clone, Deserialize)]
pub struct IpfsConfig {
    /// Backend tried first for `ipfs:` URIs
    #[serde(default)]
    pub default_backend: Option<BackendKind>,

    /// Local node HTTP API root
    #[serde(default = "default_local_api")]
    pub local_api: String,

    /// Public gateway root
    #[serde(default = "default_gateway")]
    pub gateway: String,

    /// Infura API root
    #[serde(default = "default_infura_api")]
    pub infura_api: String,
}

impl Default for IpfsConfig {
    fn default() -> Self {
        Self {
            default_backend: None,
            local_api: default_local_api(),
            gateway: default_gateway(),
            infura_api: default_infura_api(),
        }
    }
}

fn default_local_api() -> String {
    "http://127.0.0.1:5001".to_string()
}

fn default_gateway() -> String {
    "https://ipfs.io".to_string()
}

fn default_infura_api() -> String {
    "https://ipfs.infura.io:5001".to_string()
}

/// GitHub API settings
#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    /// API root that blob paths are fetched from
    #[serde(default = "default_github_api")]
    pub api_base: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: default_github_api(),
        }
    }
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

/// Resolution behaviour
#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    /// Upper bound on one URI's backend race
    #[serde(default = "default_timeout_secs")]
    pub race_timeout_secs: u64,

    /// Per-request HTTP timeout
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            race_timeout_secs: default_timeout_secs(),
            request_timeout_secs: default_timeout_secs(),
            log_level: default_log_level(),
        }
    }
}

impl ResolverConfig {
    pub fn race_timeout(&self) -> Duration {
        Duration::from_secs(self.race_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Fixture backend settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureConfig {
    /// Directory whose files are served by hash
    #[serde(default)]
    pub assets_dir: Option<PathBuf>,
}

/// Registry pointer translations
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegistryConfig {
    /// Known releases
    #[serde(default, rename = "release")]
    pub releases: Vec<ReleaseConfig>,
}

/// One registry pointer and the manifest it names
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseConfig {
    /// Registry pointer URI
    pub uri: String,
    /// Content-addressed manifest URI
    pub manifest_uri: String,
}

impl Config {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from an optional file, then apply the environment override
    pub fn load_with_env(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// Apply `CAS_RESOLVER_IPFS_BACKEND`, if set
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        let value = std::env::var(DEFAULT_BACKEND_ENV).ok();
        self.override_default_backend(value.as_deref())
    }

    /// Replace the default backend when `value` is non-empty
    pub fn override_default_backend(&mut self, value: Option<&str>) -> Result<(), ConfigError> {
        if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.ipfs.default_backend = Some(value.parse()?);
            self.validate()?;
        }
        Ok(())
    }

    /// The configured default IPFS backend
    pub fn default_backend(&self) -> Result<BackendKind, ConfigError> {
        self.ipfs
            .default_backend
            .ok_or(ConfigError::MissingDefaultBackend)
    }

    /// Validate the configuration
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(kind) = self.ipfs.default_backend {
            if !kind.is_ipfs() {
                return Err(ConfigError::Invalid(format!(
                    "default backend must serve ipfs URIs, got {}",
                    kind.as_str()
                )));
            }
        }

        for (name, value) in [
            ("ipfs.local_api", &self.ipfs.local_api),
            ("ipfs.gateway", &self.ipfs.gateway),
            ("ipfs.infura_api", &self.ipfs.infura_api),
            ("github.api_base", &self.github.api_base),
        ] {
            Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{} is not a URL: {}", name, e)))?;
        }

        if self.resolver.race_timeout_secs == 0 || self.resolver.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeouts must be at least one second".to_string(),
            ));
        }

        for release in &self.registry.releases {
            if RegistryUri::parse(&release.uri).is_none() {
                return Err(ConfigError::Invalid(format!(
                    "not a registry URI: {}",
                    release.uri
                )));
            }
            // A translation must land on content-addressed data
            let target_ok = ParsedUri::parse(&release.manifest_uri)
                .map(|parsed| parsed.scheme().is_content_addressed())
                .unwrap_or(false);
            if !target_ok {
                return Err(ConfigError::Invalid(format!(
                    "manifest URI for {} is not content-addressed: {}",
                    release.uri, release.manifest_uri
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.ipfs.local_api, "http://127.0.0.1:5001");
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert_eq!(config.resolver.race_timeout(), Duration::from_secs(30));
        assert!(matches!(
            config.default_backend(),
            Err(ConfigError::MissingDefaultBackend)
        ));
    }

    #[test]
    fn test_parse_full_config() {
        let config_str = r#"
[ipfs]
default_backend = "local"
local_api = "http://10.0.0.2:5001"

[resolver]
race_timeout_secs = 5
log_level = "debug"

[fixture]
assets_dir = "/data/assets"

[[registry.release]]
uri = "erc1319://packages.eth:1/owned?version=1.0.0"
manifest_uri = "ipfs://QmbeVyFLSuEUxiXKwSsEjef6icpdTdA4kGG9BcrJXKNKUW"
"#;

        let config = Config::parse(config_str).unwrap();
        assert_eq!(config.default_backend().unwrap(), BackendKind::Local);
        assert_eq!(config.ipfs.local_api, "http://10.0.0.2:5001");
        assert_eq!(config.resolver.race_timeout_secs, 5);
        assert_eq!(config.resolver.log_level, "debug");
        assert_eq!(config.fixture.assets_dir, Some(PathBuf::from("/data/assets")));
        assert_eq!(config.registry.releases.len(), 1);
    }

    #[test]
    fn test_non_ipfs_default_backend_error() {
        let result = Config::parse("[ipfs]\ndefault_backend = \"github\"\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_release_must_target_content_addressed_uri() {
        let config_str = r#"
[[registry.release]]
uri = "erc1319://packages.eth:1/owned"
manifest_uri = "erc1319://packages.eth:1/other"
"#;
        assert!(matches!(
            Config::parse(config_str),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_invalid_url_error() {
        let result = Config::parse("[ipfs]\ngateway = \"not a url\"\n");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_override_default_backend() {
        let mut config = Config::parse("[ipfs]\ndefault_backend = \"infura\"\n").unwrap();

        config.override_default_backend(None).unwrap();
        assert_eq!(config.default_backend().unwrap(), BackendKind::Infura);

        config.override_default_backend(Some("  ")).unwrap();
        assert_eq!(config.default_backend().unwrap(), BackendKind::Infura);

        config.override_default_backend(Some("Fixture")).unwrap();
        assert_eq!(config.default_backend().unwrap(), BackendKind::Fixture);

        assert!(matches!(
            config.override_default_backend(Some("ftp")),
            Err(ConfigError::UnknownBackend(_))
        ));
    }
}
