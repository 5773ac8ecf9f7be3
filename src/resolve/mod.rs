//! Backend registry and resolution
//!
//! The registry holds an ordered list of backend factories. Resolution builds
//! fresh backends for each request, keeps the ones capable of handling the
//! URI, and tries them (sequentially here, concurrently in `race`).

pub mod race;

pub use race::race_backends;

use crate::backend::fixture::FixtureBackend;
use crate::backend::github::GithubBlobBackend;
use crate::backend::ipfs::{IpfsFlavor, IpfsHttpBackend};
use crate::backend::registry::RegistryBackend;
use crate::backend::{http_client, write_new_file, BackendError, BackendResult, Fetched, UriBackend};
use crate::config::{BackendKind, Config, ConfigError};
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Translation hops allowed before a URI must resolve directly
pub const MAX_TRANSLATION_DEPTH: usize = 1;

/// Race timeout used when none is configured
pub const DEFAULT_RACE_TIMEOUT: Duration = Duration::from_secs(30);

/// Resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("cannot resolve {uri}: {reason}")]
    Unhandleable { uri: String, reason: String },

    #[error("resolving {uri} timed out after {after:?}")]
    Timeout { uri: String, after: Duration },

    #[error("resolution task failed: {0}")]
    Task(String),

    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl ResolveError {
    fn unhandleable(uri: &str, failures: &[String]) -> Self {
        let reason = if failures.is_empty() {
            "no backend can resolve or translate this URI".to_string()
        } else {
            failures.join("; ")
        };
        ResolveError::Unhandleable {
            uri: uri.to_string(),
            reason,
        }
    }
}

/// Builds a fresh backend instance
pub type BackendFactory = Arc<dyn Fn() -> BackendResult<Box<dyn UriBackend>> + Send + Sync>;

#[derive(Clone)]
struct RegisteredBackend {
    name: String,
    factory: BackendFactory,
}

/// Which capability a candidate must have
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Capability {
    Resolve,
    Translate,
}

/// Ordered set of backend factories
#[derive(Clone)]
pub struct BackendRegistry {
    backends: Vec<RegisteredBackend>,
    default_backend: Option<String>,
    race_timeout: Duration,
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            backends: Vec::new(),
            default_backend: None,
            race_timeout: DEFAULT_RACE_TIMEOUT,
        }
    }

    /// Registry with every known backend, configured from `config`.
    ///
    /// Fails with `MissingDefaultBackend` when neither the config file nor
    /// the environment chose a default IPFS backend.
    pub fn from_config(config: &Config) -> Result<Self, ResolveError> {
        let default = config.default_backend()?;
        let client = http_client(config)?;

        let mut registry = Self::new()
            .with_default(default.as_str())
            .with_race_timeout(config.resolver.race_timeout());

        for kind in BackendKind::ALL {
            let factory = kind_factory(kind, config, &client)?;
            registry.backends.push(RegisteredBackend {
                name: kind.as_str().to_string(),
                factory,
            });
        }

        log::info!(
            "Backend registry ready: default {}, race timeout {:?}",
            default.as_str(),
            registry.race_timeout
        );
        Ok(registry)
    }

    /// Append a backend factory; later registrations are tried later
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> BackendResult<Box<dyn UriBackend>> + Send + Sync + 'static,
    {
        self.backends.push(RegisteredBackend {
            name: name.into(),
            factory: Arc::new(factory),
        });
    }

    /// Try the named backend before all others
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default_backend = Some(name.into());
        self
    }

    /// Bound for a whole race
    pub fn with_race_timeout(mut self, timeout: Duration) -> Self {
        self.race_timeout = timeout;
        self
    }

    pub fn race_timeout(&self) -> Duration {
        self.race_timeout
    }

    /// Registered names in declaration order
    pub fn names(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name.as_str()).collect()
    }

    /// Default backend first, then the rest in declaration order
    fn ordered(&self) -> impl Iterator<Item = &RegisteredBackend> + '_ {
        let default = self.default_backend.as_deref();
        let first = self
            .backends
            .iter()
            .filter(move |b| Some(b.name.as_str()) == default);
        let rest = self
            .backends
            .iter()
            .filter(move |b| Some(b.name.as_str()) != default);
        first.chain(rest)
    }

    /// Fresh, available backends with `capability` for `uri`, in order.
    ///
    /// Factory and probe failures mean the backend is absent.
    pub(crate) async fn candidates(
        &self,
        uri: &str,
        capability: Capability,
    ) -> Vec<Box<dyn UriBackend>> {
        let mut found = Vec::new();
        for entry in self.ordered() {
            let backend = match (entry.factory)() {
                Ok(backend) => backend,
                Err(e) => {
                    log::debug!("Backend {} unavailable: {}", entry.name, e);
                    continue;
                }
            };

            let capable = match capability {
                Capability::Resolve => backend.can_resolve(uri),
                Capability::Translate => backend.can_translate(uri),
            };
            if !capable {
                continue;
            }

            if let Err(e) = backend.probe().await {
                log::debug!("Backend {} failed its probe: {}", entry.name, e);
                continue;
            }
            found.push(backend);
        }
        found
    }

    /// Resolve `uri` to verified content, trying backends one at a time
    pub async fn resolve(&self, uri: &str) -> Result<Vec<u8>, ResolveError> {
        self.resolve_at_depth(uri, 0).await
    }

    fn resolve_at_depth<'a>(
        &'a self,
        uri: &'a str,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<u8>, ResolveError>> + Send + 'a>> {
        Box::pin(async move {
            let mut failures = Vec::new();

            for backend in self.candidates(uri, Capability::Resolve).await {
                match backend.fetch(uri).await {
                    Ok(Fetched::Content(content)) => {
                        log::info!(
                            "Resolved {} via {} ({} bytes)",
                            uri,
                            backend.name(),
                            content.len()
                        );
                        return Ok(content);
                    }
                    Ok(Fetched::Uri(other)) => {
                        log::warn!(
                            "Backend {} returned {} instead of content",
                            backend.name(),
                            other
                        );
                        failures.push(format!("{}: returned a URI", backend.name()));
                    }
                    Err(e) => {
                        log::warn!("Backend {} failed for {}: {}", backend.name(), uri, e);
                        failures.push(format!("{}: {}", backend.name(), e));
                    }
                }
            }

            let translators = self.candidates(uri, Capability::Translate).await;
            let Some(translator) = translators.into_iter().next() else {
                return Err(ResolveError::unhandleable(uri, &failures));
            };

            if depth >= MAX_TRANSLATION_DEPTH {
                return Err(ResolveError::Unhandleable {
                    uri: uri.to_string(),
                    reason: "a translated URI must resolve directly, not translate again"
                        .to_string(),
                });
            }

            let target = match translator.fetch(uri).await {
                Ok(Fetched::Uri(target)) => target,
                Ok(Fetched::Content(_)) => {
                    return Err(ResolveError::Unhandleable {
                        uri: uri.to_string(),
                        reason: format!("{} returned content instead of a URI", translator.name()),
                    })
                }
                Err(e) => {
                    return Err(ResolveError::Unhandleable {
                        uri: uri.to_string(),
                        reason: format!("{}: {}", translator.name(), e),
                    })
                }
            };

            log::info!("Translated {} to {} via {}", uri, target, translator.name());
            self.resolve_at_depth(&target, depth + 1).await
        })
    }

    /// Resolve `uri` and write it to `target`, which must not exist
    pub async fn write_to_disk(&self, uri: &str, target: &Path) -> Result<(), ResolveError> {
        if target.exists() {
            return Err(BackendError::TargetExists(target.to_path_buf()).into());
        }
        let content = self.resolve(uri).await?;
        write_new_file(target, &content)?;
        log::info!("Wrote {} to {:?}", uri, target);
        Ok(())
    }
}

fn kind_factory(
    kind: BackendKind,
    config: &Config,
    client: &reqwest::Client,
) -> Result<BackendFactory, ResolveError> {
    let http = |flavor: IpfsFlavor, base: &str| -> BackendFactory {
        let base = base.to_string();
        let client = client.clone();
        Arc::new(move || -> BackendResult<Box<dyn UriBackend>> {
            Ok(Box::new(IpfsHttpBackend::new(flavor, &base, client.clone())?))
        })
    };

    let factory: BackendFactory = match kind {
        BackendKind::Infura => http(IpfsFlavor::Infura, &config.ipfs.infura_api),
        BackendKind::Gateway => http(IpfsFlavor::Gateway, &config.ipfs.gateway),
        BackendKind::Local => http(IpfsFlavor::LocalNode, &config.ipfs.local_api),
        BackendKind::Fixture => {
            let fixtures = match &config.fixture.assets_dir {
                Some(dir) => FixtureBackend::from_dir(dir)?,
                None => FixtureBackend::new(),
            };
            Arc::new(move || -> BackendResult<Box<dyn UriBackend>> {
                Ok(Box::new(fixtures.clone()))
            })
        }
        BackendKind::Github => {
            let api_base = config.github.api_base.clone();
            let client = client.clone();
            Arc::new(move || -> BackendResult<Box<dyn UriBackend>> {
                Ok(Box::new(GithubBlobBackend::new(&api_base, client.clone())))
            })
        }
        BackendKind::Registry => {
            let registry = RegistryBackend::from_config(&config.registry)?;
            Arc::new(move || -> BackendResult<Box<dyn UriBackend>> {
                Ok(Box::new(registry.clone()))
            })
        }
    };
    Ok(factory)
}
