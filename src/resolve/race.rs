//! Concurrent resolution
//!
//! Every capable backend fetches at once; the first verified content wins and
//! the remaining fetches are aborted before the race returns.

use super::{BackendRegistry, Capability, ResolveError};
use crate::backend::{BackendResult, Fetched, UriBackend};
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;

type FetchOutcome = (String, BackendResult<Fetched>);

impl BackendRegistry {
    /// Resolve many URIs concurrently, each by racing its capable backends.
    ///
    /// Duplicate URIs are resolved once. The first URI to fail fails the batch;
    /// URIs still in flight are cancelled.
    pub async fn resolve_batch<I, S>(
        &self,
        uris: I,
    ) -> Result<HashMap<String, Vec<u8>>, ResolveError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut races = JoinSet::new();

        for uri in uris {
            let uri = uri.into();
            if !seen.insert(uri.clone()) {
                continue;
            }
            let registry = self.clone();
            races.spawn(async move { registry.race_uri(uri).await });
        }

        let mut resolved = HashMap::new();
        while let Some(joined) = races.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    races.shutdown().await;
                    return Err(ResolveError::Task(e.to_string()));
                }
            };
            match outcome {
                Ok((uri, content)) => {
                    resolved.insert(uri, content);
                }
                Err(e) => {
                    races.shutdown().await;
                    return Err(e);
                }
            }
        }
        Ok(resolved)
    }

    /// Resolve a single URI by racing its capable backends
    pub async fn resolve_racing(&self, uri: &str) -> Result<Vec<u8>, ResolveError> {
        let (_, content) = self.race_uri(uri.to_string()).await?;
        Ok(content)
    }

    /// Build the candidates for `uri`, check they are available, then race them.
    ///
    /// The race timeout starts before the availability checks, so slow checks count against it.
    async fn race_uri(&self, uri: String) -> Result<(String, Vec<u8>), ResolveError> {
        let timeout = self.race_timeout;
        let deadline = Instant::now() + timeout;

        let checked =
            tokio::time::timeout_at(deadline, self.candidates(&uri, Capability::Resolve)).await;
        let candidates = match checked {
            Ok(candidates) => candidates,
            Err(_) => return Err(timed_out(uri, timeout)),
        };
        log::debug!("Racing {} backends for {}", candidates.len(), uri);
        race_until(uri, candidates, deadline, timeout).await
    }
}

/// Race `backends` for `uri`, bounded by `timeout`.
///
/// Returns the first verified content. Backends that fail, mismatch or
/// translate are losers and never cancel their siblings. Every spawned fetch
/// has finished or been aborted by the time this returns.
pub async fn race_backends(
    uri: String,
    backends: Vec<Box<dyn UriBackend>>,
    timeout: Duration,
) -> Result<(String, Vec<u8>), ResolveError> {
    race_until(uri, backends, Instant::now() + timeout, timeout).await
}

async fn race_until(
    uri: String,
    backends: Vec<Box<dyn UriBackend>>,
    deadline: Instant,
    timeout: Duration,
) -> Result<(String, Vec<u8>), ResolveError> {
    if backends.is_empty() {
        return Err(ResolveError::Unhandleable {
            uri,
            reason: "no backend can resolve this URI".to_string(),
        });
    }

    let mut tasks = JoinSet::new();
    for backend in backends {
        let uri = uri.clone();
        tasks.spawn(async move {
            let result = backend.fetch(&uri).await;
            (backend.name().to_string(), result)
        });
    }

    let outcome = tokio::time::timeout_at(deadline, first_content(&uri, &mut tasks)).await;
    tasks.shutdown().await;

    match outcome {
        Ok(Ok(content)) => Ok((uri, content)),
        Ok(Err(reason)) => Err(ResolveError::Unhandleable { uri, reason }),
        Err(_) => Err(timed_out(uri, timeout)),
    }
}

fn timed_out(uri: String, after: Duration) -> ResolveError {
    log::warn!("Race for {} timed out after {:?}", uri, after);
    ResolveError::Timeout { uri, after }
}

/// Wait for the first task yielding content; otherwise describe every failure
async fn first_content(uri: &str, tasks: &mut JoinSet<FetchOutcome>) -> Result<Vec<u8>, String> {
    let mut failures = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((name, Ok(Fetched::Content(content)))) => {
                log::info!("{} won the race for {} ({} bytes)", name, uri, content.len());
                return Ok(content);
            }
            Ok((name, Ok(Fetched::Uri(other)))) => {
                log::debug!("{} translated {} to {} during a race", name, uri, other);
                failures.push(format!("{}: returned a URI", name));
            }
            Ok((name, Err(e))) => {
                log::debug!("{} lost the race for {}: {}", name, uri, e);
                failures.push(format!("{}: {}", name, e));
            }
            Err(e) => {
                failures.push(format!("fetch task failed: {}", e));
            }
        }
    }

    Err(failures.join("; "))
}
