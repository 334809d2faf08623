//! # Service Registry
//!
//! The set of platform services the CLI dispatches to, built once from the endpoint catalog of
//! an environment (usually read back from the local cache) and handed to the dispatcher.
//!
//! An environment pointing straight at one service (`grpc+ssl://inventory.api...`) only exposes
//! that service; the bootstrap service and the other environment shapes expose the catalog.
//!
//! Loading the catalog is best effort: [`warm_up`] runs the loader on the blocking pool and
//! waits for it a bounded amount of time. The caller gets either the complete value or nothing.
use crate::endpoint::{BOOTSTRAP_SERVICE, EnvironmentEndpoint};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Display;
use std::time::Duration;

/// A `service -> endpoint URL` catalog.
pub type EndpointMap = BTreeMap<String, String>;

/// Known services, sorted by name.
///
/// Names are compared on their canonical form (lowercase, `-` read as `_`), so `cost-analysis`
/// and `cost_analysis` are the same service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceRegistry {
    /// Canonical name to the name as listed.
    services: BTreeMap<String, String>,
}

fn canonical_key(service: &str) -> String {
    service.trim().to_lowercase().replace('-', "_")
}

impl ServiceRegistry {
    pub fn new<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let services = names
            .into_iter()
            .map(|name| (canonical_key(name.as_ref()), name.as_ref().to_string()))
            .collect();

        Self { services }
    }

    /// The services reachable from `environment`, given its endpoint catalog.
    pub fn for_environment(catalog: &EndpointMap, environment: &EnvironmentEndpoint) -> Self {
        match environment.current_service() {
            Some(current) if canonical_key(current) != BOOTSTRAP_SERVICE => {
                tracing::debug!(service = current, "environment is scoped to one service");
                Self::new([current])
            }
            _ => Self::new(catalog.keys()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn contains(&self, service: &str) -> bool {
        self.services.contains_key(&canonical_key(service))
    }

    /// Service names as listed in the catalog.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.services.values().map(String::as_str)
    }
}

/// Reads a `service -> endpoint` catalog out of an endpoint listing (`{results: [...]}`).
/// Items without a string `service` and `endpoint` are skipped.
pub fn catalog_from_results(listing: &Value) -> EndpointMap {
    listing
        .get("results")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| {
            let service = item.get("service")?.as_str()?;
            let endpoint = item.get("endpoint")?.as_str()?;
            Some((service.to_string(), endpoint.to_string()))
        })
        .collect()
}

/// Runs `loader` on the blocking pool and waits at most `timeout` for it.
///
/// Returns `None` when the loader fails, panics or does not finish in time.
pub async fn warm_up<F, T, E>(loader: F, timeout: Duration) -> Option<T>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Display + Send + 'static,
{
    let task = tokio::task::spawn_blocking(loader);

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(Ok(value))) => Some(value),
        Ok(Ok(Err(err))) => {
            tracing::debug!(error = %err, "warm-up loader failed");
            None
        }
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "warm-up task failed");
            None
        }
        Err(_) => {
            tracing::warn!(?timeout, "warm-up did not complete in time");
            None
        }
    }
}
