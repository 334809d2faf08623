//! # Environment Cache
//!
//! Per-environment files under `<home>/cache/<environment>/`:
//!
//! * `access_token` - the token of `-user` environments.
//! * `endpoints.yaml` - the `service -> endpoint` catalog listed by the gateway or the bootstrap
//!   service. Entries older than a day are ignored.
//!
//! The access token is written by the login flow; this module only reads it.
use cloudctl_core::registry::EndpointMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const CACHE_DIR_NAME: &str = "cache";
const ACCESS_TOKEN_FILE: &str = "access_token";
const ENDPOINTS_FILE: &str = "endpoints.yaml";

/// How long a cached endpoint catalog stays valid.
pub const ENDPOINTS_MAX_AGE: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Failed to access cache file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Corrupted cache file '{path}': {source}")]
    Corrupted {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedEndpoints {
    /// Seconds since the Unix epoch.
    updated_at: u64,
    endpoints: EndpointMap,
}

#[derive(Debug, Clone)]
pub struct EnvironmentCache {
    dir: PathBuf,
}

impl EnvironmentCache {
    pub fn new(home: &Path, environment: &str) -> Self {
        Self {
            dir: home.join(CACHE_DIR_NAME).join(environment),
        }
    }

    /// The cached access token, if there is a non-empty one.
    pub fn access_token(&self) -> Option<String> {
        let path = self.dir.join(ACCESS_TOKEN_FILE);
        match std::fs::read_to_string(&path) {
            Ok(token) => Some(token.trim().to_string()).filter(|t| !t.is_empty()),
            Err(err) => {
                tracing::debug!(path = %path.display(), error = %err, "no cached access token");
                None
            }
        }
    }

    /// Reads the endpoint catalog. Returns `None` when there is none or it is older than
    /// [`ENDPOINTS_MAX_AGE`] at `now`.
    pub fn load_endpoints(&self, now: SystemTime) -> Result<Option<EndpointMap>, CacheError> {
        let path = self.dir.join(ENDPOINTS_FILE);
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&path).map_err(|source| CacheError::Io {
            path: path.clone(),
            source,
        })?;
        let cached: CachedEndpoints = serde_yaml_ng::from_str(&content)
            .map_err(|source| CacheError::Corrupted { path, source })?;

        let age = unix_seconds(now).saturating_sub(cached.updated_at);
        if age > ENDPOINTS_MAX_AGE.as_secs() {
            tracing::debug!(age, "cached endpoints expired");
            return Ok(None);
        }

        Ok(Some(cached.endpoints))
    }

    pub fn store_endpoints(
        &self,
        endpoints: &EndpointMap,
        now: SystemTime,
    ) -> Result<(), CacheError> {
        let path = self.dir.join(ENDPOINTS_FILE);
        let cached = CachedEndpoints {
            updated_at: unix_seconds(now),
            endpoints: endpoints.clone(),
        };
        let content = serde_yaml_ng::to_string(&cached).map_err(|source| CacheError::Corrupted {
            path: path.clone(),
            source,
        })?;

        std::fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;
        std::fs::write(&path, content).map_err(|source| CacheError::Io { path, source })
    }
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
