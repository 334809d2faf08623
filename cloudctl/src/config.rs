//! # Settings
//!
//! Reads `setting.yaml` from the cloudctl home directory (`~/.cloudctl` unless overridden):
//!
//! ```yaml
//! environment: dev-user
//! environments:
//!   dev-user:
//!     endpoint: grpc+ssl://identity.api.dev.example.dev:443
//!   dev-app:
//!     endpoint: https://console.api.dev.example.dev
//!     token: "..."
//! aliases:
//!   identity:
//!     ls: list User
//! ```
//!
//! Environments whose name ends with `-user` authenticate with the access token cached under
//! `cache/<environment>/access_token`; other environments carry their token in the settings.
use crate::cache::EnvironmentCache;
use cloudctl_core::alias::AliasTable;
use cloudctl_core::endpoint::{EndpointError, EnvironmentEndpoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const HOME_DIR_NAME: &str = ".cloudctl";
pub const SETTINGS_FILE: &str = "setting.yaml";
const USER_ENVIRONMENT_SUFFIX: &str = "-user";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unable to find the home directory, use --config-dir to set the settings location")]
    NoHomeDirectory,
    #[error("Settings file '{0}' not found")]
    NotFound(PathBuf),
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml_ng::Error,
    },
    #[error("No environment selected, set 'environment' in the settings file")]
    NoEnvironment,
    #[error("Environment '{0}' is not defined in the settings file")]
    UnknownEnvironment(String),
    #[error("Environment '{0}' has no endpoint")]
    MissingEndpoint(String),
    #[error(transparent)]
    InvalidEndpoint(#[from] EndpointError),
}

/// Connection settings of one environment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    #[serde(default)]
    pub environments: BTreeMap<String, EnvironmentSettings>,
    #[serde(default)]
    pub aliases: AliasTable,
}

/// The environment an invocation runs against.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveEnvironment {
    pub name: String,
    pub endpoint: EnvironmentEndpoint,
    pub token: Option<String>,
}

/// Resolves the cloudctl home directory: the explicit override, else `~/.cloudctl`.
pub fn home_dir(config_dir: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    match config_dir {
        Some(dir) => Ok(dir),
        None => dirs::home_dir()
            .map(|home| home.join(HOME_DIR_NAME))
            .ok_or(ConfigError::NoHomeDirectory),
    }
}

impl Settings {
    pub fn load(home: &Path) -> Result<Self, ConfigError> {
        let path = home.join(SETTINGS_FILE);
        if !path.exists() {
            return Err(ConfigError::NotFound(path));
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;

        let settings = serde_yaml_ng::from_str::<Option<Settings>>(&content)
            .map_err(|source| ConfigError::Parse { path, source })?
            .unwrap_or_default();

        tracing::debug!(
            environment = ?settings.environment,
            environments = settings.environments.len(),
            "loaded settings"
        );
        Ok(settings)
    }

    /// The selected environment, with its parsed endpoint and token.
    pub fn active(&self, home: &Path) -> Result<ActiveEnvironment, ConfigError> {
        let name = self
            .environment
            .as_deref()
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::NoEnvironment)?;

        let environment = self
            .environments
            .get(name)
            .ok_or_else(|| ConfigError::UnknownEnvironment(name.to_string()))?;

        let endpoint = environment
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::MissingEndpoint(name.to_string()))?;

        let token = if name.ends_with(USER_ENVIRONMENT_SUFFIX) {
            EnvironmentCache::new(home, name)
                .access_token()
                .or_else(|| environment.token.clone())
        } else {
            environment.token.clone()
        };

        Ok(ActiveEnvironment {
            name: name.to_string(),
            endpoint: EnvironmentEndpoint::parse(endpoint)?,
            token,
        })
    }
}
