//! # Service and Method Discovery
//!
//! Maps a `(service, resource)` pair typed by the user to a fully qualified gRPC service name,
//! picked among the names listed by the reflection server.
//!
//! Plugin services shadow the versioned API namespace: a service name containing the plugin
//! marker and ending with the resource wins over `spaceone.api.<service>.*` candidates. Within a
//! tier, the first match in server order wins. When an API version is requested, only the
//! `spaceone.api.<service>.<version>.*` package of the versioned tier is considered.
use prost_reflect::{MethodDescriptor, ServiceDescriptor};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DiscoverError {
    #[error("Resource '{resource}' not found in service '{service}'")]
    ServiceNotFound { service: String, resource: String },
    #[error("Method '{method}' not found in '{service}'")]
    MethodNotFound { service: String, method: String },
}

/// The naming rules used to recognise platform services.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamingConvention {
    /// Substring marking plugin services.
    pub plugin_marker: String,
    /// Prefix of the versioned API packages, followed by `.<service>`.
    pub api_namespace: String,
    /// Version package (`v1`, `v2`, ...) required in the versioned tier. Any when unset.
    pub api_version: Option<String>,
}

impl Default for NamingConvention {
    fn default() -> Self {
        Self {
            plugin_marker: ".plugin.".to_string(),
            api_namespace: "spaceone.api".to_string(),
            api_version: None,
        }
    }
}

impl NamingConvention {
    pub fn with_api_version(mut self, version: Option<&str>) -> Self {
        self.api_version = version
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        self
    }

    fn api_prefix(&self, service: &str) -> String {
        match &self.api_version {
            Some(version) => format!("{}.{}.{}.", self.api_namespace, service, version),
            None => format!("{}.{}", self.api_namespace, service),
        }
    }
}

/// Finds the fully qualified service exposing `resource`, using the default naming convention.
pub fn discover(
    service: &str,
    resource: &str,
    available: &[String],
) -> Result<String, DiscoverError> {
    discover_with(&NamingConvention::default(), service, resource, available)
}

pub fn discover_with(
    convention: &NamingConvention,
    service: &str,
    resource: &str,
    available: &[String],
) -> Result<String, DiscoverError> {
    let not_found = || DiscoverError::ServiceNotFound {
        service: service.to_string(),
        resource: resource.to_string(),
    };

    if resource.is_empty() {
        return Err(not_found());
    }

    let api_prefix = convention.api_prefix(service);
    let matches = |name: &&String, marker: &str| name.contains(marker) && name.ends_with(resource);

    let found = available
        .iter()
        .find(|name| matches(name, &convention.plugin_marker))
        .or_else(|| available.iter().find(|name| matches(name, &api_prefix)))
        .ok_or_else(not_found)?;

    tracing::debug!(service, resource, resolved = %found, "discovered service");
    Ok(found.clone())
}

/// Finds `verb` among the methods of `service`.
pub fn find_method(
    service: &ServiceDescriptor,
    verb: &str,
) -> Result<MethodDescriptor, DiscoverError> {
    service
        .methods()
        .find(|m| m.name() == verb)
        .ok_or_else(|| DiscoverError::MethodNotFound {
            service: service.full_name().to_string(),
            method: verb.to_string(),
        })
}
