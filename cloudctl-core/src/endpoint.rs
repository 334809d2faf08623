//! # Endpoint Resolution
//!
//! Computes the concrete network address to dial for a logical service.
//!
//! An environment is configured with a single endpoint, in one of three shapes:
//!
//! * `grpc://host:port` - a local, plaintext deployment exposing every service on one address.
//! * `grpc+ssl://identity.api.dev.example.dev:443` - a direct TLS address for one service. Other
//!   services live on sibling hosts that only differ on the first DNS label.
//! * `http(s)://console.api.dev.example.dev` - an HTTP gateway. The direct address of the
//!   bootstrap service is discovered through the gateway, with a naming fallback when the
//!   gateway does not know it.
use http::Uri;
use std::fmt::{self, Display};
use std::future::Future;
use std::str::FromStr;

/// Service whose direct address is looked up through the HTTP gateway.
pub const BOOTSTRAP_SERVICE: &str = "identity";

const DEFAULT_TLS_PORT: u16 = 443;
const MIN_DIRECT_HOST_LABELS: usize = 4;

/// Multi-word service names whose host label differs from the plain lowercase form.
const HOST_LABELS: &[(&str, &str)] = &[
    ("costanalysis", "cost-analysis"),
    ("filemanager", "file-manager"),
    ("alertmanager", "alert-manager"),
];

#[derive(Debug, thiserror::Error)]
pub enum EndpointError {
    #[error("Invalid {field} '{value}': {reason}")]
    Malformed {
        field: &'static str,
        value: String,
        reason: String,
    },
    #[error("Failed to discover the '{service}' endpoint through '{gateway}': {source}")]
    DiscoveryFailed {
        service: &'static str,
        gateway: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Transport policy of a resolved endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    InsecureLocal,
    Tls,
}

/// The concrete address to dial for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
}

impl ServiceEndpoint {
    /// The URI handed to the transport layer. The scheme decides whether TLS is used.
    pub fn uri(&self) -> String {
        match self.scheme {
            Scheme::InsecureLocal => format!("http://{}:{}", self.host, self.port),
            Scheme::Tls => format!("https://{}:{}", self.host, self.port),
        }
    }
}

impl Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// The endpoint configured for an environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentEndpoint {
    InsecureLocal { host: String, port: u16 },
    Direct { host: String, port: u16 },
    Gateway {
        url: String,
        host: String,
        port: Option<u16>,
    },
}

impl EnvironmentEndpoint {
    pub fn parse(value: &str) -> Result<Self, EndpointError> {
        let malformed = |reason: &str| EndpointError::Malformed {
            field: "endpoint",
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let uri = Uri::from_str(value).map_err(|e| malformed(&e.to_string()))?;
        let host = uri
            .host()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| malformed("missing host"))?
            .to_string();
        let port = uri.port_u16();

        match uri.scheme_str() {
            Some("grpc") => Ok(Self::InsecureLocal {
                host,
                port: port.ok_or_else(|| malformed("a local endpoint requires a port"))?,
            }),
            Some("grpc+ssl") => Ok(Self::Direct {
                host,
                port: port.unwrap_or(DEFAULT_TLS_PORT),
            }),
            Some("http") | Some("https") => Ok(Self::Gateway {
                url: value.trim_end_matches('/').to_string(),
                host,
                port,
            }),
            Some(other) => Err(malformed(&format!("unsupported scheme '{other}'"))),
            None => Err(malformed("missing scheme")),
        }
    }

    /// Name of the service the environment endpoint itself points at, if it is a direct one.
    pub fn current_service(&self) -> Option<&str> {
        match self {
            Self::Direct { host, .. } => host.split('.').next(),
            _ => None,
        }
    }
}

/// Looks up the direct address of the bootstrap service behind an HTTP gateway.
pub trait BootstrapDiscovery {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the `grpc+ssl://` address of the bootstrap service, or `None` if the gateway does
    /// not expose it.
    fn discover_bootstrap_endpoint(
        &self,
        gateway_url: &str,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;
}

/// Normalises a service short name into its DNS host label.
pub fn canonical_service_name(service: &str) -> String {
    let collapsed: String = service
        .chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect();

    HOST_LABELS
        .iter()
        .find(|(name, _)| *name == collapsed)
        .map(|(_, label)| label.to_string())
        .unwrap_or_else(|| service.to_lowercase().replace('_', "-"))
}

/// Resolves the address to dial for `service` in the given environment.
pub async fn resolve<D>(
    service: &str,
    environment: &EnvironmentEndpoint,
    discovery: &D,
) -> Result<ServiceEndpoint, EndpointError>
where
    D: BootstrapDiscovery,
{
    match environment {
        EnvironmentEndpoint::InsecureLocal { host, port } => Ok(ServiceEndpoint {
            scheme: Scheme::InsecureLocal,
            host: host.clone(),
            port: *port,
        }),
        EnvironmentEndpoint::Direct { host, port } => direct_endpoint(service, host, *port),
        EnvironmentEndpoint::Gateway { url, host, port } => {
            let bootstrap = discovery
                .discover_bootstrap_endpoint(url)
                .await
                .map_err(|e| EndpointError::DiscoveryFailed {
                    service: BOOTSTRAP_SERVICE,
                    gateway: url.clone(),
                    source: Box::new(e),
                })?;

            match bootstrap {
                Some(address) => match EnvironmentEndpoint::parse(&address)? {
                    EnvironmentEndpoint::Direct { host, port } => {
                        direct_endpoint(service, &host, port)
                    }
                    _ => Err(EndpointError::Malformed {
                        field: "bootstrap endpoint",
                        value: address,
                        reason: "expected a grpc+ssl:// address".to_string(),
                    }),
                },
                None => {
                    tracing::debug!(
                        gateway = %url,
                        "bootstrap service not exposed, deriving host from gateway"
                    );
                    direct_endpoint(service, host, port.unwrap_or(DEFAULT_TLS_PORT))
                }
            }
        }
    }
}

/// Swaps the first label of a TLS host for the service label. Hosts with fewer than
/// [`MIN_DIRECT_HOST_LABELS`] labels have no sibling naming scheme to follow.
fn direct_endpoint(
    service: &str,
    host: &str,
    port: u16,
) -> Result<ServiceEndpoint, EndpointError> {
    if host.split('.').count() < MIN_DIRECT_HOST_LABELS {
        return Err(EndpointError::Malformed {
            field: "endpoint",
            value: host.to_string(),
            reason: format!("expected at least {MIN_DIRECT_HOST_LABELS} DNS labels"),
        });
    }

    Ok(ServiceEndpoint {
        scheme: Scheme::Tls,
        host: replace_first_label(host, service),
        port,
    })
}

fn replace_first_label(host: &str, service: &str) -> String {
    let label = canonical_service_name(service);
    match host.split_once('.') {
        Some((_, rest)) => format!("{label}.{rest}"),
        None => label,
    }
}
