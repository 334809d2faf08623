//! # Service Client
//!
//! Owns the connection of one invocation and drives the whole pipeline on top of it:
//!
//! 1. list the services exposed through reflection,
//! 2. discover the service of the requested resource and the method of the verb,
//! 3. build the request out of the user parameters,
//! 4. invoke the method and post-process the answer.
//!
//! Reflection and invocation share a single transport, so the token attached by
//! [`TokenInterceptor`] is sent on every call. The connection lives exactly as long as the
//! [`ServiceClient`] that owns it and is released when the client is dropped, whichever way the
//! invocation ends.
//!
//! ## Example
//!
//! ```rust,no_run
//! use cloudctl_core::client::{FetchContext, fetch_service};
//! use cloudctl_core::{alias::AliasTable, endpoint::EnvironmentEndpoint, gateway::HttpGateway};
//! use cloudctl_core::options::FetchOptions;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let environment = EnvironmentEndpoint::parse("grpc+ssl://identity.api.dev.example.dev:443")?;
//! let gateway = HttpGateway::new()?;
//! let aliases = AliasTable::new();
//!
//! let context = FetchContext {
//!     environment: &environment,
//!     token: Some("my-token"),
//!     discovery: &gateway,
//!     aliases: &aliases,
//! };
//!
//! let options = FetchOptions::default();
//! let outcome = fetch_service(&context, "identity", "list", "User", &options).await?;
//! println!("{}", outcome.result);
//! # Ok(())
//! # }
//! ```
use crate::{
    BoxError,
    alias::{AliasProvider, AliasTable, ResolvedCommand, expand_alias},
    discovery::{self, NamingConvention},
    endpoint::{
        self, BOOTSTRAP_SERVICE, BootstrapDiscovery, EnvironmentEndpoint, Scheme, ServiceEndpoint,
    },
    error::FetchError,
    grpc::client::GrpcClient,
    invoke::{self, InvokeError},
    options::FetchOptions,
    params::{self, ParameterSet},
    postprocess::post_process,
    reflection::client::{ReflectionClient, ReflectionResolveError},
    registry::{self, EndpointMap},
};
use http_body::Body as HttpBody;
use prost_reflect::{Kind, MethodDescriptor};
use std::time::Duration;
use tonic::{
    Request, Status,
    metadata::{AsciiMetadataValue, errors::InvalidMetadataValue},
    service::{Interceptor, interceptor::InterceptedService},
    transport::{Channel, ClientTlsConfig, Endpoint},
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fields kept on list items when the user asks for the minimal column set.
const MINIMAL_FIELDS: &[&str] = &["name", "status", "state", "created_at", "finished_at"];
const DEFAULT_MINIMAL_FIELDS: &[&str] = &["name", "created_at"];

/// Resource of the bootstrap service listing the endpoint catalog.
const ENDPOINT_RESOURCE: &str = "Endpoint";

/// Errors that can occur when connecting to a service.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("Invalid URL '{0}': {1}")]
    InvalidUrl(String, #[source] tonic::transport::Error),
    #[error("Failed to connect to '{0}': {1}")]
    ConnectionFailed(String, #[source] tonic::transport::Error),
    #[error("The configured token is not a valid metadata value")]
    InvalidToken(#[source] InvalidMetadataValue),
}

/// Attaches the bearer token as `token` metadata to every outgoing call.
#[derive(Debug, Clone, Default)]
pub struct TokenInterceptor {
    token: Option<AsciiMetadataValue>,
}

impl TokenInterceptor {
    pub fn new(token: Option<&str>) -> Result<Self, ConnectError> {
        let token = token
            .filter(|t| !t.is_empty())
            .map(|t| AsciiMetadataValue::try_from(t))
            .transpose()
            .map_err(ConnectError::InvalidToken)?;

        Ok(Self { token })
    }
}

impl Interceptor for TokenInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(token) = &self.token {
            request.metadata_mut().insert("token", token.clone());
        }
        Ok(request)
    }
}

/// A channel whose calls carry the session token.
pub type AuthenticatedChannel = InterceptedService<Channel, TokenInterceptor>;

/// Opens a connection to `endpoint`. TLS with the native root certificates is used unless the
/// endpoint is a plaintext local deployment.
pub async fn connect(
    endpoint: &ServiceEndpoint,
    token: Option<&str>,
) -> Result<ServiceClient<AuthenticatedChannel>, ConnectError> {
    let uri = endpoint.uri();
    let interceptor = TokenInterceptor::new(token)?;

    let mut builder = Endpoint::from_shared(uri.clone())
        .map_err(|e| ConnectError::InvalidUrl(uri.clone(), e))?
        .connect_timeout(CONNECT_TIMEOUT);

    if endpoint.scheme == Scheme::Tls {
        let tls = ClientTlsConfig::new()
            .with_native_roots()
            .domain_name(endpoint.host.clone());
        builder = builder
            .tls_config(tls)
            .map_err(|e| ConnectError::InvalidUrl(uri.clone(), e))?;
    }

    let channel = builder
        .connect()
        .await
        .map_err(|e| ConnectError::ConnectionFailed(uri, e))?;

    tracing::debug!(%endpoint, "connected");
    Ok(ServiceClient::from_service(InterceptedService::new(
        channel,
        interceptor,
    )))
}

/// A resource exposed by a service, with its verbs and registered shorthands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResource {
    /// Fully qualified gRPC service name.
    pub service: String,
    /// Short resource name, the last segment of the service name.
    pub resource: String,
    /// Verbs without a shorthand.
    pub verbs: Vec<String>,
    /// `(shorthand, verb)` pairs registered for this resource.
    pub aliases: Vec<(String, String)>,
}

/// The answer of one invocation, ready for presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub result: serde_json::Value,
    /// The options in effect, after alias expansion.
    pub options: FetchOptions,
    /// Columns to display when the minimal column set was requested on a `list` call.
    pub minimal_columns: Option<Vec<String>>,
}

/// A connected client for one invocation.
#[derive(Debug, Clone)]
pub struct ServiceClient<S = AuthenticatedChannel> {
    reflection: ReflectionClient<S>,
    grpc: GrpcClient<S>,
}

impl<S> ServiceClient<S>
where
    S: tonic::client::GrpcService<tonic::body::Body> + Clone,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    /// Creates a client from an existing Tonic service/channel.
    pub fn from_service(service: S) -> Self {
        Self {
            reflection: ReflectionClient::new(service.clone()),
            grpc: GrpcClient::new(service),
        }
    }

    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionResolveError> {
        self.reflection.list_services().await
    }

    /// Discovers the method implementing `verb` on `resource` of `service`, optionally pinned
    /// to one API version.
    pub async fn resolve_method(
        &mut self,
        service: &str,
        verb: &str,
        resource: &str,
        api_version: Option<&str>,
    ) -> Result<MethodDescriptor, FetchError> {
        let naming = NamingConvention::default().with_api_version(api_version);
        let available = self.reflection.list_services().await?;
        let full_name = discovery::discover_with(&naming, service, resource, &available)?;
        let descriptor = self.reflection.resolve_service(&full_name).await?;

        Ok(discovery::find_method(&descriptor, verb)?)
    }

    /// Invokes `method` with an already built parameter set.
    pub async fn call(
        &mut self,
        method: &MethodDescriptor,
        params: &ParameterSet,
    ) -> Result<serde_json::Value, InvokeError> {
        invoke::invoke(&mut self.grpc, method, params).await
    }

    /// Runs an already alias-expanded command against `service`.
    pub async fn fetch(
        &mut self,
        service: &str,
        command: &ResolvedCommand,
    ) -> Result<FetchOutcome, FetchError> {
        let api_version = command.options.api_version.as_deref();
        let method = self
            .resolve_method(service, &command.verb, &command.resource, api_version)
            .await?;
        let params = params::build(&command.options, &command.verb)?;
        let result = self.call(&method, &params).await?;
        let result = post_process(result, &command.options);

        let minimal_columns = (command.options.minimal_columns && command.verb == "list")
            .then(|| minimal_fields(&method));

        Ok(FetchOutcome {
            result,
            options: command.options.clone(),
            minimal_columns,
        })
    }

    /// Lists the `service -> endpoint` catalog through `identity list Endpoint`. The client must
    /// be connected to the bootstrap service.
    pub async fn endpoint_catalog(&mut self) -> Result<EndpointMap, FetchError> {
        let command = ResolvedCommand {
            verb: "list".to_string(),
            resource: ENDPOINT_RESOURCE.to_string(),
            options: FetchOptions::default(),
        };

        let outcome = self.fetch(BOOTSTRAP_SERVICE, &command).await?;
        let catalog = registry::catalog_from_results(&outcome.result);
        tracing::debug!(services = catalog.len(), "listed endpoint catalog");
        Ok(catalog)
    }

    /// Lists the resources of `service` together with their verbs and shorthands.
    pub async fn api_resources(
        &mut self,
        service: &str,
        aliases: &AliasTable,
    ) -> Result<Vec<ApiResource>, FetchError> {
        let marker = format!(".{service}.");
        let available = self.reflection.list_services().await?;

        let mut resources = Vec::new();
        for full_name in available
            .iter()
            .filter(|name| !name.starts_with("grpc.reflection.") && name.contains(&marker))
        {
            let descriptor = match self.reflection.resolve_service(full_name).await {
                Ok(descriptor) => descriptor,
                Err(err) => {
                    tracing::warn!(service = %full_name, error = %err, "failed to resolve service");
                    continue;
                }
            };

            let resource = descriptor.name().to_string();
            let shorthands: Vec<(String, String)> = aliases
                .aliases_for(service)
                .filter_map(|(token, _)| {
                    let (verb, target) = aliases.lookup_alias(service, token)?;
                    (target == resource).then(|| (token.to_string(), verb))
                })
                .collect();

            let verbs = descriptor
                .methods()
                .map(|m| m.name().to_string())
                .filter(|verb| !shorthands.iter().any(|(_, v)| v == verb))
                .collect();

            resources.push(ApiResource {
                service: full_name.clone(),
                resource,
                verbs,
                aliases: shorthands,
            });
        }

        resources.sort_by(|a, b| a.resource.cmp(&b.resource));
        Ok(resources)
    }
}

/// Column names for the minimal view of a list method: identifiers and the fields
/// describing a lifecycle, in schema order.
pub fn minimal_fields(method: &MethodDescriptor) -> Vec<String> {
    let item = method
        .output()
        .get_field_by_name("results")
        .and_then(|field| match field.kind() {
            Kind::Message(item) => Some(item),
            _ => None,
        });

    let fields: Vec<String> = item
        .map(|item| {
            item.fields()
                .map(|f| f.name().to_string())
                .filter(|name| name.ends_with("_id") || MINIMAL_FIELDS.contains(&name.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if fields.is_empty() {
        DEFAULT_MINIMAL_FIELDS.iter().map(|f| f.to_string()).collect()
    } else {
        fields
    }
}

/// Everything a full invocation needs besides the command itself.
pub struct FetchContext<'a, D, A: ?Sized> {
    pub environment: &'a EnvironmentEndpoint,
    pub token: Option<&'a str>,
    pub discovery: &'a D,
    pub aliases: &'a A,
}

/// Expands aliases, resolves the endpoint, connects and runs the command.
pub async fn fetch_service<D, A>(
    context: &FetchContext<'_, D, A>,
    service: &str,
    verb: &str,
    resource: &str,
    options: &FetchOptions,
) -> Result<FetchOutcome, FetchError>
where
    D: BootstrapDiscovery,
    A: AliasProvider + ?Sized,
{
    let command = expand_alias(context.aliases, service, verb, resource, options);
    let endpoint = endpoint::resolve(service, context.environment, context.discovery).await?;

    let mut client = connect(&endpoint, context.token).await?;
    client.fetch(service, &command).await
}

/// Connects to the bootstrap service of `environment` and lists its endpoint catalog.
pub async fn fetch_endpoint_catalog<D>(
    environment: &EnvironmentEndpoint,
    token: Option<&str>,
    discovery: &D,
) -> Result<EndpointMap, FetchError>
where
    D: BootstrapDiscovery,
{
    let endpoint = endpoint::resolve(BOOTSTRAP_SERVICE, environment, discovery).await?;

    let mut client = connect(&endpoint, token).await?;
    client.endpoint_catalog().await
}
