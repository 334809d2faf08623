//! # cloudctl CLI Entry Point
//!
//! The main executable of cloudctl. This file drives the application lifecycle:
//!
//! 1. **Initialization**: Parses command-line arguments using [`cli::Cli`] and sets up logging.
//! 2. **Configuration**: Loads `setting.yaml` and the active environment, and warms up the service
//!    registry from the endpoint cache.
//! 3. **Execution**: Delegates the invocation to `cloudctl_core`.
//! 4. **Presentation**: Renders the result to standard output, or a formatted error to standard
//!    error with exit code 1.

mod cache;
mod cli;
mod config;
mod formatter;
mod render;
mod watch;

use anyhow::bail;
use cache::EnvironmentCache;
use clap::Parser;
use cli::{Cli, Commands, ServiceCommand};
use cloudctl_core::FetchError;
use cloudctl_core::client::{FetchContext, connect, fetch_endpoint_catalog, fetch_service};
use cloudctl_core::endpoint::{self, EnvironmentEndpoint};
use cloudctl_core::gateway::HttpGateway;
use cloudctl_core::registry::{self, EndpointMap, ServiceRegistry};
use config::{ActiveEnvironment, Settings};
use formatter::{FormattedString, ResourceList, ServiceList};
use std::process;
use std::time::{Duration, SystemTime};
use tracing_subscriber::EnvFilter;

/// How long the endpoint cache may take to load before the registry is left empty.
const REGISTRY_WARM_UP_TIMEOUT: Duration = Duration::from_millis(50);

#[tokio::main]
async fn main() {
    let args = Cli::parse();
    init_tracing(args.verbose);

    if let Err(err) = run(args).await {
        eprintln!("{}", FormattedString::from(err));
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("cloudctl=debug,cloudctl_core=debug"),
        _ => EnvFilter::new("cloudctl=trace,cloudctl_core=trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(args: Cli) -> anyhow::Result<()> {
    let home = config::home_dir(args.config_dir)?;
    let settings = Settings::load(&home)?;
    let active = settings.active(&home)?;
    let cache = EnvironmentCache::new(&home, &active.name);

    tracing::debug!(environment = %active.name, "active environment");

    match args.command {
        Commands::Services => list_services(&active, &cache).await,
        Commands::ApiResources { service } => api_resources(&settings, &active, &service).await,
        Commands::Service(raw) => {
            let (service, command) = match ServiceCommand::parse_service_args(&raw) {
                Ok(parsed) => parsed,
                Err(err) => err.exit(),
            };
            call_service(&settings, &active, &cache, &service, &command).await
        }
    }
}

/// The services of the active environment, from the cached endpoint catalog. The cache read
/// gives up after [`REGISTRY_WARM_UP_TIMEOUT`].
async fn load_registry(active: &ActiveEnvironment, cache: &EnvironmentCache) -> ServiceRegistry {
    let cache = cache.clone();
    let now = SystemTime::now();

    let catalog = registry::warm_up(move || cache.load_endpoints(now), REGISTRY_WARM_UP_TIMEOUT)
        .await
        .flatten()
        .unwrap_or_default();

    ServiceRegistry::for_environment(&catalog, &active.endpoint)
}

async fn call_service(
    settings: &Settings,
    active: &ActiveEnvironment,
    cache: &EnvironmentCache,
    service: &str,
    command: &ServiceCommand,
) -> anyhow::Result<()> {
    let registry = load_registry(active, cache).await;
    if !registry.is_empty() && !registry.contains(service) {
        bail!(
            "Unknown service '{service}'. Run 'cloudctl services' to list the available services"
        );
    }

    let gateway = HttpGateway::new()?;
    let context = FetchContext {
        environment: &active.endpoint,
        token: active.token.as_deref(),
        discovery: &gateway,
        aliases: &settings.aliases,
    };
    let resource = command.resource.clone().unwrap_or_default();
    let options = command.fetch_options();

    let fetch = || fetch_service(&context, service, &command.verb, &resource, &options);
    let mut stdout = std::io::stdout();

    if command.watch {
        return watch::watch(&mut stdout, fetch).await;
    }

    let outcome = fetch().await?;
    render::render(
        &mut stdout,
        &outcome.result,
        &outcome.options,
        outcome.minimal_columns.as_deref(),
    )?;
    Ok(())
}

/// Refreshes the endpoint cache and prints the services of the environment.
async fn list_services(
    active: &ActiveEnvironment,
    cache: &EnvironmentCache,
) -> anyhow::Result<()> {
    let catalog = fetch_catalog(active).await?;
    cache.store_endpoints(&catalog, SystemTime::now())?;

    let registry = ServiceRegistry::for_environment(&catalog, &active.endpoint);
    let services = registry.names().map(String::from).collect();
    println!("{}", FormattedString::from(ServiceList(services)));
    Ok(())
}

/// Lists the endpoint catalog: from the gateway for gateway environments, through
/// `identity list Endpoint` for the others.
async fn fetch_catalog(active: &ActiveEnvironment) -> anyhow::Result<EndpointMap> {
    let gateway = HttpGateway::new()?;

    let catalog = match &active.endpoint {
        EnvironmentEndpoint::Gateway { url, .. } => gateway.fetch_endpoints_map(url).await?,
        environment => {
            fetch_endpoint_catalog(environment, active.token.as_deref(), &gateway).await?
        }
    };

    tracing::debug!(services = catalog.len(), "fetched endpoint catalog");
    Ok(catalog)
}

async fn api_resources(
    settings: &Settings,
    active: &ActiveEnvironment,
    service: &str,
) -> anyhow::Result<()> {
    let gateway = HttpGateway::new()?;
    let endpoint = endpoint::resolve(service, &active.endpoint, &gateway)
        .await
        .map_err(FetchError::from)?;

    let mut client = connect(&endpoint, active.token.as_deref())
        .await
        .map_err(FetchError::from)?;

    let resources = client.api_resources(service, &settings.aliases).await?;
    println!("{}", FormattedString::from(ResourceList(resources)));
    Ok(())
}
