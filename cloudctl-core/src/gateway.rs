//! # HTTP Gateway Discovery
//!
//! Environments configured with an `http(s)://` endpoint talk to an HTTP gateway first. The
//! gateway exposes the platform endpoint catalog (`POST /identity/endpoint/list`), which is used
//! both to find the direct address of the bootstrap service and to build the service registry.
use crate::endpoint::{BOOTSTRAP_SERVICE, BootstrapDiscovery};
use crate::registry::EndpointMap;
use serde::Deserialize;
use std::time::Duration;

const ENDPOINT_LIST_PATH: &str = "identity/endpoint/list";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Failed to build the HTTP client: {0}")]
    ClientInit(#[source] reqwest::Error),
    #[error("Request to '{url}' failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Deserialize)]
struct EndpointList {
    #[serde(default)]
    results: Vec<EndpointInfo>,
}

#[derive(Debug, Deserialize)]
struct EndpointInfo {
    service: String,
    endpoint: String,
}

/// Client for the endpoint catalog of an HTTP gateway.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
}

impl HttpGateway {
    pub fn new() -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(GatewayError::ClientInit)?;

        Ok(Self { client })
    }

    /// Fetches the service name to endpoint URL catalog exposed by the gateway.
    pub async fn fetch_endpoints_map(
        &self,
        gateway_url: &str,
    ) -> Result<EndpointMap, GatewayError> {
        let list = self.list_endpoints(gateway_url).await?;

        Ok(list
            .results
            .into_iter()
            .map(|info| (info.service, info.endpoint))
            .collect())
    }

    async fn list_endpoints(&self, gateway_url: &str) -> Result<EndpointList, GatewayError> {
        let url = format!("{}/{ENDPOINT_LIST_PATH}", gateway_url.trim_end_matches('/'));
        let request_error = |source| GatewayError::Request {
            url: url.clone(),
            source,
        };

        tracing::debug!(%url, "listing gateway endpoints");

        self.client
            .post(&url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(request_error)?
            .json::<EndpointList>()
            .await
            .map_err(request_error)
    }
}

impl BootstrapDiscovery for HttpGateway {
    type Error = GatewayError;

    async fn discover_bootstrap_endpoint(
        &self,
        gateway_url: &str,
    ) -> Result<Option<String>, GatewayError> {
        let list = self.list_endpoints(gateway_url).await?;
        Ok(bootstrap_endpoint(list))
    }
}

fn bootstrap_endpoint(list: EndpointList) -> Option<String> {
    list.results
        .into_iter()
        .find(|info| {
            info.service == BOOTSTRAP_SERVICE && info.endpoint.starts_with("grpc+ssl://")
        })
        .map(|info| info.endpoint)
}
