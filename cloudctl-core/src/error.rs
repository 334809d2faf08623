//! The error taxonomy surfaced to callers of the engine.
//!
//! Every module reports failures with its own error type; they all collapse into
//! [`FetchError`], whose variant tells the caller which kind of remediation to offer.
use crate::BoxError;
use crate::client::ConnectError;
use crate::discovery::DiscoverError;
use crate::endpoint::EndpointError;
use crate::invoke::InvokeError;
use crate::params::ParameterError;
use crate::reflection::client::ReflectionResolveError;
use tonic::Code;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Configuration error: {0}")]
    Configuration(#[source] BoxError),
    #[error("Connectivity error: {0}")]
    Connectivity(#[source] BoxError),
    #[error("{0}")]
    NotFound(#[source] BoxError),
    #[error("Invalid parameters: {0}")]
    ParameterFormat(#[source] BoxError),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),
    #[error("Invocation failed: {0}")]
    Invocation(#[source] BoxError),
}

impl From<EndpointError> for FetchError {
    fn from(err: EndpointError) -> Self {
        match err {
            EndpointError::Malformed { .. } => Self::Configuration(err.into()),
            EndpointError::DiscoveryFailed { .. } => Self::Connectivity(err.into()),
        }
    }
}

impl From<ConnectError> for FetchError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::InvalidUrl(..) | ConnectError::InvalidToken(_) => {
                Self::Configuration(err.into())
            }
            ConnectError::ConnectionFailed(..) => Self::Connectivity(err.into()),
        }
    }
}

impl From<ReflectionResolveError> for FetchError {
    fn from(err: ReflectionResolveError) -> Self {
        if let ReflectionResolveError::ServiceNotFound(_) = err {
            return Self::NotFound(err.into());
        }

        let status = err.status().map(|s| (s.code(), s.message().to_string()));
        match status {
            Some((Code::Unauthenticated, message)) => Self::Authentication(message),
            Some((Code::Unavailable, _)) => Self::Connectivity(err.into()),
            _ => Self::Invocation(err.into()),
        }
    }
}

impl From<DiscoverError> for FetchError {
    fn from(err: DiscoverError) -> Self {
        Self::NotFound(err.into())
    }
}

impl From<ParameterError> for FetchError {
    fn from(err: ParameterError) -> Self {
        Self::ParameterFormat(err.into())
    }
}

impl From<InvokeError> for FetchError {
    fn from(err: InvokeError) -> Self {
        match err {
            InvokeError::RequestShape { .. } => Self::ParameterFormat(err.into()),
            InvokeError::Authentication(message) => Self::Authentication(message),
            InvokeError::MissingParameter(field) => Self::MissingParameter(field),
            InvokeError::Remote {
                code: Code::Unavailable,
                ..
            }
            | InvokeError::Transport(_) => Self::Connectivity(err.into()),
            InvokeError::UnsupportedStreaming(_) | InvokeError::Remote { .. } => {
                Self::Invocation(err.into())
            }
        }
    }
}
