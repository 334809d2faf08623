//! # Reflection Client
//!
//! A client implementation for `grpc.reflection.v1alpha`, the reflection protocol version served
//! by the platform.
//!
//! Besides listing services, the client builds a complete `FileDescriptorSet` for a symbol by
//! inspecting the imports of every returned file and requesting the missing ones over the same
//! stream, until the whole schema tree is known. The set is turned into a `DescriptorPool` that
//! only lives as long as the invocation that asked for it.
//!
//! ## References
//!
//! * [gRPC Server Reflection Protocol](https://github.com/grpc/grpc/blob/master/doc/server-reflection.md)
use crate::BoxError;
use futures_util::stream::once;
use http_body::Body as HttpBody;
use prost::Message;
use prost_reflect::{DescriptorError, DescriptorPool, ServiceDescriptor};
use prost_types::{FileDescriptorProto, FileDescriptorSet};
use std::collections::{BTreeMap, HashSet};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tonic::{Code, Status, Streaming, client::GrpcService, transport::Channel};
use tonic_reflection::pb::v1alpha::{
    ServerReflectionRequest, ServerReflectionResponse,
    server_reflection_client::ServerReflectionClient, server_reflection_request::MessageRequest,
    server_reflection_response::MessageResponse,
};

/// Requests that may be queued on a descriptor stream before the server answers.
const REQUEST_BUFFER: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ReflectionResolveError {
    #[error(
        "Failed to open a reflection stream, the server might not support reflection: '{0}'"
    )]
    ServerStreamInitFailed(#[source] Status),

    #[error("The reflection stream returned an error status: '{0}'")]
    ServerStreamFailure(#[source] Status),

    #[error("Reflection stream closed before all descriptors were received")]
    StreamClosed,

    #[error("Failed to queue a reflection request")]
    SendFailed,

    #[error("Reflection server answered with error code {code}: {message}")]
    ServerError { code: i32, message: String },

    #[error("Unexpected reflection response: {0}")]
    UnexpectedResponseType(String),

    #[error("Failed to decode FileDescriptorProto: {0}")]
    DecodeError(#[from] prost::DecodeError),

    #[error("Failed to build descriptor pool: {0}")]
    InvalidDescriptor(#[from] DescriptorError),

    #[error("Service '{0}' not found")]
    ServiceNotFound(String),
}

impl ReflectionResolveError {
    /// The remote status behind the failure, if the server answered with one.
    pub fn status(&self) -> Option<&Status> {
        match self {
            Self::ServerStreamInitFailed(status) | Self::ServerStreamFailure(status) => {
                Some(status)
            }
            _ => None,
        }
    }

    fn is_not_found(&self) -> bool {
        match self {
            Self::ServerError { code, .. } => *code == Code::NotFound as i32,
            Self::ServerStreamFailure(status) => status.code() == Code::NotFound,
            _ => false,
        }
    }
}

/// The host field is optional and ignored by the platform servers.
fn request(message: MessageRequest) -> ServerReflectionRequest {
    ServerReflectionRequest {
        host: String::new(),
        message_request: Some(message),
    }
}

/// Turns a response that is not the expected kind into an error.
fn unexpected(response: Option<MessageResponse>) -> ReflectionResolveError {
    match response {
        Some(MessageResponse::ErrorResponse(e)) => ReflectionResolveError::ServerError {
            code: e.error_code,
            message: e.error_message,
        },
        Some(other) => ReflectionResolveError::UnexpectedResponseType(format!("{other:?}")),
        None => ReflectionResolveError::UnexpectedResponseType("empty message".into()),
    }
}

async fn next_response(
    stream: &mut Streaming<ServerReflectionResponse>,
) -> Result<Option<MessageResponse>, ReflectionResolveError> {
    let response = stream
        .message()
        .await
        .map_err(ReflectionResolveError::ServerStreamFailure)?
        .ok_or(ReflectionResolveError::StreamClosed)?;

    Ok(response.message_response)
}

/// A client for the gRPC Server Reflection Protocol.
#[derive(Debug, Clone)]
pub struct ReflectionClient<T = Channel> {
    client: ServerReflectionClient<T>,
}

impl<S> ReflectionClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        Self {
            client: ServerReflectionClient::new(service),
        }
    }

    /// Lists the fully qualified names of all services exposed by the server.
    pub async fn list_services(&mut self) -> Result<Vec<String>, ReflectionResolveError> {
        let mut stream = self
            .client
            .server_reflection_info(once(async {
                request(MessageRequest::ListServices(String::new()))
            }))
            .await
            .map_err(ReflectionResolveError::ServerStreamInitFailed)?
            .into_inner();

        match next_response(&mut stream).await? {
            Some(MessageResponse::ListServicesResponse(list)) => {
                let services: Vec<String> = list.service.into_iter().map(|s| s.name).collect();
                tracing::debug!(count = services.len(), "listed reflected services");
                Ok(services)
            }
            other => Err(unexpected(other)),
        }
    }

    /// Resolves the schema of a fully qualified service (methods and message types).
    pub async fn resolve_service(
        &mut self,
        service_name: &str,
    ) -> Result<ServiceDescriptor, ReflectionResolveError> {
        let not_found = || ReflectionResolveError::ServiceNotFound(service_name.to_string());

        let fd_set = match self.file_descriptor_set_by_symbol(service_name).await {
            Ok(fd_set) => fd_set,
            Err(err) if err.is_not_found() => return Err(not_found()),
            Err(err) => return Err(err),
        };

        DescriptorPool::from_file_descriptor_set(fd_set)?
            .get_service_by_name(service_name)
            .ok_or_else(not_found)
    }

    /// Asks the reflection service for the file containing `symbol` and every file it
    /// transitively imports.
    pub async fn file_descriptor_set_by_symbol(
        &mut self,
        symbol: &str,
    ) -> Result<FileDescriptorSet, ReflectionResolveError> {
        let (tx, rx) = mpsc::channel(REQUEST_BUFFER);

        let mut stream = self
            .client
            .server_reflection_info(ReceiverStream::new(rx))
            .await
            .map_err(ReflectionResolveError::ServerStreamInitFailed)?
            .into_inner();

        let mut collector = DescriptorCollector::new(tx);
        collector
            .request(MessageRequest::FileContainingSymbol(symbol.to_string()))
            .await?;

        while collector.pending > 0 {
            let response = next_response(&mut stream).await?;
            collector.pending -= 1;

            match response {
                Some(MessageResponse::FileDescriptorResponse(res)) => {
                    for raw in res.file_descriptor_proto {
                        collector.add(FileDescriptorProto::decode(raw.as_ref())?).await?;
                    }
                }
                other => return Err(unexpected(other)),
            }
        }

        tracing::debug!(symbol, files = collector.files.len(), "resolved descriptor files");
        Ok(FileDescriptorSet {
            file: collector.files.into_values().collect(),
        })
    }
}

/// Accumulates descriptor files and requests the imports not yet seen.
struct DescriptorCollector {
    requests: mpsc::Sender<ServerReflectionRequest>,
    files: BTreeMap<String, FileDescriptorProto>,
    requested: HashSet<String>,
    pending: usize,
}

impl DescriptorCollector {
    fn new(requests: mpsc::Sender<ServerReflectionRequest>) -> Self {
        Self {
            requests,
            files: BTreeMap::new(),
            requested: HashSet::new(),
            pending: 0,
        }
    }

    async fn request(&mut self, message: MessageRequest) -> Result<(), ReflectionResolveError> {
        self.requests
            .send(request(message))
            .await
            .map_err(|_| ReflectionResolveError::SendFailed)?;
        self.pending += 1;
        Ok(())
    }

    async fn add(&mut self, file: FileDescriptorProto) -> Result<(), ReflectionResolveError> {
        let Some(name) = file.name.clone() else {
            return Ok(());
        };
        if self.files.contains_key(&name) {
            return Ok(());
        }

        for dependency in &file.dependency {
            if !self.files.contains_key(dependency) && self.requested.insert(dependency.clone()) {
                self.request(MessageRequest::FileByFilename(dependency.clone()))
                    .await?;
            }
        }

        self.files.insert(name, file);
        Ok(())
    }
}
