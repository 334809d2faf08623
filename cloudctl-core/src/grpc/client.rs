//! # Generic gRPC Client
//!
//! Wraps `tonic::client::Grpc` to call any method described by a `MethodDescriptor`.
//!
//! * **Dynamic Pathing**: builds the HTTP/2 path (`/package.Service/method`) at runtime.
//! * **Access Patterns**: unary and server streaming, the two shapes the platform services use.
//! * **Message Limits**: responses of up to 10 MiB are accepted, list calls get large.
//!
//! Authentication metadata is not handled here: the transport handed to [`GrpcClient::new`] is
//! expected to carry it (see [`crate::client::TokenInterceptor`]).
use super::codec::DynamicCodec;
use crate::BoxError;
use futures_util::Stream;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MethodDescriptor};
use std::str::FromStr;
use tonic::{client::GrpcService, transport::Channel};

/// Maximum encoded size of a single request or response message.
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum GrpcRequestError {
    #[error("Internal error, the client was not ready: '{0}'")]
    ClientNotReady(#[source] BoxError),
    #[error("Invalid gRPC path '{path}': '{source}'")]
    InvalidPath {
        path: String,
        source: http::uri::InvalidUri,
    },
}

/// A gRPC client agnostic of the messages it exchanges.
#[derive(Debug, Clone)]
pub struct GrpcClient<S = Channel> {
    client: tonic::client::Grpc<S>,
}

impl<S> GrpcClient<S>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    pub fn new(service: S) -> Self {
        let client = tonic::client::Grpc::new(service)
            .max_decoding_message_size(MAX_MESSAGE_SIZE)
            .max_encoding_message_size(MAX_MESSAGE_SIZE);
        Self { client }
    }

    /// Performs a Unary gRPC call (Single Request -> Single Response).
    ///
    /// # Returns
    /// * `Ok(Ok(Value))` - Successful RPC execution.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to send the request.
    pub async fn unary(
        &mut self,
        method: &MethodDescriptor,
        request: DynamicMessage,
    ) -> Result<Result<serde_json::Value, tonic::Status>, GrpcRequestError> {
        let (path, codec) = self.prepare(method).await?;

        match self
            .client
            .unary(tonic::Request::new(request), path, codec)
            .await
        {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Performs a Server Streaming gRPC call (Single Request -> Stream of Responses).
    ///
    /// The request is sent as the only message of the client half, which is closed right after.
    ///
    /// # Returns
    ///
    /// * `Ok(Ok(Stream))` - The server accepted the call.
    /// * `Ok(Err(Status))` - RPC executed, but server returned an error.
    /// * `Err(GrpcRequestError)` - Failed to send the request.
    pub async fn server_streaming(
        &mut self,
        method: &MethodDescriptor,
        request: DynamicMessage,
    ) -> Result<
        Result<impl Stream<Item = Result<serde_json::Value, tonic::Status>>, tonic::Status>,
        GrpcRequestError,
    > {
        let (path, codec) = self.prepare(method).await?;

        match self
            .client
            .server_streaming(tonic::Request::new(request), path, codec)
            .await
        {
            Ok(response) => Ok(Ok(response.into_inner())),
            Err(status) => Ok(Err(status)),
        }
    }

    /// Waits for the transport and builds the route and response codec of `method`.
    async fn prepare(
        &mut self,
        method: &MethodDescriptor,
    ) -> Result<(http::uri::PathAndQuery, DynamicCodec), GrpcRequestError> {
        self.client
            .ready()
            .await
            .map_err(|e| GrpcRequestError::ClientNotReady(e.into()))?;

        Ok((http_path(method)?, DynamicCodec::new(method.output())))
    }
}

fn http_path(method: &MethodDescriptor) -> Result<http::uri::PathAndQuery, GrpcRequestError> {
    let path = format!("/{}/{}", method.parent_service().full_name(), method.name());
    http::uri::PathAndQuery::from_str(&path)
        .map_err(|source| GrpcRequestError::InvalidPath { path, source })
}
