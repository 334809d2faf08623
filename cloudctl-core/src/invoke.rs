//! # Dynamic Invoker
//!
//! Turns an untyped [`ParameterSet`] into a request of the method input type, performs the call
//! and normalises the answer into a single JSON value.
//!
//! Remote failures are classified, so callers can tell an expired token or a missing required
//! field apart from any other error.
use crate::BoxError;
use crate::grpc::client::{GrpcClient, GrpcRequestError};
use crate::params::ParameterSet;
use futures_util::TryStreamExt;
use http_body::Body as HttpBody;
use prost_reflect::{DynamicMessage, MessageDescriptor, MethodDescriptor};
use serde_json::Value;
use tonic::{Code, client::GrpcService};

const AUTHENTICATION_MARKERS: &[&str] =
    &["ERROR_AUTHENTICATE_FAILURE", "Token is invalid or expired"];
const REQUIRED_PARAMETER_CODE: &str = "ERROR_REQUIRED_PARAMETER";
const REQUIRED_PARAMETER_PREFIX: &str = "Required parameter. (key = ";

#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("Parameters do not match the '{message}' request type: {source}")]
    RequestShape {
        message: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Method '{0}' uses client streaming, which is not supported")]
    UnsupportedStreaming(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),
    #[error("gRPC call failed with status '{code:?}': {message}")]
    Remote { code: Code, message: String },
    #[error(transparent)]
    Transport(#[from] GrpcRequestError),
}

/// The call shapes the invoker knows how to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamingShape {
    Unary,
    ServerStreaming,
}

impl StreamingShape {
    pub fn of(method: &MethodDescriptor) -> Result<Self, InvokeError> {
        match (method.is_client_streaming(), method.is_server_streaming()) {
            (false, false) => Ok(Self::Unary),
            (false, true) => Ok(Self::ServerStreaming),
            (true, _) => Err(InvokeError::UnsupportedStreaming(
                method.full_name().to_string(),
            )),
        }
    }
}

/// Builds a request of type `input` out of the parameter set.
///
/// The parameters go through their JSON text form and are decoded with the Protobuf JSON
/// mapping, which coerces values such as `"3"` into the numeric type of the field.
pub fn build_request(
    input: &MessageDescriptor,
    params: &ParameterSet,
) -> Result<DynamicMessage, InvokeError> {
    let shape_error = |source| InvokeError::RequestShape {
        message: input.full_name().to_string(),
        source,
    };

    let text = serde_json::to_string(params).map_err(shape_error)?;
    let mut deserializer = serde_json::Deserializer::from_str(&text);
    let request =
        DynamicMessage::deserialize(input.clone(), &mut deserializer).map_err(shape_error)?;
    deserializer.end().map_err(shape_error)?;

    Ok(request)
}

/// Calls `method` with `params` and returns the normalised result.
pub async fn invoke<S>(
    client: &mut GrpcClient<S>,
    method: &MethodDescriptor,
    params: &ParameterSet,
) -> Result<Value, InvokeError>
where
    S: GrpcService<tonic::body::Body>,
    S::Error: Into<BoxError>,
    S::ResponseBody: HttpBody<Data = tonic::codegen::Bytes> + Send + 'static,
    <S::ResponseBody as HttpBody>::Error: Into<BoxError> + Send,
{
    let shape = StreamingShape::of(method)?;
    let request = build_request(&method.input(), params)?;

    tracing::debug!(method = method.full_name(), ?shape, "invoking method");

    match shape {
        StreamingShape::Unary => client
            .unary(method, request)
            .await?
            .map_err(classify_status),
        StreamingShape::ServerStreaming => {
            let stream = client
                .server_streaming(method, request)
                .await?
                .map_err(classify_status)?;

            let messages: Vec<Value> = stream.try_collect().await.map_err(classify_status)?;
            tracing::debug!(messages = messages.len(), "stream completed");

            Ok(collect_stream_results(messages))
        }
    }
}

/// Normalises the messages of a server stream: a single message is returned as is, any other
/// count is wrapped in a `{"results": [...]}` container, in receive order.
pub fn collect_stream_results(mut messages: Vec<Value>) -> Value {
    if messages.len() == 1 {
        messages.remove(0)
    } else {
        serde_json::json!({ "results": messages })
    }
}

/// Maps a remote status into the invoker error taxonomy.
pub fn classify_status(status: tonic::Status) -> InvokeError {
    let message = status.message();

    if status.code() == Code::Unauthenticated
        || AUTHENTICATION_MARKERS.iter().any(|m| message.contains(m))
    {
        return InvokeError::Authentication(message.to_string());
    }

    if message.contains(REQUIRED_PARAMETER_CODE) {
        if let Some(field) = extract_required_parameter(message) {
            return InvokeError::MissingParameter(field);
        }
    }

    InvokeError::Remote {
        code: status.code(),
        message: message.to_string(),
    }
}

/// Extracts `field` from a `Required parameter. (key = field)` error message.
pub fn extract_required_parameter(message: &str) -> Option<String> {
    let start = message.find(REQUIRED_PARAMETER_PREFIX)? + REQUIRED_PARAMETER_PREFIX.len();
    let rest = &message[start..];
    let field = rest[..rest.find(')')?].trim();

    (!field.is_empty()).then(|| field.to_string())
}
