//! In-process `spaceone.api.identity.v1` services: `User` and the `Endpoint` catalog.
//!
//! The schema is built by hand and the services speak dynamic messages, so the tests need
//! neither `.proto` files nor generated code.
#![allow(dead_code)]

use cloudctl_core::grpc::codec::DynamicCodec;
use cloudctl_core::tonic::{
    self, Status,
    body::Body,
    codegen::{BoxFuture, Context, Poll, Service},
    server::{Grpc, NamedService, ServerStreamingService, UnaryService},
};
use futures_util::stream;
use prost::Message;
use prost_reflect::{DescriptorPool, DynamicMessage, MethodDescriptor, ServiceDescriptor};
use prost_types::{
    DescriptorProto, FieldDescriptorProto, FileDescriptorProto, FileDescriptorSet,
    MethodDescriptorProto, ServiceDescriptorProto,
    field_descriptor_proto::{Label, Type},
};
use serde_json::{Value, json};
use std::convert::Infallible;
use std::future::{Ready, ready};
use std::marker::PhantomData;
use std::sync::LazyLock;

pub const USER_SERVICE: &str = "spaceone.api.identity.v1.User";
pub const PROJECT_SERVICE: &str = "spaceone.api.identity.v1.Project";
pub const ENDPOINT_SERVICE: &str = "spaceone.api.identity.v1.Endpoint";
pub const VALID_TOKEN: &str = "valid-token";

/// The encoded descriptor set, as registered in the reflection service.
pub static FILE_DESCRIPTOR_SET: LazyLock<Vec<u8>> =
    LazyLock::new(|| file_descriptor_set().encode_to_vec());

fn field(name: &str, number: i32, ty: Type) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Optional as i32),
        r#type: Some(ty as i32),
        ..Default::default()
    }
}

fn repeated(name: &str, number: i32, type_name: &str) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_string()),
        number: Some(number),
        label: Some(Label::Repeated as i32),
        r#type: Some(Type::Message as i32),
        type_name: Some(type_name.to_string()),
        ..Default::default()
    }
}

fn message(name: &str, field: Vec<FieldDescriptorProto>) -> DescriptorProto {
    DescriptorProto {
        name: Some(name.to_string()),
        field,
        ..Default::default()
    }
}

fn method(
    name: &str,
    input: &str,
    output: &str,
    server_streaming: bool,
) -> MethodDescriptorProto {
    MethodDescriptorProto {
        name: Some(name.to_string()),
        input_type: Some(format!(".spaceone.api.identity.v1.{input}")),
        output_type: Some(format!(".spaceone.api.identity.v1.{output}")),
        server_streaming: Some(server_streaming),
        ..Default::default()
    }
}

pub fn file_descriptor_set() -> FileDescriptorSet {
    let file = FileDescriptorProto {
        name: Some("spaceone/api/identity/v1/user.proto".to_string()),
        package: Some("spaceone.api.identity.v1".to_string()),
        syntax: Some("proto3".to_string()),
        message_type: vec![
            message(
                "UserInfo",
                vec![
                    field("user_id", 1, Type::String),
                    field("name", 2, Type::String),
                    field("state", 3, Type::String),
                    field("email", 4, Type::String),
                    field("login_count", 5, Type::Int64),
                    field("created_at", 6, Type::String),
                ],
            ),
            message("UserRequest", vec![field("user_id", 1, Type::String)]),
            message(
                "UserQuery",
                vec![
                    field("name", 1, Type::String),
                    field("state", 2, Type::String),
                    field("page", 3, Type::Int32),
                    field("page_size", 4, Type::Int32),
                ],
            ),
            message(
                "UsersInfo",
                vec![
                    repeated("results", 1, ".spaceone.api.identity.v1.UserInfo"),
                    field("total_count", 2, Type::Int32),
                ],
            ),
            message(
                "StatRequest",
                vec![field("count", 1, Type::Int32), field("fail", 2, Type::Bool)],
            ),
            message(
                "ProjectInfo",
                vec![
                    field("project_id", 1, Type::String),
                    field("name", 2, Type::String),
                ],
            ),
            message("ProjectQuery", vec![field("name", 1, Type::String)]),
            message(
                "ProjectsInfo",
                vec![repeated(
                    "results",
                    1,
                    ".spaceone.api.identity.v1.ProjectInfo",
                )],
            ),
            message(
                "EndpointInfo",
                vec![
                    field("service", 1, Type::String),
                    field("name", 2, Type::String),
                    field("endpoint", 3, Type::String),
                    field("state", 4, Type::String),
                ],
            ),
            message("EndpointQuery", vec![field("service", 1, Type::String)]),
            message(
                "EndpointsInfo",
                vec![
                    repeated("results", 1, ".spaceone.api.identity.v1.EndpointInfo"),
                    field("total_count", 2, Type::Int32),
                ],
            ),
        ],
        service: vec![
            ServiceDescriptorProto {
                name: Some("User".to_string()),
                method: vec![
                    method("list", "UserQuery", "UsersInfo", false),
                    method("get", "UserRequest", "UserInfo", false),
                    method("stat", "StatRequest", "UserInfo", true),
                ],
                ..Default::default()
            },
            ServiceDescriptorProto {
                name: Some("Project".to_string()),
                method: vec![method("list", "ProjectQuery", "ProjectsInfo", false)],
                ..Default::default()
            },
            ServiceDescriptorProto {
                name: Some("Endpoint".to_string()),
                method: vec![method("list", "EndpointQuery", "EndpointsInfo", false)],
                ..Default::default()
            },
        ],
        ..Default::default()
    };

    FileDescriptorSet { file: vec![file] }
}

pub fn users() -> Vec<Value> {
    vec![
        json!({
            "user_id": "user-2",
            "name": "bob",
            "state": "DISABLED",
            "email": "bob@example.com",
            "login_count": 3,
            "created_at": "2024-02-01T00:00:00Z"
        }),
        json!({
            "user_id": "user-3",
            "name": "carol",
            "state": "ENABLED",
            "login_count": 9_007_199_254_740_993_i64,
            "created_at": "2024-03-01T00:00:00Z"
        }),
        json!({
            "user_id": "user-1",
            "name": "alice",
            "state": "ENABLED",
            "email": "alice@example.com",
            "login_count": 42,
            "created_at": "2024-01-01T00:00:00Z"
        }),
    ]
}

pub fn endpoints() -> Vec<Value> {
    vec![
        json!({
            "service": "identity",
            "name": "identity",
            "endpoint": "grpc+ssl://identity.api.dev.example.dev:443",
            "state": "ENABLED"
        }),
        json!({
            "service": "inventory",
            "name": "inventory",
            "endpoint": "grpc+ssl://inventory.api.dev.example.dev:443",
            "state": "ENABLED"
        }),
        json!({
            "service": "cost-analysis",
            "name": "cost-analysis",
            "endpoint": "grpc+ssl://cost-analysis.api.dev.example.dev:443",
            "state": "ENABLED"
        }),
    ]
}

/// Names the fixture service a [`ServiceImpl`] serves.
pub trait FixtureName {
    const NAME: &'static str;
}

#[derive(Debug, Clone)]
pub struct User;

#[derive(Debug, Clone)]
pub struct Endpoint;

impl FixtureName for User {
    const NAME: &'static str = USER_SERVICE;
}

impl FixtureName for Endpoint {
    const NAME: &'static str = ENDPOINT_SERVICE;
}

#[derive(Debug, Clone)]
pub struct ServiceImpl<N> {
    service: ServiceDescriptor,
    name: PhantomData<N>,
}

pub type UserServiceImpl = ServiceImpl<User>;
pub type EndpointServiceImpl = ServiceImpl<Endpoint>;

impl<N: FixtureName> ServiceImpl<N> {
    pub fn new() -> Self {
        let pool = DescriptorPool::from_file_descriptor_set(file_descriptor_set())
            .expect("fixture schema is valid");
        let service = pool
            .get_service_by_name(N::NAME)
            .expect("fixture schema declares the service");

        Self {
            service,
            name: PhantomData,
        }
    }
}

impl<N: FixtureName> NamedService for ServiceImpl<N> {
    const NAME: &'static str = N::NAME;
}

impl<N> Service<http::Request<Body>> for ServiceImpl<N> {
    type Response = http::Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<Self::Response, Self::Error>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<Body>) -> Self::Future {
        let method = req
            .uri()
            .path()
            .rsplit('/')
            .next()
            .and_then(|name| self.service.methods().find(|m| m.name() == name));

        Box::pin(async move {
            let Some(method) = method else {
                return Ok(Status::unimplemented("Unknown method").into_http());
            };

            let mut grpc = Grpc::new(DynamicCodec::new(method.input()));
            let response = if method.is_server_streaming() {
                grpc.server_streaming(StatHandler(method), req).await
            } else {
                grpc.unary(UnaryHandler(method), req).await
            };

            Ok(response)
        })
    }
}

fn authenticate<T>(request: &tonic::Request<T>) -> Result<(), Status> {
    match request.metadata().get("token").and_then(|t| t.to_str().ok()) {
        Some(VALID_TOKEN) => Ok(()),
        _ => Err(Status::unauthenticated(concat!(
            "ERROR_AUTHENTICATE_FAILURE: Authenticate failure. ",
            "(message = Token is invalid or expired.)"
        ))),
    }
}

fn to_message(method: &MethodDescriptor, value: Value) -> Result<DynamicMessage, Status> {
    DynamicMessage::deserialize(method.output(), value)
        .map_err(|e| Status::internal(format!("Invalid fixture response: {e}")))
}

struct UnaryHandler(MethodDescriptor);

impl UnaryService<Value> for UnaryHandler {
    type Response = DynamicMessage;
    type Future = Ready<Result<tonic::Response<DynamicMessage>, Status>>;

    fn call(&mut self, request: tonic::Request<Value>) -> Self::Future {
        ready(handle_unary(&self.0, request).map(tonic::Response::new))
    }
}

fn handle_unary(
    method: &MethodDescriptor,
    request: tonic::Request<Value>,
) -> Result<DynamicMessage, Status> {
    authenticate(&request)?;
    let params = request.into_inner();

    let response = match (method.parent_service().name(), method.name()) {
        ("User", "list") => {
            let results = matching(users(), &params, "state");
            json!({ "total_count": results.len(), "results": results })
        }
        ("Endpoint", "list") => {
            let results = matching(endpoints(), &params, "service");
            json!({ "total_count": results.len(), "results": results })
        }
        ("User", "get") => {
            let user_id = params
                .get("user_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .ok_or_else(|| {
                    Status::invalid_argument(
                        "ERROR_REQUIRED_PARAMETER: Required parameter. (key = user_id)",
                    )
                })?;

            users()
                .into_iter()
                .find(|user| user["user_id"] == user_id)
                .ok_or_else(|| {
                    Status::not_found(format!(
                        "ERROR_NOT_FOUND: Value not found. (user_id = {user_id})"
                    ))
                })?
        }
        _ => {
            return Err(Status::unimplemented(format!(
                "Unknown method '{}'",
                method.full_name()
            )));
        }
    };

    to_message(method, response)
}

/// Items whose `key` equals the `key` filter of the request, or all of them without a filter.
fn matching(items: Vec<Value>, params: &Value, key: &str) -> Vec<Value> {
    items
        .into_iter()
        .filter(|item| match params.get(key) {
            Some(wanted) => item.get(key) == Some(wanted),
            None => true,
        })
        .collect()
}

struct StatHandler(MethodDescriptor);

type StatStream = stream::Iter<std::vec::IntoIter<Result<DynamicMessage, Status>>>;

impl ServerStreamingService<Value> for StatHandler {
    type Response = DynamicMessage;
    type ResponseStream = StatStream;
    type Future = Ready<Result<tonic::Response<StatStream>, Status>>;

    fn call(&mut self, request: tonic::Request<Value>) -> Self::Future {
        ready(handle_stat(&self.0, request).map(tonic::Response::new))
    }
}

fn handle_stat(
    method: &MethodDescriptor,
    request: tonic::Request<Value>,
) -> Result<StatStream, Status> {
    authenticate(&request)?;
    let params = request.into_inner();

    let count = params.get("count").and_then(Value::as_u64).unwrap_or(0) as usize;
    let fail = params.get("fail").and_then(Value::as_bool).unwrap_or(false);

    let mut messages = users()
        .into_iter()
        .cycle()
        .take(count)
        .map(|user| to_message(method, user))
        .collect::<Vec<_>>();

    if fail {
        messages.push(Err(Status::internal("stat stream interrupted")));
    }

    Ok(stream::iter(messages))
}
