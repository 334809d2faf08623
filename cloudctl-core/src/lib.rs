//! # cloudctl Core
//!
//! `cloudctl-core` is the engine behind the `cloudctl` CLI. It exposes the gRPC services of a
//! cloud-management platform as dynamic `<service> <verb> <resource>` calls, without any
//! compile-time knowledge of their Protobuf schemas.
//!
//! ## Pipeline
//!
//! A single invocation flows through these modules, in order:
//!
//! * **[`endpoint`]:** Resolves the concrete `host:port` to dial for a service, from the
//!   configured environment endpoint (local plaintext, direct TLS or HTTP gateway).
//! * **[`reflection`]:** Lists services and fetches their schemas through gRPC Server Reflection.
//! * **[`discovery`]:** Maps a service short name and a resource name to one fully qualified
//!   service, preferring plugin namespaces over versioned API namespaces.
//! * **[`params`]:** Merges file, inline JSON and `key=value` parameters into one mapping.
//! * **[`invoke`]:** Builds a request from the method input schema and dispatches it, unary or
//!   server streaming, normalising the response into a [`serde_json::Value`].
//! * **[`postprocess`]:** Sorts, limits and projects list-shaped results.
//!
//! [`client::ServiceClient`] ties these together for one connection, and
//! [`client::fetch_service`] runs the whole pipeline.
//!
//! ## Collaborators
//!
//! The HTTP gateway lookup ([`gateway`]), the alias table ([`alias`]) and the cached service
//! registry ([`registry`]) are exposed as small traits/values so the CLI can inject them.
//!
//! ## Re-exports
//!
//! This crate re-exports `prost-reflect` and `tonic` to ensure that consumers
//! use compatible versions of these underlying dependencies.
pub mod alias;
pub mod client;
pub mod discovery;
pub mod endpoint;
pub mod error;
pub mod gateway;
pub mod grpc;
pub mod invoke;
pub mod options;
pub mod params;
pub mod postprocess;
pub mod reflection;
pub mod registry;

pub use error::FetchError;

// Re-exports
pub use prost_reflect;
pub use tonic;

/// Type alias for the standard boxed error used in generic bounds.
type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
