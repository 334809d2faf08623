//! # Generic gRPC Transport
//!
//! Low-level building blocks for performing gRPC calls with message types only known at runtime.
//!
//! Requests travel as `prost_reflect::DynamicMessage` values already shaped by the method input
//! schema; responses come back as `serde_json::Value` trees.
pub mod client;
pub mod codec;
