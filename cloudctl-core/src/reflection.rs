//! # Server Reflection
//!
//! This module contains the logic necessary to interact with the gRPC Server Reflection Protocol.
//!
//! The platform services only ship the `v1alpha` flavour of the protocol, so that is the one
//! spoken here. The generated client types come from `tonic-reflection`.
pub mod client;
