//! Consul agent implementation of the service registry
//!
//! - [`ConsulRegistry`]: talks to the local agent over its HTTP API
//! - [`wire`]: record to agent payload conversions

pub mod client;
pub mod wire;

pub use client::ConsulRegistry;
