//! Wire types for the service registry agent API
//!
//! This library defines the JSON payloads exchanged with the registry agent:
//! - AgentServiceRegistration: body of `PUT /v1/agent/service/register`
//! - AgentServiceCheck: health-check declaration carried by a registration
//! - AgentServiceConnect: sidecar request carried by a registration
//! - AgentService: one entry of `GET /v1/agent/services`

pub mod consul;

pub use consul::{AgentService, AgentServiceCheck, AgentServiceConnect, AgentServiceRegistration};
