//! Consul agent API payloads
pub mod agent;
pub mod registration;

pub use agent::AgentService;
pub use registration::{AgentServiceCheck, AgentServiceConnect, AgentServiceRegistration};
