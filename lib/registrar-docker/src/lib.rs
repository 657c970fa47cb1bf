//! Docker Engine integration
pub mod client;
pub mod convert;
pub mod runtime;

pub use client::DockerClient;
