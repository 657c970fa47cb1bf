//! Core reconciliation and event-translation engine
//!
//! This library provides:
//! - Workload descriptor extraction from raw runtime records
//! - Registration policy (opt-in gate, address/port resolution, checks, tags)
//! - The registry abstraction and an in-memory registry
//! - Event dispatch over the runtime's event stream
//! - Full-state reconciliation sweeps
//! - The supervisor tying dispatch and sweeps together

pub mod config;
pub mod context;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod policy;
pub mod reconciler;
pub mod record;
pub mod registry;
pub mod runtime;
pub mod supervisor;

pub use config::{BindingMode, CheckSettings, PolicyConfig, RegistrarConfig, SweepConfig};
pub use context::Context;
pub use descriptor::{PortBinding, Protocol, WorkloadDescriptor, WorkloadKind};
pub use dispatcher::{Action, DispatchOutcome, EventDispatcher, StreamEnd};
pub use error::{ConfigError, ExtractionError, PolicyError, RegistryError, RuntimeError};
pub use policy::{Decision, PolicyEngine, SkipReason};
pub use reconciler::{Reconciler, SweepFailure, SweepReport};
pub use record::{CheckSpec, ServiceRecord, ServiceRecordSummary};
pub use registry::{InMemoryRegistry, ServiceRegistry};
pub use runtime::{
    ContainerRecord, EventStream, ListedWorkload, RuntimeEvent, ServiceSpecRecord, WorkloadRuntime,
};
pub use supervisor::Registrar;
