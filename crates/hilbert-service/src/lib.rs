//! # hilbert-service
//!
//! Runs the semantic engines as cancellable, progress-reporting jobs.
//!
//! ```text
//! ProcessRegistry       ← id counters, live jobs, the arbiter
//!     │
//! ServiceJob            ← one thread, cancel token, progress tracker
//!     │ creates
//! ModuleServiceCall     ← one service on one module; nested calls form a tree
//!     │ blocks via
//! ModuleArbiter         ← at most one job holds a module; reentrant, never waits
//!     │
//! ModuleServices        ← load / well-formed / proofs / tautologies
//!     │ reads & advances
//! ModuleRepository      ← modules with their stage machines and check errors
//! ```
//!
//! A refused block is retried by the job per [`ArbiterConfig`]; the
//! arbiter itself never waits.

pub mod arbiter;
pub mod call;
pub mod config;
pub mod error;
pub mod job;
pub mod registry;
pub mod repository;
pub mod services;

pub use arbiter::ModuleArbiter;
pub use call::{CallSnapshot, ModuleServiceCall, Service, ServiceParams, ServiceResult};
pub use config::{ArbiterConfig, ProofConfig, ServiceConfig, TruthConfig};
pub use error::{ArbiterError, ConfigError, ServiceError};
pub use job::{JobHandle, JobSnapshot, JobState, ServiceJob};
pub use registry::{CallId, JobId, ProcessRegistry};
pub use repository::{KernelModule, ModuleRepository};
pub use services::ModuleServices;
