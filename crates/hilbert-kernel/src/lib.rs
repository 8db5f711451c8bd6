//! # Hilbert Kernel
//!
//! Shared data model for module verification: a module is a parsed,
//! formally specified document whose formulas and proofs are checked by the
//! engines in `hilbert-logic` under jobs orchestrated by `hilbert-service`.
//!
//! ## Architecture
//!
//! ```text
//! Element               ← Atom | OP(children…): the formula tree
//!     │
//! Module                ← address, imports, rule declarations, labelled nodes
//!     │
//! ModuleStates          ← dependency / well-formed / formally-proved machines
//!     │
//! CancelToken           ← cooperative interruption, polled by engines
//! ProgressTracker       ← completeness capability engines publish into
//! ```

pub mod cancel;
pub mod element;
pub mod error;
pub mod module;
pub mod progress;
pub mod state;

pub use cancel::{CancelToken, Cancelled};
pub use element::{Element, ElementList};
pub use error::KernelError;
pub use module::{
    Conclusion, FormalProof, Hypothesis, Import, Module, ModuleAddress, Node, NodeKind, ProofLine,
    Reason, RuleDeclaration,
};
pub use progress::{Completeness, ProgressTracker};
pub use state::{
    DependencyState, FormallyProvedState, ModuleStates, Stage, StageEvent, WellFormedState,
};
