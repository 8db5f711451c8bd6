//! # hilbert-logic
//!
//! The semantic engines jobs run against a module:
//! - `truth`: exhaustive boolean-valuation tautology check
//! - `wellformed`: operator/arity/binding/reference validation
//! - `proof`: versioned formal proof checkers behind a factory
//!
//! Engines never throw on a single bad item. They collect [`CheckError`]s
//! into a [`CheckErrorList`] (empty means success) and reserve
//! [`LogicError`] for precondition violations and cancellation.

pub mod check;
pub mod error;
pub mod formula;
pub mod proof;
pub mod resolver;
pub mod rule;
pub mod truth;
pub mod wellformed;

pub use check::{CheckError, CheckErrorList, ModuleContext, codes};
pub use error::LogicError;
pub use proof::{ProofChecker, ProofCheckerFactory};
pub use resolver::{ModuleResolver, ReferenceResolver};
pub use rule::{RuleChecker, RuleKey, RuleVersion};
pub use truth::{Interpretation, TruthOptions, TruthReport, is_tautology};
pub use wellformed::check_well_formed;
