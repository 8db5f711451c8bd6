//! Error types for the semantic engines.

use hilbert_kernel::Cancelled;

/// Precondition violations and cancellation.
///
/// Verification failures are not errors here: they are collected as
/// [`crate::CheckError`] values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogicError {
    /// The cancellation token was set; not a defect.
    #[error("interrupted")]
    Cancelled,

    /// The truth evaluator met an operator it cannot interpret.
    #[error("cannot evaluate operator `{0}`")]
    UnsupportedOperator(String),

    /// A formula node lacks the shape its operator requires.
    #[error("malformed formula: {0}")]
    MalformedFormula(String),

    /// A rule version string is not a dotted `major.minor.patch` triple.
    #[error("invalid rule version `{0}`")]
    InvalidRuleVersion(String),

    /// No checker implements the requested rule-set revision.
    #[error("rule version `{0}` is not supported")]
    UnsupportedRuleVersion(String),
}

impl From<Cancelled> for LogicError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}
