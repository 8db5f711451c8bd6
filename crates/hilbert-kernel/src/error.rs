//! Error types for kernel operations.

use crate::state::{Stage, StageEvent};

/// Precondition violations raised by kernel data structures.
///
/// These signal a caller bug (an out-of-order lifecycle event, a bad child
/// index), never a verification failure of the module under check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// The event is not accepted by the stage's current state.
    #[error("invalid {stage} transition: {event} while `{state}`")]
    InvalidTransition {
        stage: Stage,
        state: &'static str,
        event: StageEvent,
    },

    /// A stage was started before the stage it depends on succeeded.
    #[error("{stage} cannot start: {required}")]
    PrerequisiteNotMet { stage: Stage, required: &'static str },

    /// A child index was outside the list.
    #[error("element index {index} out of range for list of {len}")]
    IndexOutOfRange { index: usize, len: usize },
}
