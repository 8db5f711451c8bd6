//! Error types for jobs, calls and the arbiter.

use crate::registry::JobId;
use hilbert_kernel::{Cancelled, KernelError, ModuleAddress};
use hilbert_logic::LogicError;

/// A block request the arbiter refused. Recoverable: the caller retries,
/// skips or fails its own call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArbiterError {
    #[error("module {module} is already blocked by job {holder}")]
    AlreadyBlocked { module: ModuleAddress, holder: JobId },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Arbiter(#[from] ArbiterError),

    #[error(transparent)]
    Kernel(#[from] KernelError),

    #[error(transparent)]
    Logic(LogicError),

    #[error("module {0} is not in the repository")]
    UnknownModule(ModuleAddress),

    #[error("module {0} is already in the repository")]
    DuplicateModule(ModuleAddress),

    #[error("failed to start job thread: {0}")]
    Spawn(#[source] std::io::Error),

    /// The job's cancellation token was set. Not a defect.
    #[error("interrupted")]
    Interrupted,
}

impl ServiceError {
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Interrupted)
    }
}

impl From<Cancelled> for ServiceError {
    fn from(_: Cancelled) -> Self {
        Self::Interrupted
    }
}

impl From<LogicError> for ServiceError {
    fn from(err: LogicError) -> Self {
        match err {
            LogicError::Cancelled => Self::Interrupted,
            other => Self::Logic(other),
        }
    }
}
