// Domain Error Types

use thiserror::Error;

/// Message recorded for a cooperative cancellation
pub const CANCELLED_MESSAGE: &str = "cancelled by user";

/// Message recorded when the generator yields nothing without raising
pub const EMPTY_RESULT_MESSAGE: &str = "no content produced";

/// Message recorded by crash recovery for orphaned jobs
pub const INTERRUPTED_MESSAGE: &str = "process interrupted";

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Job {0} already has an active runner")]
    AlreadyRunning(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;

/// Why a generation job ended in `ERROR`.
///
/// The `Display` output is exactly what lands in `JobRecord::error_message`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Cooperative cancellation was observed
    #[error("cancelled by user")]
    Cancelled,

    /// The generator returned no items without raising
    #[error("no content produced")]
    EmptyResult,

    /// Any other failure from the generator or a source lookup, surfaced verbatim
    #[error("{0}")]
    CollaboratorFailure(String),

    /// A source the job depends on can no longer be located
    #[error("source missing: {0}")]
    SourceMissing(String),

    /// The owning process died while the job was running
    #[error("process interrupted")]
    Interrupted,
}
