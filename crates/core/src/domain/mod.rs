// Domain Layer - Pure business logic and entities

pub mod config;
pub mod error;
pub mod job;
pub mod source;

// Re-exports
pub use config::{Difficulty, GenerationConfig, TestMode, MAX_ITEM_COUNT};
pub use error::{
    DomainError, JobError, CANCELLED_MESSAGE, EMPTY_RESULT_MESSAGE, INTERRUPTED_MESSAGE,
};
pub use job::{GeneratedItem, JobId, JobRecord, JobStatus};
pub use source::{JobSource, SourceKind};
