// Port Layer - Interfaces for external collaborators

pub mod generator;
pub mod job_store;
pub mod providers; // For deterministic testing
pub mod source;

// Re-exports
pub use generator::{GenerationError, GenerationRequest, GenerationTarget, Generator, ProgressReporter};
pub use job_store::JobStore;
pub use providers::{IdProvider, SystemTimeProvider, TimeProvider, UuidProvider};
pub use source::{
    DocumentExtractor, MockPattern, MockPatternProvider, MockSection, QuestionBank,
    QuestionBankAccessor, SourceCatalog, SourceError, SyllabusProvider, TopicDescriptor,
};
pub use tokio_util::sync::CancellationToken;
