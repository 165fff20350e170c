// Application Layer - Use Cases and Business Logic

pub mod allocation;
pub mod cancellation;
pub mod constants;
pub mod generation;
pub mod panic_guard;
pub mod plan;
pub mod recovery;
pub mod retry;
pub mod runner;

// Re-exports
pub use allocation::allocate;
pub use cancellation::{CancellationRegistry, RegistrationGuard};
pub use generation::{GenerationService, SubmitRequest};
pub use plan::{resolve_plan, Plan, Segment};
pub use recovery::RecoveryService;
pub use retry::{PreparedRetry, RetryDispatcher};
pub use runner::JobRunner;
