// Panic isolation for collaborator calls
// A panicking generator must not leave its job stuck in PROCESSING
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed (successfully or not)
    Completed(T),
    /// Execution panicked
    Panicked(String),
}

/// Poll `future` to completion, catching any panic it raises.
///
/// # Example
/// ```text
/// match guard_async(generator.generate(&request, &reporter, &token)).await {
///     PanicGuardResult::Completed(outcome) => outcome,
///     PanicGuardResult::Panicked(msg) => Err(GenerationError::Failed(msg)),
/// }
/// ```
pub async fn guard_async<F, T>(future: F) -> PanicGuardResult<T>
where
    F: Future<Output = T>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(value) => PanicGuardResult::Completed(value),
        Err(panic_info) => {
            let panic_msg = panic_message(panic_info.as_ref());
            error!(panic_msg = %panic_msg, "Collaborator call panicked");
            PanicGuardResult::Panicked(panic_msg)
        }
    }
}

fn panic_message(panic_info: &(dyn Any + Send)) -> String {
    if let Some(s) = panic_info.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic_info.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
