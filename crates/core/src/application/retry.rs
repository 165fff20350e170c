// Retry dispatch: rebuild a prior job as a fresh submission
use crate::application::plan::{resolve_plan, Plan};
use crate::domain::{JobError, JobRecord};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, JobStore, SourceCatalog, TimeProvider};
use std::sync::Arc;
use tracing::{info, warn};

/// A retry that is ready to hand to the runner
#[derive(Debug)]
pub struct PreparedRetry {
    /// Fresh IDLE record, `retry_of` pointing at the original
    pub record: JobRecord,
    /// Plan resolved up front, absent when resolution failed for a reason
    /// other than a missing source (the runner records that failure)
    pub plan: Option<Plan>,
}

/// Retry dispatcher
///
/// Never mutates the original record. Source dependencies are resolved
/// before anything is submitted.
pub struct RetryDispatcher {
    store: Arc<dyn JobStore>,
    sources: SourceCatalog,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
}

impl RetryDispatcher {
    pub fn new(
        store: Arc<dyn JobStore>,
        sources: SourceCatalog,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Self {
        Self {
            store,
            sources,
            id_provider,
            time_provider,
        }
    }

    /// Build the retry of `original_id`.
    ///
    /// # Errors
    /// * `NotFound` if the original does not exist
    /// * `Job(SourceMissing)` if a source it depends on is gone; nothing is submitted
    pub async fn prepare(&self, original_id: &str) -> Result<PreparedRetry> {
        let original = self
            .store
            .find_by_id(&original_id.to_string())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {}", original_id)))?;

        let plan = match resolve_plan(&self.sources, &original.source, &original.config).await {
            Ok(plan) => Some(plan),
            Err(err @ JobError::SourceMissing(_)) => {
                warn!(
                    job_id = %original.id,
                    error = %err,
                    "Retry rejected, source no longer available"
                );
                return Err(AppError::Job(err));
            }
            Err(err) => {
                warn!(
                    job_id = %original.id,
                    error = %err,
                    "Retry plan unresolved, runner will record the failure"
                );
                None
            }
        };

        let record = original.retry_record(
            self.id_provider.generate_id(),
            self.time_provider.now_millis(),
        );

        info!(
            job_id = %record.id,
            retry_of = %original.id,
            source_kind = %record.source_kind(),
            "Retry prepared"
        );

        Ok(PreparedRetry { record, plan })
    }
}
