// Crash recovery logic
use crate::domain::JobStatus;
use crate::port::JobStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Crash recovery service
///
/// On process start, no runner can still be alive: the cancellation registry
/// is process-local and empty. Any PROCESSING record left in the store is
/// therefore orphaned and is rewritten to ERROR.
pub struct RecoveryService {
    store: Arc<dyn JobStore>,
}

impl RecoveryService {
    /// Create a new recovery service
    ///
    /// # Example
    /// ```ignore
    /// let recovery = RecoveryService::new(store);
    /// recovery.recover_orphaned_jobs().await?;
    /// ```
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    /// Recover orphaned jobs
    ///
    /// Algorithm:
    /// 1. Find all PROCESSING records
    /// 2. Rewrite each to ERROR with "process interrupted" and 0% progress,
    ///    leaving every other field untouched
    /// 3. Leave records in any other status alone
    ///
    /// Must run before the first submission of this process.
    ///
    /// # Returns
    /// Number of jobs recovered
    pub async fn recover_orphaned_jobs(&self) -> crate::error::Result<usize> {
        info!("Starting orphaned job recovery");

        let orphaned = self.store.find_by_status(JobStatus::Processing).await?;
        let mut recovered_count = 0;

        for mut record in orphaned {
            if !record.mark_interrupted() {
                continue;
            }

            warn!(
                job_id = %record.id,
                source_kind = %record.source_kind(),
                "Orphaned job marked as interrupted"
            );
            self.store.save(&record).await?;
            recovered_count += 1;
        }

        info!(recovered_count = %recovered_count, "Orphaned job recovery complete");
        Ok(recovered_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Difficulty, GeneratedItem, GenerationConfig, JobError, JobRecord, JobSource,
    };
    use crate::port::job_store::mocks::InMemoryJobStore;

    fn record() -> JobRecord {
        JobRecord::new_test(
            JobSource::QuestionBank {
                year: 2019,
                group: "B".to_string(),
            },
            GenerationConfig::new(12, Difficulty::Medium),
        )
    }

    #[tokio::test]
    async fn test_only_processing_records_are_rewritten() {
        let store = Arc::new(InMemoryJobStore::new());

        let mut processing = record();
        processing.begin().unwrap();
        processing.record_progress(70, "Generating: bank").unwrap();

        let mut completed = record();
        completed.begin().unwrap();
        completed
            .complete(vec![GeneratedItem::new(serde_json::json!({"q": 1}))])
            .unwrap();

        let mut failed = record();
        failed.begin().unwrap();
        failed
            .fail(&JobError::CollaboratorFailure("boom".to_string()))
            .unwrap();

        for r in [&processing, &completed, &failed] {
            store.seed(r.clone());
        }

        let recovery = RecoveryService::new(store.clone());
        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 1);

        let recovered = store.find_by_id(&processing.id).await.unwrap().unwrap();
        assert_eq!(recovered.status, JobStatus::Error);
        assert_eq!(recovered.error_message.as_deref(), Some("process interrupted"));
        assert_eq!(recovered.progress_percent, 0);
        assert_eq!(recovered.progress_label, processing.progress_label);
        assert_eq!(recovered.config, processing.config);
        assert_eq!(recovered.created_at, processing.created_at);

        assert_eq!(
            store.find_by_id(&completed.id).await.unwrap().unwrap(),
            completed
        );
        assert_eq!(store.find_by_id(&failed.id).await.unwrap().unwrap(), failed);

        // Only the orphan was written
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_second_run_is_noop() {
        let store = Arc::new(InMemoryJobStore::new());
        let mut processing = record();
        processing.begin().unwrap();
        store.seed(processing);

        let recovery = RecoveryService::new(store.clone());
        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 1);
        assert_eq!(recovery.recover_orphaned_jobs().await.unwrap(), 0);
    }
}
