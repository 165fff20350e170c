// Job Store Port (Interface)

use crate::domain::{JobId, JobRecord, JobStatus};
use crate::error::Result;
use async_trait::async_trait;

/// Durable storage for Job Records
///
/// Every record is addressed by `id`; `save` is a full-record overwrite
/// (last writer wins). Only the runner that owns a job writes to it.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Insert or fully overwrite a record
    async fn save(&self, record: &JobRecord) -> Result<()>;

    /// Delete a record (returns false if it did not exist)
    async fn delete(&self, id: &JobId) -> Result<bool>;

    /// Load every record, oldest first
    async fn load_all(&self) -> Result<Vec<JobRecord>>;

    /// Find a record by ID
    async fn find_by_id(&self, id: &JobId) -> Result<Option<JobRecord>>;

    /// Find all records in a status (used by crash recovery)
    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>> {
        Ok(self
            .load_all()
            .await?
            .into_iter()
            .filter(|r| r.status == status)
            .collect())
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::error::AppError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// In-memory store that also keeps every saved snapshot in order
    #[derive(Default)]
    pub struct InMemoryJobStore {
        records: Mutex<HashMap<JobId, JobRecord>>,
        history: Mutex<Vec<JobRecord>>,
        failing_terminal_saves: AtomicUsize,
    }

    impl InMemoryJobStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed a record without going through `save` (no history entry)
        pub fn seed(&self, record: JobRecord) {
            self.records
                .lock()
                .unwrap()
                .insert(record.id.clone(), record);
        }

        /// Every snapshot saved for one job, in write order
        pub fn history_for(&self, id: &str) -> Vec<JobRecord> {
            self.history
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.id == id)
                .cloned()
                .collect()
        }

        pub fn save_count(&self) -> usize {
            self.history.lock().unwrap().len()
        }

        /// Fail the next `n` saves of COMPLETED or ERROR records
        pub fn fail_terminal_saves(&self, n: usize) {
            self.failing_terminal_saves.store(n, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl JobStore for InMemoryJobStore {
        async fn save(&self, record: &JobRecord) -> Result<()> {
            if record.status.is_terminal()
                && self
                    .failing_terminal_saves
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok()
            {
                return Err(AppError::Database("database is locked".to_string()));
            }
            self.history.lock().unwrap().push(record.clone());
            self.records
                .lock()
                .unwrap()
                .insert(record.id.clone(), record.clone());
            Ok(())
        }

        async fn delete(&self, id: &JobId) -> Result<bool> {
            Ok(self.records.lock().unwrap().remove(id).is_some())
        }

        async fn load_all(&self) -> Result<Vec<JobRecord>> {
            let mut all: Vec<JobRecord> = self.records.lock().unwrap().values().cloned().collect();
            all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
            Ok(all)
        }

        async fn find_by_id(&self, id: &JobId) -> Result<Option<JobRecord>> {
            Ok(self.records.lock().unwrap().get(id).cloned())
        }
    }
}
