// Generation Service - caller-facing use cases for generation jobs

pub mod submit;


pub use submit::{build_record, validate_request, SubmitRequest};

use crate::application::cancellation::CancellationRegistry;
use crate::application::constants::EVENT_CHANNEL_CAPACITY;
use crate::application::plan::Plan;
use crate::application::recovery::RecoveryService;
use crate::application::retry::RetryDispatcher;
use crate::application::runner::JobRunner;
use crate::domain::{JobId, JobRecord, JobStatus};
use crate::error::{AppError, Result};
use crate::port::{Generator, IdProvider, JobStore, SourceCatalog, TimeProvider};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Generation Service
///
/// Owns the cancellation registry and the event channel for one process.
/// Construct it with [`GenerationService::start`], which runs crash recovery
/// before the first submission can happen.
pub struct GenerationService {
    store: Arc<dyn JobStore>,
    registry: Arc<CancellationRegistry>,
    runner: JobRunner,
    retry: RetryDispatcher,
    id_provider: Arc<dyn IdProvider>,
    time_provider: Arc<dyn TimeProvider>,
    events: broadcast::Sender<JobRecord>,
}

impl GenerationService {
    /// Recover orphaned jobs, then return a service ready for submissions
    pub async fn start(
        store: Arc<dyn JobStore>,
        generator: Arc<dyn Generator>,
        sources: SourceCatalog,
        id_provider: Arc<dyn IdProvider>,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self> {
        let recovered = RecoveryService::new(Arc::clone(&store))
            .recover_orphaned_jobs()
            .await?;
        if recovered > 0 {
            warn!(recovered, "Orphaned jobs from a previous run marked as interrupted");
        }

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let runner = JobRunner::new(
            Arc::clone(&store),
            generator,
            sources.clone(),
            events.clone(),
        );
        let retry = RetryDispatcher::new(
            Arc::clone(&store),
            sources,
            Arc::clone(&id_provider),
            Arc::clone(&time_provider),
        );

        Ok(Self {
            store,
            registry: Arc::new(CancellationRegistry::new()),
            runner,
            retry,
            id_provider,
            time_provider,
            events,
        })
    }

    /// Submit a new job; returns its id once the PROCESSING record is persisted
    pub async fn submit(&self, req: SubmitRequest) -> Result<JobId> {
        let record = build_record(self.id_provider.as_ref(), self.time_provider.as_ref(), req)?;
        self.launch(record, None).await
    }

    /// Request cooperative cancellation.
    ///
    /// Returns whether a running job was signalled. Unknown, finished and
    /// already-cancelled ids are no-ops.
    pub fn cancel(&self, id: &str) -> bool {
        self.registry.request_cancel(id)
    }

    /// Re-submit a prior job's source and config under a fresh id
    pub async fn retry(&self, id: &str) -> Result<JobId> {
        let prepared = self.retry.prepare(id).await?;
        self.launch(prepared.record, prepared.plan).await
    }

    /// Current snapshot of a job
    pub async fn observe(&self, id: &str) -> Result<JobRecord> {
        self.store
            .find_by_id(&id.to_string())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("job {}", id)))
    }

    /// Every stored job, oldest first
    pub async fn list(&self) -> Result<Vec<JobRecord>> {
        self.store.load_all().await
    }

    /// Delete a finished job.
    ///
    /// Returns false if the id is unknown. Running jobs are rejected with
    /// `Conflict` so their runner never loses its record.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let id = id.to_string();
        if self.registry.is_active(&id) {
            return Err(AppError::Conflict(format!("job {} is still processing", id)));
        }
        if let Some(record) = self.store.find_by_id(&id).await? {
            if record.status == JobStatus::Processing {
                return Err(AppError::Conflict(format!("job {} is still processing", id)));
            }
        }

        let deleted = self.store.delete(&id).await?;
        if deleted {
            info!(job_id = %id, "Job deleted");
        }
        Ok(deleted)
    }

    /// Receive every persisted snapshot from now on
    pub fn subscribe(&self) -> broadcast::Receiver<JobRecord> {
        self.events.subscribe()
    }

    /// Number of jobs with a live runner in this process
    pub fn active_jobs(&self) -> usize {
        self.registry.active_count()
    }

    async fn launch(&self, mut record: JobRecord, plan: Option<Plan>) -> Result<JobId> {
        record.begin()?;
        let registration = self.registry.register(&record.id)?;

        // Dropping the registration on error releases the id again
        self.store.save(&record).await?;
        let _ = self.events.send(record.clone());

        let job_id = record.id.clone();
        info!(
            job_id = %job_id,
            source_kind = %record.source_kind(),
            count = record.config.count,
            difficulty = %record.config.difficulty,
            retry_of = ?record.retry_of,
            "Job submitted"
        );

        let runner = self.runner.clone();
        tokio::spawn(async move {
            runner.run(record, plan, registration).await;
        });

        Ok(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        Difficulty, GenerationConfig, JobError, JobSource, TestMode, CANCELLED_MESSAGE,
        EMPTY_RESULT_MESSAGE, INTERRUPTED_MESSAGE,
    };
    use crate::port::generator::mocks::{ScriptedGenerator, Step};
    use crate::port::job_store::mocks::InMemoryJobStore;
    use crate::port::providers::mocks::{SequentialIdProvider, SteppingClock};
    use crate::port::source::mocks::StaticSources;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Harness {
        service: GenerationService,
        store: Arc<InMemoryJobStore>,
        generator: Arc<ScriptedGenerator>,
        sources: Arc<StaticSources>,
    }

    async fn harness(steps: Vec<Step>) -> Harness {
        harness_with_store(steps, Arc::new(InMemoryJobStore::new())).await
    }

    async fn harness_with_store(steps: Vec<Step>, store: Arc<InMemoryJobStore>) -> Harness {
        let generator = Arc::new(ScriptedGenerator::new(steps));
        let sources = Arc::new(
            StaticSources::new()
                .with_subject("math", &["Algebra", "Geometry", "Calculus", "Trig", "Stats"])
                .with_document("doc-1", "The mitochondria is the powerhouse of the cell.")
                .with_bank(2020, "A", vec![serde_json::json!({"q": "2+2?"})])
                .with_pattern("full", &[("Verbal", 3), ("Quant", 2)]),
        );
        let service = GenerationService::start(
            store.clone(),
            generator.clone(),
            SourceCatalog::from_shared(sources.clone()),
            Arc::new(SequentialIdProvider::default()),
            Arc::new(SteppingClock::starting_at(1_000)),
        )
        .await
        .unwrap();

        Harness {
            service,
            store,
            generator,
            sources,
        }
    }

    fn topics_request(names: &[&str], count: u32) -> SubmitRequest {
        SubmitRequest {
            source: JobSource::SyllabusTopics {
                subject: "math".to_string(),
                topics: names.iter().map(|s| s.to_string()).collect(),
            },
            config: GenerationConfig::new(count, Difficulty::Medium),
        }
    }

    fn document_request(count: u32) -> SubmitRequest {
        SubmitRequest {
            source: JobSource::UploadedDocument {
                document_id: "doc-1".to_string(),
                file_name: Some("biology.txt".to_string()),
            },
            config: GenerationConfig::new(count, Difficulty::Easy),
        }
    }

    async fn wait_for<F>(rx: &mut broadcast::Receiver<JobRecord>, mut pred: F) -> JobRecord
    where
        F: FnMut(&JobRecord) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let record = rx.recv().await.expect("event channel closed");
                if pred(&record) {
                    return record;
                }
            }
        })
        .await
        .expect("timed out waiting for job event")
    }

    async fn wait_terminal(rx: &mut broadcast::Receiver<JobRecord>, id: &str) -> JobRecord {
        wait_for(rx, |r| r.id == id && r.status.is_terminal()).await
    }

    #[tokio::test]
    async fn test_single_target_completes() {
        let h = harness(vec![]).await;
        let mut rx = h.service.subscribe();

        let id = h.service.submit(document_request(6)).await.unwrap();

        // PROCESSING is persisted before submit returns
        let first = h.store.history_for(&id)[0].clone();
        assert_eq!(first.status, JobStatus::Processing);
        assert_eq!(first.progress_percent, 5);

        let done = wait_terminal(&mut rx, &id).await;
        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.progress_percent, 100);
        assert_eq!(done.result.as_ref().map(|r| r.len()), Some(6));
        assert!(done.error_message.is_none());
        assert!(done.step_labels.is_empty());

        assert_eq!(h.generator.call_count(), 1);
        assert_eq!(h.service.active_jobs(), 0);
        assert_eq!(h.service.observe(&id).await.unwrap(), done);
    }

    #[tokio::test]
    async fn test_multi_target_runs_in_order_with_monotonic_progress() {
        let h = harness(vec![]).await;
        let mut rx = h.service.subscribe();

        let id = h
            .service
            .submit(topics_request(&["Geometry", "Algebra", "Calculus"], 10))
            .await
            .unwrap();
        let done = wait_terminal(&mut rx, &id).await;

        let calls = h.generator.calls();
        let labels: Vec<String> = calls.iter().map(|c| c.target.label()).collect();
        let counts: Vec<u32> = calls.iter().map(|c| c.count).collect();
        assert_eq!(labels, vec!["Geometry", "Algebra", "Calculus"]);
        assert_eq!(counts, vec![4, 3, 3]);

        assert_eq!(done.status, JobStatus::Completed);
        assert_eq!(done.step_labels, labels);
        assert_eq!(done.step_index, Some(2));

        // Items concatenated in target order
        let items = done.result.unwrap();
        assert_eq!(items.len(), 10);
        assert_eq!(items[0].as_value()["target"], "Geometry");
        assert_eq!(items[9].as_value()["target"], "Calculus");

        let history = h.store.history_for(&id);
        let percents: Vec<u8> = history.iter().map(|r| r.progress_percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
        assert_eq!(percents.last(), Some(&100));

        let steps: Vec<usize> = history.iter().filter_map(|r| r.step_index).collect();
        assert!(steps.windows(2).all(|w| w[0] <= w[1]));
    }

    #[tokio::test]
    async fn test_zero_allocations_are_skipped() {
        let h = harness(vec![]).await;
        let mut rx = h.service.subscribe();

        let id = h
            .service
            .submit(topics_request(
                &["Algebra", "Geometry", "Calculus", "Trig", "Stats"],
                2,
            ))
            .await
            .unwrap();
        let done = wait_terminal(&mut rx, &id).await;

        assert_eq!(h.generator.call_count(), 2);
        assert_eq!(done.step_labels, vec!["Algebra", "Geometry"]);
        assert_eq!(done.result.map(|r| r.len()), Some(2));
    }

    #[tokio::test]
    async fn test_failure_on_second_target_stops_the_job() {
        let h = harness(vec![Step::Items, Step::Fail("quota exceeded".to_string())]).await;
        let mut rx = h.service.subscribe();

        let id = h
            .service
            .submit(topics_request(&["Algebra", "Geometry", "Calculus"], 9))
            .await
            .unwrap();
        let done = wait_terminal(&mut rx, &id).await;

        assert_eq!(done.status, JobStatus::Error);
        assert_eq!(done.error_message.as_deref(), Some("quota exceeded"));
        assert!(done.result.is_none());
        assert_eq!(done.progress_percent, 0);
        assert_eq!(h.generator.call_count(), 2, "third target never invoked");
    }

    #[tokio::test]
    async fn test_empty_result_becomes_error() {
        let h = harness(vec![Step::Empty]).await;
        let mut rx = h.service.subscribe();

        let id = h.service.submit(document_request(5)).await.unwrap();
        let done = wait_terminal(&mut rx, &id).await;

        assert_eq!(done.status, JobStatus::Error);
        assert_eq!(done.error_message.as_deref(), Some(EMPTY_RESULT_MESSAGE));
    }

    #[tokio::test]
    async fn test_generator_panic_is_recorded() {
        let h = harness(vec![Step::Panic("model crashed".to_string())]).await;
        let mut rx = h.service.subscribe();

        let id = h.service.submit(document_request(5)).await.unwrap();
        let done = wait_terminal(&mut rx, &id).await;

        assert_eq!(done.status, JobStatus::Error);
        assert_eq!(
            done.error_message.as_deref(),
            Some("generator panicked: model crashed")
        );
        assert_eq!(h.service.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_missing_source_at_run_time() {
        let h = harness(vec![]).await;
        let mut rx = h.service.subscribe();

        let mut req = document_request(5);
        req.source = JobSource::UploadedDocument {
            document_id: "never-uploaded".to_string(),
            file_name: None,
        };
        let id = h.service.submit(req).await.unwrap();
        let done = wait_terminal(&mut rx, &id).await;

        assert_eq!(
            done.error_message.as_deref(),
            Some("source missing: document never-uploaded")
        );
        assert_eq!(h.generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_cancel_between_targets() {
        let gate = Arc::new(Notify::new());
        let h = harness(vec![Step::WaitFor(gate.clone())]).await;
        let mut rx = h.service.subscribe();

        let id = h
            .service
            .submit(topics_request(&["Algebra", "Geometry", "Calculus"], 6))
            .await
            .unwrap();

        wait_for(&mut rx, |r| r.id == id && r.progress_label.contains("waiting")).await;
        assert!(h.service.cancel(&id));
        assert!(h.service.cancel(&id), "second cancel is a no-op");
        gate.notify_one();

        let done = wait_terminal(&mut rx, &id).await;
        assert_eq!(done.status, JobStatus::Error);
        assert_eq!(done.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        assert_eq!(h.generator.call_count(), 1);

        // Cancel after the job finished changes nothing
        assert!(!h.service.cancel(&id));
        assert_eq!(h.service.observe(&id).await.unwrap(), done);
    }

    #[tokio::test]
    async fn test_cancel_after_last_call_still_wins() {
        let gate = Arc::new(Notify::new());
        let h = harness(vec![Step::WaitFor(gate.clone())]).await;
        let mut rx = h.service.subscribe();

        let id = h.service.submit(document_request(3)).await.unwrap();
        wait_for(&mut rx, |r| r.id == id && r.progress_label.contains("waiting")).await;
        h.service.cancel(&id);
        gate.notify_one();

        let done = wait_terminal(&mut rx, &id).await;
        assert_eq!(done.error_message.as_deref(), Some(CANCELLED_MESSAGE));
        assert!(done.result.is_none());
    }

    #[tokio::test]
    async fn test_cancel_unknown_id_is_noop() {
        let h = harness(vec![]).await;
        assert!(!h.service.cancel("does-not-exist"));
    }

    #[tokio::test]
    async fn test_retry_copies_config_and_leaves_original() {
        let h = harness(vec![Step::Fail("timeout".to_string())]).await;
        let mut rx = h.service.subscribe();

        let mut req = document_request(4);
        req.config.mode = TestMode::Exam;
        req.config.duration_minutes = Some(30);
        let original_id = h.service.submit(req).await.unwrap();
        let original = wait_terminal(&mut rx, &original_id).await;
        assert_eq!(original.status, JobStatus::Error);

        let retry_id = h.service.retry(&original_id).await.unwrap();
        assert_ne!(retry_id, original_id);
        let retried = wait_terminal(&mut rx, &retry_id).await;

        assert_eq!(retried.status, JobStatus::Completed);
        assert_eq!(retried.config, original.config);
        assert_eq!(retried.source, original.source);
        assert_eq!(retried.retry_of.as_deref(), Some(original_id.as_str()));
        assert_eq!(h.service.observe(&original_id).await.unwrap(), original);
    }

    #[tokio::test]
    async fn test_retry_with_missing_document_submits_nothing() {
        let h = harness(vec![]).await;
        let mut rx = h.service.subscribe();

        let original_id = h.service.submit(document_request(4)).await.unwrap();
        wait_terminal(&mut rx, &original_id).await;
        h.sources.remove_document("doc-1");

        let before = h.service.list().await.unwrap().len();
        let err = h.service.retry(&original_id).await.unwrap_err();

        assert!(matches!(err, AppError::Job(JobError::SourceMissing(_))));
        assert_eq!(h.service.list().await.unwrap().len(), before);
        assert_eq!(h.generator.call_count(), 1);
    }

    #[tokio::test]
    async fn test_retry_unknown_job() {
        let h = harness(vec![]).await;
        assert!(matches!(
            h.service.retry("missing").await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_mock_pattern_uses_section_counts() {
        let h = harness(vec![]).await;
        let mut rx = h.service.subscribe();

        let id = h
            .service
            .submit(SubmitRequest {
                source: JobSource::MockPattern {
                    pattern_id: "full".to_string(),
                },
                config: GenerationConfig::new(100, Difficulty::Hard),
            })
            .await
            .unwrap();
        let done = wait_terminal(&mut rx, &id).await;

        let counts: Vec<u32> = h.generator.calls().iter().map(|c| c.count).collect();
        assert_eq!(counts, vec![3, 2]);
        assert_eq!(done.step_labels, vec!["Verbal", "Quant"]);
        assert_eq!(done.result.map(|r| r.len()), Some(5));
    }

    #[tokio::test]
    async fn test_invalid_submit_persists_nothing() {
        let h = harness(vec![]).await;

        let err = h.service.submit(document_request(0)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(h.store.save_count(), 0);
        assert_eq!(h.generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_rejects_running_job() {
        let gate = Arc::new(Notify::new());
        let h = harness(vec![Step::WaitFor(gate.clone())]).await;
        let mut rx = h.service.subscribe();

        let id = h.service.submit(document_request(2)).await.unwrap();
        wait_for(&mut rx, |r| r.id == id && r.progress_label.contains("waiting")).await;

        assert!(matches!(
            h.service.delete(&id).await,
            Err(AppError::Conflict(_))
        ));

        gate.notify_one();
        wait_terminal(&mut rx, &id).await;

        assert!(h.service.delete(&id).await.unwrap());
        assert!(!h.service.delete(&id).await.unwrap());
        assert!(matches!(
            h.service.observe(&id).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_start_recovers_orphaned_jobs() {
        let store = Arc::new(InMemoryJobStore::new());
        let mut orphan = JobRecord::new_test(
            JobSource::QuestionBank {
                year: 2020,
                group: "A".to_string(),
            },
            GenerationConfig::new(3, Difficulty::Easy),
        );
        orphan.begin().unwrap();
        store.seed(orphan.clone());

        let h = harness_with_store(vec![], store).await;
        let recovered = h.service.observe(&orphan.id).await.unwrap();

        assert_eq!(recovered.status, JobStatus::Error);
        assert_eq!(recovered.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));

        // Interrupted jobs can be retried like any other
        let mut rx = h.service.subscribe();
        let retry_id = h.service.retry(&orphan.id).await.unwrap();
        let done = wait_terminal(&mut rx, &retry_id).await;
        assert_eq!(done.status, JobStatus::Completed);
    }

    async fn wait_idle(service: &GenerationService) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while service.active_jobs() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("job never released its registration");
    }

    #[tokio::test]
    async fn test_transient_terminal_write_failure_still_finalizes() {
        let h = harness(vec![]).await;
        h.store.fail_terminal_saves(2);
        let mut rx = h.service.subscribe();

        let id = h.service.submit(document_request(2)).await.unwrap();
        let finished = wait_terminal(&mut rx, &id).await;
        wait_idle(&h.service).await;

        assert_eq!(finished.status, JobStatus::Completed);
        let stored = h.service.observe(&id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Completed);
        assert_eq!(stored.result.map(|r| r.len()), Some(2));
        assert!(h.service.delete(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_terminal_write_retries_hold_the_registration() {
        let gate = Arc::new(Notify::new());
        let h = harness(vec![Step::WaitFor(gate.clone())]).await;
        let mut rx = h.service.subscribe();

        let id = h.service.submit(document_request(2)).await.unwrap();
        wait_for(&mut rx, |r| r.id == id && r.progress_label.contains("waiting")).await;

        h.store.fail_terminal_saves(1);
        gate.notify_one();
        // The first terminal write fails; the job stays owned until the retry lands
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(h.service.active_jobs(), 1);
        assert!(matches!(
            h.service.delete(&id).await,
            Err(AppError::Conflict(_))
        ));

        let finished = wait_terminal(&mut rx, &id).await;
        wait_idle(&h.service).await;
        assert_eq!(finished.status, JobStatus::Completed);
        assert_eq!(
            h.service.observe(&id).await.unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_exhausted_terminal_writes_leave_record_for_recovery() {
        let gate = Arc::new(Notify::new());
        let h = harness(vec![Step::WaitFor(gate.clone())]).await;
        let mut rx = h.service.subscribe();

        let id = h.service.submit(document_request(2)).await.unwrap();
        wait_for(&mut rx, |r| r.id == id && r.progress_label.contains("waiting")).await;

        h.store.fail_terminal_saves(usize::MAX);
        gate.notify_one();
        wait_idle(&h.service).await;
        h.store.fail_terminal_saves(0);

        // Every attempt failed, so the record stays PROCESSING until recovery
        let stored = h.service.observe(&id).await.unwrap();
        assert_eq!(stored.status, JobStatus::Processing);

        let restarted = harness_with_store(vec![], h.store.clone()).await;
        let recovered = restarted.service.observe(&id).await.unwrap();
        assert_eq!(recovered.status, JobStatus::Error);
        assert_eq!(recovered.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
    }
}
