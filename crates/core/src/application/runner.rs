// Job Runner - drives one job from PROCESSING to a terminal status

use crate::application::cancellation::RegistrationGuard;
use crate::application::constants::{
    FINALIZING_LABEL, HEAD_PROGRESS_PERCENT, PREPARING_LABEL, TAIL_PROGRESS_PERCENT,
    TERMINAL_SAVE_ATTEMPTS, TERMINAL_SAVE_BACKOFF,
};
use crate::application::panic_guard::{guard_async, PanicGuardResult};
use crate::application::plan::{resolve_plan, Plan, Segment};
use crate::domain::{Difficulty, DomainError, GeneratedItem, JobError, JobRecord};
use crate::error::Result;
use crate::port::{
    GenerationError, GenerationRequest, Generator, JobStore, ProgressReporter, SourceCatalog,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Runs jobs against the generator, writing every transition to the store
#[derive(Clone)]
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    generator: Arc<dyn Generator>,
    sources: SourceCatalog,
    events: broadcast::Sender<JobRecord>,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        generator: Arc<dyn Generator>,
        sources: SourceCatalog,
        events: broadcast::Sender<JobRecord>,
    ) -> Self {
        Self {
            store,
            generator,
            sources,
            events,
        }
    }

    /// Drive a PROCESSING record to COMPLETED or ERROR.
    ///
    /// `plan` is resolved here when the caller has not done it already.
    /// The registration guard is released only after the terminal write.
    pub async fn run(&self, record: JobRecord, plan: Option<Plan>, registration: RegistrationGuard) {
        let job_id = record.id.clone();
        let live = LiveRecord {
            record: Mutex::new(record),
            store: Arc::clone(&self.store),
            events: self.events.clone(),
        };

        let outcome = self.execute(&live, plan, registration.token()).await;

        let finalized = match outcome {
            Ok(items) if items.is_empty() => {
                warn!(job_id = %job_id, "Generator produced no items without raising");
                live.finish(Err(JobError::EmptyResult)).await
            }
            Ok(items) => {
                info!(job_id = %job_id, items = items.len(), "Job completed");
                live.finish(Ok(items)).await
            }
            Err(JobError::Cancelled) => {
                warn!(job_id = %job_id, "Job cancelled");
                live.finish(Err(JobError::Cancelled)).await
            }
            Err(e) => {
                error!(job_id = %job_id, error = %e, "Job failed");
                live.finish(Err(e)).await
            }
        };

        if let Err(e) = finalized {
            if live.snapshot().await.status.is_terminal() {
                warn!(job_id = %job_id, error = %e, "Failed to persist terminal job state, retrying");
                self.retry_terminal_write(&live, &job_id).await;
            } else {
                error!(job_id = %job_id, error = %e, "Failed to finalize job");
            }
        }

        drop(registration);
    }

    /// Re-send the terminal snapshot with backoff while the registration is held.
    ///
    /// When every attempt fails the store keeps PROCESSING and the next
    /// startup marks the record interrupted.
    async fn retry_terminal_write(&self, live: &LiveRecord, job_id: &str) {
        let mut delay = TERMINAL_SAVE_BACKOFF;
        for attempt in 2..=TERMINAL_SAVE_ATTEMPTS {
            tokio::time::sleep(delay).await;
            match live.persist().await {
                Ok(()) => {
                    info!(job_id = %job_id, attempt, "Terminal job state persisted");
                    return;
                }
                Err(e) => {
                    warn!(job_id = %job_id, attempt, error = %e, "Terminal write failed");
                    delay *= 2;
                }
            }
        }
        error!(
            job_id = %job_id,
            attempts = TERMINAL_SAVE_ATTEMPTS,
            "Giving up on terminal job state; left for recovery"
        );
    }

    async fn execute(
        &self,
        live: &LiveRecord,
        plan: Option<Plan>,
        token: &CancellationToken,
    ) -> std::result::Result<Vec<GeneratedItem>, JobError> {
        let plan = match plan {
            Some(plan) => plan,
            None => {
                live.progress(HEAD_PROGRESS_PERCENT, PREPARING_LABEL).await;
                let snapshot = live.snapshot().await;
                resolve_plan(&self.sources, &snapshot.source, &snapshot.config).await?
            }
        };

        if plan.is_multi_target() {
            live.set_steps(plan.step_labels()).await;
        }

        let difficulty = live.snapshot().await.config.difficulty;
        let total = plan.segments().len();
        let mut items = Vec::with_capacity(plan.total_count() as usize);

        for (index, segment) in plan.segments().iter().enumerate() {
            if token.is_cancelled() {
                return Err(JobError::Cancelled);
            }

            let batch = self
                .generate_segment(live, segment, index, total, difficulty, token)
                .await?;
            debug!(
                segment = %segment.target.label(),
                requested = segment.count,
                produced = batch.len(),
                "Segment generated"
            );
            items.extend(batch);

            live.segment_done(blend(index + 1, total, 0)).await;
        }

        // A cancel that raced the last call still wins over completion
        if token.is_cancelled() {
            return Err(JobError::Cancelled);
        }

        live.progress(100 - TAIL_PROGRESS_PERCENT, FINALIZING_LABEL).await;
        Ok(items)
    }

    async fn generate_segment(
        &self,
        live: &LiveRecord,
        segment: &Segment,
        index: usize,
        total: usize,
        difficulty: Difficulty,
        token: &CancellationToken,
    ) -> std::result::Result<Vec<GeneratedItem>, JobError> {
        let reporter = SegmentReporter {
            live,
            index,
            total,
            target: segment.target.label(),
        };
        reporter.report(0, "").await;

        let request = GenerationRequest {
            target: segment.target.clone(),
            count: segment.count,
            difficulty,
        };

        match guard_async(self.generator.generate(&request, &reporter, token)).await {
            PanicGuardResult::Completed(Ok(batch)) => Ok(batch),
            PanicGuardResult::Completed(Err(GenerationError::Cancelled)) => Err(JobError::Cancelled),
            PanicGuardResult::Completed(Err(GenerationError::Failed(msg))) => {
                Err(JobError::CollaboratorFailure(msg))
            }
            PanicGuardResult::Panicked(msg) => Err(JobError::CollaboratorFailure(format!(
                "generator panicked: {}",
                msg
            ))),
        }
    }
}

/// Overall percent after `done` of `total` segments plus `local` percent of the next
fn blend(done: usize, total: usize, local: u8) -> u8 {
    let span = (100 - HEAD_PROGRESS_PERCENT - TAIL_PROGRESS_PERCENT) as usize;
    let total = total.max(1);
    let scaled = (done * 100 + local.min(100) as usize) * span / (total * 100);
    HEAD_PROGRESS_PERCENT + scaled.min(span) as u8
}

/// The record a runner owns, written through to the store on every change
struct LiveRecord {
    record: Mutex<JobRecord>,
    store: Arc<dyn JobStore>,
    events: broadcast::Sender<JobRecord>,
}

impl LiveRecord {
    async fn snapshot(&self) -> JobRecord {
        self.record.lock().await.clone()
    }

    /// Apply `change`, then persist and broadcast if it altered the record.
    ///
    /// The lock is held across the write so snapshots reach the store in order.
    async fn apply<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut JobRecord) -> std::result::Result<bool, DomainError>,
    {
        let mut record = self.record.lock().await;
        if !change(&mut *record)? {
            return Ok(());
        }
        self.store.save(&*record).await?;
        let _ = self.events.send(record.clone());
        Ok(())
    }

    /// Save the current record again, unchanged
    async fn persist(&self) -> Result<()> {
        let record = self.record.lock().await;
        self.store.save(&*record).await?;
        let _ = self.events.send(record.clone());
        Ok(())
    }

    async fn progress(&self, percent: u8, label: &str) {
        let result = self.apply(|r| r.record_progress(percent, label)).await;
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist progress");
        }
    }

    async fn set_steps(&self, labels: Vec<String>) {
        let result = self.apply(|r| r.set_steps(labels).map(|_| true)).await;
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist step list");
        }
    }

    async fn segment_done(&self, percent: u8) {
        let result = self
            .apply(|r| {
                r.advance_step();
                let label = r.progress_label.clone();
                r.record_progress(percent, &label).map(|_| true)
            })
            .await;
        if let Err(e) = result {
            warn!(error = %e, "Failed to persist step completion");
        }
    }

    async fn finish(&self, outcome: std::result::Result<Vec<GeneratedItem>, JobError>) -> Result<()> {
        self.apply(|r| {
            match outcome {
                Ok(items) => r.complete(items)?,
                Err(e) => r.fail(&e)?,
            }
            Ok(true)
        })
        .await
    }
}

/// Maps one generator call's local progress onto the job
struct SegmentReporter<'a> {
    live: &'a LiveRecord,
    index: usize,
    total: usize,
    target: String,
}

#[async_trait]
impl<'a> ProgressReporter for SegmentReporter<'a> {
    async fn report(&self, percent: u8, label: &str) {
        let detail = if label.is_empty() {
            format!("Generating: {}", self.target)
        } else {
            format!("Generating: {} - {}", self.target, label)
        };
        let label = if self.total > 1 {
            format!("[{}/{}] {}", self.index + 1, self.total, detail)
        } else {
            detail
        };
        self.live
            .progress(blend(self.index, self.total, percent), &label)
            .await;
    }
}
