// Job Record Domain Model

use serde::{Deserialize, Serialize};

use crate::domain::config::GenerationConfig;
use crate::domain::error::{DomainError, JobError, Result};
use crate::domain::source::{JobSource, SourceKind};

/// Job ID (UUID v4)
pub type JobId = String;

/// Progress shown as soon as a job enters PROCESSING
pub const INITIAL_PROGRESS_PERCENT: u8 = 5;

/// Highest progress a job can show before it completes
pub const MAX_PROCESSING_PERCENT: u8 = 99;

pub const INITIALIZING_LABEL: &str = "Initializing...";
pub const COMPLETED_LABEL: &str = "Completed";
pub const FAILED_LABEL: &str = "Failed";

/// Job Status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Transient pre-submission state, never persisted
    Idle,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "IDLE" => Some(JobStatus::Idle),
            "PROCESSING" => Some(JobStatus::Processing),
            "COMPLETED" => Some(JobStatus::Completed),
            "ERROR" => Some(JobStatus::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Idle => write!(f, "IDLE"),
            JobStatus::Processing => write!(f, "PROCESSING"),
            JobStatus::Completed => write!(f, "COMPLETED"),
            JobStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// One generated item (question, passage, ...). Opaque to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GeneratedItem(serde_json::Value);

impl GeneratedItem {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Job Record - the persisted unit of generation work and its outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub source: JobSource,
    pub status: JobStatus,

    pub progress_percent: u8,
    pub progress_label: String,

    // Multi-target jobs only
    pub step_index: Option<usize>,
    pub step_labels: Vec<String>,

    pub config: GenerationConfig,

    pub result: Option<Vec<GeneratedItem>>,
    pub error_message: Option<String>,

    pub created_at: i64, // epoch ms
    pub retry_of: Option<JobId>,
}

impl JobRecord {
    /// Create a new IDLE record
    ///
    /// # Arguments
    ///
    /// * `id` - Unique job ID (injected, not generated)
    /// * `created_at` - Creation timestamp in epoch ms (injected, not system time)
    /// * `source` - Where the content comes from
    /// * `config` - Request parameters
    pub fn new(
        id: impl Into<String>,
        created_at: i64,
        source: JobSource,
        config: GenerationConfig,
    ) -> Self {
        Self {
            id: id.into(),
            source,
            status: JobStatus::Idle,
            progress_percent: 0,
            progress_label: String::new(),
            step_index: None,
            step_labels: Vec::new(),
            config,
            result: None,
            error_message: None,
            created_at,
            retry_of: None,
        }
    }

    /// Create a test record with deterministic ID and timestamp (test-1, test-2, ...).
    ///
    /// **Note**: production code injects ID and time via providers.
    pub fn new_test(source: JobSource, config: GenerationConfig) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static TEST_COUNTER: AtomicU64 = AtomicU64::new(1);

        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        Self::new(
            format!("test-{}", counter),
            (counter * 1000) as i64,
            source,
            config,
        )
    }

    pub fn source_kind(&self) -> SourceKind {
        self.source.kind()
    }

    /// Build the IDLE record of a retry: fresh id, same source and config
    pub fn retry_record(&self, id: impl Into<String>, created_at: i64) -> Self {
        let mut record = Self::new(id, created_at, self.source.clone(), self.config.clone());
        record.retry_of = Some(self.id.clone());
        record
    }

    /// IDLE -> PROCESSING
    pub fn begin(&mut self) -> Result<()> {
        self.expect_status(JobStatus::Idle, JobStatus::Processing)?;
        self.status = JobStatus::Processing;
        self.progress_percent = INITIAL_PROGRESS_PERCENT;
        self.progress_label = INITIALIZING_LABEL.to_string();
        Ok(())
    }

    /// Attach the named sub-steps of a multi-target job; the first becomes active
    pub fn set_steps(&mut self, labels: Vec<String>) -> Result<()> {
        self.expect_status(JobStatus::Processing, JobStatus::Processing)?;
        self.step_index = if labels.is_empty() { None } else { Some(0) };
        self.step_labels = labels;
        Ok(())
    }

    /// Apply a progress milestone.
    ///
    /// Percent never moves backwards and stays below 100 until completion.
    /// Returns false when the visible state did not change.
    pub fn record_progress(&mut self, percent: u8, label: &str) -> Result<bool> {
        self.expect_status(JobStatus::Processing, JobStatus::Processing)?;
        let next = percent
            .min(MAX_PROCESSING_PERCENT)
            .max(self.progress_percent);
        if next == self.progress_percent && self.progress_label == label {
            return Ok(false);
        }
        self.progress_percent = next;
        self.progress_label = label.to_string();
        Ok(true)
    }

    /// Move to the next sub-step (saturates at the last one)
    pub fn advance_step(&mut self) {
        if let Some(index) = self.step_index {
            let last = self.step_labels.len().saturating_sub(1);
            self.step_index = Some((index + 1).min(last));
        }
    }

    /// PROCESSING -> COMPLETED
    pub fn complete(&mut self, items: Vec<GeneratedItem>) -> Result<()> {
        self.expect_status(JobStatus::Processing, JobStatus::Completed)?;
        if items.is_empty() {
            return Err(DomainError::ValidationError(
                "a completed job must carry at least one item".to_string(),
            ));
        }
        self.status = JobStatus::Completed;
        self.progress_percent = 100;
        self.progress_label = COMPLETED_LABEL.to_string();
        if !self.step_labels.is_empty() {
            self.step_index = Some(self.step_labels.len() - 1);
        }
        self.result = Some(items);
        self.error_message = None;
        Ok(())
    }

    /// PROCESSING -> ERROR
    pub fn fail(&mut self, error: &JobError) -> Result<()> {
        self.expect_status(JobStatus::Processing, JobStatus::Error)?;
        self.status = JobStatus::Error;
        self.progress_percent = 0;
        self.progress_label = FAILED_LABEL.to_string();
        self.result = None;
        self.error_message = Some(error.to_string());
        Ok(())
    }

    /// Crash-recovery rewrite of an orphaned PROCESSING record.
    ///
    /// Touches only status, error message and percent. Returns false for
    /// records in any other status.
    pub fn mark_interrupted(&mut self) -> bool {
        if self.status != JobStatus::Processing {
            return false;
        }
        self.status = JobStatus::Error;
        self.error_message = Some(JobError::Interrupted.to_string());
        self.progress_percent = 0;
        true
    }

    fn expect_status(&self, expected: JobStatus, to: JobStatus) -> Result<()> {
        if self.status != expected {
            return Err(DomainError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        Ok(())
    }
}
