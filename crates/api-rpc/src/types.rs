//! RPC Request/Response Types
//!
//! Defines the JSON-RPC method parameters and results.

use quizgen_core::domain::{GenerationConfig, JobRecord, JobSource, JobStatus, SourceKind};
use serde::{Deserialize, Serialize};

/// generation.submit.v1 - Submit a generation job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub source: JobSource,
    pub config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: JobStatus,
}

/// Params of every method addressing a single job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobIdRequest {
    pub job_id: String,
}

/// generation.cancel.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub job_id: String,
    /// False when no running job had this id (already finished or unknown)
    pub signalled: bool,
}

/// generation.retry.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryResponse {
    pub job_id: String,
    pub retry_of: String,
}

/// generation.observe.v1 returns the full record
pub type ObserveResponse = JobRecord;

/// generation.list.v1 - List jobs, optionally filtered by status
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListRequest {
    #[serde(default)]
    pub status: Option<JobStatus>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub jobs: Vec<JobSummary>,
}

/// A job without its generated items
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub source_kind: SourceKind,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub progress_label: String,
    pub item_count: Option<usize>,
    pub error_message: Option<String>,
    pub retry_of: Option<String>,
    pub created_at: i64,
}

impl From<&JobRecord> for JobSummary {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.id.clone(),
            source_kind: record.source_kind(),
            status: record.status,
            progress_percent: record.progress_percent,
            progress_label: record.progress_label.clone(),
            item_count: record.result.as_ref().map(Vec::len),
            error_message: record.error_message.clone(),
            retry_of: record.retry_of.clone(),
            created_at: record.created_at,
        }
    }
}

/// generation.delete.v1
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub job_id: String,
    pub deleted: bool,
}
