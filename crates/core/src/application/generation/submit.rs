// Submit Use Case

use crate::domain::{DomainError, GenerationConfig, JobRecord, JobSource};
use crate::error::{AppError, Result};
use crate::port::{IdProvider, TimeProvider};
use serde::{Deserialize, Serialize};

/// Submit request: where the content comes from and how much of it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitRequest {
    pub source: JobSource,
    pub config: GenerationConfig,
}

/// Validate a submit request before anything is persisted
pub fn validate_request(req: &SubmitRequest) -> Result<()> {
    req.source.validate().map_err(into_validation)?;
    req.config.validate().map_err(into_validation)?;
    Ok(())
}

/// Build the IDLE record for a validated request
///
/// # Arguments
///
/// * `id_provider` - ID generator (injected for determinism)
/// * `time_provider` - Time provider (injected for determinism)
/// * `req` - Submit request
pub fn build_record(
    id_provider: &dyn IdProvider,
    time_provider: &dyn TimeProvider,
    req: SubmitRequest,
) -> Result<JobRecord> {
    validate_request(&req)?;

    Ok(JobRecord::new(
        id_provider.generate_id(),
        time_provider.now_millis(),
        req.source,
        req.config,
    ))
}

fn into_validation(err: DomainError) -> AppError {
    match err {
        DomainError::ValidationError(msg) => AppError::Validation(msg),
        other => AppError::Domain(other),
    }
}
