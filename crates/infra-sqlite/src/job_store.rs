// SQLite JobStore Implementation

use async_trait::async_trait;
use quizgen_core::domain::{GeneratedItem, JobId, JobRecord, JobStatus};
use quizgen_core::error::{AppError, Result};
use quizgen_core::port::JobStore;
use sqlx::SqlitePool;
use tracing::debug;

// Helper to convert sqlx::Error to AppError with structured information
fn map_sqlx_error(err: sqlx::Error) -> AppError {
    match &err {
        sqlx::Error::Database(db_err) => {
            if let Some(code) = db_err.code() {
                let code_str = code.as_ref();

                // SQLite error codes: https://www.sqlite.org/rescode.html
                match code_str {
                    "275" | "531" => {
                        // CHECK constraint failed
                        AppError::Database(format!(
                            "Check constraint violation: {} ({})",
                            db_err.message(),
                            code_str
                        ))
                    }
                    "5" => AppError::Database(format!(
                        "Database locked (SQLITE_BUSY): {}",
                        db_err.message()
                    )),
                    "13" => AppError::Database(format!("Database full: {}", db_err.message())),
                    _ => AppError::Database(format!(
                        "Database error [{}]: {}",
                        code_str,
                        db_err.message()
                    )),
                }
            } else {
                AppError::Database(format!("Database error: {}", db_err.message()))
            }
        }
        sqlx::Error::ColumnNotFound(col) => {
            AppError::Database(format!("Column not found: {}", col))
        }
        _ => AppError::Database(err.to_string()),
    }
}

pub struct SqliteJobStore {
    pool: SqlitePool,
}

impl SqliteJobStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for SqliteJobStore {
    async fn save(&self, record: &JobRecord) -> Result<()> {
        let source = serde_json::to_string(&record.source)?;
        let step_labels = serde_json::to_string(&record.step_labels)?;
        let config = serde_json::to_string(&record.config)?;
        let result = record
            .result
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            r#"
            INSERT INTO generation_jobs (
                id, source_kind, source, status,
                progress_percent, progress_label, step_index, step_labels,
                config, result, error_message, retry_of, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                source_kind = excluded.source_kind,
                source = excluded.source,
                status = excluded.status,
                progress_percent = excluded.progress_percent,
                progress_label = excluded.progress_label,
                step_index = excluded.step_index,
                step_labels = excluded.step_labels,
                config = excluded.config,
                result = excluded.result,
                error_message = excluded.error_message,
                retry_of = excluded.retry_of,
                created_at = excluded.created_at
            "#,
        )
        .bind(&record.id)
        .bind(record.source_kind().as_str())
        .bind(&source)
        .bind(record.status.to_string())
        .bind(i64::from(record.progress_percent))
        .bind(&record.progress_label)
        .bind(record.step_index.map(|i| i as i64))
        .bind(&step_labels)
        .bind(&config)
        .bind(&result)
        .bind(&record.error_message)
        .bind(&record.retry_of)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        debug!(
            job_id = %record.id,
            status = %record.status,
            progress = record.progress_percent,
            "Job record saved"
        );
        Ok(())
    }

    async fn delete(&self, id: &JobId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM generation_jobs WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        Ok(result.rows_affected() > 0)
    }

    async fn load_all(&self) -> Result<Vec<JobRecord>> {
        let rows: Vec<JobRow> =
            sqlx::query_as("SELECT * FROM generation_jobs ORDER BY created_at ASC, id ASC")
                .fetch_all(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_record).collect()
    }

    async fn find_by_id(&self, id: &JobId) -> Result<Option<JobRecord>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM generation_jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        row.map(JobRow::into_record).transpose()
    }

    async fn find_by_status(&self, status: JobStatus) -> Result<Vec<JobRecord>> {
        let rows: Vec<JobRow> = sqlx::query_as(
            "SELECT * FROM generation_jobs WHERE status = ? ORDER BY created_at ASC, id ASC",
        )
        .bind(status.to_string())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(JobRow::into_record).collect()
    }
}

#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: String,
    #[allow(dead_code)]
    source_kind: String, // Derived from `source`, kept for ad-hoc queries
    source: String,
    status: String,
    progress_percent: i64,
    progress_label: String,
    step_index: Option<i64>,
    step_labels: String,
    config: String,
    result: Option<String>,
    error_message: Option<String>,
    retry_of: Option<String>,
    created_at: i64,
}

impl JobRow {
    fn into_record(self) -> Result<JobRecord> {
        let status = JobStatus::parse(&self.status).ok_or_else(|| {
            AppError::Database(format!(
                "job {} has unknown status {}",
                self.id, self.status
            ))
        })?;

        let result = self
            .result
            .as_deref()
            .map(serde_json::from_str::<Vec<GeneratedItem>>)
            .transpose()?;

        Ok(JobRecord {
            source: serde_json::from_str(&self.source)?,
            status,
            progress_percent: self.progress_percent.clamp(0, 100) as u8,
            progress_label: self.progress_label,
            step_index: self.step_index.map(|i| i.max(0) as usize),
            step_labels: serde_json::from_str(&self.step_labels)?,
            config: serde_json::from_str(&self.config)?,
            result,
            error_message: self.error_message,
            created_at: self.created_at,
            retry_of: self.retry_of,
            id: self.id,
        })
    }
}
