//! RPC Method Handlers
//!
//! Thin translation between the wire types and the generation service.

use crate::error::to_rpc_error;
use crate::types::{
    CancelResponse, DeleteResponse, JobIdRequest, JobSummary, ListRequest, ListResponse,
    ObserveResponse, RetryResponse, SubmitRequest, SubmitResponse,
};
use jsonrpsee::types::ErrorObjectOwned;
use quizgen_core::application::{generation, GenerationService};
use quizgen_core::domain::JobStatus;
use std::sync::Arc;
use tracing::debug;

/// RPC Handler with injected dependencies
pub struct RpcHandler {
    service: Arc<GenerationService>,
}

impl RpcHandler {
    pub fn new(service: Arc<GenerationService>) -> Self {
        Self { service }
    }

    /// generation.submit.v1
    pub async fn submit(&self, params: SubmitRequest) -> Result<SubmitResponse, ErrorObjectOwned> {
        let req = generation::SubmitRequest {
            source: params.source,
            config: params.config,
        };

        let job_id = self.service.submit(req).await.map_err(to_rpc_error)?;

        Ok(SubmitResponse {
            job_id,
            status: JobStatus::Processing,
        })
    }

    /// generation.cancel.v1
    ///
    /// Never fails: unknown and finished jobs report `signalled: false`.
    pub async fn cancel(&self, params: JobIdRequest) -> Result<CancelResponse, ErrorObjectOwned> {
        let signalled = self.service.cancel(&params.job_id);
        debug!(job_id = %params.job_id, signalled, "Cancel handled");

        Ok(CancelResponse {
            job_id: params.job_id,
            signalled,
        })
    }

    /// generation.retry.v1
    pub async fn retry(&self, params: JobIdRequest) -> Result<RetryResponse, ErrorObjectOwned> {
        let job_id = self
            .service
            .retry(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(RetryResponse {
            job_id,
            retry_of: params.job_id,
        })
    }

    /// generation.observe.v1
    pub async fn observe(&self, params: JobIdRequest) -> Result<ObserveResponse, ErrorObjectOwned> {
        self.service
            .observe(&params.job_id)
            .await
            .map_err(to_rpc_error)
    }

    /// generation.list.v1
    pub async fn list(&self, params: ListRequest) -> Result<ListResponse, ErrorObjectOwned> {
        let records = self.service.list().await.map_err(to_rpc_error)?;

        let jobs = records
            .iter()
            .filter(|r| params.status.map_or(true, |s| r.status == s))
            .map(JobSummary::from)
            .collect();

        Ok(ListResponse { jobs })
    }

    /// generation.delete.v1
    pub async fn delete(&self, params: JobIdRequest) -> Result<DeleteResponse, ErrorObjectOwned> {
        let deleted = self
            .service
            .delete(&params.job_id)
            .await
            .map_err(to_rpc_error)?;

        Ok(DeleteResponse {
            job_id: params.job_id,
            deleted,
        })
    }
}
