// Cancellation Registry
// Process-local: job id -> token, only while a runner owns the job

use crate::domain::{DomainError, JobId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Registry of cancellation tokens for in-flight jobs
///
/// Starts empty on every process start; nothing here is persisted.
#[derive(Default)]
pub struct CancellationRegistry {
    tokens: Mutex<HashMap<JobId, CancellationToken>>,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh token for `id`.
    ///
    /// The returned guard deregisters on drop, so a runner that errors or
    /// panics can never leak an entry. Fails if `id` already has a live token.
    pub fn register(self: &Arc<Self>, id: &str) -> Result<RegistrationGuard, DomainError> {
        let mut tokens = self.lock();
        if tokens.contains_key(id) {
            return Err(DomainError::AlreadyRunning(id.to_string()));
        }
        let token = CancellationToken::new();
        tokens.insert(id.to_string(), token.clone());
        debug!(job_id = %id, "Cancellation token registered");

        Ok(RegistrationGuard {
            registry: Arc::clone(self),
            id: id.to_string(),
            token,
        })
    }

    /// Signal the token of `id`, if any. Returns whether a live job was signalled.
    ///
    /// Unknown ids and repeated requests are no-ops.
    pub fn request_cancel(&self, id: &str) -> bool {
        match self.lock().get(id) {
            Some(token) => {
                if !token.is_cancelled() {
                    info!(job_id = %id, "Cancellation requested");
                    token.cancel();
                }
                true
            }
            None => {
                debug!(job_id = %id, "Cancel ignored, no active runner");
                false
            }
        }
    }

    /// Remove the entry for `id`. Removing twice is a no-op.
    pub fn deregister(&self, id: &str) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn is_active(&self, id: &str) -> bool {
        self.lock().contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<JobId, CancellationToken>> {
        // Entries stay consistent even if a holder panicked
        self.tokens.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Ownership of one registry entry; deregisters on drop
pub struct RegistrationGuard {
    registry: Arc<CancellationRegistry>,
    id: JobId,
    token: CancellationToken,
}

impl RegistrationGuard {
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl Drop for RegistrationGuard {
    fn drop(&mut self) {
        if self.registry.deregister(&self.id) {
            debug!(job_id = %self.id, "Cancellation token deregistered");
        }
    }
}
