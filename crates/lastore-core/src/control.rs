//! Cancel tokens shared between the engine and the driver.
//!
//! Every live job is registered with an abort token. `Engine::cancel` sets
//! the token once the job has agreed to be cancelable; the driver polls the
//! token (or holds a clone of it) and stops the underlying operation, then
//! reports the outcome through the normal progress path.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use crate::id::JobId;

/// Registry of job id -> abort token.
#[derive(Debug, Default)]
pub struct JobControl {
    jobs: RwLock<HashMap<JobId, Arc<AtomicBool>>>,
}

impl JobControl {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job and return its (unset) abort token.
    pub fn register(&self, job_id: &JobId) -> Arc<AtomicBool> {
        let token = Arc::new(AtomicBool::new(false));
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_id.clone(), Arc::clone(&token));
        token
    }

    /// Forget a job once it has been reaped.
    pub fn unregister(&self, job_id: &JobId) {
        self.jobs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(job_id);
    }

    /// Set the abort token. Returns false if the job is not registered.
    pub fn request_abort(&self, job_id: &JobId) -> bool {
        match self.jobs.read().unwrap_or_else(PoisonError::into_inner).get(job_id) {
            Some(token) => {
                token.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Reset the token of a job that is being retried.
    pub fn clear_abort(&self, job_id: &JobId) {
        if let Some(token) = self.jobs.read().unwrap_or_else(PoisonError::into_inner).get(job_id) {
            token.store(false, Ordering::Release);
        }
    }

    pub fn is_abort_requested(&self, job_id: &JobId) -> bool {
        self.jobs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_id)
            .is_some_and(|t| t.load(Ordering::Acquire))
    }
}
