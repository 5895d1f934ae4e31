//! Admission control for running backup jobs.
//!
//! Tracks the ids of running jobs. Checking the limit and registering a job
//! happen under one lock, so two racing callers cannot both take the last slot.

use crate::utils::errors::{BackupError, Result};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub struct AdmissionControl {
    max_concurrent: usize,
    active: Arc<Mutex<HashSet<String>>>,
}

/// Held for the lifetime of a job; dropping it frees the slot.
#[derive(Debug)]
pub struct JobSlot {
    job_id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl AdmissionControl {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            max_concurrent,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Admit a job or reject it immediately when all slots are taken.
    pub fn try_admit(&self, job_id: &str) -> Result<JobSlot> {
        let mut active = lock(&self.active);
        if active.len() >= self.max_concurrent {
            return Err(BackupError::ConcurrencyLimitExceeded {
                max: self.max_concurrent,
            });
        }
        active.insert(job_id.to_string());

        Ok(JobSlot {
            job_id: job_id.to_string(),
            active: Arc::clone(&self.active),
        })
    }

    pub fn is_active(&self, job_id: &str) -> bool {
        lock(&self.active).contains(job_id)
    }

    pub fn running_count(&self) -> usize {
        lock(&self.active).len()
    }
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        lock(&self.active).remove(&self.job_id);
    }
}

// A panic while holding the lock leaves the set itself consistent
fn lock(active: &Mutex<HashSet<String>>) -> MutexGuard<'_, HashSet<String>> {
    active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
