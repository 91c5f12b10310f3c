use super::JobStore;
use crate::error::{AnalysisError, Result};
use crate::job::AnalysisJob;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<String, AnalysisJob>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> Result<MutexGuard<'_, HashMap<String, AnalysisJob>>> {
        self.jobs
            .lock()
            .map_err(|_| AnalysisError::storage(anyhow::anyhow!("job store lock poisoned")))
    }
}

impl JobStore for MemoryJobStore {
    fn insert(&self, job: &AnalysisJob) -> Result<()> {
        let mut jobs = self.guard()?;
        if jobs.contains_key(&job.id) {
            return Err(AnalysisError::Conflict(job.id.clone()));
        }
        jobs.insert(job.id.clone(), job.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<AnalysisJob> {
        self.guard()?
            .get(id)
            .cloned()
            .ok_or_else(|| AnalysisError::NotFound(id.to_string()))
    }

    fn compare_and_swap(&self, expected_version: u64, job: &AnalysisJob) -> Result<bool> {
        let mut jobs = self.guard()?;
        let current = jobs
            .get_mut(&job.id)
            .ok_or_else(|| AnalysisError::NotFound(job.id.clone()))?;
        if current.version != expected_version {
            return Ok(false);
        }
        *current = job.clone();
        Ok(true)
    }
}
