pub mod file;
pub mod memory;

use crate::error::Result;
use crate::job::AnalysisJob;

pub use file::FileJobStore;
pub use memory::MemoryJobStore;

/// Persistence for job records. The job record is the only shared mutable
/// state, so every update goes through `compare_and_swap`.
pub trait JobStore {
    /// Store a new job. `Conflict` if the id is taken.
    fn insert(&self, job: &AnalysisJob) -> Result<()>;

    /// `NotFound` if there is no such job.
    fn load(&self, id: &str) -> Result<AnalysisJob>;

    /// Replace the stored record with `job` only if the stored version is
    /// still `expected_version`. Returns `false` when another writer got there first.
    fn compare_and_swap(&self, expected_version: u64, job: &AnalysisJob) -> Result<bool>;
}

impl<S: JobStore + ?Sized> JobStore for &S {
    fn insert(&self, job: &AnalysisJob) -> Result<()> {
        (**self).insert(job)
    }

    fn load(&self, id: &str) -> Result<AnalysisJob> {
        (**self).load(id)
    }

    fn compare_and_swap(&self, expected_version: u64, job: &AnalysisJob) -> Result<bool> {
        (**self).compare_and_swap(expected_version, job)
    }
}
