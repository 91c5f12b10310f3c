use super::JobStore;
use crate::error::{AnalysisError, Result};
use crate::job::AnalysisJob;
use crate::util::{ensure_dir, write_atomic};
use anyhow::Context;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};
use tracing::warn;

const LOCK_WAIT: Duration = Duration::from_secs(2);
const LOCK_POLL: Duration = Duration::from_millis(10);
/// A lock file older than this belongs to a writer that died mid-update.
const LOCK_STALE: Duration = Duration::from_secs(30);

/// One JSON document per job under a directory.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    dir: PathBuf,
}

impl FileJobStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        ensure_dir(&dir).map_err(AnalysisError::storage)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        check_id(id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }

    fn lock(&self, id: &str) -> Result<JobLock> {
        check_id(id)?;
        JobLock::acquire(self.dir.join(format!("{id}.lock")))
    }

    fn read(&self, id: &str) -> Result<Option<AnalysisJob>> {
        let path = self.record_path(id)?;
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(AnalysisError::storage(
                    anyhow::Error::new(e).context(format!("reading job: {}", path.display())),
                ));
            }
        };
        let job = serde_json::from_str(&raw)
            .with_context(|| format!("parsing job record: {}", path.display()))
            .map_err(AnalysisError::storage)?;
        Ok(Some(job))
    }

    fn write(&self, job: &AnalysisJob) -> Result<()> {
        let path = self.record_path(&job.id)?;
        let bytes = serde_json::to_vec_pretty(job)
            .with_context(|| format!("serializing job {}", job.id))
            .map_err(AnalysisError::storage)?;
        write_atomic(&path, &bytes).map_err(AnalysisError::storage)
    }
}

impl JobStore for FileJobStore {
    fn insert(&self, job: &AnalysisJob) -> Result<()> {
        let _lock = self.lock(&job.id)?;
        if self.read(&job.id)?.is_some() {
            return Err(AnalysisError::Conflict(job.id.clone()));
        }
        self.write(job)
    }

    fn load(&self, id: &str) -> Result<AnalysisJob> {
        self.read(id)?
            .ok_or_else(|| AnalysisError::NotFound(id.to_string()))
    }

    fn compare_and_swap(&self, expected_version: u64, job: &AnalysisJob) -> Result<bool> {
        let _lock = self.lock(&job.id)?;
        let current = self
            .read(&job.id)?
            .ok_or_else(|| AnalysisError::NotFound(job.id.clone()))?;
        if current.version != expected_version {
            return Ok(false);
        }
        self.write(job)?;
        Ok(true)
    }
}

/// Ids become file names; keep them to a safe alphabet.
fn check_id(id: &str) -> Result<()> {
    let ok = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(AnalysisError::NotFound(id.to_string()))
    }
}

/// Exclusive lock file held for one read-compare-write.
struct JobLock {
    path: PathBuf,
}

impl JobLock {
    fn acquire(path: PathBuf) -> Result<Self> {
        let started = std::time::Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if lock_is_stale(&path) && break_stale_lock(&path) {
                        continue;
                    }
                    if started.elapsed() > LOCK_WAIT {
                        return Err(AnalysisError::storage(anyhow::anyhow!(
                            "timed out waiting for lock {}",
                            path.display()
                        )));
                    }
                    std::thread::sleep(LOCK_POLL);
                }
                Err(e) => {
                    return Err(AnalysisError::storage(
                        anyhow::Error::new(e).context(format!("creating lock {}", path.display())),
                    ));
                }
            }
        }
    }
}

impl Drop for JobLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

static BREAK_SEQ: AtomicU64 = AtomicU64::new(0);

/// Move a dead writer's lock aside. Of several waiters that saw the same
/// stale lock, only one rename finds it; the others get `NotFound` and go
/// back to `create_new`. A waiter whose rename caught a lock that was
/// re-created in the meantime links it back instead of keeping it.
fn break_stale_lock(path: &Path) -> bool {
    let seq = BREAK_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut aside = path.as_os_str().to_owned();
    aside.push(format!(".stale-{}-{seq}", std::process::id()));
    let aside = PathBuf::from(aside);

    if std::fs::rename(path, &aside).is_err() {
        return false;
    }
    let stale = lock_is_stale(&aside);
    if stale {
        warn!("broke stale job lock {}", path.display());
    } else if let Err(e) = std::fs::hard_link(&aside, path) {
        warn!("could not restore job lock {}: {e}", path.display());
    }
    let _ = std::fs::remove_file(&aside);
    stale
}

fn lock_is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| SystemTime::now().duration_since(t).ok())
        .is_some_and(|age| age > LOCK_STALE)
}
