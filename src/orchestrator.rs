//! Job Orchestrator: one resumable step per `advance` call.
//!
//! Between invocations a job is only ever `pending`, `completed` or `failed`.
//! A caller claims the next step by swapping `pending` for the step's running
//! status (with a lease), runs it, then writes the outcome against the version
//! it claimed. A second caller that loses either swap, or finds a live claim,
//! returns the current snapshot without touching the extractor.

use crate::aggregate::aggregate;
use crate::config::{Config, Security};
use crate::error::{AnalysisError, Result};
use crate::extractor::{AnalysisStage, AnalyzeRequest, Extractor};
use crate::job::{
    self, AnalysisJob, CreateJobRequest, JobSnapshot, JobStatus, LintStage, Step, TOTAL_STEPS,
};
use crate::lint;
use crate::narrative;
use crate::scoring;
use crate::store::JobStore;
use crate::util::{format_rfc3339, parse_rfc3339};
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Source of "now" for timestamps and lease expiry.
pub trait Clock {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> OffsetDateTime {
        (**self).now()
    }
}

#[derive(Debug, Clone)]
struct Settings {
    claim_ttl: time::Duration,
    default_niche: Option<String>,
    security: Security,
}

impl Settings {
    fn from_config(cfg: &Config) -> Self {
        let ttl = i64::try_from(cfg.orchestrator.claim_ttl_seconds).unwrap_or(i64::MAX);
        let default_niche =
            Some(cfg.scoring.default_niche.trim().to_ascii_lowercase()).filter(|n| !n.is_empty());
        Self {
            claim_ttl: time::Duration::seconds(ttl),
            default_niche,
            security: cfg.security.clone(),
        }
    }
}

pub struct Orchestrator<E: Extractor, S: JobStore, C: Clock = SystemClock> {
    settings: Settings,
    extractor: E,
    store: S,
    clock: C,
}

impl<E: Extractor, S: JobStore> Orchestrator<E, S, SystemClock> {
    pub fn new(cfg: &Config, extractor: E, store: S) -> Self {
        Self::with_clock(cfg, extractor, store, SystemClock)
    }
}

impl<E: Extractor, S: JobStore, C: Clock> Orchestrator<E, S, C> {
    pub fn with_clock(cfg: &Config, extractor: E, store: S, clock: C) -> Self {
        Self {
            settings: Settings::from_config(cfg),
            extractor,
            store,
            clock,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Validate the request and persist a new `pending` job at step 0.
    pub fn create(&self, req: &CreateJobRequest) -> Result<JobSnapshot> {
        let job = job::new_job(&self.settings.security, req, self.clock.now())?;
        self.store.insert(&job)?;
        info!(job_id = %job.id, source = %job.source, "job created");
        Ok(job.snapshot())
    }

    pub fn snapshot(&self, job_id: &str) -> Result<JobSnapshot> {
        Ok(self.store.load(job_id)?.snapshot())
    }

    /// Perform at most one step of `job_id` and return its snapshot.
    pub fn advance(&self, job_id: &str) -> Result<JobSnapshot> {
        let job = self.store.load(job_id)?;

        if job.status.is_terminal() {
            debug!(job_id, status = %job.status, "terminal job; nothing to do");
            return Ok(job.snapshot());
        }

        let now = self.clock.now();
        if job.status.is_transient() {
            if lease_is_live(&job, now) {
                info!(job_id, status = %job.status, "step already claimed by another caller");
                return Ok(job.snapshot());
            }
            warn!(
                job_id,
                status = %job.status,
                step = job.current_step,
                "claim expired; taking the step over"
            );
        }

        let step = Step::from_index(job.current_step).ok_or_else(|| {
            AnalysisError::storage(anyhow::anyhow!(
                "job {job_id} is {} at step {} of {}",
                job.status,
                job.current_step,
                job.total_steps
            ))
        })?;

        let mut claimed = job.clone();
        claimed.status = step.running_status();
        claimed.version = job.version + 1;
        let expires = now.saturating_add(self.settings.claim_ttl);
        claimed.lease_expires_at = Some(format_rfc3339(expires));
        claimed.updated_at = format_rfc3339(now);
        if !self.store.compare_and_swap(job.version, &claimed)? {
            info!(job_id, step = step.label(), "lost the claim race");
            return self.snapshot(job_id);
        }

        info!(job_id, step = step.label(), "step started");
        let started = Instant::now();
        let outcome = self.run_step(step, &claimed);
        let finished = self.clock.now();

        let mut next = match outcome {
            Ok(next) => {
                info!(
                    job_id,
                    step = step.label(),
                    status = %next.status,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "step finished"
                );
                next
            }
            Err(err) if err.is_step_failure() => {
                warn!(job_id, step = step.label(), "step failed: {err}");
                let mut failed = claimed.clone();
                failed.status = JobStatus::Failed;
                failed.error_message = Some(step.failure_message(&err));
                failed
            }
            Err(err) => {
                self.release(&claimed, finished);
                return Err(err);
            }
        };

        next.version = claimed.version + 1;
        next.lease_expires_at = None;
        next.updated_at = format_rfc3339(finished);
        if next.status == JobStatus::Completed {
            next.completed_at = Some(format_rfc3339(finished));
        }

        if !self.store.compare_and_swap(claimed.version, &next)? {
            warn!(
                job_id,
                step = step.label(),
                "job changed while the step ran; discarding its result"
            );
            return self.snapshot(job_id);
        }
        Ok(next.snapshot())
    }

    /// Manual retry: put a `failed` job back to `pending` at the step that failed.
    pub fn reset(&self, job_id: &str) -> Result<JobSnapshot> {
        let job = self.store.load(job_id)?;
        let next = job::reset_failed(&job, self.clock.now())?;
        if !self.store.compare_and_swap(job.version, &next)? {
            return Err(AnalysisError::Conflict(job_id.to_string()));
        }
        info!(
            job_id,
            step = next.current_step,
            "failed job reset to pending"
        );
        Ok(next.snapshot())
    }

    /// Advance until the job is terminal, another caller holds it, or
    /// `max_advances` calls were made.
    pub fn run_to_completion(&self, job_id: &str, max_advances: u32) -> Result<JobSnapshot> {
        let mut snap = self.snapshot(job_id)?;
        for _ in 0..max_advances {
            if snap.status.is_terminal() {
                return Ok(snap);
            }
            snap = self.advance(job_id)?;
            if snap.status.is_transient() {
                break;
            }
        }
        if !snap.status.is_terminal() {
            warn!(
                job_id,
                status = %snap.status,
                step = snap.current_step,
                "stopped before the job reached a terminal state"
            );
        }
        Ok(snap)
    }

    /// The job as it should look once `step` has succeeded. Status, version
    /// and timestamps are filled in by the caller.
    fn run_step(&self, step: Step, job: &AnalysisJob) -> Result<AnalysisJob> {
        let mut next = job.clone();
        match step {
            Step::Classify => {
                let classification = self.extractor.classify(&job.source)?;
                classification.validate()?;
                debug!(
                    job_id = %job.id,
                    format = %classification.format,
                    confidence = classification.confidence,
                    "classified"
                );
                next.classification_result = Some(classification);
                next.status = JobStatus::Pending;
                next.current_step = 1;
            }
            Step::Lint => {
                let format = self.classification(job)?.format;
                let analysis = self
                    .extractor
                    .analyze(&job.source, &self.request(job, AnalysisStage::Lint, format))?;
                let result = lint::lint(&analysis.signals, &analysis.narrative, format)?;
                debug!(
                    job_id = %job.id,
                    errors = result.errors,
                    warnings = result.warnings,
                    score = result.score,
                    "linted"
                );
                next.lint_result = Some(LintStage {
                    result,
                    signals: analysis.signals,
                    transcript: narrative::normalize(&analysis.narrative),
                });
                next.status = JobStatus::Pending;
                next.current_step = 2;
            }
            Step::Storyboard => {
                let classification = self.classification(job)?;
                let linted = job.lint_result.as_ref().ok_or_else(|| {
                    AnalysisError::invalid_input(format!("job {} has no lint result", job.id))
                })?;
                let analysis = self.extractor.analyze(
                    &job.source,
                    &self.request(job, AnalysisStage::Storyboard, classification.format),
                )?;
                let storyboard = narrative::parse_storyboard(&analysis.narrative)?;
                let signals = linted.signals.merged_with(&analysis.signals);
                let breakdown = scoring::score(&signals, self.niche_for(job))?;
                let out = aggregate(classification, &linted.result, &storyboard, &breakdown);
                debug!(
                    job_id = %job.id,
                    overall = breakdown.overall,
                    niche = %breakdown.niche,
                    beats = storyboard.beats.len(),
                    "scored"
                );
                next.storyboard_result = Some(out.document);
                next.projection = out.projection;
                next.status = JobStatus::Completed;
                next.current_step = TOTAL_STEPS;
            }
        }
        Ok(next)
    }

    fn classification<'a>(
        &self,
        job: &'a AnalysisJob,
    ) -> Result<&'a crate::extractor::Classification> {
        job.classification_result.as_ref().ok_or_else(|| {
            AnalysisError::invalid_input(format!("job {} has no classification", job.id))
        })
    }

    fn request(
        &self,
        job: &AnalysisJob,
        stage: AnalysisStage,
        format: lint::VideoFormat,
    ) -> AnalyzeRequest {
        AnalyzeRequest {
            stage,
            format,
            niche: self.niche_for(job).map(str::to_string),
        }
    }

    fn niche_for<'a>(&'a self, job: &'a AnalysisJob) -> Option<&'a str> {
        job.niche
            .as_deref()
            .or(self.settings.default_niche.as_deref())
    }

    /// Hand a claimed step back after an error that is not the job's fault,
    /// so the next caller can retry it without waiting for the lease.
    fn release(&self, claimed: &AnalysisJob, now: OffsetDateTime) {
        let mut released = claimed.clone();
        released.status = JobStatus::Pending;
        released.lease_expires_at = None;
        released.version = claimed.version + 1;
        released.updated_at = format_rfc3339(now);
        match self.store.compare_and_swap(claimed.version, &released) {
            Ok(true) => debug!(job_id = %claimed.id, "claim released"),
            Ok(false) => warn!(job_id = %claimed.id, "claim changed before it could be released"),
            Err(e) => warn!(job_id = %claimed.id, "failed to release claim: {e}"),
        }
    }
}

fn lease_is_live(job: &AnalysisJob, now: OffsetDateTime) -> bool {
    let Some(raw) = job.lease_expires_at.as_deref() else {
        return false;
    };
    match parse_rfc3339(raw) {
        Ok(expires) => now < expires,
        Err(e) => {
            warn!(job_id = %job.id, "unreadable lease expiry: {e:#}");
            false
        }
    }
}
