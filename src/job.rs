//! The persisted analysis job and its outward snapshot.

use crate::aggregate::{Projection, ResultDocument};
use crate::config::Security;
use crate::error::{AnalysisError, Result};
use crate::extractor::Classification;
use crate::lint::LintResult;
use crate::signals::VideoSignals;
use crate::util::{format_rfc3339, sha256_hex};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use time::OffsetDateTime;

pub const TOTAL_STEPS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Classifying,
    Linting,
    Storyboarding,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Held only while a step executes.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            JobStatus::Classifying | JobStatus::Linting | JobStatus::Storyboarding
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Classifying => "classifying",
            JobStatus::Linting => "linting",
            JobStatus::Storyboarding => "storyboarding",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three resumable steps, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Classify,
    Lint,
    Storyboard,
}

impl Step {
    pub fn from_index(i: u32) -> Option<Step> {
        match i {
            0 => Some(Step::Classify),
            1 => Some(Step::Lint),
            2 => Some(Step::Storyboard),
            _ => None,
        }
    }

    pub fn running_status(self) -> JobStatus {
        match self {
            Step::Classify => JobStatus::Classifying,
            Step::Lint => JobStatus::Linting,
            Step::Storyboard => JobStatus::Storyboarding,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Step::Classify => "classification",
            Step::Lint => "lint",
            Step::Storyboard => "storyboard",
        }
    }

    /// Caller-facing failure text. Fixed templates only: provider errors stay in the log.
    pub fn failure_message(self, err: &AnalysisError) -> String {
        let why = match err {
            AnalysisError::ParseFailure(_) => "the extractor response could not be interpreted",
            AnalysisError::InvalidSignals(_) => "the extracted measurements were incomplete",
            _ => "the signal extractor did not return a usable result",
        };
        format!("{} step failed: {why}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum VideoSource {
    Url(String),
    File(String),
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VideoSource::Url(u) => write!(f, "url:{u}"),
            VideoSource::File(p) => write!(f, "file:{p}"),
        }
    }
}

/// Result of the lint step, kept whole so the storyboard step can build on it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintStage {
    pub result: LintResult,
    pub signals: VideoSignals,
    pub transcript: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisJob {
    pub id: String,
    pub source: VideoSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niche: Option<String>,
    pub status: JobStatus,
    pub current_step: u32,
    pub total_steps: u32,
    #[serde(default)]
    pub classification_result: Option<Classification>,
    #[serde(default)]
    pub lint_result: Option<LintStage>,
    #[serde(default)]
    pub storyboard_result: Option<ResultDocument>,
    /// Query columns derived from `storyboard_result`; never written independently.
    #[serde(default, skip_serializing_if = "Projection::is_empty")]
    pub projection: Projection,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub completed_at: Option<String>,
    /// Bumped on every write; compare-and-swap token.
    #[serde(default)]
    pub version: u64,
    /// While a step is claimed: when another caller may take it over.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<String>,
}

impl AnalysisJob {
    pub fn progress_percent(&self) -> u32 {
        let total = self.total_steps.max(1);
        let step = self.current_step.min(total);
        (step * 100 + total / 2) / total
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id.clone(),
            status: self.status,
            current_step: self.current_step,
            total_steps: self.total_steps,
            progress_percent: self.progress_percent(),
            classification: self.classification_result.clone(),
            lint_summary: self.lint_result.as_ref().map(|l| l.result.clone()),
            storyboard: self.storyboard_result.clone(),
            error_message: if self.status == JobStatus::Failed {
                self.error_message.clone()
            } else {
                None
            },
            created_at: self.created_at.clone(),
            updated_at: self.updated_at.clone(),
            completed_at: self.completed_at.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: String,
    pub status: JobStatus,
    pub current_step: u32,
    pub total_steps: u32,
    pub progress_percent: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lint_summary: Option<LintResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storyboard: Option<ResultDocument>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateJobRequest {
    #[serde(default)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub file_reference: Option<String>,
    #[serde(default)]
    pub niche: Option<String>,
}

/// Validate a create request and build the initial `pending` record.
pub fn new_job(
    security: &Security,
    req: &CreateJobRequest,
    now: OffsetDateTime,
) -> Result<AnalysisJob> {
    let url = req
        .video_url
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());
    let file = req
        .file_reference
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let source = match (url, file) {
        (Some(_), Some(_)) => {
            return Err(AnalysisError::invalid_input(
                "give either a video URL or a file reference, not both",
            ));
        }
        (None, None) => {
            return Err(AnalysisError::invalid_input(
                "a video URL or a file reference is required",
            ));
        }
        (Some(u), None) => VideoSource::Url(validate_url(security, u)?),
        (None, Some(f)) => VideoSource::File(validate_file_reference(security, f)?),
    };

    let niche = req
        .niche
        .as_deref()
        .map(|n| n.trim().to_ascii_lowercase())
        .filter(|n| !n.is_empty());
    let ts = format_rfc3339(now);

    Ok(AnalysisJob {
        id: new_job_id(&source, now),
        source,
        niche,
        status: JobStatus::Pending,
        current_step: 0,
        total_steps: TOTAL_STEPS,
        classification_result: None,
        lint_result: None,
        storyboard_result: None,
        projection: Projection::new(),
        error_message: None,
        created_at: ts.clone(),
        updated_at: ts,
        completed_at: None,
        version: 0,
        lease_expires_at: None,
    })
}

/// Manual retry: `failed` goes back to `pending` at the same step.
pub fn reset_failed(job: &AnalysisJob, now: OffsetDateTime) -> Result<AnalysisJob> {
    if job.status != JobStatus::Failed {
        return Err(AnalysisError::invalid_input(format!(
            "job {} is {}, only failed jobs can be reset",
            job.id, job.status
        )));
    }
    let mut next = job.clone();
    next.status = JobStatus::Pending;
    next.error_message = None;
    next.lease_expires_at = None;
    next.updated_at = format_rfc3339(now);
    next.version += 1;
    Ok(next)
}

fn validate_url(security: &Security, raw: &str) -> Result<String> {
    let parsed = url::Url::parse(raw)
        .map_err(|e| AnalysisError::invalid_input(format!("malformed video URL: {e}")))?;

    let scheme = parsed.scheme();
    if !security
        .allowed_url_schemes
        .iter()
        .any(|s| s.eq_ignore_ascii_case(scheme))
    {
        return Err(AnalysisError::invalid_input(format!(
            "unsupported URL scheme: {scheme}"
        )));
    }

    let host = parsed
        .host_str()
        .ok_or_else(|| AnalysisError::invalid_input("video URL has no host"))?
        .to_ascii_lowercase();
    let host_ok = security.allowed_url_hosts.is_empty()
        || security.allowed_url_hosts.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            host == allowed || host.ends_with(&format!(".{allowed}"))
        });
    if !host_ok {
        return Err(AnalysisError::invalid_input(format!(
            "unsupported video host: {host}"
        )));
    }

    Ok(parsed.to_string())
}

fn validate_file_reference(security: &Security, raw: &str) -> Result<String> {
    if raw.split(['/', '\\']).any(|part| part == "..") {
        return Err(AnalysisError::invalid_input(
            "file reference must not contain '..'",
        ));
    }
    let ext = std::path::Path::new(raw)
        .extension()
        .and_then(|s| s.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| AnalysisError::invalid_input("file reference has no extension"))?;
    if !security
        .allowed_file_extensions
        .iter()
        .any(|e| e.eq_ignore_ascii_case(&ext))
    {
        return Err(AnalysisError::invalid_input(format!(
            "unsupported file type: .{ext}"
        )));
    }
    Ok(raw.to_string())
}

static JOB_SEQ: AtomicU64 = AtomicU64::new(0);

fn new_job_id(source: &VideoSource, now: OffsetDateTime) -> String {
    let seq = JOB_SEQ.fetch_add(1, Ordering::Relaxed);
    let seed = format!(
        "{source}:{}:{}:{seq}",
        now.unix_timestamp_nanos(),
        std::process::id()
    );
    sha256_hex(seed.as_bytes())[..32].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_rounds_to_nearest() {
        let mut job = new_job(
            &Security::default(),
            &CreateJobRequest {
                file_reference: Some("uploads/clip.mp4".into()),
                ..Default::default()
            },
            OffsetDateTime::UNIX_EPOCH,
        )
        .unwrap();
        let seen: Vec<u32> = (0..=3)
            .map(|s| {
                job.current_step = s;
                job.progress_percent()
            })
            .collect();
        assert_eq!(seen, vec![0, 33, 67, 100]);
    }

    #[test]
    fn ids_are_unique_for_same_input_and_instant() {
        let src = VideoSource::File("a.mp4".into());
        let a = new_job_id(&src, OffsetDateTime::UNIX_EPOCH);
        let b = new_job_id(&src, OffsetDateTime::UNIX_EPOCH);
        assert_ne!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn failure_messages_do_not_echo_provider_text() {
        let err = AnalysisError::extraction("HTTP 429 from provider: quota key sk-123");
        let msg = Step::Classify.failure_message(&err);
        assert_eq!(
            msg,
            "classification step failed: the signal extractor did not return a usable result"
        );
    }
}
