use super::{Extractor, types::*};
use crate::config::Config;
use crate::error::{AnalysisError, Result};
use crate::job::VideoSource;
use anyhow::{Context, anyhow};
use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Talks to the model through an external program: one JSON request on
/// stdin, one JSON response on stdout.
pub struct CommandExtractor {
    cfg: Config,
    program: PathBuf,
}

/// Transport-level outcome of one extractor call, before it is mapped onto
/// the error taxonomy.
enum CallError {
    /// Spawn failure, non-zero exit, timeout.
    Failed(anyhow::Error),
    /// The process ran but stdout is not the JSON we asked for.
    Undecodable(anyhow::Error),
}

impl CallError {
    fn into_analysis_error(self, what: &str) -> AnalysisError {
        match self {
            CallError::Failed(e) => AnalysisError::extraction(format!("{what}: {e:#}")),
            CallError::Undecodable(e) => AnalysisError::parse(format!("{what}: {e:#}")),
        }
    }
}

impl CommandExtractor {
    pub fn new(cfg: &Config) -> Result<Self> {
        let raw = cfg.extractor.program.trim();
        if raw.is_empty() {
            return Err(AnalysisError::Config("extractor.program is empty".into()));
        }
        Ok(Self {
            cfg: cfg.clone(),
            program: expand_tilde(raw),
        })
    }

    /// Step timeout, capped by the per-invocation budget.
    fn timeout_for(&self, step_seconds: u64) -> Duration {
        let budget = self.cfg.orchestrator.invocation_budget_seconds;
        let secs = if step_seconds == 0 {
            budget
        } else {
            step_seconds.min(budget)
        };
        Duration::from_secs(secs)
    }

    pub fn doctor(&self) -> anyhow::Result<ExtractorDiag> {
        let timeout = self.timeout_for(self.cfg.extractor.classify_timeout_seconds);
        match self.run_json::<_, ExtractorDiag>(&serde_json::json!({"cmd": "doctor"}), timeout) {
            Ok(diag) => Ok(diag),
            Err(CallError::Failed(e)) | Err(CallError::Undecodable(e)) => Ok(ExtractorDiag {
                program: self.program.display().to_string(),
                ok: false,
                version: None,
                error: Some(format!("{e:#}")),
            }),
        }
    }

    fn run_json<I: serde::Serialize, O: for<'de> serde::Deserialize<'de>>(
        &self,
        input: &I,
        timeout: Duration,
    ) -> std::result::Result<O, CallError> {
        debug!(
            "extractor run {} timeout={:?}",
            self.program.display(),
            timeout
        );
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.cfg.extractor.args);
        cmd.stdin(Stdio::piped());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        for (k, v) in &self.cfg.extractor.env {
            cmd.env(k, v);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning extractor: {}", self.program.display()))
            .map_err(CallError::Failed)?;

        if let Err(e) = write_request(&mut child, input) {
            let _ = child.kill();
            let _ = child.wait();
            return Err(CallError::Failed(e));
        }

        let output = wait_with_timeout(&mut child, timeout).map_err(CallError::Failed)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CallError::Failed(anyhow!(
                "extractor exited with {}\n{}",
                output.status,
                stderr.trim()
            )));
        }

        if self.cfg.extractor.keep_stderr && !output.stderr.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!("extractor stderr: {}", stderr.trim());
        }

        serde_json::from_slice(&output.stdout)
            .with_context(|| "parsing extractor JSON output")
            .map_err(CallError::Undecodable)
    }
}

impl Extractor for CommandExtractor {
    fn classify(&self, video: &VideoSource) -> Result<Classification> {
        let timeout = self.timeout_for(self.cfg.extractor.classify_timeout_seconds);
        let out: ClassifyOut = self
            .run_json(
                &serde_json::json!({"cmd": "classify", "video": video}),
                timeout,
            )
            .map_err(|e| e.into_analysis_error("classify"))?;

        if !out.ok {
            let msg = out
                .error
                .unwrap_or_else(|| "classify returned ok=false".to_string());
            return Err(AnalysisError::extraction(msg));
        }
        let (Some(format), Some(confidence)) = (out.format, out.confidence) else {
            return Err(AnalysisError::parse(
                "classify response lacks format or confidence",
            ));
        };
        let classification = Classification {
            format,
            confidence,
            evidence: out.evidence,
        };
        classification.validate()?;
        Ok(classification)
    }

    fn analyze(&self, video: &VideoSource, request: &AnalyzeRequest) -> Result<Analysis> {
        let step_timeout = match request.stage {
            AnalysisStage::Lint => self.cfg.extractor.lint_timeout_seconds,
            AnalysisStage::Storyboard => self.cfg.extractor.storyboard_timeout_seconds,
        };
        let timeout = self.timeout_for(step_timeout);
        let out: AnalyzeOut = self
            .run_json(
                &serde_json::json!({"cmd": "analyze", "video": video, "request": request}),
                timeout,
            )
            .map_err(|e| e.into_analysis_error("analyze"))?;

        if !out.ok {
            let msg = out
                .error
                .unwrap_or_else(|| "analyze returned ok=false".to_string());
            return Err(AnalysisError::extraction(msg));
        }
        let Some(narrative) = out.narrative.filter(|n| !n.trim().is_empty()) else {
            return Err(AnalysisError::extraction("analyze returned no narrative"));
        };
        if out.signals.is_none() {
            warn!("analyze ({:?}) returned no signals", request.stage);
        }
        Ok(Analysis {
            narrative,
            signals: out.signals.unwrap_or_default(),
        })
    }
}

fn write_request<I: serde::Serialize>(child: &mut Child, input: &I) -> anyhow::Result<()> {
    use std::io::Write;
    let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
    let bytes = serde_json::to_vec(input)?;
    stdin.write_all(&bytes)?;
    stdin.flush().ok();
    Ok(())
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> anyhow::Result<Output> {
    // Drain pipes while waiting so a chatty extractor can't block on a full pipe.
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> anyhow::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> anyhow::Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = stdout_thread
                .join()
                .map_err(|_| anyhow!("stdout reader thread panicked"))??;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            return Ok(Output {
                status,
                stdout,
                stderr,
            });
        }

        if start.elapsed() > timeout {
            warn!("extractor timed out after {:?}", timeout);
            let _ = child.kill();
            child.wait().with_context(|| "wait after kill")?;
            let stderr = stderr_thread
                .join()
                .map_err(|_| anyhow!("stderr reader thread panicked"))??;
            let _ = stdout_thread.join();
            return Err(anyhow!(
                "extractor exceeded timeout ({:?}); stderr: {}",
                timeout,
                String::from_utf8_lossy(&stderr).trim()
            ));
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
