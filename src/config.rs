use crate::error::AnalysisError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: Global,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub orchestrator: Orchestrator,
    #[serde(default)]
    pub extractor: Extractor,
    #[serde(default)]
    pub scoring: Scoring,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub security: Security,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> std::result::Result<(), AnalysisError> {
        if self.orchestrator.invocation_budget_seconds == 0 {
            return Err(AnalysisError::Config(
                "orchestrator.invocation_budget_seconds must be > 0".into(),
            ));
        }
        if self.orchestrator.claim_ttl_seconds == 0 {
            return Err(AnalysisError::Config(
                "orchestrator.claim_ttl_seconds must be > 0".into(),
            ));
        }
        if self.extractor.program.trim().is_empty() {
            return Err(AnalysisError::Config("extractor.program is empty".into()));
        }
        if self.paths.jobs_dir.trim().is_empty() {
            return Err(AnalysisError::Config("paths.jobs_dir is empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Global {
    pub print_summary: bool,
}
impl Default for Global {
    fn default() -> Self {
        Self {
            print_summary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    pub jobs_dir: String,
}
impl Default for Paths {
    fn default() -> Self {
        Self {
            jobs_dir: "jobs".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Orchestrator {
    /// Ceiling for one `advance` invocation; extractor timeouts are capped by it.
    pub invocation_budget_seconds: u64,
    /// How long a claimed step may stay in a transient status before another
    /// caller is allowed to take it over.
    pub claim_ttl_seconds: u64,
    pub max_advances_per_run: u32,
}
impl Default for Orchestrator {
    fn default() -> Self {
        Self {
            invocation_budget_seconds: 100,
            claim_ttl_seconds: 120,
            max_advances_per_run: 16,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Extractor {
    pub program: String,
    pub args: Vec<String>,
    pub env: std::collections::BTreeMap<String, String>,
    pub classify_timeout_seconds: u64,
    pub lint_timeout_seconds: u64,
    pub storyboard_timeout_seconds: u64,
    pub keep_stderr: bool,
}
impl Default for Extractor {
    fn default() -> Self {
        Self {
            program: "python3".into(),
            args: vec!["scripts/extractor.py".into()],
            env: Default::default(),
            classify_timeout_seconds: 30,
            lint_timeout_seconds: 60,
            storyboard_timeout_seconds: 90,
            keep_stderr: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scoring {
    /// Niche used when a job was created without one. Empty means default weights.
    pub default_niche: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Security {
    pub allowed_url_schemes: Vec<String>,
    /// Host suffixes accepted for URL inputs. Empty accepts any host.
    pub allowed_url_hosts: Vec<String>,
    pub allowed_file_extensions: Vec<String>,
}
impl Default for Security {
    fn default() -> Self {
        Self {
            allowed_url_schemes: vec!["https".into(), "http".into()],
            allowed_url_hosts: vec![
                "tiktok.com".into(),
                "youtube.com".into(),
                "youtu.be".into(),
                "instagram.com".into(),
            ],
            allowed_file_extensions: vec!["mp4".into(), "mov".into(), "m4v".into(), "webm".into()],
        }
    }
}
