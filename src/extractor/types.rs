use crate::error::{AnalysisError, Result};
use crate::lint::VideoFormat;
use crate::signals::VideoSignals;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub format: VideoFormat,
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<String>,
}

impl Classification {
    pub fn validate(&self) -> Result<()> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(AnalysisError::parse(format!(
                "classification confidence out of range: {}",
                self.confidence
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    /// Transcript plus whatever signals lint needs.
    Lint,
    /// Storyboard narrative plus the remaining signals.
    Storyboard,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub stage: AnalysisStage,
    pub format: VideoFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub niche: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Analysis {
    pub narrative: String,
    #[serde(default)]
    pub signals: VideoSignals,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorDiag {
    pub program: String,
    pub ok: bool,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyOut {
    pub ok: bool,
    #[serde(default)]
    pub format: Option<VideoFormat>,
    #[serde(default)]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeOut {
    pub ok: bool,
    #[serde(default)]
    pub narrative: Option<String>,
    #[serde(default)]
    pub signals: Option<VideoSignals>,
    #[serde(default)]
    pub error: Option<String>,
}
