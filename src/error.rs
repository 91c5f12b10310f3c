use thiserror::Error;

/// Errors surfaced by the analysis core.
///
/// `ExtractionFailure`, `ParseFailure` and `InvalidSignals` raised while a step
/// runs are absorbed by the orchestrator into a `failed` job; the rest reach
/// the caller directly.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// Malformed create-job request or an operation the job's state forbids.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("job not found: {0}")]
    NotFound(String),

    /// The signal extractor returned nothing usable (error, timeout, ok=false).
    #[error("extraction failed: {0}")]
    ExtractionFailure(String),

    /// The extractor answered, but not in the expected shape.
    #[error("could not interpret extractor output: {0}")]
    ParseFailure(String),

    /// Signals missing required fields or carrying out-of-range values.
    #[error("invalid signals: {}", .0.join(", "))]
    InvalidSignals(Vec<String>),

    /// A compare-and-swap on the job record lost against another writer.
    #[error("job {0} was modified concurrently")]
    Conflict(String),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl AnalysisError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::ExtractionFailure(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseFailure(msg.into())
    }

    pub fn storage(err: impl Into<anyhow::Error>) -> Self {
        Self::Storage(err.into())
    }

    /// True for the errors a step may raise that end in a `failed` job.
    pub fn is_step_failure(&self) -> bool {
        matches!(
            self,
            Self::ExtractionFailure(_) | Self::ParseFailure(_) | Self::InvalidSignals(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
