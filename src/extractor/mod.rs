pub mod command;
pub mod types;

use crate::error::Result;
use crate::job::VideoSource;

pub use types::{
    Analysis, AnalysisStage, AnalyzeRequest, Classification, ClassifyOut, AnalyzeOut,
    ExtractorDiag,
};

/// The external language/vision model. Slow, billed per call, not deterministic.
///
/// Implementations report `ExtractionFailure` when nothing usable came back and
/// `ParseFailure` when the answer does not have the expected shape.
pub trait Extractor {
    fn classify(&self, video: &VideoSource) -> Result<Classification>;
    fn analyze(&self, video: &VideoSource, request: &AnalyzeRequest) -> Result<Analysis>;
}

impl<E: Extractor + ?Sized> Extractor for &E {
    fn classify(&self, video: &VideoSource) -> Result<Classification> {
        (**self).classify(video)
    }

    fn analyze(&self, video: &VideoSource, request: &AnalyzeRequest) -> Result<Analysis> {
        (**self).analyze(video, request)
    }
}
