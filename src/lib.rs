pub mod aggregate;
pub mod cli;
pub mod config;
pub mod error;
pub mod extractor;
pub mod job;
pub mod lint;
pub mod narrative;
pub mod orchestrator;
pub mod scoring;
pub mod signals;
pub mod store;
pub mod util;

pub use error::{AnalysisError, Result};
