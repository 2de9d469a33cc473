pub mod analysis;
pub mod diagnostic;
pub mod extraction;
pub mod flatten;
pub mod runner;

pub use runner::{BatchFailure, BatchSummary, TrialOutcome, TrialPipeline};

use std::path::PathBuf;

use thiserror::Error;

use crate::db::DatabaseError;
use crate::llm::LlmError;
use crate::source::SourceError;
use analysis::AnalysisError;
use extraction::ExtractError;
use flatten::FlattenError;

/// Failure of one trial's run; the variant names the stage that failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Fetch failed: {0}")]
    Source(#[from] SourceError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractError),

    #[error("Analysis failed: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Model client unavailable: {0}")]
    Llm(#[from] LlmError),

    #[error("Flattening failed: {0}")]
    Flatten(#[from] FlattenError),

    #[error("Persistence failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Cannot write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Read { .. } | Self::Source(_) => "input",
            Self::Extraction(_) => "extraction",
            Self::Analysis(_) | Self::Llm(_) => "analysis",
            Self::Flatten(_) => "flatten",
            Self::Database(_) => "persistence",
            Self::Output { .. } | Self::Serialization(_) => "output",
        }
    }
}
