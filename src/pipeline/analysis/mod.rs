//! Three-pass LLM analysis: draft (with focused sub-queries), validation,
//! correction.

pub mod consistency;
pub mod orchestrator;
pub mod parser;
pub mod prompt;

pub use consistency::*;
pub use orchestrator::*;
pub use parser::*;

use thiserror::Error;

use crate::llm::LlmError;

/// A model response that could not be turned into the expected structure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResponseError {
    #[error("Empty response")]
    Empty,

    #[error("No valid JSON in response: {0}")]
    InvalidJson(String),

    #[error("Analysis has none of the expected sections")]
    MissingSections,

    #[error("Expected a JSON {0}")]
    WrongShape(&'static str),
}

/// Failure of one model-backed stage.
#[derive(Error, Debug)]
pub enum StageError {
    #[error("LLM call failed: {0}")]
    Call(#[from] LlmError),

    #[error("Unusable response: {0}")]
    Response(#[from] ResponseError),
}

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Draft analysis failed: {0}")]
    Draft(#[source] StageError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
