//! Deterministic projection of registry documents into [`ExtractedRecord`]s.
//!
//! [`ExtractedRecord`]: crate::models::ExtractedRecord

pub mod criteria;
pub mod extractor;
pub mod paths;

pub use criteria::{segment_criteria, SegmentedCriteria};
pub use extractor::{extract_from_str, extract_trial};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Document root is not a tree ({0})")]
    NotATree(&'static str),
}
