//! Projection of an analyzed trial into its single persisted row.

pub mod derive;
pub mod eligibility;
pub mod flattener;

pub use eligibility::classify_criteria;
pub use flattener::flatten;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlattenError {
    #[error("Neither the registry record nor the analysis carries a trial identifier")]
    MissingIdentifier,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
