//! Where raw registry documents come from.

pub mod directory;
pub mod registry;

pub use directory::DirectorySource;
pub use registry::RegistryClient;

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("Not a registry identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Trial not found: {0}")]
    NotFound(String),

    #[error("Registry returned error (status {status}): {body}")]
    Http { status: u16, body: String },

    #[error("Registry request failed: {0}")]
    Request(String),

    #[error("Document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Supplies the raw document of one trial.
pub trait DocumentSource {
    fn fetch(&self, nct_id: &str) -> Result<Value, SourceError>;
}

static NCT_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^NCT\d{8}$").expect("valid regex"));

/// Upper-cased identifier, or an error when it is not `NCT` + 8 digits.
pub fn normalize_nct_id(raw: &str) -> Result<String, SourceError> {
    let id = raw.trim().to_ascii_uppercase();
    if NCT_ID.is_match(&id) {
        Ok(id)
    } else {
        Err(SourceError::InvalidIdentifier(raw.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_normalized() {
        assert_eq!(normalize_nct_id(" nct04000001 ").unwrap(), "NCT04000001");
    }

    #[test]
    fn malformed_identifiers_rejected() {
        for raw in ["NCT123", "04000001", "NCT0400000X", "../NCT04000001", ""] {
            assert!(matches!(normalize_nct_id(raw), Err(SourceError::InvalidIdentifier(_))), "{raw}");
        }
    }
}
