use std::path::{Path, PathBuf};

use serde_json::Value;

use super::{normalize_nct_id, DocumentSource, SourceError};

/// Reads `<dir>/<nct_id>.json`.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl DocumentSource for DirectorySource {
    fn fetch(&self, nct_id: &str) -> Result<Value, SourceError> {
        let id = normalize_nct_id(nct_id)?;
        let path = self.dir.join(format!("{id}.json"));
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SourceError::NotFound(id));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), "Loaded document from directory");
        Ok(serde_json::from_str(&raw)?)
    }
}
