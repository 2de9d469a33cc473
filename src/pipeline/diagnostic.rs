//! Stage observation hook and the on-disk diagnostic dump built on it.
//!
//! The pipeline reports every intermediate artifact to an optional
//! [`StageObserver`]. [`DiagnosticDump`] writes them to disk so a run can be
//! inspected stage by stage:
//!
//! ```text
//! {dump_dir}/{nct_id}/
//!   01-extraction-result.json
//!   02-mechanism-prompt.txt
//!   02-mechanism-response.txt
//!   03-biomarkers-prompt.txt
//!   03-biomarkers-response.txt
//!   04-draft-prompt.txt
//!   04-draft-response.txt
//!   04-draft-result.json
//!   05-validation-…
//!   06-correction-…
//!   07-flatten-result.json
//! ```
//!
//! Dump failures are logged and never interrupt the pipeline.

use std::path::{Path, PathBuf};

use serde_json::Value;

// ──────────────────────────────────────────────
// Observer hook
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Extraction,
    Mechanism,
    Biomarkers,
    Draft,
    Validation,
    Correction,
    Flatten,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Extraction => "extraction",
            Self::Mechanism => "mechanism",
            Self::Biomarkers => "biomarkers",
            Self::Draft => "draft",
            Self::Validation => "validation",
            Self::Correction => "correction",
            Self::Flatten => "flatten",
        }
    }

    fn ordinal(&self) -> u8 {
        match self {
            Self::Extraction => 1,
            Self::Mechanism => 2,
            Self::Biomarkers => 3,
            Self::Draft => 4,
            Self::Validation => 5,
            Self::Correction => 6,
            Self::Flatten => 7,
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An intermediate artifact of one stage.
#[derive(Debug, Clone)]
pub enum StageArtifact<'a> {
    Prompt { system: &'a str, prompt: &'a str },
    Response(&'a str),
    Result(Value),
}

/// Receives every intermediate artifact of a pipeline run.
pub trait StageObserver {
    fn on_stage(&self, nct_id: &str, stage: PipelineStage, artifact: &StageArtifact<'_>);
}

// ──────────────────────────────────────────────
// Diagnostic dump
// ──────────────────────────────────────────────

/// Writes stage artifacts under `{base}/{nct_id}/`.
pub struct DiagnosticDump {
    base: PathBuf,
}

impl DiagnosticDump {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Returns the dump directory for a trial, creating it on first use.
    /// `None` (with a warning) if the directory cannot be created.
    pub fn dir_for(&self, nct_id: &str) -> Option<PathBuf> {
        let dir = self.base.join(sanitize_component(nct_id));
        if let Err(e) = std::fs::create_dir_all(&dir) {
            tracing::warn!(
                path = %dir.display(),
                error = %e,
                "Diagnostic dump: failed to create directory"
            );
            return None;
        }
        Some(dir)
    }
}

impl StageObserver for DiagnosticDump {
    fn on_stage(&self, nct_id: &str, stage: PipelineStage, artifact: &StageArtifact<'_>) {
        let Some(dir) = self.dir_for(nct_id) else {
            return;
        };
        let prefix = format!("{:02}-{}", stage.ordinal(), stage.as_str());
        match artifact {
            StageArtifact::Prompt { system, prompt } => dump_text(
                &dir,
                &format!("{prefix}-prompt.txt"),
                &format!("[system]\n{}\n\n[user]\n{}", system.trim(), prompt),
            ),
            StageArtifact::Response(text) => dump_text(&dir, &format!("{prefix}-response.txt"), text),
            StageArtifact::Result(value) => dump_json(&dir, &format!("{prefix}-result.json"), value),
        }
    }
}

/// Keep identifiers usable as a single path component.
fn sanitize_component(id: &str) -> String {
    let cleaned: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "unknown".to_string()
    } else {
        cleaned
    }
}

/// Pretty-printed JSON artifact. Failures are logged only.
pub fn dump_json<T: serde::Serialize>(dir: &Path, filename: &str, value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => write_artifact(&dir.join(filename), &json),
        Err(e) => tracing::warn!(file = filename, error = %e, "Diagnostic dump: unserializable artifact"),
    }
}

/// Plain-text artifact (prompt or raw model reply). Failures are logged only.
pub fn dump_text(dir: &Path, filename: &str, text: &str) {
    write_artifact(&dir.join(filename), text);
}

fn write_artifact(path: &Path, contents: &str) {
    if let Err(e) = std::fs::write(path, contents) {
        tracing::warn!(path = %path.display(), error = %e, "Diagnostic dump: write failed");
        return;
    }
    tracing::debug!(path = %path.display(), bytes = contents.len(), "Diagnostic dump: artifact written");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dir_for_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dump = DiagnosticDump::new(tmp.path());
        let dir = dump.dir_for("NCT01234567").unwrap();
        assert!(dir.exists());
        assert!(dir.ends_with("NCT01234567"));
    }

    #[test]
    fn identifiers_cannot_escape_base() {
        assert_eq!(sanitize_component("../etc"), "___etc");
        assert_eq!(sanitize_component(""), "unknown");
    }

    #[test]
    fn writes_each_artifact_kind() {
        let tmp = tempfile::tempdir().unwrap();
        let dump = DiagnosticDump::new(tmp.path());

        dump.on_stage("NCT1", PipelineStage::Draft, &StageArtifact::Prompt { system: "sys", prompt: "user" });
        dump.on_stage("NCT1", PipelineStage::Draft, &StageArtifact::Response("raw"));
        dump.on_stage("NCT1", PipelineStage::Flatten, &StageArtifact::Result(json!({"a": 1})));

        let dir = tmp.path().join("NCT1");
        let prompt = std::fs::read_to_string(dir.join("04-draft-prompt.txt")).unwrap();
        assert!(prompt.contains("[system]\nsys") && prompt.contains("[user]\nuser"));
        assert_eq!(std::fs::read_to_string(dir.join("04-draft-response.txt")).unwrap(), "raw");
        let json = std::fs::read_to_string(dir.join("07-flatten-result.json")).unwrap();
        assert!(json.contains("\"a\": 1"));
    }

    #[test]
    fn unwritable_base_does_not_panic() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let dump = DiagnosticDump::new(file.path().join("below-a-file"));
        assert!(dump.dir_for("NCT1").is_none());
        dump.on_stage("NCT1", PipelineStage::Extraction, &StageArtifact::Response("x"));
    }

    #[test]
    fn missing_directory_is_logged_not_raised() {
        dump_text(Path::new("/nonexistent/trialscope"), "reply.txt", "data");
        dump_json(Path::new("/nonexistent/trialscope"), "result.json", &json!([]));
    }
}
