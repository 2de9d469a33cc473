//! Drives one trial (or a directory of trials) through the whole pipeline:
//! extract → analyze → flatten → persist.
//!
//! Trials are processed sequentially. A failing trial is reported in the
//! batch summary and never stops the batch.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::analysis::{TrialAnalysis, TrialAnalyzer};
use super::diagnostic::{PipelineStage, StageArtifact, StageObserver};
use super::extraction::{extract_trial, ExtractError};
use super::flatten::flatten;
use super::PipelineError;
use crate::config::AnalysisSettings;
use crate::db::PersistenceGateway;
use crate::llm::LanguageModelClient;
use crate::models::{ExtractedRecord, FlattenedRecord};
use crate::source::DocumentSource;

const EXTRACTED_SUFFIX: &str = "_extracted.json";
const ANALYZED_SUFFIX: &str = "_analyzed.json";

/// Everything one successful run produced.
#[derive(Debug, Clone)]
pub struct TrialOutcome {
    pub nct_id: Option<String>,
    pub extracted: ExtractedRecord,
    /// `None` in extraction-only mode.
    pub analysis: Option<TrialAnalysis>,
    pub flattened: Option<FlattenedRecord>,
    pub persisted: bool,
    pub outputs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub path: PathBuf,
    pub stage: &'static str,
    pub error: String,
}

/// Per-stage counts of a directory run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub extracted: usize,
    pub analyzed: usize,
    pub persisted: usize,
    pub failures: Vec<BatchFailure>,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.total - self.failures.len()
    }

    fn record_success(&mut self, outcome: &TrialOutcome) {
        self.extracted += 1;
        if outcome.analysis.is_some() {
            self.analyzed += 1;
        }
        if outcome.persisted {
            self.persisted += 1;
        }
    }

    fn record_failure(&mut self, path: &Path, error: &PipelineError) {
        // stages that completed before the failing one
        match error {
            PipelineError::Output { path, .. } if is_analyzed_output(path) => {
                self.extracted += 1;
                self.analyzed += 1;
            }
            PipelineError::Analysis(_) | PipelineError::Output { .. } => self.extracted += 1,
            PipelineError::Flatten(_) | PipelineError::Database(_) => {
                self.extracted += 1;
                self.analyzed += 1;
            }
            _ => {}
        }
        self.failures.push(BatchFailure {
            path: path.to_path_buf(),
            stage: error.stage(),
            error: error.to_string(),
        });
    }
}

enum Mode<'a> {
    ExtractOnly,
    Full {
        llm: &'a dyn LanguageModelClient,
        settings: AnalysisSettings,
    },
}

pub struct TrialPipeline<'a> {
    mode: Mode<'a>,
    store: Option<&'a dyn PersistenceGateway>,
    observer: Option<&'a dyn StageObserver>,
    output_dir: Option<PathBuf>,
}

impl<'a> TrialPipeline<'a> {
    /// Full pipeline backed by `llm`.
    pub fn new(llm: &'a dyn LanguageModelClient, settings: AnalysisSettings) -> Self {
        Self {
            mode: Mode::Full { llm, settings },
            store: None,
            observer: None,
            output_dir: None,
        }
    }

    /// Stops after extraction; no model is needed.
    pub fn extraction_only() -> Self {
        Self {
            mode: Mode::ExtractOnly,
            store: None,
            observer: None,
            output_dir: None,
        }
    }

    pub fn with_store(mut self, store: &'a dyn PersistenceGateway) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Write `<stem>_extracted.json` and `<stem>_analyzed.json` under `dir`.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Run one raw document. `stem` names the output files; the trial
    /// identifier is used when absent.
    pub fn process_document(
        &self,
        document: &Value,
        stem: Option<&str>,
    ) -> Result<TrialOutcome, PipelineError> {
        let extracted = extract_trial(document)?;
        let nct_id = extracted.nct_id().map(str::to_string);
        let label = nct_id.as_deref().unwrap_or("unknown");
        let _span = tracing::info_span!("process_trial", nct_id = %label).entered();

        tracing::info!(
            inclusion = extracted.eligibility_criteria.inclusion_criteria.len(),
            exclusion = extracted.eligibility_criteria.exclusion_criteria.len(),
            interventions = extracted.interventions.len(),
            "Extraction complete"
        );
        self.observe(label, PipelineStage::Extraction, &extracted);

        let stem = stem.unwrap_or(label);
        let mut outputs = Vec::new();
        if let Some(dir) = &self.output_dir {
            let path = dir.join(format!("{stem}{EXTRACTED_SUFFIX}"));
            write_json_atomic(&path, &serde_json::to_value(&extracted)?)?;
            outputs.push(path);
        }

        let Mode::Full { llm, settings } = &self.mode else {
            return Ok(TrialOutcome {
                nct_id,
                extracted,
                analysis: None,
                flattened: None,
                persisted: false,
                outputs,
            });
        };

        let mut analyzer = TrialAnalyzer::new(*llm, settings.clone());
        if let Some(observer) = self.observer {
            analyzer = analyzer.with_observer(observer);
        }
        let analysis = analyzer.analyze(&extracted)?;
        if analysis.is_degraded() {
            tracing::warn!(degradations = analysis.degradations.len(), "Analysis completed with fallbacks");
        }

        if let Some(dir) = &self.output_dir {
            let path = dir.join(format!("{stem}{ANALYZED_SUFFIX}"));
            let mut handoff = analysis.analyzed.to_handoff()?;
            handoff["validation"] = serde_json::to_value(&analysis.validation)?;
            write_json_atomic(&path, &handoff)?;
            outputs.push(path);
        }

        let flattened = flatten(&extracted, &analysis.analyzed, &analysis.validation)?;
        self.observe(label, PipelineStage::Flatten, &flattened);

        let persisted = match self.store {
            Some(store) => {
                store.upsert(&flattened)?;
                true
            }
            None => false,
        };

        Ok(TrialOutcome {
            nct_id,
            extracted,
            analysis: Some(analysis),
            flattened: Some(flattened),
            persisted,
            outputs,
        })
    }

    pub fn process_file(&self, path: &Path) -> Result<TrialOutcome, PipelineError> {
        let raw = fs::read_to_string(path).map_err(|source| PipelineError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let document: Value = serde_json::from_str(&raw).map_err(ExtractError::from)?;
        let stem = path.file_stem().and_then(|s| s.to_str());
        self.process_document(&document, stem)
    }

    /// Fetch a trial from `source` and run it.
    pub fn process_source(
        &self,
        source: &dyn DocumentSource,
        nct_id: &str,
    ) -> Result<TrialOutcome, PipelineError> {
        let document = source.fetch(nct_id)?;
        self.process_document(&document, Some(nct_id.trim()))
    }

    /// Run every `*.json` document in `dir`, sorted by file name. Files this
    /// pipeline wrote itself are skipped.
    pub fn process_directory(&self, dir: &Path) -> Result<BatchSummary, PipelineError> {
        let files = input_files(dir).map_err(|source| PipelineError::Read {
            path: dir.to_path_buf(),
            source,
        })?;
        tracing::info!(dir = %dir.display(), files = files.len(), "Processing directory");

        let mut summary = BatchSummary {
            total: files.len(),
            ..Default::default()
        };
        for path in &files {
            match self.process_file(path) {
                Ok(outcome) => summary.record_success(&outcome),
                Err(e) => {
                    tracing::error!(path = %path.display(), stage = e.stage(), error = %e, "Trial failed");
                    summary.record_failure(path, &e);
                }
            }
        }

        tracing::info!(
            total = summary.total,
            succeeded = summary.succeeded(),
            failed = summary.failures.len(),
            "Directory complete"
        );
        Ok(summary)
    }

    fn observe<T: Serialize>(&self, nct_id: &str, stage: PipelineStage, value: &T) {
        let Some(observer) = self.observer else {
            return;
        };
        match serde_json::to_value(value) {
            Ok(v) => observer.on_stage(nct_id, stage, &StageArtifact::Result(v)),
            Err(e) => tracing::warn!(stage = stage.as_str(), error = %e, "Cannot serialize stage result"),
        }
    }
}

/// The analyzed output is written only after the analysis returned.
fn is_analyzed_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(ANALYZED_SUFFIX))
}

fn input_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let is_input = path.is_file()
            && name.ends_with(".json")
            && !name.ends_with(EXTRACTED_SUFFIX)
            && !name.ends_with(ANALYZED_SUFFIX);
        if is_input {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Pretty JSON via temp file + rename, so readers never see a partial file.
fn write_json_atomic(path: &Path, value: &Value) -> Result<(), PipelineError> {
    let io_error = |source| PipelineError::Output {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let temp_path = path.with_extension("json.tmp");

    let mut file = File::create(&temp_path).map_err(io_error)?;
    file.write_all(&bytes).map_err(io_error)?;
    file.sync_all().map_err(io_error)?;
    fs::rename(&temp_path, path).map_err(io_error)?;

    tracing::debug!(path = %path.display(), size = bytes.len(), "Output written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteTrialStore;
    use crate::llm::ScriptedLlmClient;
    use crate::models::CriterionKind;
    use crate::pipeline::analysis::prompt::{
        BIOMARKER_SYSTEM_PROMPT, CORRECTION_SYSTEM_PROMPT, DRAFT_SYSTEM_PROMPT,
        MECHANISM_SYSTEM_PROMPT, VALIDATION_SYSTEM_PROMPT,
    };
    use crate::source::DirectorySource;
    use serde_json::json;

    const ANALYSIS: &str = r#"{
        "core_trial_metadata": {"nct_id": "NCT00000001", "status": "Recruiting", "phase": "Phase 1"},
        "scientific_content": {"intervention": [{"name": "DrugA", "type": "Drug"}]},
        "patient_related_information": {"eligibility_criteria": {"inclusion": ["Age 18 years or older"], "exclusion": []}},
        "operational_aspects": {}
    }"#;

    fn minimal_document() -> Value {
        json!({
            "protocolSection": {
                "identificationModule": {"nctId": "NCT00000001", "briefTitle": "DrugA study"},
                "statusModule": {"overallStatus": "RECRUITING"},
                "armsInterventionsModule": {"interventions": [{"name": "DrugA", "type": "Drug"}]},
                "eligibilityModule": {"eligibilityCriteria": "Inclusion Criteria:\n\n* Age 18 years or older"}
            }
        })
    }

    fn scripted() -> ScriptedLlmClient {
        ScriptedLlmClient::new()
            .reply(MECHANISM_SYSTEM_PROMPT, r#"{"mechanism_of_action": "N/A", "target_pathway": {}}"#)
            .reply(BIOMARKER_SYSTEM_PROMPT, "[]")
            .reply(DRAFT_SYSTEM_PROMPT, ANALYSIS)
            .reply(
                VALIDATION_SYSTEM_PROMPT,
                r#"{"hallucinations": [], "missing_info": [], "overall_assessment": {"score": 9, "rationale": "Accurate"}, "recommendations": []}"#,
            )
            .reply(CORRECTION_SYSTEM_PROMPT, ANALYSIS)
    }

    #[test]
    fn end_to_end_with_stubbed_model() {
        let llm = scripted();
        let store = SqliteTrialStore::in_memory().unwrap();
        let pipeline = TrialPipeline::new(&llm, AnalysisSettings::default()).with_store(&store);

        let outcome = pipeline.process_document(&minimal_document(), None).unwrap();

        assert_eq!(outcome.extracted.eligibility_criteria.inclusion_criteria.len(), 1);
        let flattened = outcome.flattened.unwrap();
        assert_eq!(flattened.nct_id, "NCT00000001");
        let age = &flattened.eligibility_criteria_structured.age_related;
        assert_eq!(age.len(), 1);
        assert_eq!(age[0].kind, CriterionKind::Inclusion);
        assert!(outcome.persisted);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get("NCT00000001").unwrap().field("analysis_score"), Some(&json!(9)));
    }

    #[test]
    fn draft_transport_error_produces_nothing() {
        let llm = ScriptedLlmClient::new()
            .reply(MECHANISM_SYSTEM_PROMPT, "{}")
            .reply(BIOMARKER_SYSTEM_PROMPT, "[]")
            .fail(DRAFT_SYSTEM_PROMPT, "http://down");
        let store = SqliteTrialStore::in_memory().unwrap();
        let pipeline = TrialPipeline::new(&llm, AnalysisSettings::default()).with_store(&store);

        let err = pipeline.process_document(&minimal_document(), None).unwrap_err();
        assert!(matches!(err, PipelineError::Analysis(_)));
        assert_eq!(err.stage(), "analysis");
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn unparseable_validation_still_completes() {
        let llm = ScriptedLlmClient::new()
            .reply(MECHANISM_SYSTEM_PROMPT, "{}")
            .reply(BIOMARKER_SYSTEM_PROMPT, "[]")
            .reply(DRAFT_SYSTEM_PROMPT, ANALYSIS)
            .reply(VALIDATION_SYSTEM_PROMPT, "The analysis looks fine to me.")
            .reply(CORRECTION_SYSTEM_PROMPT, ANALYSIS);
        let pipeline = TrialPipeline::new(&llm, AnalysisSettings::default());

        let outcome = pipeline.process_document(&minimal_document(), None).unwrap();
        let analysis = outcome.analysis.unwrap();
        assert_eq!(analysis.validation.score(), None);
        assert_eq!(analysis.analyzed.nct_id(), Some("NCT00000001"));
        assert_eq!(outcome.flattened.unwrap().analysis_score, None);
        assert!(!outcome.persisted);
    }

    #[test]
    fn extraction_only_skips_analysis() {
        let pipeline = TrialPipeline::extraction_only();
        let outcome = pipeline.process_document(&minimal_document(), None).unwrap();
        assert!(outcome.analysis.is_none());
        assert!(outcome.flattened.is_none());
        assert_eq!(outcome.nct_id.as_deref(), Some("NCT00000001"));
    }

    #[test]
    fn outputs_written_with_stem_names() {
        let tmp = tempfile::tempdir().unwrap();
        let llm = scripted();
        let pipeline = TrialPipeline::new(&llm, AnalysisSettings::default()).with_output_dir(tmp.path());

        let outcome = pipeline.process_document(&minimal_document(), Some("study")).unwrap();
        assert_eq!(outcome.outputs.len(), 2);

        let extracted: Value =
            serde_json::from_str(&fs::read_to_string(tmp.path().join("study_extracted.json")).unwrap()).unwrap();
        assert_eq!(extracted["basic_info"]["nct_id"], "NCT00000001");
        let analyzed: Value =
            serde_json::from_str(&fs::read_to_string(tmp.path().join("study_analyzed.json")).unwrap()).unwrap();
        assert_eq!(analyzed["analyzed_data"]["core_trial_metadata"]["status"], "Recruiting");
        assert_eq!(analyzed["validation"]["overall_assessment"]["score"], 9);
        assert!(!tmp.path().join("study_analyzed.json.tmp").exists());
    }

    #[test]
    fn directory_batch_reports_failures_and_continues() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a.json"), minimal_document().to_string()).unwrap();
        fs::write(tmp.path().join("b.json"), "not json").unwrap();
        fs::write(tmp.path().join("c.json"), "42").unwrap();
        fs::write(tmp.path().join("a_extracted.json"), "{}").unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let llm = scripted();
        let store = SqliteTrialStore::in_memory().unwrap();
        let pipeline = TrialPipeline::new(&llm, AnalysisSettings::default()).with_store(&store);
        let summary = pipeline.process_directory(tmp.path()).unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.succeeded(), 1);
        assert_eq!(summary.persisted, 1);
        assert_eq!(summary.failures.len(), 2);
        assert!(summary.failures.iter().all(|f| f.stage == "extraction"));
        assert!(summary.failures[0].path.ends_with("b.json"));
    }

    #[test]
    fn failed_analyzed_write_still_counts_as_analyzed() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        fs::write(input.path().join("a.json"), minimal_document().to_string()).unwrap();
        // a directory in the way makes the final rename fail
        fs::create_dir(output.path().join("a_analyzed.json")).unwrap();

        let llm = scripted();
        let pipeline = TrialPipeline::new(&llm, AnalysisSettings::default()).with_output_dir(output.path());
        let summary = pipeline.process_directory(input.path()).unwrap();

        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].stage, "output");
        assert_eq!((summary.extracted, summary.analyzed, summary.persisted), (1, 1, 0));
        assert!(output.path().join("a_extracted.json").is_file());
    }

    #[test]
    fn failed_extracted_write_counts_only_extraction() {
        let mut summary = BatchSummary { total: 1, ..Default::default() };
        let error = PipelineError::Output {
            path: PathBuf::from("out/a_extracted.json"),
            source: std::io::Error::other("disk full"),
        };
        summary.record_failure(Path::new("a.json"), &error);
        assert_eq!((summary.extracted, summary.analyzed), (1, 0));
    }

    #[test]
    fn missing_directory_is_read_error() {
        let pipeline = TrialPipeline::extraction_only();
        let tmp = tempfile::tempdir().unwrap();
        let err = pipeline.process_directory(&tmp.path().join("absent")).unwrap_err();
        assert!(matches!(err, PipelineError::Read { .. }));
    }

    #[test]
    fn fetch_from_directory_source() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("NCT00000001.json"), minimal_document().to_string()).unwrap();
        let source = DirectorySource::new(tmp.path());

        let pipeline = TrialPipeline::extraction_only();
        let outcome = pipeline.process_source(&source, "NCT00000001").unwrap();
        assert_eq!(outcome.nct_id.as_deref(), Some("NCT00000001"));

        let err = pipeline.process_source(&source, "NCT00000002").unwrap_err();
        assert_eq!(err.stage(), "input");
    }
}
