use serde::Serialize;

use super::consistency::enforce_consistency;
use super::parser::{
    parse_analysis_response, parse_biomarker_response, parse_mechanism_response,
    parse_validation_response,
};
use super::prompt::{
    build_biomarker_prompt, build_correction_prompt, build_draft_prompt, build_mechanism_prompt,
    build_validation_prompt, BIOMARKER_SYSTEM_PROMPT, CORRECTION_SYSTEM_PROMPT,
    DRAFT_SYSTEM_PROMPT, MECHANISM_SYSTEM_PROMPT, VALIDATION_SYSTEM_PROMPT,
};
use super::parser::ParsedAnalysis;
use super::{AnalysisError, StageError};
use crate::config::AnalysisSettings;
use crate::llm::{CompletionRequest, LanguageModelClient};
use crate::models::{AnalyzedRecord, ExtractedRecord, MechanismDetails, ValidationReport};
use crate::pipeline::diagnostic::{PipelineStage, StageArtifact, StageObserver};

/// A stage that failed and was replaced by its fallback value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Degradation {
    pub stage: &'static str,
    pub reason: String,
}

/// Outcome of the draft → validate → correct pipeline for one trial.
#[derive(Debug, Clone)]
pub struct TrialAnalysis {
    /// Final record: the correction, or the draft when correction failed.
    pub analyzed: AnalyzedRecord,
    pub validation: ValidationReport,
    /// Draft as produced before validation, kept for audit.
    pub draft: AnalyzedRecord,
    pub degradations: Vec<Degradation>,
    pub warnings: Vec<String>,
}

impl TrialAnalysis {
    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

/// Orchestrates the three-pass analysis of an extracted trial:
/// sub-queries + draft → validation → correction.
///
/// Only the draft is fatal. Sub-queries fall back to empty details, validation
/// to a neutral report, correction to the draft.
pub struct TrialAnalyzer<'a> {
    llm: &'a dyn LanguageModelClient,
    settings: AnalysisSettings,
    observer: Option<&'a dyn StageObserver>,
}

impl<'a> TrialAnalyzer<'a> {
    pub fn new(llm: &'a dyn LanguageModelClient, settings: AnalysisSettings) -> Self {
        Self {
            llm,
            settings,
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn StageObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn settings(&self) -> &AnalysisSettings {
        &self.settings
    }

    pub fn analyze(&self, extracted: &ExtractedRecord) -> Result<TrialAnalysis, AnalysisError> {
        let nct_id = extracted.nct_id().unwrap_or("unknown");
        let _span = tracing::info_span!("analyze_trial", nct_id = %nct_id).entered();

        let record_json = serde_json::to_string_pretty(extracted)?;
        let mut degradations = Vec::new();
        let mut warnings = Vec::new();

        // ── Stage 1: focused sub-queries + draft ──
        let mechanism = self
            .extract_mechanism(nct_id, extracted)
            .unwrap_or_else(|e| {
                degrade(&mut degradations, PipelineStage::Mechanism, &e);
                MechanismDetails::default()
            });
        let biomarkers = self
            .extract_biomarkers(nct_id, extracted)
            .unwrap_or_else(|e| {
                degrade(&mut degradations, PipelineStage::Biomarkers, &e);
                Vec::new()
            });

        let mut draft = self.draft(nct_id, &record_json).map_err(|e| {
            tracing::error!(nct_id = %nct_id, error = %e, "Draft analysis failed");
            AnalysisError::Draft(e)
        })?;
        if draft.placeholders_normalized > 0 {
            warnings.push(format!(
                "draft: {} placeholder values normalized to N/A",
                draft.placeholders_normalized
            ));
        }
        draft.record.merge_scientific_details(mechanism, biomarkers);
        warnings.extend(enforce_consistency(&mut draft.record, extracted));
        let draft = draft.record;
        self.observe_result(nct_id, PipelineStage::Draft, &draft);
        tracing::info!(nct_id = %nct_id, "Draft analysis complete");

        // ── Stage 2: validation ──
        let draft_json = serde_json::to_string_pretty(&draft)?;
        let validation = match self.validate(nct_id, &record_json, &draft_json) {
            Ok(report) => {
                tracing::info!(
                    nct_id = %nct_id,
                    score = ?report.score(),
                    issues = report.issue_count(),
                    "Validation complete"
                );
                report
            }
            Err(e) => {
                degrade(&mut degradations, PipelineStage::Validation, &e);
                ValidationReport::neutral()
            }
        };
        self.observe_result(nct_id, PipelineStage::Validation, &validation);

        // ── Stage 3: correction ──
        let validation_json = serde_json::to_string_pretty(&validation)?;
        let analyzed = match self.correct(nct_id, &record_json, &draft_json, &validation_json) {
            Ok(mut corrected) => {
                if corrected.placeholders_normalized > 0 {
                    warnings.push(format!(
                        "correction: {} placeholder values normalized to N/A",
                        corrected.placeholders_normalized
                    ));
                }
                warnings.extend(enforce_consistency(&mut corrected.record, extracted));
                tracing::info!(nct_id = %nct_id, "Correction complete");
                corrected.record
            }
            Err(e) => {
                degrade(&mut degradations, PipelineStage::Correction, &e);
                draft.clone()
            }
        };
        self.observe_result(nct_id, PipelineStage::Correction, &analyzed);

        for warning in &warnings {
            tracing::warn!(nct_id = %nct_id, warning = %warning, "Analysis adjusted");
        }

        Ok(TrialAnalysis {
            analyzed,
            validation,
            draft,
            degradations,
            warnings,
        })
    }

    fn extract_mechanism(
        &self,
        nct_id: &str,
        extracted: &ExtractedRecord,
    ) -> Result<MechanismDetails, StageError> {
        let prompt = build_mechanism_prompt(extracted);
        let response = self.call(
            nct_id,
            PipelineStage::Mechanism,
            MECHANISM_SYSTEM_PROMPT,
            &prompt,
            self.settings.budgets.mechanism,
        )?;
        Ok(parse_mechanism_response(&response)?)
    }

    fn extract_biomarkers(
        &self,
        nct_id: &str,
        extracted: &ExtractedRecord,
    ) -> Result<Vec<String>, StageError> {
        let prompt = build_biomarker_prompt(extracted);
        let response = self.call(
            nct_id,
            PipelineStage::Biomarkers,
            BIOMARKER_SYSTEM_PROMPT,
            &prompt,
            self.settings.budgets.biomarkers,
        )?;
        Ok(parse_biomarker_response(&response)?)
    }

    fn draft(&self, nct_id: &str, record_json: &str) -> Result<ParsedAnalysis, StageError> {
        let prompt = build_draft_prompt(record_json);
        let response = self.call(
            nct_id,
            PipelineStage::Draft,
            DRAFT_SYSTEM_PROMPT,
            &prompt,
            self.settings.budgets.draft,
        )?;
        Ok(parse_analysis_response(&response)?)
    }

    fn validate(
        &self,
        nct_id: &str,
        record_json: &str,
        draft_json: &str,
    ) -> Result<ValidationReport, StageError> {
        let prompt = build_validation_prompt(record_json, draft_json);
        let response = self.call(
            nct_id,
            PipelineStage::Validation,
            VALIDATION_SYSTEM_PROMPT,
            &prompt,
            self.settings.budgets.validation,
        )?;
        Ok(parse_validation_response(&response)?)
    }

    fn correct(
        &self,
        nct_id: &str,
        record_json: &str,
        draft_json: &str,
        validation_json: &str,
    ) -> Result<ParsedAnalysis, StageError> {
        let prompt = build_correction_prompt(record_json, draft_json, validation_json);
        let response = self.call(
            nct_id,
            PipelineStage::Correction,
            CORRECTION_SYSTEM_PROMPT,
            &prompt,
            self.settings.budgets.correction,
        )?;
        Ok(parse_analysis_response(&response)?)
    }

    /// One blocking completion, reported to the observer on both sides.
    fn call(
        &self,
        nct_id: &str,
        stage: PipelineStage,
        system: &str,
        prompt: &str,
        max_tokens: u32,
    ) -> Result<String, StageError> {
        if let Some(observer) = self.observer {
            observer.on_stage(nct_id, stage, &StageArtifact::Prompt { system, prompt });
        }

        let request = CompletionRequest {
            model: &self.settings.model,
            system,
            prompt,
            max_tokens,
            temperature: self.settings.temperature,
        };
        let response = self.llm.complete(&request)?;

        if let Some(observer) = self.observer {
            observer.on_stage(nct_id, stage, &StageArtifact::Response(&response));
        }
        tracing::debug!(
            nct_id = %nct_id,
            stage = stage.as_str(),
            chars = response.len(),
            "LLM response received"
        );
        Ok(response)
    }

    fn observe_result<T: Serialize>(&self, nct_id: &str, stage: PipelineStage, value: &T) {
        let Some(observer) = self.observer else {
            return;
        };
        match serde_json::to_value(value) {
            Ok(v) => observer.on_stage(nct_id, stage, &StageArtifact::Result(v)),
            Err(e) => tracing::warn!(stage = stage.as_str(), error = %e, "Cannot serialize stage result"),
        }
    }
}

fn degrade(degradations: &mut Vec<Degradation>, stage: PipelineStage, error: &StageError) {
    tracing::warn!(stage = stage.as_str(), error = %error, "Stage failed, using fallback");
    degradations.push(Degradation {
        stage: stage.as_str(),
        reason: error.to_string(),
    });
}
