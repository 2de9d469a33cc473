//! Turns raw model text into typed stage results.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::consistency::normalize_placeholders;
use super::ResponseError;
use crate::models::analyzed::SECTION_KEYS;
use crate::models::lenient::value_to_strings;
use crate::models::{AnalyzedRecord, MechanismDetails, ValidationReport};

/// Reasoning blocks some models emit before the answer.
static THINK_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<think>.*?</think>").expect("valid regex"));

/// A parsed analysis plus how many placeholders were rewritten to `"N/A"`.
#[derive(Debug, Clone)]
pub struct ParsedAnalysis {
    pub record: AnalyzedRecord,
    pub placeholders_normalized: usize,
}

/// Locate and parse the JSON payload of a model response.
///
/// Preference order: a ```` ```json ```` fence, any ```` ``` ```` fence, the whole
/// text, then the outermost brace or bracket slice.
pub fn parse_json_block(response: &str) -> Result<Value, ResponseError> {
    let cleaned = THINK_BLOCK.replace_all(response, "");
    let text = cleaned.trim();
    if text.is_empty() {
        return Err(ResponseError::Empty);
    }

    let mut candidates: Vec<&str> = Vec::with_capacity(4);
    if let Some(inner) = fenced(text, "```json") {
        candidates.push(inner);
    }
    if let Some(inner) = fenced(text, "```") {
        candidates.push(inner.trim_start_matches(|c: char| c.is_ascii_alphabetic()));
    }
    candidates.push(text);
    if let Some(slice) = outermost(text, '{', '}') {
        candidates.push(slice);
    }
    if let Some(slice) = outermost(text, '[', ']') {
        candidates.push(slice);
    }

    let mut last_error = String::from("no JSON found");
    for candidate in candidates {
        match serde_json::from_str::<Value>(candidate.trim()) {
            Ok(value) => return Ok(value),
            Err(e) => last_error = e.to_string(),
        }
    }
    Err(ResponseError::InvalidJson(last_error))
}

/// Content between `opener` and the next closing fence.
fn fenced<'a>(text: &'a str, opener: &str) -> Option<&'a str> {
    let start = text.find(opener)? + opener.len();
    let end = text[start..].find("```")?;
    Some(&text[start..start + end])
}

fn outermost(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

/// Parse a draft or corrected analysis.
///
/// The payload must be an object carrying at least one analysis section; an
/// `{"analyzed_data": ...}` hand-off wrapper is unwrapped.
pub fn parse_analysis_response(response: &str) -> Result<ParsedAnalysis, ResponseError> {
    let mut value = parse_json_block(response)?;

    if let Some(inner) = value.get_mut("analyzed_data").map(Value::take) {
        value = inner;
    }
    let Value::Object(map) = &value else {
        return Err(ResponseError::WrongShape("object"));
    };
    if !SECTION_KEYS.iter().any(|key| map.contains_key(*key)) {
        return Err(ResponseError::MissingSections);
    }

    let placeholders_normalized = normalize_placeholders(&mut value);
    let record = AnalyzedRecord::from_value(value)
        .map_err(|e| ResponseError::InvalidJson(e.to_string()))?;

    Ok(ParsedAnalysis { record, placeholders_normalized })
}

/// Parse the mechanism-of-action sub-query.
pub fn parse_mechanism_response(response: &str) -> Result<MechanismDetails, ResponseError> {
    let mut value = parse_json_block(response)?;
    if !value.is_object() {
        return Err(ResponseError::WrongShape("object"));
    }
    normalize_placeholders(&mut value);
    serde_json::from_value(value).map_err(|e| ResponseError::InvalidJson(e.to_string()))
}

/// Parse the biomarker sub-query: a JSON array of names (or an object with a
/// `biomarkers` array).
pub fn parse_biomarker_response(response: &str) -> Result<Vec<String>, ResponseError> {
    let mut value = parse_json_block(response)?;
    if let Some(inner) = value.get_mut("biomarkers").map(Value::take) {
        value = inner;
    }
    if !value.is_array() {
        return Err(ResponseError::WrongShape("array"));
    }
    normalize_placeholders(&mut value);
    Ok(dedup(value_to_strings(&value)))
}

/// Parse a validation report.
pub fn parse_validation_response(response: &str) -> Result<ValidationReport, ResponseError> {
    let value = parse_json_block(response)?;
    if !value.is_object() {
        return Err(ResponseError::WrongShape("object"));
    }
    ValidationReport::from_value(value).map_err(|e| ResponseError::InvalidJson(e.to_string()))
}

fn dedup(items: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(items.len());
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fenced_json_wins_over_surrounding_text() {
        let response = "Here you go:\n```json\n{\"a\": 1}\n```\nHope that helps {not json}";
        assert_eq!(parse_json_block(response).unwrap(), json!({"a": 1}));
    }

    #[test]
    fn bare_fence_with_language_tag() {
        let response = "```JSON\n[1, 2]\n```";
        assert_eq!(parse_json_block(response).unwrap(), json!([1, 2]));
    }

    #[test]
    fn whole_text_without_fence() {
        assert_eq!(parse_json_block(" {\"a\": true} ").unwrap(), json!({"a": true}));
    }

    #[test]
    fn embedded_object_without_fence() {
        let response = "The result is {\"score\": 5} as requested.";
        assert_eq!(parse_json_block(response).unwrap(), json!({"score": 5}));
    }

    #[test]
    fn think_blocks_are_ignored() {
        let response = "<think>maybe {\"wrong\": 1}</think>```json\n{\"right\": 1}\n```";
        assert_eq!(parse_json_block(response).unwrap(), json!({"right": 1}));
    }

    #[test]
    fn empty_and_garbage_responses() {
        assert!(matches!(parse_json_block("   "), Err(ResponseError::Empty)));
        assert!(matches!(parse_json_block("no json here"), Err(ResponseError::InvalidJson(_))));
    }

    #[test]
    fn analysis_requires_a_section() {
        let err = parse_analysis_response("```json\n{\"foo\": 1}\n```").unwrap_err();
        assert!(matches!(err, ResponseError::MissingSections));
        let err = parse_analysis_response("[1]").unwrap_err();
        assert!(matches!(err, ResponseError::WrongShape(_)));
    }

    #[test]
    fn analysis_unwraps_handoff_and_normalizes_placeholders() {
        let response = r#"{"analyzed_data": {"core_trial_metadata": {"nct_id": "NCT1", "status": "Unknown", "phase": "Not specified"}}}"#;
        let parsed = parse_analysis_response(response).unwrap();
        assert_eq!(parsed.record.nct_id(), Some("NCT1"));
        assert_eq!(parsed.record.core_trial_metadata.status, None);
        assert_eq!(parsed.placeholders_normalized, 2);
    }

    #[test]
    fn mechanism_response() {
        let parsed = parse_mechanism_response(
            "```json\n{\"mechanism_of_action\": \"Blocks PD-1\", \"target_pathway\": {\"gene\": \"N/A\", \"protein\": [\"PD-1\"], \"chemical_compound\": \"N/A\"}}\n```",
        )
        .unwrap();
        assert_eq!(parsed.mechanism_of_action.as_deref(), Some("Blocks PD-1"));
        assert!(parsed.target_pathway.gene.is_empty());
        assert_eq!(parsed.target_pathway.protein, vec!["PD-1"]);
        assert!(matches!(parse_mechanism_response("[]"), Err(ResponseError::WrongShape(_))));
    }

    #[test]
    fn biomarker_response_variants() {
        assert_eq!(parse_biomarker_response("[\"EGFR\", \"EGFR\", \"ALK\"]").unwrap(), vec!["EGFR", "ALK"]);
        assert!(parse_biomarker_response("```json\n[\"N/A\"]\n```").unwrap().is_empty());
        assert_eq!(parse_biomarker_response("{\"biomarkers\": [\"KRAS\"]}").unwrap(), vec!["KRAS"]);
        assert!(matches!(parse_biomarker_response("{\"x\": 1}"), Err(ResponseError::WrongShape(_))));
    }

    #[test]
    fn validation_response() {
        let report = parse_validation_response(
            "```json\n{\"hallucinations\": [], \"missing_info\": [], \"overall_assessment\": {\"score\": 9, \"rationale\": \"Accurate\"}, \"recommendations\": []}\n```",
        )
        .unwrap();
        assert_eq!(report.score(), Some(9));
        assert!(matches!(parse_validation_response("\"text\""), Err(ResponseError::WrongShape(_))));
    }
}
