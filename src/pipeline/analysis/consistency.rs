//! Post-parse checks on model-produced analyses.
//!
//! Model output is never trusted blindly: alternative placeholders are folded
//! into the single `"N/A"` sentinel, the identifier is pinned to the registry
//! value, and runaway lists are capped. Every adjustment is reported.

use serde_json::Value;

use crate::models::{AnalyzedRecord, ExtractedRecord, NOT_AVAILABLE};

/// Spellings models use instead of the sentinel (compared case-insensitively).
const ALTERNATIVE_PLACEHOLDERS: &[&str] = &[
    "unknown",
    "not available",
    "not specified",
    "not reported",
    "not applicable",
    "not mentioned",
    "not provided",
    "none",
    "null",
    "nil",
    "tbd",
    "na",
    "-",
    "--",
];

/// Maximum interventions kept from one analysis.
pub const MAX_INTERVENTIONS: usize = 50;

/// Maximum sites kept from one analysis.
pub const MAX_LOCATIONS: usize = 1000;

/// Rewrite alternative placeholder strings to `"N/A"` in place.
/// Returns the number of rewritten leaves.
pub fn normalize_placeholders(value: &mut Value) -> usize {
    match value {
        Value::String(s) => {
            let t = s.trim();
            if ALTERNATIVE_PLACEHOLDERS.iter().any(|p| t.eq_ignore_ascii_case(p)) {
                *s = NOT_AVAILABLE.to_string();
                1
            } else {
                0
            }
        }
        Value::Array(items) => items.iter_mut().map(normalize_placeholders).sum(),
        Value::Object(map) => map.values_mut().map(normalize_placeholders).sum(),
        _ => 0,
    }
}

/// Pin the identifier to the registry and cap oversized lists.
///
/// Returns human-readable warnings for every adjustment made.
pub fn enforce_consistency(record: &mut AnalyzedRecord, extracted: &ExtractedRecord) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(registry_id) = extracted.nct_id() {
        let core = &mut record.core_trial_metadata;
        match core.nct_id.as_deref() {
            Some(id) if id == registry_id => {}
            Some(id) => {
                warnings.push(format!(
                    "nct_id '{id}' does not match registry '{registry_id}'; using registry value"
                ));
                core.nct_id = Some(registry_id.to_string());
            }
            None => core.nct_id = Some(registry_id.to_string()),
        }
    }

    let interventions = &mut record.scientific_content.intervention;
    if interventions.len() > MAX_INTERVENTIONS {
        warnings.push(format!(
            "{} interventions reported; keeping first {MAX_INTERVENTIONS}",
            interventions.len()
        ));
        interventions.truncate(MAX_INTERVENTIONS);
    }

    let locations = &mut record.operational_aspects.locations;
    if locations.len() > MAX_LOCATIONS {
        warnings.push(format!(
            "{} locations reported; keeping first {MAX_LOCATIONS}",
            locations.len()
        ));
        locations.truncate(MAX_LOCATIONS);
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{InterventionDetail, SiteDetail};
    use serde_json::json;

    fn extracted_with_id(id: &str) -> ExtractedRecord {
        let mut record = ExtractedRecord::default();
        record.basic_info.nct_id = Some(id.into());
        record
    }

    #[test]
    fn placeholders_rewritten_recursively() {
        let mut value = json!({
            "a": "Unknown",
            "b": ["x", "Not Specified", {"c": " none "}],
            "d": "N/A",
            "e": "None (Open Label)",
            "f": 3
        });
        assert_eq!(normalize_placeholders(&mut value), 3);
        assert_eq!(value["a"], "N/A");
        assert_eq!(value["b"][1], "N/A");
        assert_eq!(value["b"][2]["c"], "N/A");
        assert_eq!(value["e"], "None (Open Label)");
    }

    #[test]
    fn mismatched_identifier_is_pinned() {
        let mut record = AnalyzedRecord::default();
        record.core_trial_metadata.nct_id = Some("NCT99999999".into());
        let warnings = enforce_consistency(&mut record, &extracted_with_id("NCT00000001"));
        assert_eq!(record.nct_id(), Some("NCT00000001"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn missing_identifier_is_filled_silently() {
        let mut record = AnalyzedRecord::default();
        let warnings = enforce_consistency(&mut record, &extracted_with_id("NCT00000001"));
        assert_eq!(record.nct_id(), Some("NCT00000001"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn unknown_registry_id_leaves_record_alone() {
        let mut record = AnalyzedRecord::default();
        record.core_trial_metadata.nct_id = Some("NCT5".into());
        assert!(enforce_consistency(&mut record, &ExtractedRecord::default()).is_empty());
        assert_eq!(record.nct_id(), Some("NCT5"));
    }

    #[test]
    fn oversized_lists_are_capped() {
        let mut record = AnalyzedRecord::default();
        record.scientific_content.intervention = vec![InterventionDetail::default(); MAX_INTERVENTIONS + 5];
        record.operational_aspects.locations = vec![SiteDetail::default(); MAX_LOCATIONS + 1];
        let warnings = enforce_consistency(&mut record, &ExtractedRecord::default());
        assert_eq!(record.scientific_content.intervention.len(), MAX_INTERVENTIONS);
        assert_eq!(record.operational_aspects.locations.len(), MAX_LOCATIONS);
        assert_eq!(warnings.len(), 2);
    }
}
