use crate::models::{ExtractedRecord, NOT_AVAILABLE};

// ═══════════════════════════════════════════════
// System prompts (one per stage)
// ═══════════════════════════════════════════════

pub const MECHANISM_SYSTEM_PROMPT: &str =
    "You are a pharmaceutical scientist who extracts mechanism of action and biological target information from clinical trial interventions.";

pub const BIOMARKER_SYSTEM_PROMPT: &str =
    "You are a clinical trial biomarker specialist who lists the biomarkers a trial explicitly mentions.";

pub const DRAFT_SYSTEM_PROMPT: &str = r#"
You are a clinical trial analyst. Your ONLY role is to organize the registry data
you are given into the requested JSON structure.

RULES (ABSOLUTE, NO EXCEPTIONS):
1. Every value MUST be supported by the registry data provided.
2. NEVER invent dates, numbers, sites, people or outcomes.
3. Use exactly "N/A" for any field the data does not support. Do not use
   "Unknown", "Not specified", "None" or any other placeholder.
4. Preserve values verbatim where possible (doses, dates, counts).
5. Output a single JSON object wrapped in ```json``` fences.
"#;

pub const VALIDATION_SYSTEM_PROMPT: &str =
    "You are a clinical trial data validation expert who critically checks analyses against source registry data for accuracy.";

pub const CORRECTION_SYSTEM_PROMPT: &str =
    "You are a clinical trial data correction expert who rewrites analyses so that every value is traceable to the source registry data.";

/// Draft/correction output schema, shown verbatim to the model.
const ANALYSIS_SCHEMA: &str = r#"{
  "core_trial_metadata": {
    "nct_id": "NCT number",
    "status": "overall status",
    "dates": {"registration": "date", "start": "date", "completion": "date", "last_update": "date"},
    "phase": "trial phase",
    "study_type": "study type",
    "enrollment": {"target": 0, "actual": "N/A"},
    "sponsor_collaborators": {"primary_sponsor": "name", "collaborators": ["name"]}
  },
  "scientific_content": {
    "intervention": [{"name": "name", "type": "type", "description": "text", "dosage": "dose", "route": "route"}],
    "study_design": {"allocation": "text", "intervention_model": "text", "masking": "text", "primary_purpose": "text"},
    "arms_groups": [{"arm_name": "label", "arm_type": "type", "description": "text"}],
    "outcomes": {
      "primary": [{"measure": "text", "description": "text", "timeframe": "text"}],
      "secondary": [{"measure": "text", "description": "text", "timeframe": "text"}]
    }
  },
  "patient_related_information": {
    "eligibility_criteria": {"inclusion": ["criterion"], "exclusion": ["criterion"]},
    "demographics": {"age": {"min": 18, "max": "N/A", "description": "text"}, "sex": "text", "other": ["text"]},
    "disease_characteristics": {"subtypes": ["text"], "stages": ["text"], "severity": "text"},
    "prior_treatments": {"required": ["text"], "excluded": ["text"]}
  },
  "operational_aspects": {
    "locations": [{"facility": "name", "city": "city", "state": "state", "country": "country", "status": "status"}],
    "investigators": [{"name": "name", "role": "role", "facility": "facility"}],
    "enrollment_status": {
      "overall": "status",
      "site_specific": [{"facility": "name", "status": "status", "participants_enrolled": "N/A"}]
    },
    "ipd_sharing": {"plan": "text", "description": "text"}
  }
}"#;

// ═══════════════════════════════════════════════
// Prompt builders
// ═══════════════════════════════════════════════

fn or_na(value: Option<&str>) -> &str {
    value.unwrap_or(NOT_AVAILABLE)
}

/// Mechanism-of-action sub-query over the intervention descriptions.
pub fn build_mechanism_prompt(record: &ExtractedRecord) -> String {
    let interventions = if record.interventions.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        record
            .interventions
            .iter()
            .map(|i| {
                format!(
                    "Name: {}\nType: {}\nDescription: {}",
                    or_na(i.name.as_deref()),
                    or_na(i.intervention_type.as_deref()),
                    or_na(i.description.as_deref()),
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n")
    };

    format!(
        r#"Analyze the interventions of this clinical trial and extract:
1. The mechanism of action
2. Target genes
3. Target proteins
4. Chemical compounds involved

<interventions>
{interventions}
</interventions>

Name specific biological targets (gene and protein names), not general concepts.
Use "N/A" for anything not stated or confidently inferable from the text above.

Respond with JSON only:
```json
{{
  "mechanism_of_action": "how the intervention works",
  "target_pathway": {{
    "gene": ["GENE"],
    "protein": ["Protein"],
    "chemical_compound": ["Compound"]
  }}
}}
```"#
    )
}

/// Biomarker sub-query over criteria and outcomes.
pub fn build_biomarker_prompt(record: &ExtractedRecord) -> String {
    let bullets = |items: &[String]| {
        if items.is_empty() {
            NOT_AVAILABLE.to_string()
        } else {
            items.iter().map(|c| format!("- {c}")).collect::<Vec<_>>().join("\n")
        }
    };
    let inclusion = bullets(&record.eligibility_criteria.inclusion_criteria);
    let exclusion = bullets(&record.eligibility_criteria.exclusion_criteria);

    let outcome_lines: Vec<String> = record
        .outcomes
        .primary_outcomes
        .iter()
        .chain(&record.outcomes.secondary_outcomes)
        .map(|o| {
            format!(
                "- {}: {}",
                o.measure.as_deref().unwrap_or(""),
                o.description.as_deref().unwrap_or("")
            )
        })
        .collect();
    let outcomes = if outcome_lines.is_empty() {
        NOT_AVAILABLE.to_string()
    } else {
        outcome_lines.join("\n")
    };

    format!(
        r#"List every biomarker mentioned in the clinical trial information below.
Biomarkers include genetic markers, protein markers, imaging markers and any
other measurable biological indicator.

INCLUSION CRITERIA:
{inclusion}

EXCLUSION CRITERIA:
{exclusion}

OUTCOMES:
{outcomes}

List only biomarkers that are explicitly mentioned. If there are none, return ["N/A"].
Respond with a JSON array of biomarker names only:
```json
["Biomarker A", "Biomarker B"]
```"#
    )
}

/// Full four-section draft over the extracted record.
pub fn build_draft_prompt(record_json: &str) -> String {
    format!(
        r#"<registry_data>
{record_json}
</registry_data>

Organize the registry data above into the following JSON structure.
Mechanism of action, targets and biomarkers are handled separately; leave them out.

```json
{ANALYSIS_SCHEMA}
```"#
    )
}

/// Critique of a draft against the extracted record.
pub fn build_validation_prompt(record_json: &str, draft_json: &str) -> String {
    format!(
        r#"Compare an AI-generated analysis of a clinical trial with the original registry data
and identify hallucinations, inaccuracies and misrepresentations.

ORIGINAL REGISTRY DATA:
```json
{record_json}
```

AI-GENERATED ANALYSIS:
```json
{draft_json}
```

Identify:
1. Statements not supported by, or contradicting, the original data
2. Fabricated details
3. Important information in the original data that was omitted
4. Assertions made with more confidence than the data supports

Respond with JSON only:
```json
{{
  "hallucinations": [
    {{"field": "core_trial_metadata.status", "incorrect": "value in analysis", "correct": "value in data", "evidence": "where the data says so"}}
  ],
  "missing_info": [
    {{"field": "scientific_content.intervention", "missing": "what was left out", "evidence": "where the data says so"}}
  ],
  "overall_assessment": {{"score": 0, "rationale": "quality rationale, score from 0 to 10"}},
  "recommendations": ["specific improvement"]
}}
```"#
    )
}

/// Rewrite of the draft that addresses the validation findings.
pub fn build_correction_prompt(record_json: &str, draft_json: &str, validation_json: &str) -> String {
    format!(
        r#"Correct an AI-generated clinical trial analysis using a validation review and the
original registry data.

ORIGINAL REGISTRY DATA:
```json
{record_json}
```

INITIAL ANALYSIS:
```json
{draft_json}
```

VALIDATION REVIEW:
```json
{validation_json}
```

Produce a corrected analysis that:
1. Fixes every hallucination and inaccuracy in the review
2. Adds important information the review reports as missing
3. Keeps the exact structure of the initial analysis, including mechanism, targets and biomarkers

Every value MUST be traceable to the original data. Use exactly "N/A" where the
data gives no reliable value, and remove unsupported statements.

Respond with the complete corrected JSON object:
```json
{{
  "core_trial_metadata": {{}},
  "scientific_content": {{}},
  "patient_related_information": {{}},
  "operational_aspects": {{}}
}}
```"#
    )
}
