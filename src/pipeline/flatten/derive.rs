//! Small, pure derivation rules shared by the flattener.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::lenient::is_sentinel;
use crate::models::Scalar;

/// Normalize a text leaf: sentinel, empty and whitespace become `None`;
/// anything else is trimmed and cut to `max_len` characters.
pub fn clean_text(value: Option<&str>, max_len: Option<usize>) -> Option<String> {
    let text = value?.trim();
    if is_sentinel(text) {
        return None;
    }
    Some(match max_len {
        Some(max) if text.chars().count() > max => text.chars().take(max).collect(),
        _ => text.to_string(),
    })
}

/// First-seen order, no repeats, no empty or sentinel values.
pub fn distinct<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let Some(text) = clean_text(Some(value.as_ref()), None) else {
            continue;
        };
        if !out.contains(&text) {
            out.push(text);
        }
    }
    out
}

/// Integer coercion of an analyzed scalar (`"42"` → 42, `"12a"` → none).
pub fn coerce_integer(value: Option<&Scalar>) -> Option<i64> {
    value.and_then(Scalar::as_integer)
}

pub fn yes_no(flag: Option<bool>) -> Option<String> {
    flag.map(|b| if b { "Yes" } else { "No" }.to_string())
}

// ──────────────────────────────────────────────
// Registry ages
// ──────────────────────────────────────────────

static REGISTRY_AGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s*(years?|months?|weeks?|days?)?\s*$").expect("valid regex")
});

/// Whole years from the registry form (`"18 Years"`, `"6 Months"`).
/// Sub-year units floor to whole years; `"N/A"` and free text are absent.
pub fn parse_registry_age(text: &str) -> Option<i64> {
    let caps = REGISTRY_AGE.captures(text)?;
    let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_lowercase())
        .unwrap_or_else(|| "years".to_string());
    let years = match unit.trim_end_matches('s') {
        "month" => amount / 12,
        "week" => amount / 52,
        "day" => amount / 365,
        _ => amount,
    };
    Some(years)
}

// ──────────────────────────────────────────────
// Interventions and biomarkers
// ──────────────────────────────────────────────

/// Intervention types whose names are reported as drug names.
const DRUG_LIKE_TYPES: &[&str] = &[
    "drug",
    "biological",
    "combination product",
    "combination_product",
    "genetic",
    "dietary supplement",
    "dietary_supplement",
];

/// Untyped interventions count as drug-like.
pub fn is_drug_like(intervention_type: Option<&str>) -> bool {
    match intervention_type.map(str::trim) {
        None => true,
        Some(t) if is_sentinel(t) => true,
        Some(t) => DRUG_LIKE_TYPES.iter().any(|d| t.eq_ignore_ascii_case(d)),
    }
}

struct BiomarkerRule {
    regex: Regex,
    kind: &'static str,
}

/// Checked in order; the first match decides.
static BIOMARKER_RULES: LazyLock<Vec<BiomarkerRule>> = LazyLock::new(|| {
    vec![
        rule(
            r"(?i)\b(?:mutation|mutant|gene|genetic|genotyp\w*|allele|variant|polymorphism|snp|deletion|amplification|fusion|rearrangement|translocation|exon|dna|rna|msi|tmb)\b",
            "genetic",
        ),
        rule(
            r"(?i)\b(?:mri|pet|ct|imaging|scan|ultrasound|radiograph\w*|x-ray|echocardiogra\w*|suvmax)\b",
            "imaging",
        ),
        rule(
            r"(?i)\b(?:protein|expression|receptor|antibod\w*|antigen|enzyme|kinase|ihc|immunohistochemi\w*|pd-l1|her2|psa|cea|ca-125)\b",
            "protein",
        ),
        rule(
            r"(?i)\b(?:level|levels|count|serum|plasma|blood|urine|hba1c|glucose|creatinine|hemoglobin|cholesterol|concentration|titer|laboratory|lab)\b",
            "laboratory",
        ),
    ]
});

fn rule(pattern: &str, kind: &'static str) -> BiomarkerRule {
    BiomarkerRule {
        regex: Regex::new(pattern).expect("valid regex"),
        kind,
    }
}

/// One of `genetic`, `imaging`, `protein`, `laboratory`, `other`.
pub fn classify_biomarker(biomarker: &str) -> &'static str {
    BIOMARKER_RULES
        .iter()
        .find(|r| r.regex.is_match(biomarker))
        .map(|r| r.kind)
        .unwrap_or("other")
}
