//! Keyword buckets for eligibility criteria.
//!
//! Buckets are tested in a fixed priority order and the first match wins, so
//! every criterion lands in exactly one bucket. Unmatched criteria are
//! `general`.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{BucketEntry, CriterionKind, EligibilityBuckets};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Age,
    Condition,
    Treatment,
    Procedure,
    Laboratory,
    General,
}

struct BucketPattern {
    regex: Regex,
    bucket: Bucket,
}

/// Priority order: age → condition → treatment → procedure → laboratory.
static BUCKET_PATTERNS: LazyLock<Vec<BucketPattern>> = LazyLock::new(|| {
    vec![
        pattern(
            r"(?i)\b(?:age[ds]?|years?\s+old|years?\s+of\s+age|adults?|pediatric|paediatric|child(?:ren)?|infants?|adolescents?|elderly|neonates?)\b|(?:[≥≤<>]=?)\s*\d+\s*(?:years?|yrs?)\b",
            Bucket::Age,
        ),
        pattern(
            r"(?i)\b(?:diagnos\w*|confirmed|disease|condition|cancer|carcinoma|tumou?rs?|malignan\w*|metasta\w*|stage|histolog\w*|patholog\w*|syndrome|disorder|infection|nsclc|lymphoma|leukemia|diabetes|pregnan\w*|comorbid\w*)\b",
            Bucket::Condition,
        ),
        pattern(
            r"(?i)\b(?:prior|previous(?:ly)?|treat\w*|therap\w*|chemotherap\w*|radiotherap\w*|radiation|medications?|drugs?|inhibitors?|immunotherap\w*|vaccin\w*|dos(?:e|es|ing)|regimens?)\b",
            Bucket::Treatment,
        ),
        pattern(
            r"(?i)\b(?:surg\w*|biops\w*|procedures?|transplant\w*|resection|operation|catheter\w*|endoscop\w*|implant\w*|mri|ct\s+scan|imaging)\b",
            Bucket::Procedure,
        ),
        pattern(
            r"(?i)\b(?:laboratory|lab|hemoglobin|haemoglobin|platelets?|neutrophils?|creatinine|bilirubin|alt|ast|uln|counts?|serum|plasma|blood|urine|g/dl|mg/dl|clearance|inr|hba1c|glucose)\b",
            Bucket::Laboratory,
        ),
    ]
});

fn pattern(regex: &str, bucket: Bucket) -> BucketPattern {
    BucketPattern {
        regex: Regex::new(regex).expect("valid regex"),
        bucket,
    }
}

fn bucket_for(criterion: &str) -> Bucket {
    BUCKET_PATTERNS
        .iter()
        .find(|p| p.regex.is_match(criterion))
        .map(|p| p.bucket)
        .unwrap_or(Bucket::General)
}

/// Place every inclusion and exclusion criterion into its bucket, keeping
/// input order within each bucket (inclusion items first).
pub fn classify_criteria(inclusion: &[String], exclusion: &[String]) -> EligibilityBuckets {
    let mut buckets = EligibilityBuckets::default();
    let tagged = inclusion
        .iter()
        .map(|c| (c, CriterionKind::Inclusion))
        .chain(exclusion.iter().map(|c| (c, CriterionKind::Exclusion)));

    for (criterion, kind) in tagged {
        let entry = BucketEntry {
            criterion: criterion.clone(),
            kind,
        };
        let target = match bucket_for(criterion) {
            Bucket::Age => &mut buckets.age_related,
            Bucket::Condition => &mut buckets.condition_related,
            Bucket::Treatment => &mut buckets.treatment_related,
            Bucket::Procedure => &mut buckets.procedure_related,
            Bucket::Laboratory => &mut buckets.laboratory_related,
            Bucket::General => &mut buckets.general,
        };
        target.push(entry);
    }
    buckets
}
