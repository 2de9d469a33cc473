//! The single-row persistence form of an analyzed trial.
//!
//! [`FlattenedRecord::columns`] is the one place that names the persisted
//! columns. The table DDL, the upsert column list, its placeholders, the
//! update clause and the bound values are all generated from it, so a new
//! field cannot be added to one without the others.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Identifier column and upsert conflict key.
pub const KEY_COLUMN: &str = "nct_id";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlattenedRecord {
    // ── Core metadata ──
    pub nct_id: String,
    pub status: Option<String>,
    pub registration_date: Option<String>,
    pub start_date: Option<String>,
    pub completion_date: Option<String>,
    pub last_update_date: Option<String>,
    pub study_first_submit_date: Option<String>,
    pub primary_completion_date: Option<String>,
    pub phase: Option<String>,
    pub study_type: Option<String>,
    pub target_enrollment: Option<i64>,
    pub actual_enrollment: Option<i64>,
    pub enrollment_type: Option<String>,
    pub primary_sponsor: Option<String>,
    pub primary_sponsor_class: Option<String>,
    pub collaborators: Vec<String>,
    pub lead_sponsor: Option<String>,
    pub brief_title: Option<String>,
    pub official_title: Option<String>,

    // ── Scientific content ──
    pub allocation: Option<String>,
    pub intervention_model: Option<String>,
    pub intervention_model_description: Option<String>,
    pub masking: Option<String>,
    pub masking_description: Option<String>,
    pub primary_purpose: Option<String>,
    pub interventions: Value,
    pub intervention_types: Vec<String>,
    pub drug_names: Vec<String>,
    pub dosages: Vec<String>,
    pub administration_routes: Vec<String>,
    pub mechanisms_of_action: Vec<String>,
    pub target_pathways: Value,
    pub target_genes: Vec<String>,
    pub target_proteins: Vec<String>,
    pub target_chemical_compounds: Vec<String>,
    pub biomarkers: Vec<String>,
    pub biomarker_types: Vec<String>,
    pub arms_groups: Value,
    pub number_of_arms: Option<i64>,
    pub primary_outcomes: Value,
    pub secondary_outcomes: Value,
    pub other_outcomes: Value,

    // ── Patient-related ──
    pub inclusion_criteria: Vec<String>,
    pub exclusion_criteria: Vec<String>,
    pub eligibility_criteria_structured: EligibilityBuckets,
    pub min_age: Option<i64>,
    pub max_age: Option<i64>,
    pub eligible_sex: Option<String>,
    pub healthy_volunteers: Option<String>,
    pub demographics_other: Vec<String>,
    pub conditions: Vec<String>,
    pub disease_subtypes: Vec<String>,
    pub disease_stages: Vec<String>,
    pub disease_severity: Option<String>,
    pub keywords: Vec<String>,
    pub required_prior_treatments: Vec<String>,
    pub excluded_prior_treatments: Vec<String>,

    // ── Operational ──
    pub locations: Value,
    pub countries: Vec<String>,
    pub facility_names: Vec<String>,
    pub facility_status: BTreeMap<String, String>,
    pub investigators: Value,
    pub overall_officials: Value,
    pub responsible_party: Value,
    pub enrollment_status: Value,
    pub site_recruitment_status: Value,
    pub ipd_sharing: Value,
    pub ipd_sharing_plan: Option<String>,
    pub ipd_sharing_time_frame: Option<String>,
    pub ipd_sharing_access_criteria: Option<String>,
    pub ipd_sharing_url: Option<String>,
    pub central_contacts: Value,
    pub overall_contact: Value,
    pub overall_contact_backup: Value,
    pub trial_references: Value,
    pub results_references: Value,
    pub provided_documents: Value,
    pub oversight_info: Value,
    pub data_monitoring_committee: Option<String>,
    pub why_stopped: Option<String>,
    pub has_expanded_access: Option<String>,
    pub expanded_access_info: Value,

    // ── Analysis audit ──
    pub analysis_score: Option<i64>,
    pub analysis_rationale: Option<String>,
    pub missing_info: Value,
    pub recommendations: Vec<String>,
    pub original_data: Value,
    pub analyzed_data: Value,
}

/// Criteria grouped into the six eligibility buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EligibilityBuckets {
    pub age_related: Vec<BucketEntry>,
    pub condition_related: Vec<BucketEntry>,
    pub treatment_related: Vec<BucketEntry>,
    pub procedure_related: Vec<BucketEntry>,
    pub laboratory_related: Vec<BucketEntry>,
    pub general: Vec<BucketEntry>,
}

impl EligibilityBuckets {
    pub fn total(&self) -> usize {
        self.age_related.len()
            + self.condition_related.len()
            + self.treatment_related.len()
            + self.procedure_related.len()
            + self.laboratory_related.len()
            + self.general.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketEntry {
    pub criterion: String,
    #[serde(rename = "type")]
    pub kind: CriterionKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CriterionKind {
    Inclusion,
    Exclusion,
}

// ──────────────────────────────────────────────
// Column projection
// ──────────────────────────────────────────────

/// A persisted value together with its storage class.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Integer(Option<i64>),
    /// Stored as JSON text; `Value::Null` is stored as SQL NULL.
    Json(Value),
}

impl ColumnValue {
    pub fn sql_type(&self) -> &'static str {
        match self {
            ColumnValue::Integer(_) => "INTEGER",
            ColumnValue::Text(_) | ColumnValue::Json(_) => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: &'static str,
    pub value: ColumnValue,
}

fn text(name: &'static str, value: &Option<String>) -> Column {
    Column { name, value: ColumnValue::Text(value.clone()) }
}

fn integer(name: &'static str, value: Option<i64>) -> Column {
    Column { name, value: ColumnValue::Integer(value) }
}

fn json_col(name: &'static str, value: &Value) -> Column {
    Column { name, value: ColumnValue::Json(value.clone()) }
}

fn list(name: &'static str, value: &[String]) -> Column {
    Column { name, value: ColumnValue::Json(json!(value)) }
}

impl FlattenedRecord {
    /// Every persisted column, in table order.
    pub fn columns(&self) -> Vec<Column> {
        vec![
            text(KEY_COLUMN, &Some(self.nct_id.clone())),
            text("status", &self.status),
            text("registration_date", &self.registration_date),
            text("start_date", &self.start_date),
            text("completion_date", &self.completion_date),
            text("last_update_date", &self.last_update_date),
            text("study_first_submit_date", &self.study_first_submit_date),
            text("primary_completion_date", &self.primary_completion_date),
            text("phase", &self.phase),
            text("study_type", &self.study_type),
            integer("target_enrollment", self.target_enrollment),
            integer("actual_enrollment", self.actual_enrollment),
            text("enrollment_type", &self.enrollment_type),
            text("primary_sponsor", &self.primary_sponsor),
            text("primary_sponsor_class", &self.primary_sponsor_class),
            list("collaborators", &self.collaborators),
            text("lead_sponsor", &self.lead_sponsor),
            text("brief_title", &self.brief_title),
            text("official_title", &self.official_title),
            text("allocation", &self.allocation),
            text("intervention_model", &self.intervention_model),
            text("intervention_model_description", &self.intervention_model_description),
            text("masking", &self.masking),
            text("masking_description", &self.masking_description),
            text("primary_purpose", &self.primary_purpose),
            json_col("interventions", &self.interventions),
            list("intervention_types", &self.intervention_types),
            list("drug_names", &self.drug_names),
            list("dosages", &self.dosages),
            list("administration_routes", &self.administration_routes),
            list("mechanisms_of_action", &self.mechanisms_of_action),
            json_col("target_pathways", &self.target_pathways),
            list("target_genes", &self.target_genes),
            list("target_proteins", &self.target_proteins),
            list("target_chemical_compounds", &self.target_chemical_compounds),
            list("biomarkers", &self.biomarkers),
            list("biomarker_types", &self.biomarker_types),
            json_col("arms_groups", &self.arms_groups),
            integer("number_of_arms", self.number_of_arms),
            json_col("primary_outcomes", &self.primary_outcomes),
            json_col("secondary_outcomes", &self.secondary_outcomes),
            json_col("other_outcomes", &self.other_outcomes),
            list("inclusion_criteria", &self.inclusion_criteria),
            list("exclusion_criteria", &self.exclusion_criteria),
            json_col(
                "eligibility_criteria_structured",
                &json!(self.eligibility_criteria_structured),
            ),
            integer("min_age", self.min_age),
            integer("max_age", self.max_age),
            text("eligible_sex", &self.eligible_sex),
            text("healthy_volunteers", &self.healthy_volunteers),
            list("demographics_other", &self.demographics_other),
            list("conditions", &self.conditions),
            list("disease_subtypes", &self.disease_subtypes),
            list("disease_stages", &self.disease_stages),
            text("disease_severity", &self.disease_severity),
            list("keywords", &self.keywords),
            list("required_prior_treatments", &self.required_prior_treatments),
            list("excluded_prior_treatments", &self.excluded_prior_treatments),
            json_col("locations", &self.locations),
            list("countries", &self.countries),
            list("facility_names", &self.facility_names),
            json_col("facility_status", &json!(self.facility_status)),
            json_col("investigators", &self.investigators),
            json_col("overall_officials", &self.overall_officials),
            json_col("responsible_party", &self.responsible_party),
            json_col("enrollment_status", &self.enrollment_status),
            json_col("site_recruitment_status", &self.site_recruitment_status),
            json_col("ipd_sharing", &self.ipd_sharing),
            text("ipd_sharing_plan", &self.ipd_sharing_plan),
            text("ipd_sharing_time_frame", &self.ipd_sharing_time_frame),
            text("ipd_sharing_access_criteria", &self.ipd_sharing_access_criteria),
            text("ipd_sharing_url", &self.ipd_sharing_url),
            json_col("central_contacts", &self.central_contacts),
            json_col("overall_contact", &self.overall_contact),
            json_col("overall_contact_backup", &self.overall_contact_backup),
            json_col("trial_references", &self.trial_references),
            json_col("results_references", &self.results_references),
            json_col("provided_documents", &self.provided_documents),
            json_col("oversight_info", &self.oversight_info),
            text("data_monitoring_committee", &self.data_monitoring_committee),
            text("why_stopped", &self.why_stopped),
            text("has_expanded_access", &self.has_expanded_access),
            json_col("expanded_access_info", &self.expanded_access_info),
            integer("analysis_score", self.analysis_score),
            text("analysis_rationale", &self.analysis_rationale),
            json_col("missing_info", &self.missing_info),
            list("recommendations", &self.recommendations),
            json_col("original_data", &self.original_data),
            json_col("analyzed_data", &self.analyzed_data),
        ]
    }

    /// Column names in table order.
    pub fn column_names() -> Vec<&'static str> {
        Self::default().columns().into_iter().map(|c| c.name).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn column_names_are_unique() {
        let names = FlattenedRecord::column_names();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), unique.len());
        assert_eq!(names.len(), 88);
        assert_eq!(names[0], KEY_COLUMN);
    }

    #[test]
    fn lists_project_as_json_arrays() {
        let record = FlattenedRecord {
            nct_id: "NCT00000001".into(),
            countries: vec!["France".into()],
            ..Default::default()
        };
        let countries = record
            .columns()
            .into_iter()
            .find(|c| c.name == "countries")
            .unwrap();
        assert_eq!(countries.value, ColumnValue::Json(json!(["France"])));
    }

    #[test]
    fn integer_columns_declare_integer_type() {
        let record = FlattenedRecord::default();
        let ints: Vec<_> = record
            .columns()
            .into_iter()
            .filter(|c| c.value.sql_type() == "INTEGER")
            .map(|c| c.name)
            .collect();
        assert_eq!(
            ints,
            vec!["target_enrollment", "actual_enrollment", "number_of_arms", "min_age", "max_age", "analysis_score"]
        );
    }

    #[test]
    fn buckets_serialize_with_type_tag() {
        let buckets = EligibilityBuckets {
            age_related: vec![BucketEntry { criterion: "Age >= 18".into(), kind: CriterionKind::Inclusion }],
            ..Default::default()
        };
        let value = json!(buckets);
        assert_eq!(value["age_related"][0]["type"], "inclusion");
        assert_eq!(buckets.total(), 1);
    }
}
