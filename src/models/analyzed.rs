//! Typed form of the four-section trial analysis produced by the model.
//!
//! Every scalar leaf is optional and serializes to `"N/A"` when absent, so the
//! JSON handed to later prompts keeps the sentinel contract. Deserialization
//! goes through [`lenient`](super::lenient) and never rejects a section for
//! shape drift; only the envelope checks in the response parser can fail.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::lenient::{self, FromText, Scalar};

/// The four top-level section keys of an analysis.
pub const SECTION_KEYS: [&str; 4] = [
    "core_trial_metadata",
    "scientific_content",
    "patient_related_information",
    "operational_aspects",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedRecord {
    #[serde(default, deserialize_with = "lenient::object")]
    pub core_trial_metadata: CoreMetadata,
    #[serde(default, deserialize_with = "lenient::object")]
    pub scientific_content: ScientificContent,
    #[serde(default, deserialize_with = "lenient::object")]
    pub patient_related_information: PatientInfo,
    #[serde(default, deserialize_with = "lenient::object")]
    pub operational_aspects: OperationalAspects,
}

impl FromText for AnalyzedRecord {}

impl AnalyzedRecord {
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    pub fn nct_id(&self) -> Option<&str> {
        self.core_trial_metadata.nct_id.as_deref()
    }

    /// File hand-off form: `{"analyzed_data": {...}}`.
    pub fn to_handoff(&self) -> Result<Value, serde_json::Error> {
        Ok(serde_json::json!({ "analyzed_data": serde_json::to_value(self)? }))
    }

    /// Mechanism, targets and biomarkers from the focused sub-queries replace
    /// whatever the draft produced for those fields.
    pub fn merge_scientific_details(&mut self, mechanism: MechanismDetails, biomarkers: Vec<String>) {
        let science = &mut self.scientific_content;
        science.mechanism_of_action = mechanism.mechanism_of_action;
        science.target_pathway = mechanism.target_pathway;
        science.biomarkers = biomarkers;
    }
}

// ═══════════════════════════════════════════════
// Core trial metadata
// ═══════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreMetadata {
    #[serde(default, with = "lenient::text")]
    pub nct_id: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub dates: TrialDates,
    #[serde(default, with = "lenient::text")]
    pub phase: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub study_type: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub enrollment: Enrollment,
    #[serde(default, deserialize_with = "lenient::object")]
    pub sponsor_collaborators: Sponsors,
}

impl FromText for CoreMetadata {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrialDates {
    #[serde(default, with = "lenient::text")]
    pub registration: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub start: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub completion: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub last_update: Option<String>,
}

impl FromText for TrialDates {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enrollment {
    #[serde(default, with = "lenient::scalar")]
    pub target: Option<Scalar>,
    #[serde(default, with = "lenient::scalar")]
    pub actual: Option<Scalar>,
}

impl FromText for Enrollment {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sponsors {
    #[serde(default, with = "lenient::text")]
    pub primary_sponsor: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub collaborators: Vec<String>,
}

impl FromText for Sponsors {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { primary_sponsor: Some(text), ..Default::default() })
    }
}

// ═══════════════════════════════════════════════
// Scientific content
// ═══════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScientificContent {
    #[serde(default, deserialize_with = "lenient::objects")]
    pub intervention: Vec<InterventionDetail>,
    #[serde(default, with = "lenient::text")]
    pub mechanism_of_action: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub target_pathway: TargetPathway,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub biomarkers: Vec<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub study_design: StudyDesign,
    #[serde(default, deserialize_with = "lenient::objects")]
    pub arms_groups: Vec<ArmSummary>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub outcomes: OutcomeSummary,
}

impl FromText for ScientificContent {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterventionDetail {
    #[serde(default, with = "lenient::text")]
    pub name: Option<String>,
    #[serde(rename = "type", default, with = "lenient::text")]
    pub intervention_type: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub description: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub dosage: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub route: Option<String>,
}

impl FromText for InterventionDetail {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { name: Some(text), ..Default::default() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetPathway {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub gene: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub protein: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub chemical_compound: Vec<String>,
}

impl FromText for TargetPathway {}

impl TargetPathway {
    pub fn is_empty(&self) -> bool {
        self.gene.is_empty() && self.protein.is_empty() && self.chemical_compound.is_empty()
    }
}

/// Result of the mechanism-of-action sub-query.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MechanismDetails {
    #[serde(default, with = "lenient::text")]
    pub mechanism_of_action: Option<String>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub target_pathway: TargetPathway,
}

impl FromText for MechanismDetails {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudyDesign {
    #[serde(default, with = "lenient::text")]
    pub allocation: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub intervention_model: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub masking: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub primary_purpose: Option<String>,
}

impl FromText for StudyDesign {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmSummary {
    #[serde(default, with = "lenient::text")]
    pub arm_name: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub arm_type: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub description: Option<String>,
}

impl FromText for ArmSummary {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { arm_name: Some(text), ..Default::default() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    #[serde(default, deserialize_with = "lenient::objects")]
    pub primary: Vec<OutcomeDetail>,
    #[serde(default, deserialize_with = "lenient::objects")]
    pub secondary: Vec<OutcomeDetail>,
}

impl FromText for OutcomeSummary {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeDetail {
    #[serde(default, with = "lenient::text")]
    pub measure: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub description: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub timeframe: Option<String>,
}

impl FromText for OutcomeDetail {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { measure: Some(text), ..Default::default() })
    }
}

// ═══════════════════════════════════════════════
// Patient-related information
// ═══════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientInfo {
    #[serde(default, deserialize_with = "lenient::object")]
    pub eligibility_criteria: CriteriaLists,
    #[serde(default, deserialize_with = "lenient::object")]
    pub demographics: Demographics,
    #[serde(default, deserialize_with = "lenient::object")]
    pub disease_characteristics: DiseaseCharacteristics,
    #[serde(default, deserialize_with = "lenient::object")]
    pub prior_treatments: PriorTreatments,
}

impl FromText for PatientInfo {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriteriaLists {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub inclusion: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub exclusion: Vec<String>,
}

impl FromText for CriteriaLists {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Demographics {
    #[serde(default, deserialize_with = "lenient::object")]
    pub age: AgeRange,
    #[serde(default, with = "lenient::text")]
    pub sex: Option<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub other: Vec<String>,
}

impl FromText for Demographics {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgeRange {
    #[serde(default, with = "lenient::scalar")]
    pub min: Option<Scalar>,
    #[serde(default, with = "lenient::scalar")]
    pub max: Option<Scalar>,
    #[serde(default, with = "lenient::text")]
    pub description: Option<String>,
}

impl FromText for AgeRange {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { description: Some(text), ..Default::default() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiseaseCharacteristics {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub subtypes: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub stages: Vec<String>,
    #[serde(default, with = "lenient::text")]
    pub severity: Option<String>,
}

impl FromText for DiseaseCharacteristics {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriorTreatments {
    #[serde(default, deserialize_with = "lenient::strings")]
    pub required: Vec<String>,
    #[serde(default, deserialize_with = "lenient::strings")]
    pub excluded: Vec<String>,
}

impl FromText for PriorTreatments {}

// ═══════════════════════════════════════════════
// Operational aspects
// ═══════════════════════════════════════════════

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationalAspects {
    #[serde(default, deserialize_with = "lenient::objects")]
    pub locations: Vec<SiteDetail>,
    #[serde(default, deserialize_with = "lenient::objects")]
    pub investigators: Vec<Investigator>,
    #[serde(default, deserialize_with = "lenient::object")]
    pub enrollment_status: EnrollmentStatus,
    #[serde(default, deserialize_with = "lenient::object")]
    pub ipd_sharing: IpdPlan,
}

impl FromText for OperationalAspects {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteDetail {
    #[serde(default, with = "lenient::text")]
    pub facility: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub city: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub state: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub country: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub status: Option<String>,
}

impl FromText for SiteDetail {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { facility: Some(text), ..Default::default() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Investigator {
    #[serde(default, with = "lenient::text")]
    pub name: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub role: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub facility: Option<String>,
}

impl FromText for Investigator {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { name: Some(text), ..Default::default() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnrollmentStatus {
    #[serde(default, with = "lenient::text")]
    pub overall: Option<String>,
    #[serde(default, deserialize_with = "lenient::objects")]
    pub site_specific: Vec<SiteEnrollment>,
}

impl FromText for EnrollmentStatus {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { overall: Some(text), ..Default::default() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteEnrollment {
    #[serde(default, with = "lenient::text")]
    pub facility: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub status: Option<String>,
    #[serde(default, with = "lenient::scalar")]
    pub participants_enrolled: Option<Scalar>,
}

impl FromText for SiteEnrollment {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { facility: Some(text), ..Default::default() })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IpdPlan {
    #[serde(default, with = "lenient::text")]
    pub plan: Option<String>,
    #[serde(default, with = "lenient::text")]
    pub description: Option<String>,
}

impl FromText for IpdPlan {
    fn from_text(text: String) -> Option<Self> {
        Some(Self { plan: Some(text), ..Default::default() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn absent_leaves_serialize_as_sentinel() {
        let value = serde_json::to_value(AnalyzedRecord::default()).unwrap();
        assert_eq!(value["core_trial_metadata"]["nct_id"], "N/A");
        assert_eq!(value["core_trial_metadata"]["enrollment"]["target"], "N/A");
        assert_eq!(value["scientific_content"]["mechanism_of_action"], "N/A");
        assert_eq!(value["operational_aspects"]["ipd_sharing"]["plan"], "N/A");
        assert_eq!(value["scientific_content"]["biomarkers"], json!([]));
    }

    #[test]
    fn reads_full_schema_example() {
        let record = AnalyzedRecord::from_value(json!({
            "core_trial_metadata": {
                "nct_id": "NCT01234567",
                "status": "Recruiting",
                "dates": {"registration": "2023-01-05", "start": "2023-02-01", "completion": "N/A", "last_update": "N/A"},
                "phase": "Phase 2",
                "study_type": "Interventional",
                "enrollment": {"target": 120, "actual": "N/A"},
                "sponsor_collaborators": {"primary_sponsor": "Acme Oncology", "collaborators": ["NCI"]}
            },
            "scientific_content": {
                "intervention": [{"name": "Drug X", "type": "Drug", "description": "oral", "dosage": "10 mg", "route": "Oral"}],
                "mechanism_of_action": "EGFR inhibition",
                "target_pathway": {"gene": ["EGFR"], "protein": "N/A", "chemical_compound": ["Drug X"]},
                "biomarkers": ["EGFR mutation"],
                "study_design": {"allocation": "Randomized", "intervention_model": "Parallel", "masking": "None (Open Label)", "primary_purpose": "Treatment"},
                "arms_groups": [{"arm_name": "A", "arm_type": "Experimental", "description": "Drug X"}],
                "outcomes": {"primary": [{"measure": "PFS", "description": "N/A", "timeframe": "24 months"}], "secondary": []}
            },
            "patient_related_information": {
                "eligibility_criteria": {"inclusion": ["Age >= 18"], "exclusion": ["Pregnancy"]},
                "demographics": {"age": {"min": "18", "max": "N/A", "description": "Adults"}, "sex": "All", "other": []},
                "disease_characteristics": {"subtypes": ["NSCLC"], "stages": ["IV"], "severity": "Advanced"},
                "prior_treatments": {"required": [], "excluded": ["Prior EGFR TKI"]}
            },
            "operational_aspects": {
                "locations": [{"facility": "Mayo Clinic", "city": "Rochester", "state": "MN", "country": "United States", "status": "Recruiting"}],
                "investigators": [{"name": "Dr. A", "role": "PI", "facility": "Mayo Clinic"}],
                "enrollment_status": {"overall": "Recruiting", "site_specific": [{"facility": "Mayo Clinic", "status": "Recruiting", "participants_enrolled": "N/A"}]},
                "ipd_sharing": {"plan": "No", "description": "N/A"}
            }
        }))
        .unwrap();

        assert_eq!(record.nct_id(), Some("NCT01234567"));
        assert_eq!(record.core_trial_metadata.enrollment.target, Some(Scalar::Integer(120)));
        assert_eq!(record.core_trial_metadata.enrollment.actual, None);
        assert_eq!(record.scientific_content.intervention[0].intervention_type.as_deref(), Some("Drug"));
        assert!(record.scientific_content.target_pathway.protein.is_empty());
        assert_eq!(
            record.patient_related_information.demographics.age.min,
            Some(Scalar::Text("18".into()))
        );
        assert_eq!(record.operational_aspects.locations.len(), 1);
        assert_eq!(record.operational_aspects.enrollment_status.site_specific.len(), 1);
    }

    #[test]
    fn tolerates_shape_drift() {
        let record = AnalyzedRecord::from_value(json!({
            "core_trial_metadata": {"phase": ["Phase 1", "Phase 2"], "sponsor_collaborators": "Acme"},
            "scientific_content": "N/A",
            "operational_aspects": {"enrollment_status": "Completed", "ipd_sharing": "Undecided"}
        }))
        .unwrap();
        assert_eq!(record.core_trial_metadata.phase.as_deref(), Some("Phase 1, Phase 2"));
        assert_eq!(record.core_trial_metadata.sponsor_collaborators.primary_sponsor.as_deref(), Some("Acme"));
        assert_eq!(record.scientific_content, ScientificContent::default());
        assert_eq!(record.operational_aspects.enrollment_status.overall.as_deref(), Some("Completed"));
        assert_eq!(record.operational_aspects.ipd_sharing.plan.as_deref(), Some("Undecided"));
    }

    #[test]
    fn merge_replaces_scientific_details() {
        let mut record = AnalyzedRecord::default();
        record.scientific_content.biomarkers = vec!["stale".into()];
        record.merge_scientific_details(
            MechanismDetails {
                mechanism_of_action: Some("PD-1 blockade".into()),
                target_pathway: TargetPathway { protein: vec!["PD-1".into()], ..Default::default() },
            },
            vec!["PD-L1 expression".into()],
        );
        let science = &record.scientific_content;
        assert_eq!(science.mechanism_of_action.as_deref(), Some("PD-1 blockade"));
        assert_eq!(science.target_pathway.protein, vec!["PD-1"]);
        assert_eq!(science.biomarkers, vec!["PD-L1 expression"]);
    }

    #[test]
    fn handoff_wraps_record() {
        let handoff = AnalyzedRecord::default().to_handoff().unwrap();
        assert!(handoff["analyzed_data"]["core_trial_metadata"].is_object());
    }
}
