use serde::{Deserialize, Serialize};

/// Deterministic projection of one registry document.
///
/// `basic_info`, `eligibility_criteria`, `interventions` and `outcomes` form
/// the hand-off contract consumed by the analysis prompts; the remaining
/// sections carry registry-only facts the flattener persists directly.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedRecord {
    pub basic_info: BasicInfo,
    pub eligibility_criteria: EligibilityCriteria,
    pub interventions: Vec<Intervention>,
    pub outcomes: Outcomes,
    pub population: Population,
    pub arms: Vec<ArmGroup>,
    pub locations: Vec<Location>,
    pub contacts: Contacts,
    pub responsible_party: Option<ResponsibleParty>,
    pub references: Vec<Reference>,
    pub ipd_sharing: IpdSharing,
    pub oversight: Oversight,
    pub expanded_access: ExpandedAccess,
    pub documents: Vec<ProvidedDocument>,
}

impl ExtractedRecord {
    pub fn nct_id(&self) -> Option<&str> {
        self.basic_info.nct_id.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BasicInfo {
    pub nct_id: Option<String>,
    pub brief_title: Option<String>,
    pub official_title: Option<String>,
    pub overall_status: Option<String>,
    pub why_stopped: Option<String>,
    pub study_type: Option<String>,
    pub phases: Vec<String>,
    pub enrollment: Option<i64>,
    pub enrollment_type: Option<String>,
    pub start_date: Option<String>,
    pub primary_completion_date: Option<String>,
    pub completion_date: Option<String>,
    pub study_first_submit_date: Option<String>,
    pub last_update_date: Option<String>,
    pub lead_sponsor: Option<String>,
    pub lead_sponsor_class: Option<String>,
    pub collaborators: Vec<String>,
    pub conditions: Vec<String>,
    pub keywords: Vec<String>,
    pub allocation: Option<String>,
    pub intervention_model: Option<String>,
    pub intervention_model_description: Option<String>,
    pub primary_purpose: Option<String>,
    pub masking: Option<String>,
    pub masking_description: Option<String>,
    pub who_masked: Vec<String>,
    pub has_results: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityCriteria {
    pub inclusion_criteria: Vec<String>,
    pub exclusion_criteria: Vec<String>,
}

impl EligibilityCriteria {
    pub fn is_empty(&self) -> bool {
        self.inclusion_criteria.is_empty() && self.exclusion_criteria.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Intervention {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub intervention_type: Option<String>,
    pub description: Option<String>,
    pub dosage: Option<String>,
    pub route: Option<String>,
    pub arm_group_labels: Vec<String>,
    pub other_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outcome {
    pub measure: Option<String>,
    pub description: Option<String>,
    pub time_frame: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Outcomes {
    pub primary_outcomes: Vec<Outcome>,
    pub secondary_outcomes: Vec<Outcome>,
    pub other_outcomes: Vec<Outcome>,
}

/// Structured eligibility facts outside the free-text criteria.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Population {
    pub minimum_age: Option<String>,
    pub maximum_age: Option<String>,
    pub sex: Option<String>,
    pub healthy_volunteers: Option<bool>,
    pub std_ages: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmGroup {
    pub label: Option<String>,
    pub arm_type: Option<String>,
    pub description: Option<String>,
    pub intervention_names: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Location {
    pub facility: Option<String>,
    pub status: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contacts {
    pub central_contacts: Vec<Contact>,
    pub overall_officials: Vec<Official>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contact {
    pub name: Option<String>,
    pub role: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Official {
    pub name: Option<String>,
    pub affiliation: Option<String>,
    pub role: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsibleParty {
    pub party_type: Option<String>,
    pub investigator_name: Option<String>,
    pub investigator_title: Option<String>,
    pub investigator_affiliation: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reference {
    pub pmid: Option<String>,
    pub reference_type: Option<String>,
    pub citation: Option<String>,
}

impl Reference {
    /// Registry reference type for publications reporting trial results.
    pub fn is_result(&self) -> bool {
        self.reference_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("RESULT"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IpdSharing {
    pub plan: Option<String>,
    pub description: Option<String>,
    pub info_types: Vec<String>,
    pub time_frame: Option<String>,
    pub access_criteria: Option<String>,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Oversight {
    pub has_dmc: Option<bool>,
    pub is_fda_regulated_drug: Option<bool>,
    pub is_fda_regulated_device: Option<bool>,
}

impl Oversight {
    pub fn is_empty(&self) -> bool {
        self.has_dmc.is_none()
            && self.is_fda_regulated_drug.is_none()
            && self.is_fda_regulated_device.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpandedAccess {
    pub has_expanded_access: Option<bool>,
    pub nct_id: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidedDocument {
    pub label: Option<String>,
    pub type_abbrev: Option<String>,
    pub date: Option<String>,
    pub filename: Option<String>,
    pub has_protocol: Option<bool>,
    pub has_sap: Option<bool>,
    pub has_icf: Option<bool>,
}
