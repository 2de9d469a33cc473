use serde_json::Value;

use super::criteria::segment_criteria;
use super::paths::{resolve, resolve_array, resolve_bool, resolve_i64, resolve_str, resolve_strings};
use super::ExtractError;
use crate::models::{
    ArmGroup, BasicInfo, Contact, Contacts, EligibilityCriteria, ExpandedAccess, ExtractedRecord,
    Intervention, IpdSharing, Location, Official, Outcome, Outcomes, Oversight, Population,
    ProvidedDocument, Reference, ResponsibleParty,
};

const PROTOCOL: &str = "protocolSection";

/// Extract a record from raw document text.
pub fn extract_from_str(raw: &str) -> Result<ExtractedRecord, ExtractError> {
    let document: Value = serde_json::from_str(raw)?;
    extract_trial(&document)
}

/// Project a registry document tree into an [`ExtractedRecord`].
///
/// Accepts a single document object or an array of documents, in which case
/// the first one is used. Absent paths become absent fields; the only failure
/// is a root that is not a tree at all.
pub fn extract_trial(document: &Value) -> Result<ExtractedRecord, ExtractError> {
    let study = match document {
        Value::Object(_) => document,
        Value::Array(items) => match items.first() {
            Some(first @ Value::Object(_)) => first,
            Some(_) => return Err(ExtractError::NotATree("array of non-objects")),
            None => {
                tracing::warn!("Registry document is an empty array");
                return Ok(ExtractedRecord::default());
            }
        },
        Value::Null => return Err(ExtractError::NotATree("null")),
        Value::Bool(_) => return Err(ExtractError::NotATree("boolean")),
        Value::Number(_) => return Err(ExtractError::NotATree("number")),
        Value::String(_) => return Err(ExtractError::NotATree("string")),
    };

    let protocol = resolve(study, PROTOCOL).unwrap_or(&Value::Null);

    let record = ExtractedRecord {
        basic_info: extract_basic_info(study, protocol),
        eligibility_criteria: extract_eligibility(protocol),
        interventions: extract_interventions(protocol),
        outcomes: extract_outcomes(protocol),
        population: extract_population(protocol),
        arms: extract_arms(protocol),
        locations: extract_locations(protocol),
        contacts: extract_contacts(protocol),
        responsible_party: extract_responsible_party(protocol),
        references: extract_references(protocol),
        ipd_sharing: extract_ipd_sharing(protocol),
        oversight: Oversight {
            has_dmc: resolve_bool(protocol, "oversightModule.oversightHasDmc"),
            is_fda_regulated_drug: resolve_bool(protocol, "oversightModule.isFdaRegulatedDrug"),
            is_fda_regulated_device: resolve_bool(protocol, "oversightModule.isFdaRegulatedDevice"),
        },
        expanded_access: ExpandedAccess {
            has_expanded_access: resolve_bool(protocol, "statusModule.expandedAccessInfo.hasExpandedAccess"),
            nct_id: resolve_str(protocol, "statusModule.expandedAccessInfo.nctId"),
            status: resolve_str(protocol, "statusModule.expandedAccessInfo.statusForNctId"),
        },
        documents: extract_documents(study),
    };

    tracing::debug!(
        nct_id = record.nct_id().unwrap_or("-"),
        inclusion = record.eligibility_criteria.inclusion_criteria.len(),
        exclusion = record.eligibility_criteria.exclusion_criteria.len(),
        interventions = record.interventions.len(),
        "Registry document extracted"
    );

    Ok(record)
}

fn extract_basic_info(study: &Value, p: &Value) -> BasicInfo {
    let design = resolve(p, "designModule").unwrap_or(&Value::Null);

    BasicInfo {
        nct_id: resolve_str(p, "identificationModule.nctId"),
        brief_title: resolve_str(p, "identificationModule.briefTitle"),
        official_title: resolve_str(p, "identificationModule.officialTitle"),
        overall_status: resolve_str(p, "statusModule.overallStatus"),
        why_stopped: resolve_str(p, "statusModule.whyStopped"),
        study_type: resolve_str(design, "studyType"),
        phases: resolve_strings(design, "phases"),
        enrollment: resolve_i64(design, "enrollmentInfo.count"),
        enrollment_type: resolve_str(design, "enrollmentInfo.type"),
        start_date: resolve_str(p, "statusModule.startDateStruct.date"),
        primary_completion_date: resolve_str(p, "statusModule.primaryCompletionDateStruct.date"),
        completion_date: resolve_str(p, "statusModule.completionDateStruct.date"),
        study_first_submit_date: resolve_str(p, "statusModule.studyFirstSubmitDate"),
        last_update_date: resolve_str(p, "statusModule.lastUpdateSubmitDate")
            .or_else(|| resolve_str(p, "statusModule.lastUpdatePostDateStruct.date")),
        lead_sponsor: resolve_str(p, "sponsorCollaboratorsModule.leadSponsor.name"),
        lead_sponsor_class: resolve_str(p, "sponsorCollaboratorsModule.leadSponsor.class"),
        collaborators: resolve_array(p, "sponsorCollaboratorsModule.collaborators")
            .iter()
            .filter_map(|c| resolve_str(c, "name"))
            .collect(),
        conditions: resolve_strings(p, "conditionsModule.conditions"),
        keywords: resolve_strings(p, "conditionsModule.keywords"),
        allocation: resolve_str(design, "designInfo.allocation"),
        intervention_model: resolve_str(design, "designInfo.interventionModel"),
        intervention_model_description: resolve_str(design, "designInfo.interventionModelDescription"),
        primary_purpose: resolve_str(design, "designInfo.primaryPurpose"),
        masking: resolve_str(design, "designInfo.maskingInfo.masking"),
        masking_description: resolve_str(design, "designInfo.maskingInfo.maskingDescription"),
        who_masked: resolve_strings(design, "designInfo.maskingInfo.whoMasked"),
        has_results: resolve_bool(study, "hasResults"),
    }
}

fn extract_eligibility(p: &Value) -> EligibilityCriteria {
    let text = resolve_str(p, "eligibilityModule.eligibilityCriteria").unwrap_or_default();
    let segmented = segment_criteria(&text);
    if !text.is_empty() && segmented.is_empty() {
        tracing::debug!("Eligibility text present but no criteria segmented");
    }
    EligibilityCriteria {
        inclusion_criteria: segmented.inclusion,
        exclusion_criteria: segmented.exclusion,
    }
}

fn extract_interventions(p: &Value) -> Vec<Intervention> {
    resolve_array(p, "armsInterventionsModule.interventions")
        .iter()
        .map(|i| Intervention {
            name: resolve_str(i, "name"),
            intervention_type: resolve_str(i, "type"),
            description: resolve_str(i, "description"),
            dosage: resolve_str(i, "dosage"),
            route: resolve_str(i, "route"),
            arm_group_labels: resolve_strings(i, "armGroupLabels"),
            other_names: resolve_strings(i, "otherNames"),
        })
        .collect()
}

fn extract_outcome_list(p: &Value, path: &str) -> Vec<Outcome> {
    resolve_array(p, path)
        .iter()
        .map(|o| Outcome {
            measure: resolve_str(o, "measure"),
            description: resolve_str(o, "description"),
            time_frame: resolve_str(o, "timeFrame"),
        })
        .collect()
}

fn extract_outcomes(p: &Value) -> Outcomes {
    Outcomes {
        primary_outcomes: extract_outcome_list(p, "outcomesModule.primaryOutcomes"),
        secondary_outcomes: extract_outcome_list(p, "outcomesModule.secondaryOutcomes"),
        other_outcomes: extract_outcome_list(p, "outcomesModule.otherOutcomes"),
    }
}

fn extract_population(p: &Value) -> Population {
    Population {
        minimum_age: resolve_str(p, "eligibilityModule.minimumAge"),
        maximum_age: resolve_str(p, "eligibilityModule.maximumAge"),
        sex: resolve_str(p, "eligibilityModule.sex"),
        healthy_volunteers: resolve_bool(p, "eligibilityModule.healthyVolunteers"),
        std_ages: resolve_strings(p, "eligibilityModule.stdAges"),
    }
}

fn extract_arms(p: &Value) -> Vec<ArmGroup> {
    resolve_array(p, "armsInterventionsModule.armGroups")
        .iter()
        .map(|a| ArmGroup {
            label: resolve_str(a, "label"),
            arm_type: resolve_str(a, "type"),
            description: resolve_str(a, "description"),
            intervention_names: resolve_strings(a, "interventionNames"),
        })
        .collect()
}

fn extract_locations(p: &Value) -> Vec<Location> {
    resolve_array(p, "contactsLocationsModule.locations")
        .iter()
        .map(|l| Location {
            facility: resolve_str(l, "facility"),
            status: resolve_str(l, "status"),
            city: resolve_str(l, "city"),
            state: resolve_str(l, "state"),
            zip: resolve_str(l, "zip"),
            country: resolve_str(l, "country"),
        })
        .collect()
}

fn extract_contacts(p: &Value) -> Contacts {
    Contacts {
        central_contacts: resolve_array(p, "contactsLocationsModule.centralContacts")
            .iter()
            .map(|c| Contact {
                name: resolve_str(c, "name"),
                role: resolve_str(c, "role"),
                phone: resolve_str(c, "phone"),
                email: resolve_str(c, "email"),
            })
            .collect(),
        overall_officials: resolve_array(p, "contactsLocationsModule.overallOfficials")
            .iter()
            .map(|o| Official {
                name: resolve_str(o, "name"),
                affiliation: resolve_str(o, "affiliation"),
                role: resolve_str(o, "role"),
            })
            .collect(),
    }
}

fn extract_responsible_party(p: &Value) -> Option<ResponsibleParty> {
    let party = resolve(p, "sponsorCollaboratorsModule.responsibleParty")?;
    Some(ResponsibleParty {
        party_type: resolve_str(party, "type"),
        investigator_name: resolve_str(party, "investigatorFullName"),
        investigator_title: resolve_str(party, "investigatorTitle"),
        investigator_affiliation: resolve_str(party, "investigatorAffiliation"),
    })
}

fn extract_references(p: &Value) -> Vec<Reference> {
    resolve_array(p, "referencesModule.references")
        .iter()
        .map(|r| Reference {
            pmid: resolve_str(r, "pmid"),
            reference_type: resolve_str(r, "type"),
            citation: resolve_str(r, "citation"),
        })
        .collect()
}

fn extract_ipd_sharing(p: &Value) -> IpdSharing {
    IpdSharing {
        plan: resolve_str(p, "ipdSharingStatementModule.ipdSharing"),
        description: resolve_str(p, "ipdSharingStatementModule.description"),
        info_types: resolve_strings(p, "ipdSharingStatementModule.infoTypes"),
        time_frame: resolve_str(p, "ipdSharingStatementModule.timeFrame"),
        access_criteria: resolve_str(p, "ipdSharingStatementModule.accessCriteria"),
        url: resolve_str(p, "ipdSharingStatementModule.url"),
    }
}

fn extract_documents(study: &Value) -> Vec<ProvidedDocument> {
    resolve_array(study, "documentSection.largeDocumentModule.largeDocs")
        .iter()
        .map(|d| ProvidedDocument {
            label: resolve_str(d, "label"),
            type_abbrev: resolve_str(d, "typeAbbrev"),
            date: resolve_str(d, "date"),
            filename: resolve_str(d, "filename"),
            has_protocol: resolve_bool(d, "hasProtocol"),
            has_sap: resolve_bool(d, "hasSap"),
            has_icf: resolve_bool(d, "hasIcf"),
        })
        .collect()
}
