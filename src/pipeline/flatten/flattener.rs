use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use super::derive::{
    classify_biomarker, clean_text, coerce_integer, distinct, is_drug_like, parse_registry_age,
    yes_no,
};
use super::eligibility::classify_criteria;
use super::FlattenError;
use crate::models::{AnalyzedRecord, ExtractedRecord, FlattenedRecord, ValidationReport};

const ID_MAX: usize = 20;
const SHORT_MAX: usize = 50;
const LABEL_MAX: usize = 100;

/// Project one analyzed trial into its persisted row.
///
/// Pure and deterministic: identical inputs always give an identical record.
/// Analyzed values win over registry values for metadata; registry-only
/// sections come from the extracted record.
pub fn flatten(
    extracted: &ExtractedRecord,
    analyzed: &AnalyzedRecord,
    validation: &ValidationReport,
) -> Result<FlattenedRecord, FlattenError> {
    let nct_id = clean_text(extracted.nct_id(), Some(ID_MAX))
        .or_else(|| clean_text(analyzed.nct_id(), Some(ID_MAX)))
        .ok_or(FlattenError::MissingIdentifier)?;

    let basic = &extracted.basic_info;
    let core = &analyzed.core_trial_metadata;
    let science = &analyzed.scientific_content;
    let patient = &analyzed.patient_related_information;
    let ops = &analyzed.operational_aspects;
    let design = &science.study_design;

    let prefer = |primary: &Option<String>, fallback: &Option<String>, max: Option<usize>| {
        clean_text(primary.as_deref(), max).or_else(|| clean_text(fallback.as_deref(), max))
    };

    // ── Enrollment ──
    let mut target_enrollment = coerce_integer(core.enrollment.target.as_ref());
    let mut actual_enrollment = coerce_integer(core.enrollment.actual.as_ref());
    if target_enrollment.is_none() && actual_enrollment.is_none() {
        let is_actual = basic
            .enrollment_type
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case("ACTUAL"));
        if is_actual {
            actual_enrollment = basic.enrollment;
        } else {
            target_enrollment = basic.enrollment;
        }
    }

    // ── Interventions ──
    let (interventions, interventions_json) = intervention_view(extracted, analyzed)?;
    let target = &science.target_pathway;

    // ── Eligibility ──
    let criteria = &extracted.eligibility_criteria;
    let (inclusion, exclusion) = if criteria.is_empty() {
        let lists = &patient.eligibility_criteria;
        (lists.inclusion.clone(), lists.exclusion.clone())
    } else {
        (criteria.inclusion_criteria.clone(), criteria.exclusion_criteria.clone())
    };
    let eligibility_criteria_structured = classify_criteria(&inclusion, &exclusion);

    let population = &extracted.population;
    let min_age = coerce_integer(patient.demographics.age.min.as_ref())
        .or_else(|| population.minimum_age.as_deref().and_then(parse_registry_age));
    let max_age = coerce_integer(patient.demographics.age.max.as_ref())
        .or_else(|| population.maximum_age.as_deref().and_then(parse_registry_age));

    // ── Sites ──
    let registry_sites = &extracted.locations;
    let countries = distinct(
        registry_sites
            .iter()
            .filter_map(|l| l.country.as_deref())
            .chain(ops.locations.iter().filter_map(|l| l.country.as_deref())),
    );
    let facility_names = distinct(
        registry_sites
            .iter()
            .filter_map(|l| l.facility.as_deref())
            .chain(ops.locations.iter().filter_map(|l| l.facility.as_deref())),
    );
    let mut facility_status = BTreeMap::new();
    for site in registry_sites {
        let facility = clean_text(site.facility.as_deref(), None);
        let status = clean_text(site.status.as_deref(), None);
        if let (Some(facility), Some(status)) = (facility, status) {
            facility_status.insert(facility, status);
        }
    }
    let site_recruitment_status = if ops.enrollment_status.site_specific.is_empty() {
        Value::Array(
            registry_sites
                .iter()
                .filter(|l| l.facility.is_some() || l.status.is_some())
                .map(|l| json!({ "facility": l.facility, "status": l.status }))
                .collect(),
        )
    } else {
        to_json(&ops.enrollment_status.site_specific)?
    };

    // ── Registry-only sections ──
    let contacts = &extracted.contacts.central_contacts;
    let ipd = &extracted.ipd_sharing;
    let ipd_sharing = if ipd.plan.is_some() {
        to_json(ipd)?
    } else {
        to_json(&ops.ipd_sharing)?
    };
    let results_references: Vec<_> = extracted.references.iter().filter(|r| r.is_result()).collect();
    let access = &extracted.expanded_access;

    let biomarkers = distinct(&science.biomarkers);
    let biomarker_types = distinct(biomarkers.iter().map(|b| classify_biomarker(b)));

    let arms_groups = if science.arms_groups.is_empty() {
        to_json(&extracted.arms)?
    } else {
        to_json(&science.arms_groups)?
    };
    let arm_count = science.arms_groups.len().max(extracted.arms.len());

    let outcomes = &extracted.outcomes;
    let primary_outcomes = if science.outcomes.primary.is_empty() {
        to_json(&outcomes.primary_outcomes)?
    } else {
        to_json(&science.outcomes.primary)?
    };
    let secondary_outcomes = if science.outcomes.secondary.is_empty() {
        to_json(&outcomes.secondary_outcomes)?
    } else {
        to_json(&science.outcomes.secondary)?
    };

    let collaborators = if core.sponsor_collaborators.collaborators.is_empty() {
        distinct(&basic.collaborators)
    } else {
        distinct(&core.sponsor_collaborators.collaborators)
    };

    let registry_phase = (!basic.phases.is_empty()).then(|| basic.phases.join(", "));

    Ok(FlattenedRecord {
        nct_id,
        status: prefer(&core.status, &basic.overall_status, Some(LABEL_MAX)),
        registration_date: prefer(&core.dates.registration, &basic.study_first_submit_date, None),
        start_date: prefer(&core.dates.start, &basic.start_date, None),
        completion_date: prefer(&core.dates.completion, &basic.completion_date, None),
        last_update_date: prefer(&core.dates.last_update, &basic.last_update_date, None),
        study_first_submit_date: clean_text(basic.study_first_submit_date.as_deref(), None),
        primary_completion_date: clean_text(basic.primary_completion_date.as_deref(), None),
        phase: prefer(&core.phase, &registry_phase, Some(SHORT_MAX)),
        study_type: prefer(&core.study_type, &basic.study_type, Some(LABEL_MAX)),
        target_enrollment,
        actual_enrollment,
        enrollment_type: clean_text(basic.enrollment_type.as_deref(), Some(SHORT_MAX)),
        primary_sponsor: prefer(&core.sponsor_collaborators.primary_sponsor, &basic.lead_sponsor, None),
        primary_sponsor_class: clean_text(basic.lead_sponsor_class.as_deref(), Some(LABEL_MAX)),
        collaborators,
        lead_sponsor: clean_text(basic.lead_sponsor.as_deref(), None),
        brief_title: clean_text(basic.brief_title.as_deref(), None),
        official_title: clean_text(basic.official_title.as_deref(), None),

        allocation: prefer(&design.allocation, &basic.allocation, Some(LABEL_MAX)),
        intervention_model: prefer(&design.intervention_model, &basic.intervention_model, Some(LABEL_MAX)),
        intervention_model_description: clean_text(basic.intervention_model_description.as_deref(), None),
        masking: prefer(&design.masking, &basic.masking, Some(LABEL_MAX)),
        masking_description: clean_text(basic.masking_description.as_deref(), None),
        primary_purpose: prefer(&design.primary_purpose, &basic.primary_purpose, Some(LABEL_MAX)),
        interventions: interventions_json,
        intervention_types: distinct(interventions.iter().filter_map(|i| i.kind.as_deref())),
        drug_names: distinct(
            interventions
                .iter()
                .filter(|i| is_drug_like(i.kind.as_deref()))
                .filter_map(|i| i.name.as_deref()),
        ),
        dosages: distinct(interventions.iter().filter_map(|i| i.dosage.as_deref())),
        administration_routes: distinct(interventions.iter().filter_map(|i| i.route.as_deref())),
        mechanisms_of_action: distinct(science.mechanism_of_action.as_deref()),
        target_pathways: to_json(target)?,
        target_genes: distinct(&target.gene),
        target_proteins: distinct(&target.protein),
        target_chemical_compounds: distinct(&target.chemical_compound),
        biomarkers,
        biomarker_types,
        arms_groups,
        number_of_arms: (arm_count > 0).then_some(arm_count as i64),
        primary_outcomes,
        secondary_outcomes,
        other_outcomes: to_json(&outcomes.other_outcomes)?,

        inclusion_criteria: inclusion,
        exclusion_criteria: exclusion,
        eligibility_criteria_structured,
        min_age,
        max_age,
        eligible_sex: prefer(&patient.demographics.sex, &population.sex, Some(ID_MAX)),
        healthy_volunteers: clean_text(yes_no(population.healthy_volunteers).as_deref(), Some(ID_MAX)),
        demographics_other: distinct(&patient.demographics.other),
        conditions: distinct(&basic.conditions),
        disease_subtypes: distinct(&patient.disease_characteristics.subtypes),
        disease_stages: distinct(&patient.disease_characteristics.stages),
        disease_severity: clean_text(patient.disease_characteristics.severity.as_deref(), None),
        keywords: distinct(&basic.keywords),
        required_prior_treatments: distinct(&patient.prior_treatments.required),
        excluded_prior_treatments: distinct(&patient.prior_treatments.excluded),

        locations: if registry_sites.is_empty() {
            to_json(&ops.locations)?
        } else {
            to_json(registry_sites)?
        },
        countries,
        facility_names,
        facility_status,
        investigators: to_json(&ops.investigators)?,
        overall_officials: to_json(&extracted.contacts.overall_officials)?,
        responsible_party: to_json(&extracted.responsible_party)?,
        enrollment_status: to_json(&ops.enrollment_status)?,
        site_recruitment_status,
        ipd_sharing,
        ipd_sharing_plan: prefer(&ops.ipd_sharing.plan, &ipd.plan, None),
        ipd_sharing_time_frame: clean_text(ipd.time_frame.as_deref(), None),
        ipd_sharing_access_criteria: clean_text(ipd.access_criteria.as_deref(), None),
        ipd_sharing_url: clean_text(ipd.url.as_deref(), None),
        central_contacts: to_json(contacts)?,
        overall_contact: to_json(&contacts.first())?,
        overall_contact_backup: to_json(&contacts.get(1))?,
        trial_references: to_json(&extracted.references)?,
        results_references: to_json(&results_references)?,
        provided_documents: to_json(&extracted.documents)?,
        oversight_info: if extracted.oversight.is_empty() {
            Value::Null
        } else {
            to_json(&extracted.oversight)?
        },
        data_monitoring_committee: yes_no(extracted.oversight.has_dmc),
        why_stopped: clean_text(basic.why_stopped.as_deref(), None),
        has_expanded_access: yes_no(access.has_expanded_access),
        expanded_access_info: if access.has_expanded_access.is_some()
            || access.nct_id.is_some()
            || access.status.is_some()
        {
            to_json(access)?
        } else {
            Value::Null
        },

        analysis_score: validation.score().map(i64::from),
        analysis_rationale: clean_text(validation.rationale(), None),
        missing_info: to_json(&validation.missing_info)?,
        recommendations: distinct(&validation.recommendations),
        original_data: to_json(extracted)?,
        analyzed_data: to_json(analyzed)?,
    })
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Value, FlattenError> {
    Ok(serde_json::to_value(value)?)
}

/// The fields the flattener reads from either intervention shape.
struct InterventionFields<'a> {
    name: Option<&'a str>,
    kind: Option<&'a str>,
    dosage: Option<&'a str>,
    route: Option<&'a str>,
}

/// Interventions as one uniform list: the analyzed list when the model
/// produced one, the registry list otherwise.
fn intervention_view<'a>(
    extracted: &'a ExtractedRecord,
    analyzed: &'a AnalyzedRecord,
) -> Result<(Vec<InterventionFields<'a>>, Value), FlattenError> {
    let detailed = &analyzed.scientific_content.intervention;
    if detailed.is_empty() {
        let items = extracted
            .interventions
            .iter()
            .map(|i| InterventionFields {
                name: i.name.as_deref(),
                kind: i.intervention_type.as_deref(),
                dosage: i.dosage.as_deref(),
                route: i.route.as_deref(),
            })
            .collect();
        Ok((items, to_json(&extracted.interventions)?))
    } else {
        let items = detailed
            .iter()
            .map(|i| InterventionFields {
                name: i.name.as_deref(),
                kind: i.intervention_type.as_deref(),
                dosage: i.dosage.as_deref(),
                route: i.route.as_deref(),
            })
            .collect();
        Ok((items, to_json(detailed)?))
    }
}
