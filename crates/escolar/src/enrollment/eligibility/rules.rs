use std::collections::BTreeMap;

use super::super::domain::{EnrollmentStatus, GroupId, StudentStatus};
use super::availability::ExamPeriodAvailability;
use super::config::EligibilityConfig;
use super::snapshot::{EnrollmentTarget, RecordKind, StudentSnapshot};
use super::{EligibilityCheck, EligibilityRule, RequirementProgress};

pub(crate) struct EligibilitySignals {
    pub student_status: StudentStatus,
    pub requirement_satisfied: bool,
    pub current_level: u8,
    pub requested_level: Option<u8>,
    pub active_at_level: bool,
    pub active_in_group: Option<GroupId>,
    pub registration_open: Option<bool>,
    pub missing_prerequisites: Vec<String>,
    pub exam_period: Option<ExamPeriodAvailability>,
    pub already_registered_for_exam: bool,
}

/// Aggregate English progress: approved levels and the average of their best grades.
pub(crate) fn english_requirement(
    snapshot: &StudentSnapshot,
    config: &EligibilityConfig,
) -> RequirementProgress {
    let mut best_by_level: BTreeMap<u8, Option<f32>> = BTreeMap::new();
    for record in snapshot
        .english_records()
        .filter(|record| record.status == EnrollmentStatus::Aprobado)
    {
        let Some(level) = record.level else { continue };
        let best = best_by_level.entry(level).or_insert(None);
        *best = match (*best, record.calificacion_final) {
            (Some(current), Some(grade)) => Some(current.max(grade)),
            (None, grade) => grade,
            (current, None) => current,
        };
    }

    let grades: Vec<f32> = best_by_level.values().filter_map(|grade| *grade).collect();
    let average = if grades.is_empty() {
        None
    } else {
        Some(grades.iter().sum::<f32>() / grades.len() as f32)
    };

    let all_levels = (1..=config.english_levels).all(|level| best_by_level.contains_key(&level));
    let satisfied = all_levels && average.map_or(false, |avg| avg >= config.passing_grade);

    RequirementProgress {
        approved_levels: best_by_level.keys().copied().collect(),
        average,
        satisfied,
    }
}

pub(crate) fn run_checks(
    snapshot: &StudentSnapshot,
    target: &EnrollmentTarget,
    config: &EligibilityConfig,
) -> (Vec<EligibilityCheck>, EligibilitySignals) {
    let mut checks = Vec::new();

    let student_active = snapshot.status == StudentStatus::Activo;
    checks.push(EligibilityCheck::new(
        EligibilityRule::StudentActive,
        student_active,
        format!("student status {}", snapshot.status.label()),
    ));

    let current_level = snapshot.current_level();
    let requested_level = target.english_level();
    let mut requirement_satisfied = false;
    let mut active_at_level = false;

    if let Some(level) = requested_level {
        let progress = english_requirement(snapshot, config);
        requirement_satisfied = progress.satisfied;
        checks.push(EligibilityCheck::new(
            EligibilityRule::RequirementOutstanding,
            !progress.satisfied,
            match progress.average {
                Some(average) => format!(
                    "{} of {} levels approved, average {:.1}",
                    progress.approved_levels.len(),
                    config.english_levels,
                    average
                ),
                None => format!(
                    "{} of {} levels approved",
                    progress.approved_levels.len(),
                    config.english_levels
                ),
            },
        ));

        checks.push(EligibilityCheck::new(
            EligibilityRule::CurrentLevel,
            level == current_level,
            format!("requested level {level}, current level {current_level}"),
        ));

        active_at_level = snapshot.english_records().any(|record| {
            record.level == Some(level) && record.status.blocks_reenrollment()
        });
        checks.push(EligibilityCheck::new(
            EligibilityRule::NoActiveRecordAtLevel,
            !active_at_level,
            if active_at_level {
                format!("active record at level {level}")
            } else {
                format!("no active record at level {level}")
            },
        ));
    }

    let mut active_in_group = None;
    if let Some(group_id) = target.group_id() {
        let duplicate = snapshot.records.iter().any(|record| {
            record.kind != RecordKind::ExamRegistration
                && record.group_id == Some(group_id)
                && record.status.blocks_reenrollment()
        });
        if duplicate {
            active_in_group = Some(group_id);
        }
        checks.push(EligibilityCheck::new(
            EligibilityRule::NoActiveRecordInGroup,
            !duplicate,
            format!("group {group_id}"),
        ));
    }

    let mut registration_open = None;
    let mut missing_prerequisites = Vec::new();
    if let EnrollmentTarget::Group {
        registration_open: window,
        required_subjects,
        ..
    } = target
    {
        if let Some(open) = window {
            registration_open = Some(*open);
            checks.push(EligibilityCheck::new(
                EligibilityRule::GroupRegistrationWindow,
                *open,
                if *open {
                    "group registration window open".to_string()
                } else {
                    "group registration window closed".to_string()
                },
            ));
        }

        let approved = snapshot.approved_subjects();
        missing_prerequisites = required_subjects
            .iter()
            .filter(|required| !approved.contains(&required.subject_id))
            .map(|required| required.clave.clone())
            .collect();
        checks.push(EligibilityCheck::new(
            EligibilityRule::PrerequisitesApproved,
            missing_prerequisites.is_empty(),
            if missing_prerequisites.is_empty() {
                format!("{} prerequisite(s) approved", required_subjects.len())
            } else {
                format!("missing {}", missing_prerequisites.join(", "))
            },
        ));
    }

    let mut exam_period = None;
    let mut already_registered_for_exam = false;
    if let EnrollmentTarget::ExamPeriod(availability) = target {
        exam_period = Some(*availability);
        checks.push(EligibilityCheck::new(
            EligibilityRule::ExamPeriodStatusOpen,
            availability.is_open_status,
            "estatus must be ABIERTO".to_string(),
        ));
        checks.push(EligibilityCheck::new(
            EligibilityRule::ExamPeriodNotDeleted,
            availability.is_not_deleted,
            "period must not be deleted".to_string(),
        ));
        checks.push(EligibilityCheck::new(
            EligibilityRule::ExamPeriodRegistrationWindow,
            availability.is_in_registration_period,
            "now must fall inside the registration window".to_string(),
        ));
        checks.push(EligibilityCheck::new(
            EligibilityRule::ExamPeriodCapacity,
            availability.has_capacity,
            "cupoActual must be below cupoMaximo".to_string(),
        ));

        already_registered_for_exam = snapshot.records.iter().any(|record| {
            record.exam_period_id == Some(availability.exam_period_id)
                && record.status.blocks_reenrollment()
        });
        checks.push(EligibilityCheck::new(
            EligibilityRule::NoActiveExamRegistration,
            !already_registered_for_exam,
            format!("exam period {}", availability.exam_period_id),
        ));
    }

    let signals = EligibilitySignals {
        student_status: snapshot.status,
        requirement_satisfied,
        current_level,
        requested_level,
        active_at_level,
        active_in_group,
        registration_open,
        missing_prerequisites,
        exam_period,
        already_registered_for_exam,
    };

    (checks, signals)
}
