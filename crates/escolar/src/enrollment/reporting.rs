//! Read-only queries over a consistent view of the tables. Presentation is
//! left to callers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::domain::{EnrollmentStatus, ExamPeriodId, ExamPeriodStatus, GroupId, StudentId};
use super::eligibility::{
    EligibilityEvaluator, ExamPeriodAvailability, RequirementProgress, StudentSnapshot,
};
use super::repository::RepositoryError;
use super::service::{open_records_for_group, slots_held_in_group};
use super::tables::Tables;
use super::validation::AcademicPeriod;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupOccupancy {
    pub group_id: GroupId,
    pub clave: String,
    pub subject_clave: Option<String>,
    pub period: AcademicPeriod,
    pub english_level: Option<u8>,
    pub cupo_minimo: u32,
    pub cupo_actual: u32,
    pub cupo_maximo: u32,
    pub available_slots: u32,
    pub open_records: usize,
    pub slots_held: usize,
    pub below_minimum: bool,
    /// `cupo_actual` matches the number of records holding a slot.
    pub ledger_consistent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPeriodOverview {
    pub exam_period_id: ExamPeriodId,
    pub nombre: String,
    pub estatus: ExamPeriodStatus,
    pub cupo_actual: u32,
    pub cupo_maximo: u32,
    pub availability: ExamPeriodAvailability,
    pub registrations: BTreeMap<EnrollmentStatus, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnglishProgressRow {
    pub student_id: StudentId,
    pub matricula: String,
    pub nombre: String,
    pub current_level: u8,
    pub progress: RequirementProgress,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OccupancyReport {
    pub generated_at: DateTime<Utc>,
    pub groups: Vec<GroupOccupancy>,
    pub exam_periods: Vec<ExamPeriodOverview>,
    pub enrollment_status: BTreeMap<EnrollmentStatus, usize>,
    pub english: Vec<EnglishProgressRow>,
}

pub fn group_occupancy(tables: &Tables, period: Option<&AcademicPeriod>) -> Vec<GroupOccupancy> {
    tables
        .groups
        .values()
        .filter(|group| !group.is_deleted())
        .filter(|group| period.map_or(true, |period| &group.period == period))
        .map(|group| {
            let open_records = open_records_for_group(tables, &group.id);
            let slots_held = slots_held_in_group(tables, &group.id);
            GroupOccupancy {
                group_id: group.id,
                clave: group.clave.clone(),
                subject_clave: tables
                    .subjects
                    .get(&group.subject_id)
                    .map(|subject| subject.clave.clone()),
                period: group.period.clone(),
                english_level: group.english_level(),
                cupo_minimo: group.cupo_minimo,
                cupo_actual: group.cupo_actual,
                cupo_maximo: group.cupo_maximo,
                available_slots: group.available_slots(),
                open_records,
                slots_held,
                below_minimum: group.cupo_actual < group.cupo_minimo,
                ledger_consistent: slots_held == group.cupo_actual as usize,
            }
        })
        .collect()
}

pub fn exam_period_overview(tables: &Tables, now: DateTime<Utc>) -> Vec<ExamPeriodOverview> {
    tables
        .exam_periods
        .values()
        .filter(|period| period.deleted_at.is_none())
        .map(|period| {
            let mut registrations = BTreeMap::new();
            for registration in tables.exam_registrations.values().filter(|registration| {
                registration.exam_period_id == period.id && registration.deleted_at.is_none()
            }) {
                *registrations.entry(registration.status).or_insert(0) += 1;
            }

            ExamPeriodOverview {
                exam_period_id: period.id,
                nombre: period.nombre.clone(),
                estatus: period.estatus,
                cupo_actual: period.cupo_actual,
                cupo_maximo: period.cupo_maximo,
                availability: ExamPeriodAvailability::assess(period, now),
                registrations,
            }
        })
        .collect()
}

pub fn enrollment_status_counts(tables: &Tables) -> BTreeMap<EnrollmentStatus, usize> {
    let mut counts = BTreeMap::new();
    for enrollment in tables.enrollments.values().filter(|row| !row.is_deleted()) {
        *counts.entry(enrollment.status).or_insert(0) += 1;
    }
    counts
}

pub fn english_progress(
    tables: &Tables,
    evaluator: &EligibilityEvaluator,
) -> Result<Vec<EnglishProgressRow>, RepositoryError> {
    let mut rows = Vec::new();
    for student in tables.students.values().filter(|student| !student.is_deleted()) {
        let snapshot = StudentSnapshot::collect(tables, &student.id)?;
        rows.push(EnglishProgressRow {
            student_id: student.id,
            matricula: student.matricula.to_string(),
            nombre: student.full_name(),
            current_level: snapshot.current_level(),
            progress: evaluator.requirement(&snapshot),
        });
    }
    Ok(rows)
}

pub fn occupancy_report(
    tables: &Tables,
    evaluator: &EligibilityEvaluator,
    now: DateTime<Utc>,
) -> Result<OccupancyReport, RepositoryError> {
    Ok(OccupancyReport {
        generated_at: now,
        groups: group_occupancy(tables, None),
        exam_periods: exam_period_overview(tables, now),
        enrollment_status: enrollment_status_counts(tables),
        english: english_progress(tables, evaluator)?,
    })
}
