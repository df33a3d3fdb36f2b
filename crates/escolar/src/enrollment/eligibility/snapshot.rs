use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::{
    CourseType, EnrollmentStatus, ExamPeriodId, GroupId, StudentId, StudentStatus, SubjectId,
};
use super::super::repository::RepositoryError;
use super::super::tables::Tables;
use super::availability::ExamPeriodAvailability;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    GroupEnrollment,
    SpecialCourse,
    ExamRegistration,
}

/// One of the student's lifecycle records, reduced to what eligibility needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub kind: RecordKind,
    pub level: Option<u8>,
    pub group_id: Option<GroupId>,
    pub subject_id: Option<SubjectId>,
    pub exam_period_id: Option<ExamPeriodId>,
    pub status: EnrollmentStatus,
    pub calificacion_final: Option<f32>,
}

/// Read-only view of a student's academic state at decision time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSnapshot {
    pub student_id: StudentId,
    pub status: StudentStatus,
    pub english_level: Option<u8>,
    pub records: Vec<RecordSummary>,
}

impl StudentSnapshot {
    /// Gather the student's live (not soft-deleted) records.
    pub fn collect(tables: &Tables, student_id: &StudentId) -> Result<Self, RepositoryError> {
        let student = tables.student(student_id)?;
        let mut records = Vec::new();

        for enrollment in tables
            .enrollments
            .values()
            .filter(|enrollment| &enrollment.student_id == student_id && !enrollment.is_deleted())
        {
            let group = tables.groups.get(&enrollment.group_id);
            records.push(RecordSummary {
                kind: RecordKind::GroupEnrollment,
                level: group.and_then(|group| group.english_level()),
                group_id: Some(enrollment.group_id),
                subject_id: group.map(|group| group.subject_id),
                exam_period_id: None,
                status: enrollment.status,
                calificacion_final: enrollment.calificacion_final,
            });
        }

        for course in tables
            .special_courses
            .values()
            .filter(|course| &course.student_id == student_id && course.deleted_at.is_none())
        {
            records.push(RecordSummary {
                kind: RecordKind::SpecialCourse,
                level: (course.course_type == CourseType::Ingles).then_some(course.level),
                group_id: course.group_id,
                subject_id: None,
                exam_period_id: None,
                status: course.status,
                calificacion_final: course.calificacion_final,
            });
        }

        for registration in tables.exam_registrations.values().filter(|registration| {
            &registration.student_id == student_id && registration.deleted_at.is_none()
        }) {
            records.push(RecordSummary {
                kind: RecordKind::ExamRegistration,
                level: None,
                group_id: None,
                subject_id: None,
                exam_period_id: Some(registration.exam_period_id),
                status: registration.status,
                calificacion_final: registration.calificacion_final,
            });
        }

        Ok(Self {
            student_id: *student_id,
            status: student.status,
            english_level: student.english.current_level,
            records,
        })
    }

    pub fn current_level(&self) -> u8 {
        self.english_level.unwrap_or(1)
    }

    pub fn english_records(&self) -> impl Iterator<Item = &RecordSummary> {
        self.records.iter().filter(|record| record.level.is_some())
    }

    pub fn approved_subjects(&self) -> BTreeSet<SubjectId> {
        self.records
            .iter()
            .filter(|record| record.status == EnrollmentStatus::Aprobado)
            .filter_map(|record| record.subject_id)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredSubject {
    pub subject_id: SubjectId,
    pub clave: String,
}

/// What the student is asking to join.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EnrollmentTarget {
    Group {
        group_id: GroupId,
        english_level: Option<u8>,
        /// `None` for groups without a registration window.
        registration_open: Option<bool>,
        required_subjects: Vec<RequiredSubject>,
    },
    EnglishCourse {
        level: u8,
        group_id: Option<GroupId>,
    },
    ExamPeriod(ExamPeriodAvailability),
}

impl EnrollmentTarget {
    pub fn for_group(
        tables: &Tables,
        group_id: &GroupId,
        now: DateTime<Utc>,
    ) -> Result<Self, RepositoryError> {
        let group = tables.group(group_id)?;
        let today = now.date_naive();
        let required_subjects = tables
            .prerequisites_of(&group.subject_id)
            .into_iter()
            .map(|subject_id| {
                let clave = tables
                    .subjects
                    .get(&subject_id)
                    .map(|subject| subject.clave.clone())
                    .unwrap_or_else(|| subject_id.to_string());
                RequiredSubject { subject_id, clave }
            })
            .collect();

        Ok(EnrollmentTarget::Group {
            group_id: *group_id,
            english_level: group.english_level(),
            registration_open: group
                .english
                .map(|info| info.registration_start <= today && today <= info.registration_end),
            required_subjects,
        })
    }

    pub fn for_exam_period(
        tables: &Tables,
        exam_period_id: &ExamPeriodId,
        now: DateTime<Utc>,
    ) -> Result<Self, RepositoryError> {
        let period = tables.exam_period(exam_period_id)?;
        Ok(EnrollmentTarget::ExamPeriod(ExamPeriodAvailability::assess(
            period, now,
        )))
    }

    pub fn english_level(&self) -> Option<u8> {
        match self {
            EnrollmentTarget::Group { english_level, .. } => *english_level,
            EnrollmentTarget::EnglishCourse { level, .. } => Some(*level),
            EnrollmentTarget::ExamPeriod(_) => None,
        }
    }

    pub fn group_id(&self) -> Option<GroupId> {
        match self {
            EnrollmentTarget::Group { group_id, .. } => Some(*group_id),
            EnrollmentTarget::EnglishCourse { group_id, .. } => *group_id,
            EnrollmentTarget::ExamPeriod(_) => None,
        }
    }
}
