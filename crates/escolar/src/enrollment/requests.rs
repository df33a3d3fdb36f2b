use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use super::domain::{
    CareerId, EnglishGroupInfo, EnrollmentStatus, ExamPeriodId, ExamPeriodStatus, GroupId,
    Modality, StudentId, StudentStatus, SubjectId, TeacherId,
};
use super::validation::AcademicPeriod;

/// Student account plus its login, created as one unit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewStudent {
    pub username: String,
    #[serde(default)]
    pub password_digest: String,
    pub nombre: String,
    pub apellido_paterno: String,
    #[serde(default)]
    pub apellido_materno: Option<String>,
    #[serde(default)]
    pub curp: Option<String>,
    pub career_id: CareerId,
    pub semester: u8,
    #[serde(default)]
    pub english_level: Option<u8>,
    /// Year used for the matricula; defaults to the current year.
    #[serde(default)]
    pub enrollment_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewTeacher {
    pub username: String,
    #[serde(default)]
    pub password_digest: String,
    pub numero_empleado: String,
    pub nombre: String,
    pub apellido_paterno: String,
    #[serde(default)]
    pub apellido_materno: Option<String>,
    #[serde(default)]
    pub departamento: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewCareer {
    pub clave: String,
    pub nombre: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewSubject {
    pub clave: String,
    pub nombre: String,
    pub creditos: u32,
    pub semestre: u8,
    pub career_id: CareerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewPrerequisite {
    pub required_subject_id: SubjectId,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewGroup {
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub period: AcademicPeriod,
    pub clave: String,
    pub modality: Modality,
    #[serde(default)]
    pub cupo_minimo: u32,
    pub cupo_maximo: u32,
    #[serde(default)]
    pub english: Option<EnglishGroupInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewExamPeriod {
    pub nombre: String,
    pub fecha_inscripcion_inicio: DateTime<Utc>,
    pub fecha_inscripcion_fin: DateTime<Utc>,
    pub fecha_inicio_examen: NaiveDate,
    pub fecha_fin_examen: NaiveDate,
    pub cupo_maximo: u32,
    #[serde(default)]
    pub estatus: Option<ExamPeriodStatus>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExamPeriodStatusUpdate {
    pub estatus: ExamPeriodStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnrollmentRequest {
    pub student_id: StudentId,
    pub group_id: GroupId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnglishCourseRequest {
    pub student_id: StudentId,
    pub level: u8,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub requiere_pago: bool,
}

/// Placement exam result that grants the student's current level outright.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DiagnosticPass {
    pub student_id: StudentId,
    pub level: u8,
    pub calificacion_final: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExamRegistrationRequest {
    pub student_id: StudentId,
    pub exam_period_id: ExamPeriodId,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TransitionRequest {
    pub status: EnrollmentStatus,
    #[serde(default)]
    pub calificacion_final: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FinalGradeRequest {
    pub calificacion_final: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PartialGradeRequest {
    /// 1-based partial number.
    pub parcial: u8,
    pub calificacion: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AttendanceRequest {
    pub asistencias: u32,
    pub faltas: u32,
    #[serde(default)]
    pub retardos: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudentStatusUpdate {
    pub status: StudentStatus,
}

/// Dry-run target for an eligibility preview; exactly one field must be set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EligibilityQuery {
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub level: Option<u8>,
    #[serde(default)]
    pub exam_period_id: Option<ExamPeriodId>,
}
