use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::capacity::CapacityTarget;
use super::matricula::Matricula;
use super::validation::AcademicPeriod;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

entity_id!(
    /// Login account shared by administrators, teachers and students.
    UserId
);
entity_id!(StudentId);
entity_id!(TeacherId);
entity_id!(CareerId);
entity_id!(SubjectId);
entity_id!(GroupId);
entity_id!(EnrollmentId);
entity_id!(GradeHistoryId);
entity_id!(ExamPeriodId);
entity_id!(ExamRegistrationId);
entity_id!(SpecialCourseId);

/// Number of English proficiency levels a student must pass.
pub const ENGLISH_LEVELS: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// Opaque digest produced by the authentication layer.
    #[serde(default)]
    pub password_digest: String,
    pub role: Role,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StudentStatus {
    Activo,
    Inactivo,
    Egresado,
}

impl StudentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            StudentStatus::Activo => "ACTIVO",
            StudentStatus::Inactivo => "INACTIVO",
            StudentStatus::Egresado => "EGRESADO",
        }
    }
}

/// English proficiency tracked on the student record.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnglishProfile {
    pub current_level: Option<u8>,
    pub average_score: Option<f32>,
    pub certified_level: Option<u8>,
}

impl EnglishProfile {
    /// Students without a placement start at level 1.
    pub fn effective_level(&self) -> u8 {
        self.current_level.unwrap_or(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreditCounters {
    pub creditos_cursados: u32,
    pub creditos_aprobados: u32,
}

impl CreditCounters {
    pub fn is_consistent(&self) -> bool {
        self.creditos_aprobados <= self.creditos_cursados
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub user_id: UserId,
    pub matricula: Matricula,
    pub nombre: String,
    pub apellido_paterno: String,
    pub apellido_materno: Option<String>,
    pub curp: Option<String>,
    pub career_id: CareerId,
    pub semester: u8,
    pub status: StudentStatus,
    pub english: EnglishProfile,
    pub credits: CreditCounters,
    pub created_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Student {
    pub fn full_name(&self) -> String {
        match &self.apellido_materno {
            Some(materno) => format!("{} {} {}", self.nombre, self.apellido_paterno, materno),
            None => format!("{} {}", self.nombre, self.apellido_paterno),
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Teacher {
    pub id: TeacherId,
    pub user_id: UserId,
    pub numero_empleado: String,
    pub nombre: String,
    pub apellido_paterno: String,
    pub apellido_materno: Option<String>,
    pub departamento: Option<String>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Career {
    pub id: CareerId,
    pub clave: String,
    pub nombre: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
    pub id: SubjectId,
    pub clave: String,
    pub nombre: String,
    pub creditos: u32,
    pub semestre: u8,
    pub career_id: CareerId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prerequisite {
    pub subject_id: SubjectId,
    pub required_subject_id: SubjectId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Modality {
    Presencial,
    EnLinea,
    Mixta,
}

/// Extra scheduling data carried by English-course groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnglishGroupInfo {
    pub level: u8,
    pub registration_start: NaiveDate,
    pub registration_end: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub subject_id: SubjectId,
    pub teacher_id: TeacherId,
    pub period: AcademicPeriod,
    pub clave: String,
    pub modality: Modality,
    pub cupo_minimo: u32,
    pub cupo_actual: u32,
    pub cupo_maximo: u32,
    pub english: Option<EnglishGroupInfo>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Group {
    pub fn english_level(&self) -> Option<u8> {
        self.english.map(|info| info.level)
    }

    pub fn available_slots(&self) -> u32 {
        self.cupo_maximo.saturating_sub(self.cupo_actual)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Lifecycle shared by group enrollments, special courses and exam registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EnrollmentStatus {
    Inscrito,
    EnCurso,
    Aprobado,
    Reprobado,
    Baja,
    Cancelado,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::Inscrito => "INSCRITO",
            EnrollmentStatus::EnCurso => "EN_CURSO",
            EnrollmentStatus::Aprobado => "APROBADO",
            EnrollmentStatus::Reprobado => "REPROBADO",
            EnrollmentStatus::Baja => "BAJA",
            EnrollmentStatus::Cancelado => "CANCELADO",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, EnrollmentStatus::Inscrito | EnrollmentStatus::EnCurso)
    }

    pub const fn is_open(self) -> bool {
        !self.is_terminal()
    }

    /// Occupying a capacity slot. An approved record keeps the slot it passed in.
    pub const fn holds_capacity(self) -> bool {
        matches!(
            self,
            EnrollmentStatus::Inscrito | EnrollmentStatus::EnCurso | EnrollmentStatus::Aprobado
        )
    }

    /// Records in these states prevent a second enrollment at the same level or group.
    pub const fn blocks_reenrollment(self) -> bool {
        !matches!(
            self,
            EnrollmentStatus::Reprobado | EnrollmentStatus::Baja | EnrollmentStatus::Cancelado
        )
    }

    pub const fn can_transition_to(self, next: EnrollmentStatus) -> bool {
        use EnrollmentStatus::*;
        matches!(
            (self, next),
            (Inscrito, EnCurso)
                | (Inscrito, Baja)
                | (Inscrito, Cancelado)
                | (EnCurso, Aprobado)
                | (EnCurso, Reprobado)
                | (EnCurso, Baja)
                | (EnCurso, Cancelado)
        )
    }
}

impl fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    pub asistencias: u32,
    pub faltas: u32,
    pub retardos: u32,
}

impl Attendance {
    /// Share of sessions attended, or `None` before any session is recorded.
    pub fn percentage(&self) -> Option<f32> {
        let total = self.asistencias + self.faltas;
        if total == 0 {
            return None;
        }
        Some(self.asistencias as f32 * 100.0 / total as f32)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub id: EnrollmentId,
    pub student_id: StudentId,
    pub group_id: GroupId,
    pub parciales: [Option<f32>; 3],
    pub calificacion_final: Option<f32>,
    pub attendance: Attendance,
    pub porcentaje_asistencia: Option<f32>,
    pub status: EnrollmentStatus,
    pub aprobado: bool,
    pub enrolled_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Enrollment {
    pub fn new(student_id: StudentId, group_id: GroupId, at: DateTime<Utc>) -> Self {
        Self {
            id: EnrollmentId::new(),
            student_id,
            group_id,
            parciales: [None; 3],
            calificacion_final: None,
            attendance: Attendance::default(),
            porcentaje_asistencia: None,
            status: EnrollmentStatus::Inscrito,
            aprobado: false,
            enrolled_at: at,
            updated_at: at,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn capacity_target(&self) -> CapacityTarget {
        CapacityTarget::Group(self.group_id)
    }
}

/// Append-only audit of final grade writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeHistory {
    pub id: GradeHistoryId,
    pub record: RecordRef,
    pub previous: Option<f32>,
    pub grade: f32,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExamPeriodStatus {
    Planeado,
    Abierto,
    Cerrado,
    EnProceso,
    Finalizado,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPeriod {
    pub id: ExamPeriodId,
    pub nombre: String,
    pub fecha_inscripcion_inicio: DateTime<Utc>,
    pub fecha_inscripcion_fin: DateTime<Utc>,
    pub fecha_inicio_examen: NaiveDate,
    pub fecha_fin_examen: NaiveDate,
    pub estatus: ExamPeriodStatus,
    pub cupo_actual: u32,
    pub cupo_maximo: u32,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamRegistration {
    pub id: ExamRegistrationId,
    pub student_id: StudentId,
    pub exam_period_id: ExamPeriodId,
    pub status: EnrollmentStatus,
    pub calificacion_final: Option<f32>,
    pub aprobado: bool,
    pub registered_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl ExamRegistration {
    pub fn capacity_target(&self) -> CapacityTarget {
        CapacityTarget::ExamPeriod(self.exam_period_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CourseType {
    Ingles,
    Otro,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialCourse {
    pub id: SpecialCourseId,
    pub student_id: StudentId,
    pub group_id: Option<GroupId>,
    pub course_type: CourseType,
    pub level: u8,
    pub requiere_pago: bool,
    pub pago_aprobado: bool,
    pub status: EnrollmentStatus,
    pub calificacion_final: Option<f32>,
    pub aprobado: bool,
    pub requested_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl SpecialCourse {
    /// Auto-created by a diagnostic exam pass rather than taken as a course.
    pub fn completado_por_diagnostico(&self) -> bool {
        self.group_id.is_none()
            && !self.requiere_pago
            && self.status == EnrollmentStatus::Aprobado
            && self.course_type == CourseType::Ingles
    }

    pub fn payment_pending(&self) -> bool {
        self.requiere_pago && !self.pago_aprobado
    }

    pub fn capacity_target(&self) -> Option<CapacityTarget> {
        self.group_id.map(CapacityTarget::Group)
    }
}

/// Any record driven by the enrollment lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum RecordRef {
    Enrollment(EnrollmentId),
    SpecialCourse(SpecialCourseId),
    ExamRegistration(ExamRegistrationId),
}

impl fmt::Display for RecordRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::Enrollment(id) => write!(f, "enrollment {id}"),
            RecordRef::SpecialCourse(id) => write!(f, "special course {id}"),
            RecordRef::ExamRegistration(id) => write!(f, "exam registration {id}"),
        }
    }
}
