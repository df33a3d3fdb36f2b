use std::sync::Arc;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;
use tracing::{info, warn};

use super::capacity::{self, CapacityError, CapacityTarget, CapacityTicket};
use super::domain::{
    Career, CareerId, CourseType, CreditCounters, EnglishProfile, Enrollment, EnrollmentId,
    EnrollmentStatus, ExamPeriod, ExamPeriodId, ExamPeriodStatus, ExamRegistration,
    ExamRegistrationId, GradeHistory, GradeHistoryId, Group, GroupId, Prerequisite, RecordRef,
    Role, SpecialCourse, SpecialCourseId, Student, StudentId, StudentStatus, Subject, SubjectId,
    Teacher, TeacherId, User, UserId,
};
use super::eligibility::{
    EligibilityCheck, EligibilityConfig, EligibilityEvaluator, EligibilityOutcome,
    EnrollmentTarget, ExamPeriodAvailability, RequirementProgress, StudentSnapshot,
};
use super::lifecycle::{EnrollmentStateMachine, Lifecycle, TransitionError, TransitionPlan};
use super::matricula::next_matricula;
use super::purge::{purge_tables, PurgeError, PurgeReport};
use super::reporting::{self, OccupancyReport};
use super::repository::{EntityStore, RepositoryError};
use super::requests::{
    AttendanceRequest, DiagnosticPass, EligibilityQuery, EnglishCourseRequest,
    EnrollmentRequest, ExamPeriodStatusUpdate, ExamRegistrationRequest, FinalGradeRequest,
    NewCareer, NewExamPeriod, NewGroup, NewPrerequisite, NewStudent, NewSubject, NewTeacher,
    PartialGradeRequest, StudentStatusUpdate, TransitionRequest,
};
use super::roster::{SeedPlan, SeedReport};
use super::tables::Tables;
use super::validation::{self, ValidationError};

/// Source of "now" for registration windows and timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

/// A created record together with the slot it holds and the checks that admitted it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentReceipt<T> {
    pub record: T,
    pub capacity: Option<CapacityTicket>,
    pub checks: Vec<EligibilityCheck>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum LifecycleRecord {
    Enrollment(Enrollment),
    SpecialCourse(SpecialCourse),
    ExamRegistration(ExamRegistration),
}

impl LifecycleRecord {
    pub fn status(&self) -> EnrollmentStatus {
        match self {
            LifecycleRecord::Enrollment(row) => row.status,
            LifecycleRecord::SpecialCourse(row) => row.status,
            LifecycleRecord::ExamRegistration(row) => row.status,
        }
    }

    pub fn aprobado(&self) -> bool {
        match self {
            LifecycleRecord::Enrollment(row) => row.aprobado,
            LifecycleRecord::SpecialCourse(row) => row.aprobado,
            LifecycleRecord::ExamRegistration(row) => row.aprobado,
        }
    }

    pub fn final_grade(&self) -> Option<f32> {
        match self {
            LifecycleRecord::Enrollment(row) => row.calificacion_final,
            LifecycleRecord::SpecialCourse(row) => row.calificacion_final,
            LifecycleRecord::ExamRegistration(row) => row.calificacion_final,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionReceipt {
    pub record: LifecycleRecord,
    pub plan: TransitionPlan,
}

#[derive(Debug, Clone, Copy)]
enum Change {
    Status {
        to: EnrollmentStatus,
        grade: Option<f32>,
    },
    FinalGrade(f32),
}

/// Coordinates eligibility, capacity and lifecycle rules over one store.
///
/// Every mutating operation is a single store transaction: either all of
/// its writes commit or none do.
pub struct EnrollmentService<S> {
    store: Arc<S>,
    evaluator: EligibilityEvaluator,
    lifecycle: EnrollmentStateMachine,
    clock: Arc<dyn Clock>,
}

impl<S> EnrollmentService<S>
where
    S: EntityStore + 'static,
{
    pub fn new(store: Arc<S>, config: EligibilityConfig) -> Self {
        Self::with_clock(store, config, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<S>, config: EligibilityConfig, clock: Arc<dyn Clock>) -> Self {
        let lifecycle = EnrollmentStateMachine::new(config.passing_grade);
        Self {
            store,
            evaluator: EligibilityEvaluator::new(config),
            lifecycle,
            clock,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn evaluator(&self) -> &EligibilityEvaluator {
        &self.evaluator
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Create the login and the student record, with a freshly issued matricula.
    pub fn register_student(&self, request: NewStudent) -> Result<Student, EnrollmentServiceError> {
        let now = self.now();
        let student = self
            .store
            .transaction(|tables| self.insert_student(tables, &request, now))?;
        info!(matricula = %student.matricula, student_id = %student.id, "student registered");
        Ok(student)
    }

    pub fn register_teacher(&self, request: NewTeacher) -> Result<Teacher, EnrollmentServiceError> {
        let now = self.now();
        let teacher = self
            .store
            .transaction(|tables| self.insert_teacher(tables, &request, now))?;
        info!(numero_empleado = %teacher.numero_empleado, "teacher registered");
        Ok(teacher)
    }

    pub fn create_career(&self, request: NewCareer) -> Result<Career, EnrollmentServiceError> {
        let career = Career {
            id: CareerId::new(),
            clave: validation::non_empty("clave", &request.clave)?,
            nombre: validation::non_empty("nombre", &request.nombre)?,
        };
        self.store.transaction(|tables| {
            tables.insert_career(career.clone())?;
            Ok::<_, EnrollmentServiceError>(())
        })?;
        Ok(career)
    }

    pub fn create_subject(&self, request: NewSubject) -> Result<Subject, EnrollmentServiceError> {
        let subject = Subject {
            id: SubjectId::new(),
            clave: validation::non_empty("clave", &request.clave)?,
            nombre: validation::non_empty("nombre", &request.nombre)?,
            creditos: request.creditos,
            semestre: validation::semester(request.semestre)?,
            career_id: request.career_id,
        };
        self.store.transaction(|tables| {
            tables.insert_subject(subject.clone())?;
            Ok::<_, EnrollmentServiceError>(())
        })?;
        Ok(subject)
    }

    pub fn add_prerequisite(
        &self,
        subject_id: SubjectId,
        request: NewPrerequisite,
    ) -> Result<Prerequisite, EnrollmentServiceError> {
        if subject_id == request.required_subject_id {
            return Err(ValidationError::SelfPrerequisite.into());
        }
        let link = Prerequisite {
            subject_id,
            required_subject_id: request.required_subject_id,
        };
        self.store.transaction(|tables| {
            tables.insert_prerequisite(link)?;
            Ok::<_, EnrollmentServiceError>(())
        })?;
        Ok(link)
    }

    pub fn create_group(&self, request: NewGroup) -> Result<Group, EnrollmentServiceError> {
        validation::capacity_bounds(request.cupo_minimo, request.cupo_maximo)?;
        if let Some(info) = &request.english {
            validation::english_level(info.level)?;
            validation::window(
                "registration",
                &info.registration_start,
                &info.registration_end,
            )?;
        }

        let group = Group {
            id: GroupId::new(),
            subject_id: request.subject_id,
            teacher_id: request.teacher_id,
            period: request.period,
            clave: validation::non_empty("clave", &request.clave)?,
            modality: request.modality,
            cupo_minimo: request.cupo_minimo,
            cupo_actual: 0,
            cupo_maximo: request.cupo_maximo,
            english: request.english,
            deleted_at: None,
        };
        self.store.transaction(|tables| {
            tables.insert_group(group.clone())?;
            Ok::<_, EnrollmentServiceError>(())
        })?;
        info!(group_id = %group.id, clave = %group.clave, period = %group.period, "group created");
        Ok(group)
    }

    pub fn create_exam_period(
        &self,
        request: NewExamPeriod,
    ) -> Result<ExamPeriod, EnrollmentServiceError> {
        validation::window(
            "registration",
            &request.fecha_inscripcion_inicio,
            &request.fecha_inscripcion_fin,
        )?;
        validation::window(
            "exam",
            &request.fecha_inicio_examen,
            &request.fecha_fin_examen,
        )?;
        validation::capacity_bounds(0, request.cupo_maximo)?;

        let period = ExamPeriod {
            id: ExamPeriodId::new(),
            nombre: validation::non_empty("nombre", &request.nombre)?,
            fecha_inscripcion_inicio: request.fecha_inscripcion_inicio,
            fecha_inscripcion_fin: request.fecha_inscripcion_fin,
            fecha_inicio_examen: request.fecha_inicio_examen,
            fecha_fin_examen: request.fecha_fin_examen,
            estatus: request.estatus.unwrap_or(ExamPeriodStatus::Planeado),
            cupo_actual: 0,
            cupo_maximo: request.cupo_maximo,
            deleted_at: None,
        };
        self.store.transaction(|tables| {
            tables.insert_exam_period(period.clone())?;
            Ok::<_, EnrollmentServiceError>(())
        })?;
        Ok(period)
    }

    pub fn update_exam_period_status(
        &self,
        exam_period_id: ExamPeriodId,
        update: ExamPeriodStatusUpdate,
    ) -> Result<ExamPeriod, EnrollmentServiceError> {
        self.store.transaction(|tables| {
            let period = tables.exam_period_mut(&exam_period_id)?;
            if period.deleted_at.is_some() {
                return Err(RepositoryError::not_found("exam period", exam_period_id).into());
            }
            period.estatus = update.estatus;
            Ok(period.clone())
        })
    }

    pub fn delete_exam_period(
        &self,
        exam_period_id: ExamPeriodId,
    ) -> Result<ExamPeriod, EnrollmentServiceError> {
        let now = self.now();
        self.store.transaction(|tables| {
            let period = tables.exam_period_mut(&exam_period_id)?;
            if period.deleted_at.is_some() {
                return Err(RepositoryError::not_found("exam period", exam_period_id).into());
            }
            period.deleted_at = Some(now);
            Ok(period.clone())
        })
    }

    /// Enroll a student in a group: eligibility, reservation and insert in one unit.
    pub fn enroll(
        &self,
        request: EnrollmentRequest,
    ) -> Result<EnrollmentReceipt<Enrollment>, EnrollmentServiceError> {
        let now = self.now();
        let receipt = self.store.transaction(|tables| {
            live_group(tables, &request.group_id)?;
            let outcome = self.evaluate_in(
                tables,
                &request.student_id,
                EnrollmentTarget::for_group(tables, &request.group_id, now)?,
            )?;

            let ticket = capacity::reserve(tables, CapacityTarget::Group(request.group_id))?;
            let enrollment = Enrollment::new(request.student_id, request.group_id, now);
            tables
                .insert_enrollment(enrollment.clone())
                .map_err(duplicate_pair)?;

            Ok::<_, EnrollmentServiceError>(EnrollmentReceipt {
                record: enrollment,
                capacity: Some(ticket),
                checks: outcome.checks,
            })
        })?;

        info!(
            enrollment_id = %receipt.record.id,
            student_id = %request.student_id,
            group_id = %request.group_id,
            "enrollment created"
        );
        Ok(receipt)
    }

    /// Request an English course at the student's current level.
    pub fn request_english_course(
        &self,
        request: EnglishCourseRequest,
    ) -> Result<EnrollmentReceipt<SpecialCourse>, EnrollmentServiceError> {
        validation::english_level(request.level)?;
        let now = self.now();
        let receipt = self.store.transaction(|tables| {
            if let Some(group_id) = &request.group_id {
                let group = live_group(tables, group_id)?;
                match group.english_level() {
                    Some(level) if level == request.level => {}
                    Some(level) => {
                        return Err(ValidationError::GroupLevelMismatch {
                            group_level: level,
                            requested: request.level,
                        }
                        .into())
                    }
                    None => return Err(ValidationError::NotAnEnglishGroup.into()),
                }
            }

            let outcome = self.evaluate_in(
                tables,
                &request.student_id,
                EnrollmentTarget::EnglishCourse {
                    level: request.level,
                    group_id: request.group_id,
                },
            )?;

            let ticket = match request.group_id {
                Some(group_id) => Some(capacity::reserve(tables, CapacityTarget::Group(group_id))?),
                None => None,
            };
            let course = SpecialCourse {
                id: SpecialCourseId::new(),
                student_id: request.student_id,
                group_id: request.group_id,
                course_type: CourseType::Ingles,
                level: request.level,
                requiere_pago: request.requiere_pago,
                pago_aprobado: false,
                status: EnrollmentStatus::Inscrito,
                calificacion_final: None,
                aprobado: false,
                requested_at: now,
                deleted_at: None,
            };
            tables.insert_special_course(course.clone())?;

            Ok::<_, EnrollmentServiceError>(EnrollmentReceipt {
                record: course,
                capacity: ticket,
                checks: outcome.checks,
            })
        })?;

        info!(
            special_course_id = %receipt.record.id,
            student_id = %request.student_id,
            level = request.level,
            "English course requested"
        );
        Ok(receipt)
    }

    /// Record a passed placement exam as an approved course with no group and no payment.
    pub fn grant_diagnostic_pass(
        &self,
        request: DiagnosticPass,
    ) -> Result<EnrollmentReceipt<SpecialCourse>, EnrollmentServiceError> {
        validation::english_level(request.level)?;
        let grade = validation::grade(request.calificacion_final)?;
        if grade < self.lifecycle.passing_grade() {
            return Err(TransitionError::BelowPassing {
                grade,
                passing: self.lifecycle.passing_grade(),
            }
            .into());
        }

        let now = self.now();
        let receipt = self.store.transaction(|tables| {
            let outcome = self.evaluate_in(
                tables,
                &request.student_id,
                EnrollmentTarget::EnglishCourse {
                    level: request.level,
                    group_id: None,
                },
            )?;

            let course = SpecialCourse {
                id: SpecialCourseId::new(),
                student_id: request.student_id,
                group_id: None,
                course_type: CourseType::Ingles,
                level: request.level,
                requiere_pago: false,
                pago_aprobado: false,
                status: EnrollmentStatus::Aprobado,
                calificacion_final: Some(grade),
                aprobado: true,
                requested_at: now,
                deleted_at: None,
            };
            tables.insert_special_course(course.clone())?;
            tables.insert_grade_history(GradeHistory {
                id: GradeHistoryId::new(),
                record: RecordRef::SpecialCourse(course.id),
                previous: None,
                grade,
                recorded_at: now,
            })?;
            self.refresh_english_profile(tables, &request.student_id)?;

            Ok::<_, EnrollmentServiceError>(EnrollmentReceipt {
                record: course,
                capacity: None,
                checks: outcome.checks,
            })
        })?;

        info!(
            student_id = %request.student_id,
            level = request.level,
            "diagnostic pass granted"
        );
        Ok(receipt)
    }

    pub fn approve_payment(
        &self,
        special_course_id: SpecialCourseId,
    ) -> Result<SpecialCourse, EnrollmentServiceError> {
        self.store.transaction(|tables| {
            let course = tables.special_course_mut(&special_course_id)?;
            if course.deleted_at.is_some() {
                return Err(RepositoryError::not_found("special course", special_course_id).into());
            }
            if !course.requiere_pago {
                return Err(TransitionError::PaymentNotRequired.into());
            }
            if course.status.is_terminal() {
                return Err(TransitionError::PaymentAfterClose(course.status).into());
            }
            course.pago_aprobado = true;
            Ok(course.clone())
        })
    }

    pub fn register_for_exam(
        &self,
        request: ExamRegistrationRequest,
    ) -> Result<EnrollmentReceipt<ExamRegistration>, EnrollmentServiceError> {
        let now = self.now();
        let receipt = self.store.transaction(|tables| {
            let outcome = self.evaluate_in(
                tables,
                &request.student_id,
                EnrollmentTarget::for_exam_period(tables, &request.exam_period_id, now)?,
            )?;

            let ticket =
                capacity::reserve(tables, CapacityTarget::ExamPeriod(request.exam_period_id))?;
            let registration = ExamRegistration {
                id: ExamRegistrationId::new(),
                student_id: request.student_id,
                exam_period_id: request.exam_period_id,
                status: EnrollmentStatus::Inscrito,
                calificacion_final: None,
                aprobado: false,
                registered_at: now,
                deleted_at: None,
            };
            tables.insert_exam_registration(registration.clone())?;

            Ok::<_, EnrollmentServiceError>(EnrollmentReceipt {
                record: registration,
                capacity: Some(ticket),
                checks: outcome.checks,
            })
        })?;

        info!(
            exam_registration_id = %receipt.record.id,
            exam_period_id = %request.exam_period_id,
            "exam registration created"
        );
        Ok(receipt)
    }

    /// Move a record to a new status, releasing its slot when it leaves without approval.
    pub fn transition(
        &self,
        record: RecordRef,
        request: TransitionRequest,
    ) -> Result<TransitionReceipt, EnrollmentServiceError> {
        let grade = request.calificacion_final.map(validation::grade).transpose()?;
        self.change(
            record,
            Change::Status {
                to: request.status,
                grade,
            },
        )
    }

    /// Write the final grade of an EN_CURSO record; the grade decides APROBADO or REPROBADO.
    pub fn record_final_grade(
        &self,
        record: RecordRef,
        request: FinalGradeRequest,
    ) -> Result<TransitionReceipt, EnrollmentServiceError> {
        let grade = validation::grade(request.calificacion_final)?;
        self.change(record, Change::FinalGrade(grade))
    }

    pub fn record_partial_grade(
        &self,
        enrollment_id: EnrollmentId,
        request: PartialGradeRequest,
    ) -> Result<Enrollment, EnrollmentServiceError> {
        if !(1..=3).contains(&request.parcial) {
            return Err(ValidationError::PartialIndex(request.parcial).into());
        }
        let grade = validation::grade(request.calificacion)?;
        let now = self.now();

        self.store.transaction(|tables| {
            let enrollment = live_enrollment_mut(tables, &enrollment_id)?;
            if enrollment.status.is_terminal() {
                return Err(TransitionError::NotInProgress(enrollment.status).into());
            }
            enrollment.parciales[usize::from(request.parcial - 1)] = Some(grade);
            enrollment.updated_at = now;
            Ok(enrollment.clone())
        })
    }

    pub fn record_attendance(
        &self,
        enrollment_id: EnrollmentId,
        request: AttendanceRequest,
    ) -> Result<Enrollment, EnrollmentServiceError> {
        let now = self.now();
        self.store.transaction(|tables| {
            let enrollment = live_enrollment_mut(tables, &enrollment_id)?;
            enrollment.attendance.asistencias = request.asistencias;
            enrollment.attendance.faltas = request.faltas;
            enrollment.attendance.retardos = request.retardos;
            enrollment.porcentaje_asistencia = enrollment.attendance.percentage();
            enrollment.updated_at = now;
            Ok::<_, EnrollmentServiceError>(enrollment.clone())
        })
    }

    /// Soft-delete a record, giving back its slot if it still held one.
    pub fn delete_record(&self, record: RecordRef) -> Result<LifecycleRecord, EnrollmentServiceError> {
        let now = self.now();
        let deleted = self.store.transaction(|tables| {
            let (status, target) = match record {
                RecordRef::Enrollment(id) => row_state(tables.enrollment(&id)?, record)?,
                RecordRef::SpecialCourse(id) => row_state(tables.special_course(&id)?, record)?,
                RecordRef::ExamRegistration(id) => {
                    row_state(tables.exam_registration(&id)?, record)?
                }
            };
            if status.holds_capacity() {
                if let Some(target) = target {
                    capacity::release(tables, target)?;
                }
            }

            let view = match record {
                RecordRef::Enrollment(id) => {
                    let row = tables.enrollment_mut(&id)?;
                    row.soft_delete(now);
                    LifecycleRecord::Enrollment(row.clone())
                }
                RecordRef::SpecialCourse(id) => {
                    let row = tables.special_course_mut(&id)?;
                    row.soft_delete(now);
                    LifecycleRecord::SpecialCourse(row.clone())
                }
                RecordRef::ExamRegistration(id) => {
                    let row = tables.exam_registration_mut(&id)?;
                    row.soft_delete(now);
                    LifecycleRecord::ExamRegistration(row.clone())
                }
            };
            Ok::<_, EnrollmentServiceError>(view)
        })?;

        info!(%record, "record deleted");
        Ok(deleted)
    }

    pub fn set_student_status(
        &self,
        student_id: StudentId,
        update: StudentStatusUpdate,
    ) -> Result<Student, EnrollmentServiceError> {
        self.store.transaction(|tables| {
            let student = tables.student_mut(&student_id)?;
            if student.is_deleted() {
                return Err(RepositoryError::not_found("student", student_id).into());
            }
            student.status = update.status;
            Ok(student.clone())
        })
    }

    /// Soft-delete a student and disable their login. Rejected while any
    /// record still holds a slot.
    pub fn deactivate_student(&self, student_id: StudentId) -> Result<Student, EnrollmentServiceError> {
        let now = self.now();
        let student = self.store.transaction(|tables| {
            let student = tables.student(&student_id)?;
            if student.is_deleted() {
                return Err(RepositoryError::not_found("student", student_id).into());
            }

            let open = open_records_for_student(tables, &student_id);
            if open > 0 {
                return Err(EnrollmentServiceError::ReferentialIntegrity(format!(
                    "student {} has {open} open record(s)",
                    student.matricula
                )));
            }

            let user_id = student.user_id;
            let student = tables.student_mut(&student_id)?;
            student.deleted_at = Some(now);
            student.status = StudentStatus::Inactivo;
            let snapshot = student.clone();
            if let Some(user) = tables.users.get_mut(&user_id) {
                user.active = false;
            }
            Ok(snapshot)
        })?;

        info!(matricula = %student.matricula, "student deactivated");
        Ok(student)
    }

    /// Hard-delete a subject nothing refers to.
    pub fn delete_subject(&self, subject_id: SubjectId) -> Result<Subject, EnrollmentServiceError> {
        self.store.transaction(|tables| {
            let subject = tables.subject(&subject_id)?.clone();
            let groups = tables
                .groups
                .values()
                .filter(|group| group.subject_id == subject_id)
                .count();
            if groups > 0 {
                return Err(EnrollmentServiceError::ReferentialIntegrity(format!(
                    "subject {} is taught by {groups} group(s)",
                    subject.clave
                )));
            }
            let links = tables
                .prerequisites
                .iter()
                .filter(|link| {
                    link.subject_id == subject_id || link.required_subject_id == subject_id
                })
                .count();
            if links > 0 {
                return Err(EnrollmentServiceError::ReferentialIntegrity(format!(
                    "subject {} appears in {links} prerequisite link(s)",
                    subject.clave
                )));
            }

            tables.subjects.remove(&subject_id);
            Ok(subject)
        })
    }

    pub fn delete_group(&self, group_id: GroupId) -> Result<Group, EnrollmentServiceError> {
        let now = self.now();
        self.store.transaction(|tables| {
            live_group(tables, &group_id)?;
            let open = open_records_for_group(tables, &group_id);
            if open > 0 {
                return Err(EnrollmentServiceError::ReferentialIntegrity(format!(
                    "group {group_id} has {open} open record(s)"
                )));
            }
            let group = tables.group_mut(&group_id)?;
            group.deleted_at = Some(now);
            Ok(group.clone())
        })
    }

    /// Remove everything except the protected admin login, in one unit.
    pub fn purge(&self) -> Result<PurgeReport, EnrollmentServiceError> {
        let report = self
            .store
            .transaction(|tables| purge_tables(tables).map_err(EnrollmentServiceError::from))?;
        warn!(removed = report.total_removed(), "store purged");
        Ok(report)
    }

    /// Create whatever in `plan` does not exist yet; existing usernames and claves are skipped.
    pub fn seed(&self, plan: &SeedPlan) -> Result<SeedReport, EnrollmentServiceError> {
        let now = self.now();
        let report = self.store.transaction(|tables| {
            let mut report = SeedReport::default();

            if tables.user_by_username(&plan.admin.username).is_some() {
                report.skipped.push(format!("user {}", plan.admin.username));
            } else {
                tables.insert_user(User {
                    id: UserId::new(),
                    username: validation::non_empty("username", &plan.admin.username)?,
                    password_digest: plan.admin.password_digest.clone(),
                    role: Role::Admin,
                    active: true,
                    created_at: now,
                })?;
                report.created.push(format!("user {}", plan.admin.username));
            }

            for career in &plan.careers {
                if tables.career_by_clave(&career.clave).is_some() {
                    report.skipped.push(format!("career {}", career.clave));
                    continue;
                }
                tables.insert_career(Career {
                    id: CareerId::new(),
                    clave: validation::non_empty("clave", &career.clave)?,
                    nombre: validation::non_empty("nombre", &career.nombre)?,
                })?;
                report.created.push(format!("career {}", career.clave));
            }

            for teacher in &plan.teachers {
                if tables.user_by_username(&teacher.username).is_some() {
                    report.skipped.push(format!("user {}", teacher.username));
                    continue;
                }
                self.insert_teacher(tables, teacher, now)?;
                report.created.push(format!("user {}", teacher.username));
            }

            for entry in &plan.students {
                if tables.user_by_username(&entry.username).is_some() {
                    report.skipped.push(format!("user {}", entry.username));
                    continue;
                }
                let career_id = tables
                    .career_by_clave(&entry.career_clave)
                    .map(|career| career.id)
                    .ok_or_else(|| RepositoryError::ForeignKey {
                        entity: "student",
                        reference: "career",
                        id: entry.career_clave.clone(),
                    })?;
                let student = self.insert_student(tables, &entry.to_request(career_id), now)?;
                report
                    .created
                    .push(format!("user {} ({})", entry.username, student.matricula));
            }

            Ok::<_, EnrollmentServiceError>(report)
        })?;

        info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            "seed applied"
        );
        Ok(report)
    }

    /// Dry-run evaluation; nothing is written.
    pub fn check_eligibility(
        &self,
        student_id: StudentId,
        query: EligibilityQuery,
    ) -> Result<EligibilityOutcome, EnrollmentServiceError> {
        let now = self.now();
        self.store.read(|tables| {
            let snapshot = StudentSnapshot::collect(tables, &student_id)?;
            let target = match (query.group_id, query.level, query.exam_period_id) {
                (Some(group_id), None, None) => EnrollmentTarget::for_group(tables, &group_id, now)?,
                (None, Some(level), None) => {
                    validation::english_level(level)?;
                    EnrollmentTarget::EnglishCourse {
                        level,
                        group_id: None,
                    }
                }
                (None, None, Some(exam_period_id)) => {
                    EnrollmentTarget::for_exam_period(tables, &exam_period_id, now)?
                }
                _ => return Err(ValidationError::EligibilityTarget.into()),
            };
            Ok::<_, EnrollmentServiceError>(self.evaluator.evaluate(&snapshot, &target))
        })?
    }

    pub fn exam_period_availability(
        &self,
        exam_period_id: ExamPeriodId,
    ) -> Result<ExamPeriodAvailability, EnrollmentServiceError> {
        let now = self.now();
        let availability = self.store.read(|tables| {
            tables
                .exam_period(&exam_period_id)
                .map(|period| ExamPeriodAvailability::assess(period, now))
        })??;
        Ok(availability)
    }

    pub fn english_progress(
        &self,
        student_id: StudentId,
    ) -> Result<RequirementProgress, EnrollmentServiceError> {
        let snapshot = self
            .store
            .read(|tables| StudentSnapshot::collect(tables, &student_id))??;
        Ok(self.evaluator.requirement(&snapshot))
    }

    /// Occupancy, exam availability and English progress from one consistent read.
    pub fn occupancy_report(&self) -> Result<OccupancyReport, EnrollmentServiceError> {
        let now = self.now();
        let report = self
            .store
            .read(|tables| reporting::occupancy_report(tables, &self.evaluator, now))??;
        Ok(report)
    }

    pub fn student(&self, student_id: StudentId) -> Result<Student, EnrollmentServiceError> {
        let student = self
            .store
            .read(|tables| tables.student(&student_id).cloned())??;
        Ok(student)
    }

    pub fn group(&self, group_id: GroupId) -> Result<Group, EnrollmentServiceError> {
        let group = self.store.read(|tables| tables.group(&group_id).cloned())??;
        Ok(group)
    }

    pub fn record(&self, record: RecordRef) -> Result<LifecycleRecord, EnrollmentServiceError> {
        let view = self.store.read(|tables| match record {
            RecordRef::Enrollment(id) => tables
                .enrollment(&id)
                .cloned()
                .map(LifecycleRecord::Enrollment),
            RecordRef::SpecialCourse(id) => tables
                .special_course(&id)
                .cloned()
                .map(LifecycleRecord::SpecialCourse),
            RecordRef::ExamRegistration(id) => tables
                .exam_registration(&id)
                .cloned()
                .map(LifecycleRecord::ExamRegistration),
        })??;
        Ok(view)
    }

    /// Run a read-only query against a consistent view of the tables.
    pub fn query<T, F>(&self, query: F) -> Result<T, EnrollmentServiceError>
    where
        F: FnOnce(&Tables) -> Result<T, ValidationError>,
    {
        let result = self.store.read(query)??;
        Ok(result)
    }

    fn evaluate_in(
        &self,
        tables: &Tables,
        student_id: &StudentId,
        target: EnrollmentTarget,
    ) -> Result<EligibilityOutcome, EnrollmentServiceError> {
        let student = tables.student(student_id)?;
        if student.is_deleted() {
            return Err(RepositoryError::not_found("student", student_id).into());
        }

        let snapshot = StudentSnapshot::collect(tables, student_id)?;
        let outcome = self.evaluator.evaluate(&snapshot, &target);
        match outcome.denial() {
            None => Ok(outcome),
            Some(reason) => {
                let message = reason.summary();
                warn!(student_id = %student_id, reason = %message, "enrollment denied");
                if reason.is_duplicate() {
                    Err(EnrollmentServiceError::DuplicateEnrollment {
                        message,
                        checks: outcome.checks,
                    })
                } else {
                    Err(EnrollmentServiceError::Denied(Box::new(outcome)))
                }
            }
        }
    }

    fn change(
        &self,
        record: RecordRef,
        change: Change,
    ) -> Result<TransitionReceipt, EnrollmentServiceError> {
        let now = self.now();
        let receipt = self.store.transaction(|tables| {
            let (plan, target, previous) = match record {
                RecordRef::Enrollment(id) => {
                    self.plan_change(tables.enrollment(&id)?, record, change)?
                }
                RecordRef::SpecialCourse(id) => {
                    let course = tables.special_course(&id)?;
                    let entering_course = matches!(
                        change,
                        Change::Status {
                            to: EnrollmentStatus::EnCurso,
                            ..
                        }
                    );
                    if entering_course && course.payment_pending() {
                        return Err(TransitionError::PaymentPending.into());
                    }
                    self.plan_change(course, record, change)?
                }
                RecordRef::ExamRegistration(id) => {
                    self.plan_change(tables.exam_registration(&id)?, record, change)?
                }
            };

            if plan.release_capacity {
                if let Some(target) = target {
                    capacity::release(tables, target)?;
                }
            }

            let row: &mut dyn Lifecycle = match record {
                RecordRef::Enrollment(id) => tables.enrollment_mut(&id)? as &mut dyn Lifecycle,
                RecordRef::SpecialCourse(id) => {
                    tables.special_course_mut(&id)? as &mut dyn Lifecycle
                }
                RecordRef::ExamRegistration(id) => {
                    tables.exam_registration_mut(&id)? as &mut dyn Lifecycle
                }
            };
            row.apply_plan(&plan, now);
            let student_id = row.student_id();

            if let Some(grade) = plan.final_grade {
                tables.insert_grade_history(GradeHistory {
                    id: GradeHistoryId::new(),
                    record,
                    previous,
                    grade,
                    recorded_at: now,
                })?;
            }
            self.apply_completion(tables, record, &plan, &student_id)?;

            let view = match record {
                RecordRef::Enrollment(id) => {
                    LifecycleRecord::Enrollment(tables.enrollment(&id)?.clone())
                }
                RecordRef::SpecialCourse(id) => {
                    LifecycleRecord::SpecialCourse(tables.special_course(&id)?.clone())
                }
                RecordRef::ExamRegistration(id) => {
                    LifecycleRecord::ExamRegistration(tables.exam_registration(&id)?.clone())
                }
            };
            Ok::<_, EnrollmentServiceError>(TransitionReceipt { record: view, plan })
        })?;

        info!(
            %record,
            from = %receipt.plan.from,
            to = %receipt.plan.to,
            released = receipt.plan.release_capacity,
            "status changed"
        );
        Ok(receipt)
    }

    fn plan_change<R: Lifecycle>(
        &self,
        row: &R,
        record: RecordRef,
        change: Change,
    ) -> Result<(TransitionPlan, Option<CapacityTarget>, Option<f32>), EnrollmentServiceError> {
        if row.is_deleted() {
            return Err(RepositoryError::not_found("record", record).into());
        }
        let plan = match change {
            Change::Status { to, grade } => self.lifecycle.plan(row.status(), to, grade)?,
            Change::FinalGrade(grade) => self.lifecycle.plan_final_grade(row.status(), grade)?,
        };
        Ok((plan, row.ledger_target(), row.final_grade()))
    }

    /// Credit counters for regular subjects, English progress for English levels.
    fn apply_completion(
        &self,
        tables: &mut Tables,
        record: RecordRef,
        plan: &TransitionPlan,
        student_id: &StudentId,
    ) -> Result<(), EnrollmentServiceError> {
        if !matches!(plan.to, EnrollmentStatus::Aprobado | EnrollmentStatus::Reprobado) {
            return Ok(());
        }

        let english = match record {
            RecordRef::Enrollment(id) => {
                let group_id = tables.enrollment(&id)?.group_id;
                let group = tables.group(&group_id)?;
                if group.english.is_none() {
                    let creditos = tables.subject(&group.subject_id)?.creditos;
                    let student = tables.student_mut(student_id)?;
                    add_credits(&mut student.credits, creditos, plan.aprobado);
                    false
                } else {
                    true
                }
            }
            RecordRef::SpecialCourse(id) => {
                tables.special_course(&id)?.course_type == CourseType::Ingles
            }
            RecordRef::ExamRegistration(_) => false,
        };

        if english && plan.aprobado {
            self.refresh_english_profile(tables, student_id)?;
        }
        Ok(())
    }

    fn refresh_english_profile(
        &self,
        tables: &mut Tables,
        student_id: &StudentId,
    ) -> Result<(), RepositoryError> {
        let snapshot = StudentSnapshot::collect(tables, student_id)?;
        let progress = self.evaluator.requirement(&snapshot);
        let top_level = self.evaluator.config().english_levels;

        let student = tables.student_mut(student_id)?;
        let highest = progress.approved_levels.last().copied();
        let next = highest.map(|level| (level + 1).min(top_level));
        let current = student.english.current_level;
        student.english = EnglishProfile {
            current_level: current.max(next),
            average_score: progress.average,
            certified_level: highest,
        };
        Ok(())
    }

    fn insert_student(
        &self,
        tables: &mut Tables,
        request: &NewStudent,
        now: DateTime<Utc>,
    ) -> Result<Student, EnrollmentServiceError> {
        let username = validation::non_empty("username", &request.username)?;
        let nombre = validation::non_empty("nombre", &request.nombre)?;
        let apellido_paterno = validation::non_empty("apellidoPaterno", &request.apellido_paterno)?;
        let curp = request.curp.as_deref().map(validation::curp).transpose()?;
        let semester = validation::semester(request.semester)?;
        let english_level = request
            .english_level
            .map(validation::english_level)
            .transpose()?;
        let year = request.enrollment_year.unwrap_or_else(|| now.year());

        let user = User {
            id: UserId::new(),
            username,
            password_digest: request.password_digest.clone(),
            role: Role::Student,
            active: true,
            created_at: now,
        };
        let student = Student {
            id: StudentId::new(),
            user_id: user.id,
            matricula: next_matricula(tables, year)?,
            nombre,
            apellido_paterno,
            apellido_materno: request
                .apellido_materno
                .as_deref()
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            curp,
            career_id: request.career_id,
            semester,
            status: StudentStatus::Activo,
            english: EnglishProfile {
                current_level: english_level,
                ..EnglishProfile::default()
            },
            credits: CreditCounters::default(),
            created_at: now,
            deleted_at: None,
        };

        tables.insert_user(user)?;
        tables.insert_student(student.clone())?;
        Ok(student)
    }

    fn insert_teacher(
        &self,
        tables: &mut Tables,
        request: &NewTeacher,
        now: DateTime<Utc>,
    ) -> Result<Teacher, EnrollmentServiceError> {
        let user = User {
            id: UserId::new(),
            username: validation::non_empty("username", &request.username)?,
            password_digest: request.password_digest.clone(),
            role: Role::Teacher,
            active: true,
            created_at: now,
        };
        let teacher = Teacher {
            id: TeacherId::new(),
            user_id: user.id,
            numero_empleado: validation::non_empty("numeroEmpleado", &request.numero_empleado)?,
            nombre: validation::non_empty("nombre", &request.nombre)?,
            apellido_paterno: validation::non_empty("apellidoPaterno", &request.apellido_paterno)?,
            apellido_materno: request.apellido_materno.clone(),
            departamento: request.departamento.clone(),
            deleted_at: None,
        };

        tables.insert_user(user)?;
        tables.insert_teacher(teacher.clone())?;
        Ok(teacher)
    }
}

fn add_credits(credits: &mut CreditCounters, creditos: u32, aprobado: bool) {
    credits.creditos_cursados += creditos;
    if aprobado {
        credits.creditos_aprobados += creditos;
    }
}

fn live_group<'a>(tables: &'a Tables, group_id: &GroupId) -> Result<&'a Group, RepositoryError> {
    let group = tables.group(group_id)?;
    if group.is_deleted() {
        return Err(RepositoryError::not_found("group", group_id));
    }
    Ok(group)
}

fn live_enrollment_mut<'a>(
    tables: &'a mut Tables,
    enrollment_id: &EnrollmentId,
) -> Result<&'a mut Enrollment, RepositoryError> {
    let enrollment = tables.enrollment_mut(enrollment_id)?;
    if enrollment.is_deleted() {
        return Err(RepositoryError::not_found("enrollment", enrollment_id));
    }
    Ok(enrollment)
}

fn row_state<R: Lifecycle>(
    row: &R,
    record: RecordRef,
) -> Result<(EnrollmentStatus, Option<CapacityTarget>), RepositoryError> {
    if row.is_deleted() {
        return Err(RepositoryError::not_found("record", record));
    }
    Ok((row.status(), row.ledger_target()))
}

fn open_records_for_student(tables: &Tables, student_id: &StudentId) -> usize {
    let enrollments = tables
        .enrollments
        .values()
        .filter(|row| &row.student_id == student_id && !row.is_deleted())
        .filter(|row| row.status.is_open())
        .count();
    let courses = tables
        .special_courses
        .values()
        .filter(|row| &row.student_id == student_id && row.deleted_at.is_none())
        .filter(|row| row.status.is_open())
        .count();
    let exams = tables
        .exam_registrations
        .values()
        .filter(|row| &row.student_id == student_id && row.deleted_at.is_none())
        .filter(|row| row.status.is_open())
        .count();
    enrollments + courses + exams
}

pub(crate) fn open_records_for_group(tables: &Tables, group_id: &GroupId) -> usize {
    count_group_rows(tables, group_id, EnrollmentStatus::is_open)
}

/// Rows whose slot is counted in the group's `cupo_actual`.
pub(crate) fn slots_held_in_group(tables: &Tables, group_id: &GroupId) -> usize {
    count_group_rows(tables, group_id, EnrollmentStatus::holds_capacity)
}

fn count_group_rows(
    tables: &Tables,
    group_id: &GroupId,
    counts: fn(EnrollmentStatus) -> bool,
) -> usize {
    let enrollments = tables
        .enrollments
        .values()
        .filter(|row| &row.group_id == group_id && !row.is_deleted())
        .filter(|row| counts(row.status))
        .count();
    let courses = tables
        .special_courses
        .values()
        .filter(|row| row.group_id.as_ref() == Some(group_id) && row.deleted_at.is_none())
        .filter(|row| counts(row.status))
        .count();
    enrollments + courses
}

fn duplicate_pair(error: RepositoryError) -> EnrollmentServiceError {
    match error {
        RepositoryError::Conflict { value, .. } => EnrollmentServiceError::DuplicateEnrollment {
            message: format!("an enrollment already exists for student, group {value}"),
            checks: Vec::new(),
        },
        other => other.into(),
    }
}

/// Error raised by the enrollment service.
#[derive(Debug, thiserror::Error)]
pub enum EnrollmentServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("enrollment denied: {}", .0.decision.summary())]
    Denied(Box<EligibilityOutcome>),
    #[error("{message}")]
    DuplicateEnrollment {
        message: String,
        checks: Vec<EligibilityCheck>,
    },
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("referential integrity: {0}")]
    ReferentialIntegrity(String),
    #[error(transparent)]
    Purge(#[from] PurgeError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl EnrollmentServiceError {
    /// Per-rule breakdown for denials, empty for every other failure.
    pub fn checks(&self) -> &[EligibilityCheck] {
        match self {
            EnrollmentServiceError::Denied(outcome) => &outcome.checks,
            EnrollmentServiceError::DuplicateEnrollment { checks, .. } => checks,
            _ => &[],
        }
    }
}
