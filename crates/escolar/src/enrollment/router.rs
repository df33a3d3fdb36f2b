use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use serde::Serialize;
use serde_json::json;

use super::capacity::CapacityError;
use super::domain::{
    EnrollmentId, ExamPeriodId, ExamRegistrationId, GroupId, RecordRef, SpecialCourseId,
    StudentId, SubjectId,
};
use super::extract::{Filters, Id, Payload};
use super::lifecycle::TransitionError;
use super::listing::{self, EnrollmentQuery, GroupQuery, StudentQuery};
use super::repository::{EntityStore, RepositoryError};
use super::requests::{
    AttendanceRequest, DiagnosticPass, EligibilityQuery, EnglishCourseRequest,
    EnrollmentRequest, ExamPeriodStatusUpdate, ExamRegistrationRequest, FinalGradeRequest,
    NewCareer, NewExamPeriod, NewGroup, NewPrerequisite, NewStudent, NewSubject, NewTeacher,
    PartialGradeRequest, StudentStatusUpdate, TransitionRequest,
};
use super::service::{EnrollmentService, EnrollmentServiceError};

type SharedService<S> = State<Arc<EnrollmentService<S>>>;

/// Router exposing the enrollment service under `/api/v1`.
pub fn enrollment_router<S>(service: Arc<EnrollmentService<S>>) -> Router
where
    S: EntityStore + 'static,
{
    Router::new()
        .route(
            "/api/v1/students",
            post(register_student_handler::<S>).get(list_students_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id",
            get(student_handler::<S>).delete(deactivate_student_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/status",
            put(student_status_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/eligibility",
            get(eligibility_handler::<S>),
        )
        .route(
            "/api/v1/students/:student_id/english",
            get(english_progress_handler::<S>),
        )
        .route("/api/v1/teachers", post(register_teacher_handler::<S>))
        .route("/api/v1/careers", post(create_career_handler::<S>))
        .route("/api/v1/subjects", post(create_subject_handler::<S>))
        .route(
            "/api/v1/subjects/:subject_id",
            axum::routing::delete(delete_subject_handler::<S>),
        )
        .route(
            "/api/v1/subjects/:subject_id/prerequisites",
            post(add_prerequisite_handler::<S>),
        )
        .route(
            "/api/v1/groups",
            post(create_group_handler::<S>).get(list_groups_handler::<S>),
        )
        .route(
            "/api/v1/groups/:group_id",
            get(group_handler::<S>).delete(delete_group_handler::<S>),
        )
        .route(
            "/api/v1/enrollments",
            post(enroll_handler::<S>).get(list_enrollments_handler::<S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id",
            get(enrollment_handler::<S>).delete(delete_enrollment_handler::<S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/status",
            put(enrollment_status_handler::<S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/final-grade",
            put(enrollment_final_grade_handler::<S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/partials",
            put(partial_grade_handler::<S>),
        )
        .route(
            "/api/v1/enrollments/:enrollment_id/attendance",
            put(attendance_handler::<S>),
        )
        .route(
            "/api/v1/special-courses",
            post(request_english_course_handler::<S>),
        )
        .route(
            "/api/v1/special-courses/diagnostic",
            post(diagnostic_pass_handler::<S>),
        )
        .route(
            "/api/v1/special-courses/:course_id",
            axum::routing::delete(delete_special_course_handler::<S>),
        )
        .route(
            "/api/v1/special-courses/:course_id/payment",
            put(approve_payment_handler::<S>),
        )
        .route(
            "/api/v1/special-courses/:course_id/status",
            put(special_course_status_handler::<S>),
        )
        .route(
            "/api/v1/special-courses/:course_id/final-grade",
            put(special_course_final_grade_handler::<S>),
        )
        .route("/api/v1/exam-periods", post(create_exam_period_handler::<S>))
        .route(
            "/api/v1/exam-periods/:exam_period_id",
            axum::routing::delete(delete_exam_period_handler::<S>),
        )
        .route(
            "/api/v1/exam-periods/:exam_period_id/status",
            put(exam_period_status_handler::<S>),
        )
        .route(
            "/api/v1/exam-periods/:exam_period_id/availability",
            get(exam_period_availability_handler::<S>),
        )
        .route(
            "/api/v1/exam-registrations",
            post(register_for_exam_handler::<S>),
        )
        .route(
            "/api/v1/exam-registrations/:registration_id",
            axum::routing::delete(delete_exam_registration_handler::<S>),
        )
        .route(
            "/api/v1/exam-registrations/:registration_id/status",
            put(exam_registration_status_handler::<S>),
        )
        .route(
            "/api/v1/exam-registrations/:registration_id/final-grade",
            put(exam_registration_final_grade_handler::<S>),
        )
        .route("/api/v1/reports/occupancy", get(occupancy_report_handler::<S>))
        .with_state(service)
}

fn respond<T: Serialize>(status: StatusCode, result: Result<T, EnrollmentServiceError>) -> Response {
    match result {
        Ok(body) => (status, axum::Json(body)).into_response(),
        Err(error) => error_response(error),
    }
}

/// Map a service failure onto a status code and the `{error}` envelope.
pub(crate) fn error_response(error: EnrollmentServiceError) -> Response {
    let status = match &error {
        EnrollmentServiceError::Validation(_) | EnrollmentServiceError::Denied(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EnrollmentServiceError::DuplicateEnrollment { .. }
        | EnrollmentServiceError::ReferentialIntegrity(_) => StatusCode::CONFLICT,
        EnrollmentServiceError::Capacity(CapacityError::CapacityExceeded { .. }) => {
            StatusCode::CONFLICT
        }
        EnrollmentServiceError::Capacity(CapacityError::NotReserved(_)) => StatusCode::NOT_FOUND,
        EnrollmentServiceError::Transition(
            TransitionError::MissingFinalGrade(_)
            | TransitionError::BelowPassing { .. }
            | TransitionError::AbovePassing { .. }
            | TransitionError::PaymentNotRequired,
        ) => StatusCode::UNPROCESSABLE_ENTITY,
        EnrollmentServiceError::Transition(_) => StatusCode::CONFLICT,
        EnrollmentServiceError::Repository(RepositoryError::NotFound { .. }) => {
            StatusCode::NOT_FOUND
        }
        EnrollmentServiceError::Repository(RepositoryError::Conflict { .. }) => {
            StatusCode::CONFLICT
        }
        EnrollmentServiceError::Repository(RepositoryError::ForeignKey { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        EnrollmentServiceError::Repository(RepositoryError::Unavailable(_))
        | EnrollmentServiceError::Purge(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!(%error, "transaction aborted");
        let payload = json!({
            "error": "transaction aborted",
        });
        return (status, axum::Json(payload)).into_response();
    }

    let checks = error.checks();
    let payload = if checks.is_empty() {
        json!({
            "error": error.to_string(),
        })
    } else {
        json!({
            "error": error.to_string(),
            "checks": checks,
        })
    };
    (status, axum::Json(payload)).into_response()
}

pub(crate) async fn register_student_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Payload(request): Payload<NewStudent>,
) -> Response {
    respond(StatusCode::CREATED, service.register_student(request))
}

pub(crate) async fn list_students_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Filters(query): Filters<StudentQuery>,
) -> Response {
    respond(
        StatusCode::OK,
        service.query(|tables| listing::list_students(tables, &query)),
    )
}

pub(crate) async fn student_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(student_id): Id<StudentId>,
) -> Response {
    respond(StatusCode::OK, service.student(student_id))
}

pub(crate) async fn deactivate_student_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(student_id): Id<StudentId>,
) -> Response {
    respond(StatusCode::OK, service.deactivate_student(student_id))
}

pub(crate) async fn student_status_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(student_id): Id<StudentId>,
    Payload(update): Payload<StudentStatusUpdate>,
) -> Response {
    respond(StatusCode::OK, service.set_student_status(student_id, update))
}

pub(crate) async fn eligibility_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(student_id): Id<StudentId>,
    Filters(query): Filters<EligibilityQuery>,
) -> Response {
    respond(StatusCode::OK, service.check_eligibility(student_id, query))
}

pub(crate) async fn english_progress_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(student_id): Id<StudentId>,
) -> Response {
    respond(StatusCode::OK, service.english_progress(student_id))
}

pub(crate) async fn register_teacher_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Payload(request): Payload<NewTeacher>,
) -> Response {
    respond(StatusCode::CREATED, service.register_teacher(request))
}

pub(crate) async fn create_career_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Payload(request): Payload<NewCareer>,
) -> Response {
    respond(StatusCode::CREATED, service.create_career(request))
}

pub(crate) async fn create_subject_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Payload(request): Payload<NewSubject>,
) -> Response {
    respond(StatusCode::CREATED, service.create_subject(request))
}

pub(crate) async fn delete_subject_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(subject_id): Id<SubjectId>,
) -> Response {
    respond(StatusCode::OK, service.delete_subject(subject_id))
}

pub(crate) async fn add_prerequisite_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(subject_id): Id<SubjectId>,
    Payload(request): Payload<NewPrerequisite>,
) -> Response {
    respond(StatusCode::CREATED, service.add_prerequisite(subject_id, request))
}

pub(crate) async fn create_group_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Payload(request): Payload<NewGroup>,
) -> Response {
    respond(StatusCode::CREATED, service.create_group(request))
}

pub(crate) async fn list_groups_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Filters(query): Filters<GroupQuery>,
) -> Response {
    respond(
        StatusCode::OK,
        service.query(|tables| listing::list_groups(tables, &query)),
    )
}

pub(crate) async fn group_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(group_id): Id<GroupId>,
) -> Response {
    respond(StatusCode::OK, service.group(group_id))
}

pub(crate) async fn delete_group_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(group_id): Id<GroupId>,
) -> Response {
    respond(StatusCode::OK, service.delete_group(group_id))
}

pub(crate) async fn enroll_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Payload(request): Payload<EnrollmentRequest>,
) -> Response {
    respond(StatusCode::CREATED, service.enroll(request))
}

pub(crate) async fn list_enrollments_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Filters(query): Filters<EnrollmentQuery>,
) -> Response {
    respond(
        StatusCode::OK,
        service.query(|tables| listing::list_enrollments(tables, &query)),
    )
}

pub(crate) async fn enrollment_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(enrollment_id): Id<EnrollmentId>,
) -> Response {
    respond(
        StatusCode::OK,
        service.record(RecordRef::Enrollment(enrollment_id)),
    )
}

pub(crate) async fn delete_enrollment_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(enrollment_id): Id<EnrollmentId>,
) -> Response {
    respond(
        StatusCode::OK,
        service.delete_record(RecordRef::Enrollment(enrollment_id)),
    )
}

pub(crate) async fn enrollment_status_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(enrollment_id): Id<EnrollmentId>,
    Payload(request): Payload<TransitionRequest>,
) -> Response {
    respond(
        StatusCode::OK,
        service.transition(RecordRef::Enrollment(enrollment_id), request),
    )
}

pub(crate) async fn enrollment_final_grade_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(enrollment_id): Id<EnrollmentId>,
    Payload(request): Payload<FinalGradeRequest>,
) -> Response {
    respond(
        StatusCode::OK,
        service.record_final_grade(RecordRef::Enrollment(enrollment_id), request),
    )
}

pub(crate) async fn partial_grade_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(enrollment_id): Id<EnrollmentId>,
    Payload(request): Payload<PartialGradeRequest>,
) -> Response {
    respond(
        StatusCode::OK,
        service.record_partial_grade(enrollment_id, request),
    )
}

pub(crate) async fn attendance_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(enrollment_id): Id<EnrollmentId>,
    Payload(request): Payload<AttendanceRequest>,
) -> Response {
    respond(StatusCode::OK, service.record_attendance(enrollment_id, request))
}

pub(crate) async fn request_english_course_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Payload(request): Payload<EnglishCourseRequest>,
) -> Response {
    respond(StatusCode::CREATED, service.request_english_course(request))
}

pub(crate) async fn diagnostic_pass_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Payload(request): Payload<DiagnosticPass>,
) -> Response {
    respond(StatusCode::CREATED, service.grant_diagnostic_pass(request))
}

pub(crate) async fn delete_special_course_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(course_id): Id<SpecialCourseId>,
) -> Response {
    respond(
        StatusCode::OK,
        service.delete_record(RecordRef::SpecialCourse(course_id)),
    )
}

pub(crate) async fn approve_payment_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(course_id): Id<SpecialCourseId>,
) -> Response {
    respond(StatusCode::OK, service.approve_payment(course_id))
}

pub(crate) async fn special_course_status_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(course_id): Id<SpecialCourseId>,
    Payload(request): Payload<TransitionRequest>,
) -> Response {
    respond(
        StatusCode::OK,
        service.transition(RecordRef::SpecialCourse(course_id), request),
    )
}

pub(crate) async fn special_course_final_grade_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(course_id): Id<SpecialCourseId>,
    Payload(request): Payload<FinalGradeRequest>,
) -> Response {
    respond(
        StatusCode::OK,
        service.record_final_grade(RecordRef::SpecialCourse(course_id), request),
    )
}

pub(crate) async fn create_exam_period_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Payload(request): Payload<NewExamPeriod>,
) -> Response {
    respond(StatusCode::CREATED, service.create_exam_period(request))
}

pub(crate) async fn exam_period_status_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(exam_period_id): Id<ExamPeriodId>,
    Payload(update): Payload<ExamPeriodStatusUpdate>,
) -> Response {
    respond(
        StatusCode::OK,
        service.update_exam_period_status(exam_period_id, update),
    )
}

pub(crate) async fn delete_exam_period_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(exam_period_id): Id<ExamPeriodId>,
) -> Response {
    respond(StatusCode::OK, service.delete_exam_period(exam_period_id))
}

pub(crate) async fn exam_period_availability_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(exam_period_id): Id<ExamPeriodId>,
) -> Response {
    respond(
        StatusCode::OK,
        service.exam_period_availability(exam_period_id),
    )
}

pub(crate) async fn register_for_exam_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Payload(request): Payload<ExamRegistrationRequest>,
) -> Response {
    respond(StatusCode::CREATED, service.register_for_exam(request))
}

pub(crate) async fn delete_exam_registration_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(registration_id): Id<ExamRegistrationId>,
) -> Response {
    respond(
        StatusCode::OK,
        service.delete_record(RecordRef::ExamRegistration(registration_id)),
    )
}

pub(crate) async fn exam_registration_status_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(registration_id): Id<ExamRegistrationId>,
    Payload(request): Payload<TransitionRequest>,
) -> Response {
    respond(
        StatusCode::OK,
        service.transition(RecordRef::ExamRegistration(registration_id), request),
    )
}

pub(crate) async fn exam_registration_final_grade_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
    Id(registration_id): Id<ExamRegistrationId>,
    Payload(request): Payload<FinalGradeRequest>,
) -> Response {
    respond(
        StatusCode::OK,
        service.record_final_grade(RecordRef::ExamRegistration(registration_id), request),
    )
}

pub(crate) async fn occupancy_report_handler<S: EntityStore + 'static>(
    State(service): SharedService<S>,
) -> Response {
    respond(StatusCode::OK, service.occupancy_report())
}
