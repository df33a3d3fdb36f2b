use std::sync::Arc;
use std::thread;

use super::common::*;

use crate::enrollment::domain::{EnrollmentStatus, ExamPeriodStatus, RecordRef, StudentStatus};
use crate::enrollment::requests::{
    AttendanceRequest, DiagnosticPass, EligibilityQuery, EnglishCourseRequest, EnrollmentRequest,
    ExamRegistrationRequest, FinalGradeRequest, NewCareer, NewPrerequisite, PartialGradeRequest,
    StudentStatusUpdate, TransitionRequest,
};
use crate::enrollment::reporting;
use crate::enrollment::roster::RosterEntry;
use crate::enrollment::{
    CapacityError, DenialReason, EnrollmentServiceError, RepositoryError, SeedPlan,
    TransitionError, ValidationError,
};

fn start(status: EnrollmentStatus) -> TransitionRequest {
    TransitionRequest {
        status,
        calificacion_final: None,
    }
}

#[test]
fn enrollment_reserves_a_slot_and_reports_checks() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 30);
    let student = campus.student("ana", None);

    let receipt = campus
        .service
        .enroll(EnrollmentRequest {
            student_id: student.id,
            group_id: group.id,
        })
        .expect("enrolled");

    assert_eq!(receipt.record.status, EnrollmentStatus::Inscrito);
    assert!(!receipt.record.aprobado);
    let ticket = receipt.capacity.expect("slot ticket");
    assert_eq!((ticket.cupo_actual, ticket.cupo_maximo), (1, 30));
    assert!(receipt.checks.iter().all(|check| check.passed));
    assert_eq!(campus.cupo_actual(&group), 1);
}

#[test]
fn full_group_rejects_and_writes_nothing() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 1);
    let first = campus.student("ana", None);
    let second = campus.student("luis", None);
    campus.enroll(&first, &group);

    let error = campus
        .service
        .enroll(EnrollmentRequest {
            student_id: second.id,
            group_id: group.id,
        })
        .expect_err("group is full");

    assert!(matches!(
        error,
        EnrollmentServiceError::Capacity(CapacityError::CapacityExceeded { .. })
    ));
    assert_eq!(campus.cupo_actual(&group), 1);
    assert_eq!(campus.tables(|tables| tables.enrollments.len()), 1);
}

#[test]
fn concurrent_requests_never_oversubscribe_a_group() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 1);
    let students: Vec<_> = (0..8)
        .map(|index| campus.student(&format!("alumno{index}"), None))
        .collect();

    let results: Vec<_> = thread::scope(|scope| {
        let handles: Vec<_> = students
            .iter()
            .map(|student| {
                let service = Arc::clone(&campus.service);
                let request = EnrollmentRequest {
                    student_id: student.id,
                    group_id: group.id,
                };
                scope.spawn(move || service.enroll(request))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread finished"))
            .collect()
    });

    let admitted = results.iter().filter(|result| result.is_ok()).count();
    assert_eq!(admitted, 1);
    assert!(results.iter().filter(|result| result.is_err()).all(|result| matches!(
        result,
        Err(EnrollmentServiceError::Capacity(CapacityError::CapacityExceeded { .. }))
    )));
    assert_eq!(campus.cupo_actual(&group), 1);
}

#[test]
fn second_enrollment_in_same_group_is_a_duplicate() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 30);
    let student = campus.student("ana", None);
    campus.enroll(&student, &group);

    let error = campus
        .service
        .enroll(EnrollmentRequest {
            student_id: student.id,
            group_id: group.id,
        })
        .expect_err("duplicate");

    assert!(matches!(error, EnrollmentServiceError::DuplicateEnrollment { .. }));
    assert!(!error.checks().is_empty());
    assert_eq!(campus.cupo_actual(&group), 1);
}

#[test]
fn unique_pair_conflict_rolls_back_the_reserved_slot() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 30);
    let student = campus.student("ana", None);
    let enrollment = campus.enroll(&student, &group);
    let record = RecordRef::Enrollment(enrollment.id);
    campus
        .service
        .transition(record, start(EnrollmentStatus::EnCurso))
        .expect("started");
    campus
        .service
        .record_final_grade(
            record,
            FinalGradeRequest {
                calificacion_final: 40.0,
            },
        )
        .expect("graded");
    assert_eq!(campus.cupo_actual(&group), 0);

    // Eligibility lets a failed student retry, the stored pair does not.
    let error = campus
        .service
        .enroll(EnrollmentRequest {
            student_id: student.id,
            group_id: group.id,
        })
        .expect_err("pair already stored");

    assert!(matches!(error, EnrollmentServiceError::DuplicateEnrollment { .. }));
    assert_eq!(campus.cupo_actual(&group), 0);
}

#[test]
fn matriculas_are_sequential_per_year() {
    let campus = campus();
    let first = campus.student("ana", None);
    campus.student("luis", None);
    let third = campus.student("sofia", None);
    campus
        .service
        .deactivate_student(first.id)
        .expect("deactivated");
    let fourth = campus.student("diego", None);
    let mut other_year = new_student("eva", &campus.career, None);
    other_year.enrollment_year = Some(2024);
    let earlier = campus
        .service
        .register_student(other_year)
        .expect("registered");

    assert_eq!(first.matricula.as_str(), "2025-000001");
    assert_eq!(third.matricula.as_str(), "2025-000003");
    assert_eq!(fourth.matricula.as_str(), "2025-000004");
    assert_eq!(earlier.matricula.as_str(), "2024-000001");
}

#[test]
fn duplicate_username_rolls_back_the_student() {
    let campus = campus();
    campus.student("ana", None);

    let error = campus
        .service
        .register_student(new_student("ana", &campus.career, None))
        .expect_err("username taken");

    assert!(matches!(
        error,
        EnrollmentServiceError::Repository(RepositoryError::Conflict { .. })
    ));
    assert_eq!(campus.tables(|tables| tables.students.len()), 1);
}

#[test]
fn english_course_follows_the_current_level() {
    let campus = campus();
    let level_one = campus.english_group("ING-1A", 1, 20);
    let level_two = campus.english_group("ING-2A", 2, 20);
    let student = campus.student("ana", Some(2));

    let wrong = campus
        .service
        .request_english_course(EnglishCourseRequest {
            student_id: student.id,
            level: 1,
            group_id: Some(level_one.id),
            requiere_pago: false,
        })
        .expect_err("level mismatch");
    let right = campus
        .service
        .request_english_course(EnglishCourseRequest {
            student_id: student.id,
            level: 2,
            group_id: Some(level_two.id),
            requiere_pago: false,
        })
        .expect("level 2 course");

    match wrong {
        EnrollmentServiceError::Denied(outcome) => assert_eq!(
            outcome.denial(),
            Some(&DenialReason::LevelMismatch {
                current: 2,
                requested: 1,
            })
        ),
        other => panic!("expected denial, got {other:?}"),
    }
    assert_eq!(campus.cupo_actual(&level_one), 0);
    assert_eq!(right.record.level, 2);
    assert_eq!(campus.cupo_actual(&level_two), 1);
}

#[test]
fn english_course_must_match_the_group_level() {
    let campus = campus();
    let level_three = campus.english_group("ING-3A", 3, 20);
    let regular = campus.group("ISC-101-A", 20);
    let student = campus.student("ana", Some(2));

    let mismatch = campus.service.request_english_course(EnglishCourseRequest {
        student_id: student.id,
        level: 2,
        group_id: Some(level_three.id),
        requiere_pago: false,
    });
    let not_english = campus.service.request_english_course(EnglishCourseRequest {
        student_id: student.id,
        level: 2,
        group_id: Some(regular.id),
        requiere_pago: false,
    });

    assert!(matches!(
        mismatch,
        Err(EnrollmentServiceError::Validation(ValidationError::GroupLevelMismatch {
            group_level: 3,
            requested: 2,
        }))
    ));
    assert!(matches!(
        not_english,
        Err(EnrollmentServiceError::Validation(ValidationError::NotAnEnglishGroup))
    ));
}

#[test]
fn closed_registration_window_denies_english_group() {
    let campus = campus();
    let group = campus.english_group_with_window("ING-1B", 1, 20, date(2025, 1, 6), date(2025, 1, 31));
    let student = campus.student("ana", None);

    let error = campus
        .service
        .enroll(EnrollmentRequest {
            student_id: student.id,
            group_id: group.id,
        })
        .expect_err("window closed");

    match error {
        EnrollmentServiceError::Denied(outcome) => {
            assert_eq!(outcome.denial(), Some(&DenialReason::RegistrationClosed))
        }
        other => panic!("expected denial, got {other:?}"),
    }
}

#[test]
fn approving_an_english_level_advances_the_student() {
    let campus = campus();
    let group = campus.english_group("ING-2A", 2, 20);
    let student = campus.student("ana", Some(2));
    let enrollment = campus.enroll(&student, &group);
    let record = RecordRef::Enrollment(enrollment.id);

    campus
        .service
        .transition(record, start(EnrollmentStatus::EnCurso))
        .expect("started");
    let receipt = campus
        .service
        .record_final_grade(
            record,
            FinalGradeRequest {
                calificacion_final: 85.0,
            },
        )
        .expect("graded");

    assert_eq!(receipt.record.status(), EnrollmentStatus::Aprobado);
    assert!(receipt.record.aprobado());
    assert!(!receipt.plan.release_capacity);
    let updated = campus.service.student(student.id).expect("student");
    assert_eq!(updated.english.current_level, Some(3));
    assert_eq!(updated.english.certified_level, Some(2));
    assert_eq!(updated.english.average_score, Some(85.0));
    assert_eq!(updated.credits.creditos_cursados, 0);
    assert_eq!(campus.tables(|tables| tables.grade_history.len()), 1);

    let report = campus.service.occupancy_report().expect("report");
    assert_eq!(report.english.len(), 1);
    assert_eq!(report.english[0].current_level, 3);
    assert_eq!(report.english[0].progress.approved_levels, vec![2]);
    assert!(!report.english[0].progress.satisfied);
    assert!(report.groups[0].ledger_consistent);
}

#[test]
fn failing_a_subject_releases_the_slot_and_counts_credits() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 20);
    let passed_group = campus.group_for(&campus.subject("ISC-102", 4), "ISC-102-A", 20);
    let student = campus.student("ana", None);
    let failed = RecordRef::Enrollment(campus.enroll(&student, &group).id);
    let passed = RecordRef::Enrollment(campus.enroll(&student, &passed_group).id);

    for record in [failed, passed] {
        campus
            .service
            .transition(record, start(EnrollmentStatus::EnCurso))
            .expect("started");
    }
    let failure = campus
        .service
        .transition(
            failed,
            TransitionRequest {
                status: EnrollmentStatus::Reprobado,
                calificacion_final: Some(52.0),
            },
        )
        .expect("failed");
    campus
        .service
        .record_final_grade(
            passed,
            FinalGradeRequest {
                calificacion_final: 90.0,
            },
        )
        .expect("passed");

    assert!(failure.plan.release_capacity);
    assert!(!failure.record.aprobado());
    assert_eq!(campus.cupo_actual(&group), 0);
    assert_eq!(campus.cupo_actual(&passed_group), 1);
    let credits = campus.service.student(student.id).expect("student").credits;
    assert_eq!(credits.creditos_cursados, 9);
    assert_eq!(credits.creditos_aprobados, 4);
    assert!(credits.is_consistent());
}

#[test]
fn approval_without_a_passing_grade_is_rejected() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 20);
    let student = campus.student("ana", None);
    let record = RecordRef::Enrollment(campus.enroll(&student, &group).id);
    campus
        .service
        .transition(record, start(EnrollmentStatus::EnCurso))
        .expect("started");

    let missing = campus
        .service
        .transition(record, start(EnrollmentStatus::Aprobado));
    let low = campus.service.transition(
        record,
        TransitionRequest {
            status: EnrollmentStatus::Aprobado,
            calificacion_final: Some(60.0),
        },
    );

    assert!(matches!(
        missing,
        Err(EnrollmentServiceError::Transition(TransitionError::MissingFinalGrade(_)))
    ));
    assert!(matches!(
        low,
        Err(EnrollmentServiceError::Transition(TransitionError::BelowPassing { .. }))
    ));
    let stored = campus.service.record(record).expect("record");
    assert_eq!(stored.status(), EnrollmentStatus::EnCurso);
    assert!(!stored.aprobado());
    assert_eq!(stored.final_grade(), None);
}

#[test]
fn dropping_a_course_gives_the_slot_back() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 20);
    let student = campus.student("ana", None);
    let record = RecordRef::Enrollment(campus.enroll(&student, &group).id);

    let receipt = campus
        .service
        .transition(record, start(EnrollmentStatus::Baja))
        .expect("dropped");
    let again = campus.service.transition(record, start(EnrollmentStatus::EnCurso));

    assert!(receipt.plan.release_capacity);
    assert_eq!(campus.cupo_actual(&group), 0);
    assert!(matches!(
        again,
        Err(EnrollmentServiceError::Transition(TransitionError::Illegal { .. }))
    ));
}

#[test]
fn soft_delete_releases_an_open_slot_once() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 20);
    let student = campus.student("ana", None);
    let record = RecordRef::Enrollment(campus.enroll(&student, &group).id);

    let deleted = campus.service.delete_record(record).expect("deleted");
    let twice = campus.service.delete_record(record);

    assert_eq!(deleted.status(), EnrollmentStatus::Inscrito);
    assert_eq!(campus.cupo_actual(&group), 0);
    assert!(matches!(
        twice,
        Err(EnrollmentServiceError::Repository(RepositoryError::NotFound { .. }))
    ));
}

#[test]
fn approved_record_keeps_its_slot_until_deleted() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 20);
    let student = campus.student("ana", None);
    let record = RecordRef::Enrollment(campus.enroll(&student, &group).id);
    campus
        .service
        .transition(record, start(EnrollmentStatus::EnCurso))
        .expect("started");
    campus
        .service
        .record_final_grade(
            record,
            FinalGradeRequest {
                calificacion_final: 90.0,
            },
        )
        .expect("graded");

    let occupancy = campus.tables(|tables| reporting::group_occupancy(tables, None));
    assert_eq!(occupancy[0].cupo_actual, 1);
    assert_eq!(occupancy[0].slots_held, 1);
    assert_eq!(occupancy[0].open_records, 0);
    assert!(occupancy[0].ledger_consistent);

    campus.service.delete_record(record).expect("deleted");
    let occupancy = campus.tables(|tables| reporting::group_occupancy(tables, None));
    assert_eq!(campus.cupo_actual(&group), 0);
    assert!(occupancy[0].ledger_consistent);
}

#[test]
fn payment_is_only_approved_on_open_paid_courses() {
    let campus = campus();
    let group = campus.english_group("ING-1A", 1, 20);
    let free = campus.student("ana", None);
    let paying = campus.student("luis", None);
    let request = |student_id, requiere_pago| EnglishCourseRequest {
        student_id,
        level: 1,
        group_id: Some(group.id),
        requiere_pago,
    };
    let free_course = campus
        .service
        .request_english_course(request(free.id, false))
        .expect("requested")
        .record;
    let paid_course = campus
        .service
        .request_english_course(request(paying.id, true))
        .expect("requested")
        .record;
    campus
        .service
        .transition(
            RecordRef::SpecialCourse(paid_course.id),
            start(EnrollmentStatus::Cancelado),
        )
        .expect("cancelled");

    let not_required = campus.service.approve_payment(free_course.id);
    let after_close = campus.service.approve_payment(paid_course.id);

    assert!(matches!(
        not_required,
        Err(EnrollmentServiceError::Transition(TransitionError::PaymentNotRequired))
    ));
    assert!(matches!(
        after_close,
        Err(EnrollmentServiceError::Transition(TransitionError::PaymentAfterClose(
            EnrollmentStatus::Cancelado
        )))
    ));
    campus.tables(|tables| {
        assert!(!tables.special_courses[&free_course.id].pago_aprobado);
        assert!(!tables.special_courses[&paid_course.id].pago_aprobado);
    });
}

#[test]
fn diagnostic_pass_grants_the_level_without_a_group() {
    let campus = campus();
    let student = campus.student("ana", None);

    let receipt = campus
        .service
        .grant_diagnostic_pass(DiagnosticPass {
            student_id: student.id,
            level: 1,
            calificacion_final: 92.0,
        })
        .expect("granted");
    let below = campus.service.grant_diagnostic_pass(DiagnosticPass {
        student_id: student.id,
        level: 2,
        calificacion_final: 50.0,
    });

    assert!(receipt.record.completado_por_diagnostico());
    assert!(receipt.capacity.is_none());
    assert!(matches!(
        below,
        Err(EnrollmentServiceError::Transition(TransitionError::BelowPassing { .. }))
    ));
    let progress = campus.service.english_progress(student.id).expect("progress");
    assert_eq!(progress.approved_levels, vec![1]);
    let updated = campus.service.student(student.id).expect("student");
    assert_eq!(updated.english.current_level, Some(2));
}

#[test]
fn paid_course_cannot_start_before_payment() {
    let campus = campus();
    let group = campus.english_group("ING-1A", 1, 20);
    let student = campus.student("ana", None);
    let course = campus
        .service
        .request_english_course(EnglishCourseRequest {
            student_id: student.id,
            level: 1,
            group_id: Some(group.id),
            requiere_pago: true,
        })
        .expect("requested")
        .record;
    let record = RecordRef::SpecialCourse(course.id);

    let blocked = campus.service.transition(record, start(EnrollmentStatus::EnCurso));
    campus.service.approve_payment(course.id).expect("paid");
    let started = campus
        .service
        .transition(record, start(EnrollmentStatus::EnCurso))
        .expect("started");

    assert!(matches!(
        blocked,
        Err(EnrollmentServiceError::Transition(TransitionError::PaymentPending))
    ));
    assert_eq!(started.record.status(), EnrollmentStatus::EnCurso);
}

#[test]
fn exam_registration_checks_availability_and_duplicates() {
    let campus = campus();
    let open = campus.exam_period(at(2025, 3, 1), at(2025, 3, 20), ExamPeriodStatus::Abierto, 30);
    let future = campus.exam_period(at(2025, 4, 1), at(2025, 4, 20), ExamPeriodStatus::Abierto, 30);
    let student = campus.student("ana", None);
    let request = ExamRegistrationRequest {
        student_id: student.id,
        exam_period_id: open.id,
    };

    let receipt = campus.service.register_for_exam(request).expect("registered");
    let duplicate = campus.service.register_for_exam(request);
    let early = campus.service.register_for_exam(ExamRegistrationRequest {
        student_id: student.id,
        exam_period_id: future.id,
    });

    assert_eq!(receipt.capacity.map(|ticket| ticket.cupo_actual), Some(1));
    assert!(matches!(
        duplicate,
        Err(EnrollmentServiceError::DuplicateEnrollment { .. })
    ));
    match early {
        Err(EnrollmentServiceError::Denied(outcome)) => assert!(matches!(
            outcome.denial(),
            Some(DenialReason::ExamPeriodUnavailable { .. })
        )),
        other => panic!("expected denial, got {other:?}"),
    }
    let availability = campus
        .service
        .exam_period_availability(future.id)
        .expect("availability");
    assert!(!availability.is_in_registration_period);
}

#[test]
fn deleted_exam_period_stays_unavailable() {
    let campus = campus();
    let period = campus.exam_period(at(2025, 3, 1), at(2025, 3, 20), ExamPeriodStatus::Abierto, 30);
    campus
        .service
        .delete_exam_period(period.id)
        .expect("deleted");

    let availability = campus
        .service
        .exam_period_availability(period.id)
        .expect("availability");

    assert!(!availability.is_not_deleted);
    assert!(!availability.esta_disponible);
}

#[test]
fn prerequisites_gate_enrollment() {
    let campus = campus();
    let advanced = campus.subject("ISC-201", 6);
    campus
        .service
        .add_prerequisite(
            advanced.id,
            NewPrerequisite {
                required_subject_id: campus.subject.id,
            },
        )
        .expect("linked");
    let group = campus.group_for(&advanced, "ISC-201-A", 20);
    let student = campus.student("ana", None);

    let error = campus
        .service
        .enroll(EnrollmentRequest {
            student_id: student.id,
            group_id: group.id,
        })
        .expect_err("prerequisite missing");
    let self_link = campus.service.add_prerequisite(
        advanced.id,
        NewPrerequisite {
            required_subject_id: advanced.id,
        },
    );

    assert_eq!(error.to_string(), "enrollment denied: missing prerequisites: ISC-101");
    assert!(matches!(
        self_link,
        Err(EnrollmentServiceError::Validation(ValidationError::SelfPrerequisite))
    ));
}

#[test]
fn inactive_students_cannot_enroll() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 20);
    let student = campus.student("ana", None);
    campus
        .service
        .set_student_status(
            student.id,
            StudentStatusUpdate {
                status: StudentStatus::Egresado,
            },
        )
        .expect("status updated");

    let error = campus
        .service
        .enroll(EnrollmentRequest {
            student_id: student.id,
            group_id: group.id,
        })
        .expect_err("inactive");

    assert_eq!(error.to_string(), "enrollment denied: student status is EGRESADO");
}

#[test]
fn deactivation_is_rejected_while_records_are_open() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 20);
    let student = campus.student("ana", None);
    let record = RecordRef::Enrollment(campus.enroll(&student, &group).id);

    let blocked = campus.service.deactivate_student(student.id);
    campus
        .service
        .transition(record, start(EnrollmentStatus::Cancelado))
        .expect("cancelled");
    let deactivated = campus
        .service
        .deactivate_student(student.id)
        .expect("deactivated");

    assert!(matches!(
        blocked,
        Err(EnrollmentServiceError::ReferentialIntegrity(_))
    ));
    assert_eq!(deactivated.status, StudentStatus::Inactivo);
    assert!(deactivated.deleted_at.is_some());
    let login_active = campus.tables(|tables| tables.users[&deactivated.user_id].active);
    assert!(!login_active);
}

#[test]
fn referenced_subjects_and_busy_groups_are_protected() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 20);
    let student = campus.student("ana", None);
    campus.enroll(&student, &group);
    let unused = campus.subject("ISC-999", 3);

    let subject = campus.service.delete_subject(campus.subject.id);
    let busy = campus.service.delete_group(group.id);
    let removed = campus.service.delete_subject(unused.id).expect("deleted");

    assert!(matches!(
        subject,
        Err(EnrollmentServiceError::ReferentialIntegrity(_))
    ));
    assert!(matches!(busy, Err(EnrollmentServiceError::ReferentialIntegrity(_))));
    assert_eq!(removed.clave, "ISC-999");
    assert!(campus.tables(|tables| !tables.subjects.contains_key(&unused.id)));
}

#[test]
fn partial_grades_and_attendance_are_recorded() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 20);
    let student = campus.student("ana", None);
    let enrollment = campus.enroll(&student, &group);

    campus
        .service
        .record_partial_grade(
            enrollment.id,
            PartialGradeRequest {
                parcial: 2,
                calificacion: 77.5,
            },
        )
        .expect("partial recorded");
    let updated = campus
        .service
        .record_attendance(
            enrollment.id,
            AttendanceRequest {
                asistencias: 18,
                faltas: 2,
                retardos: 1,
            },
        )
        .expect("attendance recorded");
    let out_of_range = campus.service.record_partial_grade(
        enrollment.id,
        PartialGradeRequest {
            parcial: 4,
            calificacion: 80.0,
        },
    );

    assert_eq!(updated.parciales, [None, Some(77.5), None]);
    assert_eq!(updated.porcentaje_asistencia, Some(90.0));
    assert!(matches!(
        out_of_range,
        Err(EnrollmentServiceError::Validation(ValidationError::PartialIndex(4)))
    ));
}

#[test]
fn eligibility_preview_needs_exactly_one_target() {
    let campus = campus();
    let group = campus.group("ISC-101-A", 20);
    let student = campus.student("ana", Some(1));

    let ambiguous = campus.service.check_eligibility(
        student.id,
        EligibilityQuery {
            group_id: Some(group.id),
            level: Some(1),
            exam_period_id: None,
        },
    );
    let preview = campus
        .service
        .check_eligibility(
            student.id,
            EligibilityQuery {
                level: Some(1),
                ..EligibilityQuery::default()
            },
        )
        .expect("preview");

    assert!(matches!(
        ambiguous,
        Err(EnrollmentServiceError::Validation(ValidationError::EligibilityTarget))
    ));
    assert!(preview.is_allowed());
    assert_eq!(campus.tables(|tables| tables.special_courses.len()), 0);
}

#[test]
fn seeding_twice_creates_nothing_new() {
    let campus = campus();
    let mut plan = SeedPlan::with_admin("admin");
    plan.careers.push(NewCareer {
        clave: "IND".to_string(),
        nombre: "Ingenieria Industrial".to_string(),
    });
    plan.students.push(RosterEntry {
        username: "pedro".to_string(),
        nombre: "Pedro".to_string(),
        apellido_paterno: "Ramos".to_string(),
        apellido_materno: None,
        curp: None,
        career_clave: "IND".to_string(),
        semester: 1,
        english_level: None,
        enrollment_year: Some(2025),
    });

    let first = campus.service.seed(&plan).expect("first seed");
    let second = campus.service.seed(&plan).expect("second seed");

    assert_eq!(first.created.len(), 3);
    assert!(second.created.is_empty());
    assert_eq!(second.skipped.len(), 3);
    assert_eq!(campus.tables(|tables| tables.students.len()), 1);
}

#[test]
fn seed_with_unknown_career_rolls_back_entirely() {
    let campus = campus();
    let mut plan = SeedPlan::with_admin("admin");
    plan.students.push(RosterEntry {
        username: "pedro".to_string(),
        nombre: "Pedro".to_string(),
        apellido_paterno: "Ramos".to_string(),
        apellido_materno: None,
        curp: None,
        career_clave: "ARQ".to_string(),
        semester: 1,
        english_level: None,
        enrollment_year: None,
    });

    let error = campus.service.seed(&plan).expect_err("unknown career");

    assert!(matches!(
        error,
        EnrollmentServiceError::Repository(RepositoryError::ForeignKey { .. })
    ));
    assert!(campus.tables(|tables| tables.user_by_username("admin").is_none()));
}
