//! End-to-end scenarios through the public service facade and HTTP router.
//!
//! Each scenario seeds a small campus from a roster, then drives students
//! through enrollment, grading and clean-up the way an operator would.

mod common {
    use std::io::Cursor;
    use std::sync::Arc;

    use chrono::{NaiveDate, TimeZone, Utc};

    use escolar::enrollment::domain::{EnglishGroupInfo, Group, Modality, Student, Teacher};
    use escolar::enrollment::requests::{NewCareer, NewGroup, NewSubject, NewTeacher};
    use escolar::enrollment::{
        AcademicPeriod, EligibilityConfig, EnrollmentService, EntityStore, FixedClock,
        MemoryStore, RosterImporter, SeedPlan,
    };

    pub(super) type Service = EnrollmentService<MemoryStore>;

    const ROSTER: &str = "username,nombre,apellido_paterno,apellido_materno,curp,career_clave,semester,english_level,enrollment_year\n\
                          ana.lopez,Ana,Lopez,Garcia,,ISC,3,2,2025\n\
                          luis.perez,Luis,Perez,,,ISC,1,,2025\n\
                          sofia.ruiz,Sofia,Ruiz,,,ISC,5,1,2025\n";

    pub(super) struct Campus {
        pub service: Arc<Service>,
        pub students: Vec<Student>,
        pub teacher: Teacher,
        pub english_two: Group,
        pub programming: Group,
    }

    pub(super) fn campus() -> Campus {
        let store = Arc::new(MemoryStore::new());
        let clock = Utc
            .with_ymd_and_hms(2025, 2, 14, 9, 30, 0)
            .single()
            .expect("valid instant");
        let service = Arc::new(EnrollmentService::with_clock(
            store.clone(),
            EligibilityConfig::default(),
            Arc::new(FixedClock(clock)),
        ));

        let mut plan = SeedPlan::with_admin("admin");
        plan.careers.push(NewCareer {
            clave: "ISC".to_string(),
            nombre: "Ingenieria en Sistemas Computacionales".to_string(),
        });
        plan.teachers.push(NewTeacher {
            username: "rmendez".to_string(),
            password_digest: String::new(),
            numero_empleado: "EMP-204".to_string(),
            nombre: "Rocio".to_string(),
            apellido_paterno: "Mendez".to_string(),
            apellido_materno: None,
            departamento: Some("Idiomas".to_string()),
        });
        plan.students = RosterImporter::from_reader(Cursor::new(ROSTER)).expect("roster parses");
        service.seed(&plan).expect("campus seeded");

        let (career_id, teacher, mut students) = store
            .read(|tables| {
                let career_id = tables.career_by_clave("ISC").map(|career| career.id);
                let teacher = tables.teachers.values().next().cloned();
                let students: Vec<Student> = tables.students.values().cloned().collect();
                (career_id, teacher, students)
            })
            .expect("store readable");
        let career_id = career_id.expect("career seeded");
        let teacher = teacher.expect("teacher seeded");
        students.sort_by(|left, right| left.matricula.cmp(&right.matricula));

        let english = service
            .create_subject(NewSubject {
                clave: "ING".to_string(),
                nombre: "Ingles".to_string(),
                creditos: 0,
                semestre: 1,
                career_id,
            })
            .expect("english subject");
        let programming_subject = service
            .create_subject(NewSubject {
                clave: "ISC-110".to_string(),
                nombre: "Programacion".to_string(),
                creditos: 5,
                semestre: 1,
                career_id,
            })
            .expect("programming subject");

        let period = AcademicPeriod::parse("2025-1").expect("valid period");
        let english_two = service
            .create_group(NewGroup {
                subject_id: english.id,
                teacher_id: teacher.id,
                period: period.clone(),
                clave: "ING-2A".to_string(),
                modality: Modality::Mixta,
                cupo_minimo: 1,
                cupo_maximo: 2,
                english: Some(EnglishGroupInfo {
                    level: 2,
                    registration_start: NaiveDate::from_ymd_opt(2025, 2, 1).expect("valid"),
                    registration_end: NaiveDate::from_ymd_opt(2025, 2, 28).expect("valid"),
                }),
            })
            .expect("english group");
        let programming = service
            .create_group(NewGroup {
                subject_id: programming_subject.id,
                teacher_id: teacher.id,
                period,
                clave: "ISC-110-A".to_string(),
                modality: Modality::Presencial,
                cupo_minimo: 5,
                cupo_maximo: 40,
                english: None,
            })
            .expect("programming group");

        Campus {
            service,
            students,
            teacher,
            english_two,
            programming,
        }
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use common::*;
use escolar::enrollment::domain::{EnrollmentStatus, RecordRef};
use escolar::enrollment::requests::{EnrollmentRequest, FinalGradeRequest, TransitionRequest};
use escolar::enrollment::{enrollment_router, DenialReason, EnrollmentServiceError, EntityStore};
use serde_json::{json, Value};
use tower::ServiceExt;

#[test]
fn roster_seed_issues_sequential_matriculas() {
    let campus = campus();

    let matriculas: Vec<_> = campus
        .students
        .iter()
        .map(|student| student.matricula.to_string())
        .collect();

    assert_eq!(
        matriculas,
        vec!["2025-000001", "2025-000002", "2025-000003"]
    );
    assert_eq!(campus.students[0].apellido_materno.as_deref(), Some("Garcia"));
    assert_eq!(campus.students[1].english.current_level, None);
    assert_eq!(campus.teacher.numero_empleado, "EMP-204");
}

#[test]
fn english_group_admits_only_students_at_its_level() {
    let campus = campus();
    let ana = &campus.students[0];
    let sofia = &campus.students[2];

    let admitted = campus.service.enroll(EnrollmentRequest {
        student_id: ana.id,
        group_id: campus.english_two.id,
    });
    let rejected = campus.service.enroll(EnrollmentRequest {
        student_id: sofia.id,
        group_id: campus.english_two.id,
    });

    assert!(admitted.is_ok());
    match rejected {
        Err(EnrollmentServiceError::Denied(outcome)) => assert_eq!(
            outcome.denial(),
            Some(&DenialReason::LevelMismatch {
                current: 1,
                requested: 2,
            })
        ),
        other => panic!("expected level denial, got {other:?}"),
    }
}

#[test]
fn completed_course_keeps_its_slot_and_failed_course_frees_it() {
    let campus = campus();
    let ana = &campus.students[0];
    let luis = &campus.students[1];

    let ana_record = RecordRef::Enrollment(
        campus
            .service
            .enroll(EnrollmentRequest {
                student_id: ana.id,
                group_id: campus.programming.id,
            })
            .expect("ana enrolled")
            .record
            .id,
    );
    let luis_record = RecordRef::Enrollment(
        campus
            .service
            .enroll(EnrollmentRequest {
                student_id: luis.id,
                group_id: campus.programming.id,
            })
            .expect("luis enrolled")
            .record
            .id,
    );

    for (record, grade) in [(ana_record, 93.0), (luis_record, 41.0)] {
        campus
            .service
            .transition(
                record,
                TransitionRequest {
                    status: EnrollmentStatus::EnCurso,
                    calificacion_final: None,
                },
            )
            .expect("course started");
        campus
            .service
            .record_final_grade(
                record,
                FinalGradeRequest {
                    calificacion_final: grade,
                },
            )
            .expect("grade recorded");
    }

    let group = campus.service.group(campus.programming.id).expect("group");
    let ana_now = campus.service.student(ana.id).expect("ana");
    let luis_now = campus.service.student(luis.id).expect("luis");
    assert_eq!(group.cupo_actual, 1);
    assert_eq!(ana_now.credits.creditos_aprobados, 5);
    assert_eq!(luis_now.credits.creditos_aprobados, 0);
    assert_eq!(luis_now.credits.creditos_cursados, 5);
}

#[tokio::test]
async fn http_flow_enrolls_and_reports_occupancy() {
    let campus = campus();
    let app = enrollment_router(Arc::clone(&campus.service));
    let ana = &campus.students[0];

    let enroll = Request::builder()
        .method("POST")
        .uri("/api/v1/enrollments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "studentId": ana.id, "groupId": campus.english_two.id }).to_string(),
        ))
        .expect("request builds");
    let created = app.clone().oneshot(enroll).await.expect("router responds");
    assert_eq!(created.status(), StatusCode::CREATED);

    let report = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/reports/occupancy")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    assert_eq!(report.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(report.into_body(), 64 * 1024)
        .await
        .expect("body bytes");
    let body: Value = serde_json::from_slice(&bytes).expect("json body");
    let groups = body["groups"].as_array().expect("groups listed");
    let english = groups
        .iter()
        .find(|group| group["clave"] == "ING-2A")
        .expect("english group reported");
    assert_eq!(english["cupoActual"], 1);
    assert_eq!(english["availableSlots"], 1);
    assert_eq!(english["belowMinimum"], false);
    let programming = groups
        .iter()
        .find(|group| group["clave"] == "ISC-110-A")
        .expect("programming group reported");
    assert_eq!(programming["belowMinimum"], true);
}

#[test]
fn purge_after_term_leaves_only_the_admin() {
    let campus = campus();
    campus
        .service
        .enroll(EnrollmentRequest {
            student_id: campus.students[0].id,
            group_id: campus.programming.id,
        })
        .expect("enrolled");

    let report = campus.service.purge().expect("purged");

    assert_eq!(report.preserved_users, vec!["admin".to_string()]);
    assert!(report.total_removed() > 0);
    let remaining = campus
        .service
        .store()
        .read(|tables| (tables.students.len(), tables.users.len(), tables.orphans()))
        .expect("store readable");
    assert_eq!(remaining, (0, 1, Vec::<String>::new()));
}
