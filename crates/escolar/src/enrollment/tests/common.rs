use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::Value;

use crate::enrollment::domain::{
    Career, EnglishGroupInfo, Enrollment, EnrollmentStatus, ExamPeriod, ExamPeriodStatus, Group,
    Modality, Student, StudentId, StudentStatus, Subject, Teacher,
};
use crate::enrollment::eligibility::{RecordKind, RecordSummary, StudentSnapshot};
use crate::enrollment::repository::{EntityStore, RepositoryError};
use crate::enrollment::requests::{
    EnrollmentRequest, NewCareer, NewExamPeriod, NewGroup, NewStudent, NewSubject, NewTeacher,
};
use crate::enrollment::{
    AcademicPeriod, EligibilityConfig, EnrollmentService, FixedClock, MemoryStore, Tables,
};

pub(super) type Service = EnrollmentService<MemoryStore>;

/// 2025-03-10 12:00 UTC, inside the March registration windows used below.
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 0, 0, 0)
        .single()
        .expect("valid instant")
}

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn period() -> AcademicPeriod {
    AcademicPeriod::parse("2025-1").expect("valid period")
}

pub(super) fn service_with_store(store: Arc<MemoryStore>) -> Arc<Service> {
    Arc::new(EnrollmentService::with_clock(
        store,
        EligibilityConfig::default(),
        Arc::new(FixedClock(now())),
    ))
}

pub(super) fn new_student(username: &str, career: &Career, english_level: Option<u8>) -> NewStudent {
    NewStudent {
        username: username.to_string(),
        password_digest: String::new(),
        nombre: "Ana".to_string(),
        apellido_paterno: username.to_string(),
        apellido_materno: None,
        curp: None,
        career_id: career.id,
        semester: 3,
        english_level,
        enrollment_year: None,
    }
}

/// A career, a teacher, one regular subject and the English subject.
pub(super) struct Campus {
    pub service: Arc<Service>,
    pub store: Arc<MemoryStore>,
    pub career: Career,
    pub teacher: Teacher,
    pub subject: Subject,
    pub english: Subject,
}

pub(super) fn campus() -> Campus {
    let store = Arc::new(MemoryStore::new());
    let service = service_with_store(store.clone());

    let career = service
        .create_career(NewCareer {
            clave: "ISC".to_string(),
            nombre: "Ingenieria en Sistemas Computacionales".to_string(),
        })
        .expect("career created");
    let teacher = service
        .register_teacher(NewTeacher {
            username: "mtorres".to_string(),
            password_digest: String::new(),
            numero_empleado: "EMP-001".to_string(),
            nombre: "Marta".to_string(),
            apellido_paterno: "Torres".to_string(),
            apellido_materno: None,
            departamento: Some("Sistemas".to_string()),
        })
        .expect("teacher registered");

    let subject = create_subject(&service, &career, "ISC-101", 5);
    let english = create_subject(&service, &career, "ING", 0);

    Campus {
        service,
        store,
        career,
        teacher,
        subject,
        english,
    }
}

fn create_subject(service: &Service, career: &Career, clave: &str, creditos: u32) -> Subject {
    service
        .create_subject(NewSubject {
            clave: clave.to_string(),
            nombre: format!("Materia {clave}"),
            creditos,
            semestre: 1,
            career_id: career.id,
        })
        .expect("subject created")
}

impl Campus {
    pub fn subject(&self, clave: &str, creditos: u32) -> Subject {
        create_subject(&self.service, &self.career, clave, creditos)
    }

    pub fn student(&self, username: &str, english_level: Option<u8>) -> Student {
        self.service
            .register_student(new_student(username, &self.career, english_level))
            .expect("student registered")
    }

    pub fn group(&self, clave: &str, cupo_maximo: u32) -> Group {
        self.group_for(&self.subject, clave, cupo_maximo)
    }

    pub fn group_for(&self, subject: &Subject, clave: &str, cupo_maximo: u32) -> Group {
        self.service
            .create_group(NewGroup {
                subject_id: subject.id,
                teacher_id: self.teacher.id,
                period: period(),
                clave: clave.to_string(),
                modality: Modality::Presencial,
                cupo_minimo: 0,
                cupo_maximo,
                english: None,
            })
            .expect("group created")
    }

    /// English group whose registration window spans March 2025.
    pub fn english_group(&self, clave: &str, level: u8, cupo_maximo: u32) -> Group {
        self.english_group_with_window(clave, level, cupo_maximo, date(2025, 3, 1), date(2025, 3, 31))
    }

    pub fn english_group_with_window(
        &self,
        clave: &str,
        level: u8,
        cupo_maximo: u32,
        registration_start: NaiveDate,
        registration_end: NaiveDate,
    ) -> Group {
        self.service
            .create_group(NewGroup {
                subject_id: self.english.id,
                teacher_id: self.teacher.id,
                period: period(),
                clave: clave.to_string(),
                modality: Modality::Presencial,
                cupo_minimo: 0,
                cupo_maximo,
                english: Some(EnglishGroupInfo {
                    level,
                    registration_start,
                    registration_end,
                }),
            })
            .expect("English group created")
    }

    pub fn exam_period(
        &self,
        inicio: DateTime<Utc>,
        fin: DateTime<Utc>,
        estatus: ExamPeriodStatus,
        cupo_maximo: u32,
    ) -> ExamPeriod {
        self.service
            .create_exam_period(NewExamPeriod {
                nombre: "Examen de ubicacion".to_string(),
                fecha_inscripcion_inicio: inicio,
                fecha_inscripcion_fin: fin,
                fecha_inicio_examen: fin.date_naive(),
                fecha_fin_examen: fin.date_naive(),
                cupo_maximo,
                estatus: Some(estatus),
            })
            .expect("exam period created")
    }

    pub fn enroll(&self, student: &Student, group: &Group) -> Enrollment {
        self.service
            .enroll(EnrollmentRequest {
                student_id: student.id,
                group_id: group.id,
            })
            .expect("enrollment created")
            .record
    }

    pub fn tables<T>(&self, query: impl FnOnce(&Tables) -> T) -> T {
        self.store.read(query).expect("store readable")
    }

    pub fn cupo_actual(&self, group: &Group) -> u32 {
        self.tables(|tables| tables.groups[&group.id].cupo_actual)
    }
}

pub(super) fn snapshot(status: StudentStatus, english_level: Option<u8>) -> StudentSnapshot {
    StudentSnapshot {
        student_id: StudentId::new(),
        status,
        english_level,
        records: Vec::new(),
    }
}

pub(super) fn english_record(
    level: u8,
    status: EnrollmentStatus,
    calificacion_final: Option<f32>,
) -> RecordSummary {
    RecordSummary {
        kind: RecordKind::SpecialCourse,
        level: Some(level),
        group_id: None,
        subject_id: None,
        exam_period_id: None,
        status,
        calificacion_final,
    }
}

/// Store whose backend is always down.
pub(super) struct UnavailableStore;

impl EntityStore for UnavailableStore {
    fn read<T, F>(&self, _query: F) -> Result<T, RepositoryError>
    where
        F: FnOnce(&Tables) -> T,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn transaction<T, E, F>(&self, _work: F) -> Result<T, E>
    where
        F: FnOnce(&mut Tables) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        Err(RepositoryError::Unavailable("database offline".to_string()).into())
    }
}

pub(super) fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

pub(super) fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("body bytes");
    serde_json::from_slice(&bytes).expect("json body")
}

pub(super) async fn assert_error(response: Response, status: StatusCode) -> Value {
    assert_eq!(response.status(), status);
    let body = read_json_body(response).await;
    assert!(body["error"].is_string(), "missing error envelope: {body}");
    body
}
