use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::domain::{
    Career, CareerId, Enrollment, EnrollmentId, ExamPeriod, ExamPeriodId, ExamRegistration,
    ExamRegistrationId, GradeHistory, Group, GroupId, Prerequisite, RecordRef, SpecialCourse,
    SpecialCourseId, Student, StudentId, Subject, SubjectId, Teacher, TeacherId, User, UserId,
};
use super::repository::RepositoryError;

/// Relational snapshot of every entity, keyed by primary key.
///
/// Insert helpers enforce the unique and foreign-key constraints a relational
/// backend would; callers mutate rows through the `*_mut` accessors.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Tables {
    pub users: BTreeMap<UserId, User>,
    pub students: BTreeMap<StudentId, Student>,
    pub teachers: BTreeMap<TeacherId, Teacher>,
    pub careers: BTreeMap<CareerId, Career>,
    pub subjects: BTreeMap<SubjectId, Subject>,
    pub prerequisites: Vec<Prerequisite>,
    pub groups: BTreeMap<GroupId, Group>,
    pub enrollments: BTreeMap<EnrollmentId, Enrollment>,
    pub grade_history: Vec<GradeHistory>,
    pub exam_periods: BTreeMap<ExamPeriodId, ExamPeriod>,
    pub exam_registrations: BTreeMap<ExamRegistrationId, ExamRegistration>,
    pub special_courses: BTreeMap<SpecialCourseId, SpecialCourse>,
}

fn fetch<'a, K, V>(
    map: &'a BTreeMap<K, V>,
    entity: &'static str,
    id: &K,
) -> Result<&'a V, RepositoryError>
where
    K: Ord + Display,
{
    map.get(id)
        .ok_or_else(|| RepositoryError::not_found(entity, id))
}

fn fetch_mut<'a, K, V>(
    map: &'a mut BTreeMap<K, V>,
    entity: &'static str,
    id: &K,
) -> Result<&'a mut V, RepositoryError>
where
    K: Ord + Display,
{
    map.get_mut(id)
        .ok_or_else(|| RepositoryError::not_found(entity, id))
}

fn require<K, V>(
    map: &BTreeMap<K, V>,
    entity: &'static str,
    reference: &'static str,
    id: &K,
) -> Result<(), RepositoryError>
where
    K: Ord + Display,
{
    if map.contains_key(id) {
        Ok(())
    } else {
        Err(RepositoryError::ForeignKey {
            entity,
            reference,
            id: id.to_string(),
        })
    }
}

fn conflict(entity: &'static str, constraint: &'static str, value: impl ToString) -> RepositoryError {
    RepositoryError::Conflict {
        entity,
        constraint,
        value: value.to_string(),
    }
}

impl Tables {
    pub fn user(&self, id: &UserId) -> Result<&User, RepositoryError> {
        fetch(&self.users, "user", id)
    }

    pub fn user_by_username(&self, username: &str) -> Option<&User> {
        self.users.values().find(|user| user.username == username)
    }

    pub fn student(&self, id: &StudentId) -> Result<&Student, RepositoryError> {
        fetch(&self.students, "student", id)
    }

    pub fn student_mut(&mut self, id: &StudentId) -> Result<&mut Student, RepositoryError> {
        fetch_mut(&mut self.students, "student", id)
    }

    pub fn teacher(&self, id: &TeacherId) -> Result<&Teacher, RepositoryError> {
        fetch(&self.teachers, "teacher", id)
    }

    pub fn career(&self, id: &CareerId) -> Result<&Career, RepositoryError> {
        fetch(&self.careers, "career", id)
    }

    pub fn career_by_clave(&self, clave: &str) -> Option<&Career> {
        self.careers.values().find(|career| career.clave == clave)
    }

    pub fn subject(&self, id: &SubjectId) -> Result<&Subject, RepositoryError> {
        fetch(&self.subjects, "subject", id)
    }

    pub fn group(&self, id: &GroupId) -> Result<&Group, RepositoryError> {
        fetch(&self.groups, "group", id)
    }

    pub fn group_mut(&mut self, id: &GroupId) -> Result<&mut Group, RepositoryError> {
        fetch_mut(&mut self.groups, "group", id)
    }

    pub fn enrollment(&self, id: &EnrollmentId) -> Result<&Enrollment, RepositoryError> {
        fetch(&self.enrollments, "enrollment", id)
    }

    pub fn enrollment_mut(&mut self, id: &EnrollmentId) -> Result<&mut Enrollment, RepositoryError> {
        fetch_mut(&mut self.enrollments, "enrollment", id)
    }

    pub fn exam_period(&self, id: &ExamPeriodId) -> Result<&ExamPeriod, RepositoryError> {
        fetch(&self.exam_periods, "exam period", id)
    }

    pub fn exam_period_mut(
        &mut self,
        id: &ExamPeriodId,
    ) -> Result<&mut ExamPeriod, RepositoryError> {
        fetch_mut(&mut self.exam_periods, "exam period", id)
    }

    pub fn exam_registration(
        &self,
        id: &ExamRegistrationId,
    ) -> Result<&ExamRegistration, RepositoryError> {
        fetch(&self.exam_registrations, "exam registration", id)
    }

    pub fn exam_registration_mut(
        &mut self,
        id: &ExamRegistrationId,
    ) -> Result<&mut ExamRegistration, RepositoryError> {
        fetch_mut(&mut self.exam_registrations, "exam registration", id)
    }

    pub fn special_course(&self, id: &SpecialCourseId) -> Result<&SpecialCourse, RepositoryError> {
        fetch(&self.special_courses, "special course", id)
    }

    pub fn special_course_mut(
        &mut self,
        id: &SpecialCourseId,
    ) -> Result<&mut SpecialCourse, RepositoryError> {
        fetch_mut(&mut self.special_courses, "special course", id)
    }

    /// Subjects that must be approved before `subject` can be taken.
    pub fn prerequisites_of(&self, subject: &SubjectId) -> Vec<SubjectId> {
        self.prerequisites
            .iter()
            .filter(|link| &link.subject_id == subject)
            .map(|link| link.required_subject_id)
            .collect()
    }

    pub fn insert_user(&mut self, user: User) -> Result<(), RepositoryError> {
        if self.user_by_username(&user.username).is_some() {
            return Err(conflict("user", "username", &user.username));
        }
        self.users.insert(user.id, user);
        Ok(())
    }

    pub fn insert_student(&mut self, student: Student) -> Result<(), RepositoryError> {
        require(&self.users, "student", "user", &student.user_id)?;
        require(&self.careers, "student", "career", &student.career_id)?;
        if self
            .students
            .values()
            .any(|existing| existing.matricula == student.matricula)
        {
            return Err(conflict("student", "matricula", &student.matricula));
        }
        if self
            .students
            .values()
            .any(|existing| existing.user_id == student.user_id)
        {
            return Err(conflict("student", "user_id", student.user_id));
        }
        self.students.insert(student.id, student);
        Ok(())
    }

    pub fn insert_teacher(&mut self, teacher: Teacher) -> Result<(), RepositoryError> {
        require(&self.users, "teacher", "user", &teacher.user_id)?;
        if self
            .teachers
            .values()
            .any(|existing| existing.numero_empleado == teacher.numero_empleado)
        {
            return Err(conflict("teacher", "numero_empleado", &teacher.numero_empleado));
        }
        self.teachers.insert(teacher.id, teacher);
        Ok(())
    }

    pub fn insert_career(&mut self, career: Career) -> Result<(), RepositoryError> {
        if self.career_by_clave(&career.clave).is_some() {
            return Err(conflict("career", "clave", &career.clave));
        }
        self.careers.insert(career.id, career);
        Ok(())
    }

    pub fn insert_subject(&mut self, subject: Subject) -> Result<(), RepositoryError> {
        require(&self.careers, "subject", "career", &subject.career_id)?;
        if self
            .subjects
            .values()
            .any(|existing| existing.clave == subject.clave)
        {
            return Err(conflict("subject", "clave", &subject.clave));
        }
        self.subjects.insert(subject.id, subject);
        Ok(())
    }

    pub fn insert_prerequisite(&mut self, link: Prerequisite) -> Result<(), RepositoryError> {
        require(&self.subjects, "prerequisite", "subject", &link.subject_id)?;
        require(&self.subjects, "prerequisite", "subject", &link.required_subject_id)?;
        if self.prerequisites.contains(&link) {
            return Err(conflict(
                "prerequisite",
                "subject_id, required_subject_id",
                format!("{}, {}", link.subject_id, link.required_subject_id),
            ));
        }
        self.prerequisites.push(link);
        Ok(())
    }

    pub fn insert_group(&mut self, group: Group) -> Result<(), RepositoryError> {
        require(&self.subjects, "group", "subject", &group.subject_id)?;
        require(&self.teachers, "group", "teacher", &group.teacher_id)?;
        self.groups.insert(group.id, group);
        Ok(())
    }

    pub fn insert_enrollment(&mut self, enrollment: Enrollment) -> Result<(), RepositoryError> {
        require(&self.students, "enrollment", "student", &enrollment.student_id)?;
        require(&self.groups, "enrollment", "group", &enrollment.group_id)?;
        if self.enrollments.values().any(|existing| {
            existing.student_id == enrollment.student_id && existing.group_id == enrollment.group_id
        }) {
            return Err(conflict(
                "enrollment",
                "student_id, group_id",
                format!("{}, {}", enrollment.student_id, enrollment.group_id),
            ));
        }
        self.enrollments.insert(enrollment.id, enrollment);
        Ok(())
    }

    pub fn insert_special_course(&mut self, course: SpecialCourse) -> Result<(), RepositoryError> {
        require(&self.students, "special course", "student", &course.student_id)?;
        if let Some(group_id) = &course.group_id {
            require(&self.groups, "special course", "group", group_id)?;
        }
        self.special_courses.insert(course.id, course);
        Ok(())
    }

    pub fn insert_exam_period(&mut self, period: ExamPeriod) -> Result<(), RepositoryError> {
        self.exam_periods.insert(period.id, period);
        Ok(())
    }

    pub fn insert_exam_registration(
        &mut self,
        registration: ExamRegistration,
    ) -> Result<(), RepositoryError> {
        require(
            &self.students,
            "exam registration",
            "student",
            &registration.student_id,
        )?;
        require(
            &self.exam_periods,
            "exam registration",
            "exam period",
            &registration.exam_period_id,
        )?;
        self.exam_registrations
            .insert(registration.id, registration);
        Ok(())
    }

    pub fn insert_grade_history(&mut self, entry: GradeHistory) -> Result<(), RepositoryError> {
        if !self.record_exists(&entry.record) {
            return Err(RepositoryError::ForeignKey {
                entity: "grade history",
                reference: "record",
                id: entry.record.to_string(),
            });
        }
        self.grade_history.push(entry);
        Ok(())
    }

    pub fn record_exists(&self, record: &RecordRef) -> bool {
        match record {
            RecordRef::Enrollment(id) => self.enrollments.contains_key(id),
            RecordRef::SpecialCourse(id) => self.special_courses.contains_key(id),
            RecordRef::ExamRegistration(id) => self.exam_registrations.contains_key(id),
        }
    }

    /// Describe every row whose foreign key points at a missing parent.
    pub fn orphans(&self) -> Vec<String> {
        let mut orphans = Vec::new();
        let mut note = |present: bool, description: String| {
            if !present {
                orphans.push(description);
            }
        };

        for student in self.students.values() {
            note(
                self.users.contains_key(&student.user_id),
                format!("student {} -> user {}", student.id, student.user_id),
            );
            note(
                self.careers.contains_key(&student.career_id),
                format!("student {} -> career {}", student.id, student.career_id),
            );
        }
        for teacher in self.teachers.values() {
            note(
                self.users.contains_key(&teacher.user_id),
                format!("teacher {} -> user {}", teacher.id, teacher.user_id),
            );
        }
        for subject in self.subjects.values() {
            note(
                self.careers.contains_key(&subject.career_id),
                format!("subject {} -> career {}", subject.id, subject.career_id),
            );
        }
        for link in &self.prerequisites {
            note(
                self.subjects.contains_key(&link.subject_id)
                    && self.subjects.contains_key(&link.required_subject_id),
                format!(
                    "prerequisite {} -> {}",
                    link.subject_id, link.required_subject_id
                ),
            );
        }
        for group in self.groups.values() {
            note(
                self.subjects.contains_key(&group.subject_id),
                format!("group {} -> subject {}", group.id, group.subject_id),
            );
            note(
                self.teachers.contains_key(&group.teacher_id),
                format!("group {} -> teacher {}", group.id, group.teacher_id),
            );
        }
        for enrollment in self.enrollments.values() {
            note(
                self.students.contains_key(&enrollment.student_id),
                format!("enrollment {} -> student {}", enrollment.id, enrollment.student_id),
            );
            note(
                self.groups.contains_key(&enrollment.group_id),
                format!("enrollment {} -> group {}", enrollment.id, enrollment.group_id),
            );
        }
        for course in self.special_courses.values() {
            note(
                self.students.contains_key(&course.student_id),
                format!("special course {} -> student {}", course.id, course.student_id),
            );
            if let Some(group_id) = &course.group_id {
                note(
                    self.groups.contains_key(group_id),
                    format!("special course {} -> group {}", course.id, group_id),
                );
            }
        }
        for registration in self.exam_registrations.values() {
            note(
                self.students.contains_key(&registration.student_id)
                    && self.exam_periods.contains_key(&registration.exam_period_id),
                format!("exam registration {}", registration.id),
            );
        }
        for entry in &self.grade_history {
            note(
                self.record_exists(&entry.record),
                format!("grade history {} -> {}", entry.id, entry.record),
            );
        }

        orphans
    }
}
