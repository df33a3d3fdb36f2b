use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::domain::{
    CareerId, Enrollment, EnrollmentStatus, Group, GroupId, Student, StudentId, StudentStatus,
    SubjectId, TeacherId,
};
use super::tables::Tables;
use super::validation::ValidationError;

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    fn apply(self, ordering: Ordering) -> Ordering {
        match self {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }
}

/// Validated paging parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
}

impl PageRequest {
    pub fn new(
        page: Option<u32>,
        limit: Option<u32>,
        sort_by: Option<String>,
        sort_order: Option<SortOrder>,
    ) -> Result<Self, ValidationError> {
        let page = page.unwrap_or(1);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);
        if page == 0 || limit == 0 {
            return Err(ValidationError::Pagination);
        }
        Ok(Self {
            page,
            limit: limit.min(MAX_LIMIT),
            sort_by: sort_by.filter(|field| !field.trim().is_empty()),
            sort_order: sort_order.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: usize,
    pub total_pages: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

pub fn paginate<T>(items: Vec<T>, request: &PageRequest) -> Page<T> {
    let total = items.len();
    let limit = request.limit as usize;
    let total_pages = total.div_ceil(limit) as u32;
    let offset = (request.page as usize - 1).saturating_mul(limit);

    Page {
        items: items.into_iter().skip(offset).take(limit).collect(),
        pagination: Pagination {
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
        },
    }
}

fn sort_with<T>(
    items: &mut [T],
    request: &PageRequest,
    default_field: &str,
    compare: impl Fn(&str, &T, &T) -> Option<Ordering>,
) {
    let field = request.sort_by.as_deref().unwrap_or(default_field);
    items.sort_by(|left, right| {
        request
            .sort_order
            .apply(compare(field, left, right).unwrap_or(Ordering::Equal))
    });
}

fn compare_f32(left: Option<f32>, right: Option<f32>) -> Ordering {
    match (left, right) {
        (Some(l), Some(r)) => l.total_cmp(&r),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StudentQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub status: Option<StudentStatus>,
    pub career_id: Option<CareerId>,
    pub semester: Option<u8>,
    /// Case-insensitive match against matricula and names.
    pub search: Option<String>,
    #[serde(default)]
    pub include_deleted: bool,
}

const STUDENT_SORT_FIELDS: [&str; 5] = [
    "matricula",
    "nombre",
    "apellidoPaterno",
    "semester",
    "createdAt",
];

fn compare_students(field: &str, left: &Student, right: &Student) -> Option<Ordering> {
    Some(match field {
        "matricula" => left.matricula.cmp(&right.matricula),
        "nombre" => left.nombre.cmp(&right.nombre),
        "apellidoPaterno" => left.apellido_paterno.cmp(&right.apellido_paterno),
        "semester" => left.semester.cmp(&right.semester),
        "createdAt" => left.created_at.cmp(&right.created_at),
        _ => return None,
    })
}

pub fn list_students(tables: &Tables, query: &StudentQuery) -> Result<Page<Student>, ValidationError> {
    let request = PageRequest::new(
        query.page,
        query.limit,
        query.sort_by.clone(),
        query.sort_order,
    )?;
    let sort_field = request.sort_by.as_deref().unwrap_or("matricula");
    if !STUDENT_SORT_FIELDS.contains(&sort_field) {
        return Err(ValidationError::UnknownSortField(sort_field.to_string()));
    }

    let needle = query
        .search
        .as_deref()
        .map(|value| value.trim().to_lowercase())
        .filter(|value| !value.is_empty());

    let mut students: Vec<Student> = tables
        .students
        .values()
        .filter(|student| query.include_deleted || !student.is_deleted())
        .filter(|student| query.status.map_or(true, |status| student.status == status))
        .filter(|student| query.career_id.map_or(true, |career| student.career_id == career))
        .filter(|student| query.semester.map_or(true, |semester| student.semester == semester))
        .filter(|student| {
            needle.as_deref().map_or(true, |needle| {
                student.matricula.as_str().contains(needle)
                    || student.full_name().to_lowercase().contains(needle)
            })
        })
        .cloned()
        .collect();

    sort_with(&mut students, &request, "matricula", compare_students);
    Ok(paginate(students, &request))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct GroupQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub period: Option<String>,
    pub subject_id: Option<SubjectId>,
    pub teacher_id: Option<TeacherId>,
    pub english_level: Option<u8>,
    /// Only groups with at least one free slot.
    #[serde(default)]
    pub with_availability: bool,
}

const GROUP_SORT_FIELDS: [&str; 4] = ["clave", "period", "cupoActual", "availableSlots"];

fn compare_groups(field: &str, left: &Group, right: &Group) -> Option<Ordering> {
    Some(match field {
        "clave" => left.clave.cmp(&right.clave),
        "period" => left.period.cmp(&right.period),
        "cupoActual" => left.cupo_actual.cmp(&right.cupo_actual),
        "availableSlots" => left.available_slots().cmp(&right.available_slots()),
        _ => return None,
    })
}

pub fn list_groups(tables: &Tables, query: &GroupQuery) -> Result<Page<Group>, ValidationError> {
    let request = PageRequest::new(
        query.page,
        query.limit,
        query.sort_by.clone(),
        query.sort_order,
    )?;
    let sort_field = request.sort_by.as_deref().unwrap_or("clave");
    if !GROUP_SORT_FIELDS.contains(&sort_field) {
        return Err(ValidationError::UnknownSortField(sort_field.to_string()));
    }

    let mut groups: Vec<Group> = tables
        .groups
        .values()
        .filter(|group| !group.is_deleted())
        .filter(|group| {
            query
                .period
                .as_deref()
                .map_or(true, |period| group.period.as_str() == period)
        })
        .filter(|group| query.subject_id.map_or(true, |id| group.subject_id == id))
        .filter(|group| query.teacher_id.map_or(true, |id| group.teacher_id == id))
        .filter(|group| {
            query
                .english_level
                .map_or(true, |level| group.english_level() == Some(level))
        })
        .filter(|group| !query.with_availability || group.available_slots() > 0)
        .cloned()
        .collect();

    sort_with(&mut groups, &request, "clave", compare_groups);
    Ok(paginate(groups, &request))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnrollmentQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub student_id: Option<StudentId>,
    pub group_id: Option<GroupId>,
    pub status: Option<EnrollmentStatus>,
}

const ENROLLMENT_SORT_FIELDS: [&str; 3] = ["enrolledAt", "status", "calificacionFinal"];

fn compare_enrollments(field: &str, left: &Enrollment, right: &Enrollment) -> Option<Ordering> {
    Some(match field {
        "enrolledAt" => left.enrolled_at.cmp(&right.enrolled_at),
        "status" => left.status.cmp(&right.status),
        "calificacionFinal" => compare_f32(left.calificacion_final, right.calificacion_final),
        _ => return None,
    })
}

pub fn list_enrollments(
    tables: &Tables,
    query: &EnrollmentQuery,
) -> Result<Page<Enrollment>, ValidationError> {
    let request = PageRequest::new(
        query.page,
        query.limit,
        query.sort_by.clone(),
        query.sort_order,
    )?;
    let sort_field = request.sort_by.as_deref().unwrap_or("enrolledAt");
    if !ENROLLMENT_SORT_FIELDS.contains(&sort_field) {
        return Err(ValidationError::UnknownSortField(sort_field.to_string()));
    }

    let mut enrollments: Vec<Enrollment> = tables
        .enrollments
        .values()
        .filter(|enrollment| !enrollment.is_deleted())
        .filter(|enrollment| query.student_id.map_or(true, |id| enrollment.student_id == id))
        .filter(|enrollment| query.group_id.map_or(true, |id| enrollment.group_id == id))
        .filter(|enrollment| query.status.map_or(true, |status| enrollment.status == status))
        .cloned()
        .collect();

    sort_with(&mut enrollments, &request, "enrolledAt", compare_enrollments);
    Ok(paginate(enrollments, &request))
}
