use serde::Serialize;

use super::tables::Tables;

/// Username that survives every purge.
pub const PROTECTED_USERNAME: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeStep {
    pub table: &'static str,
    pub removed: usize,
}

/// Rows removed per table, in the order they were deleted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PurgeReport {
    pub steps: Vec<PurgeStep>,
    pub preserved_users: Vec<String>,
}

impl PurgeReport {
    pub fn total_removed(&self) -> usize {
        self.steps.iter().map(|step| step.removed).sum()
    }

    pub fn removed(&self, table: &str) -> usize {
        self.steps
            .iter()
            .find(|step| step.table == table)
            .map_or(0, |step| step.removed)
    }

    fn record(&mut self, table: &'static str, removed: usize) {
        self.steps.push(PurgeStep { table, removed });
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PurgeError {
    #[error("purge would leave orphaned rows: {}", .0.join("; "))]
    Orphans(Vec<String>),
}

/// Delete children before parents. The caller runs this inside one
/// transaction, so an orphan check failure rolls every step back.
pub fn purge_tables(tables: &mut Tables) -> Result<PurgeReport, PurgeError> {
    let mut report = PurgeReport::default();

    report.record("grade_history", tables.grade_history.len());
    tables.grade_history.clear();

    report.record("exam_registrations", tables.exam_registrations.len());
    tables.exam_registrations.clear();

    report.record("special_courses", tables.special_courses.len());
    tables.special_courses.clear();

    report.record("enrollments", tables.enrollments.len());
    tables.enrollments.clear();

    report.record("groups", tables.groups.len());
    tables.groups.clear();

    report.record("prerequisites", tables.prerequisites.len());
    tables.prerequisites.clear();

    report.record("subjects", tables.subjects.len());
    tables.subjects.clear();

    report.record("exam_periods", tables.exam_periods.len());
    tables.exam_periods.clear();

    report.record("students", tables.students.len());
    tables.students.clear();

    report.record("teachers", tables.teachers.len());
    tables.teachers.clear();

    report.record("careers", tables.careers.len());
    tables.careers.clear();

    let candidates: Vec<_> = tables.users.keys().copied().collect();
    let mut removed_users = 0;
    for id in candidates {
        let protected = tables
            .users
            .get(&id)
            .map_or(true, |user| user.username == PROTECTED_USERNAME);
        if protected {
            continue;
        }
        tables.users.remove(&id);
        removed_users += 1;
    }
    report.record("users", removed_users);
    report.preserved_users = tables
        .users
        .values()
        .map(|user| user.username.clone())
        .collect();

    let orphans = tables.orphans();
    if !orphans.is_empty() {
        return Err(PurgeError::Orphans(orphans));
    }

    Ok(report)
}
