use chrono::{DateTime, Utc};
use serde::Serialize;

use super::capacity::CapacityTarget;
use super::domain::{Enrollment, EnrollmentStatus, ExamRegistration, SpecialCourse, StudentId};

/// Transition rules for every enrollment-like record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrollmentStateMachine {
    passing_grade: f32,
}

/// What applying a transition must do besides writing the new status.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionPlan {
    pub from: EnrollmentStatus,
    pub to: EnrollmentStatus,
    pub release_capacity: bool,
    pub aprobado: bool,
    pub final_grade: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot move from {from} to {to}")]
    Illegal {
        from: EnrollmentStatus,
        to: EnrollmentStatus,
    },
    #[error("{0} requires a final grade")]
    MissingFinalGrade(EnrollmentStatus),
    #[error("grade {grade} is below the passing grade {passing}")]
    BelowPassing { grade: f32, passing: f32 },
    #[error("grade {grade} reaches the passing grade {passing}")]
    AbovePassing { grade: f32, passing: f32 },
    #[error("payment has not been approved")]
    PaymentPending,
    #[error("course does not require payment")]
    PaymentNotRequired,
    #[error("payment cannot be approved on a {0} course")]
    PaymentAfterClose(EnrollmentStatus),
    #[error("final grades can only be recorded while EN_CURSO, record is {0}")]
    NotInProgress(EnrollmentStatus),
}

impl EnrollmentStateMachine {
    pub fn new(passing_grade: f32) -> Self {
        Self { passing_grade }
    }

    pub fn passing_grade(&self) -> f32 {
        self.passing_grade
    }

    pub fn outcome_for_grade(&self, grade: f32) -> EnrollmentStatus {
        if grade >= self.passing_grade {
            EnrollmentStatus::Aprobado
        } else {
            EnrollmentStatus::Reprobado
        }
    }

    pub fn plan(
        &self,
        from: EnrollmentStatus,
        to: EnrollmentStatus,
        final_grade: Option<f32>,
    ) -> Result<TransitionPlan, TransitionError> {
        if !from.can_transition_to(to) {
            return Err(TransitionError::Illegal { from, to });
        }

        match to {
            EnrollmentStatus::Aprobado => {
                let grade = final_grade.ok_or(TransitionError::MissingFinalGrade(to))?;
                if grade < self.passing_grade {
                    return Err(TransitionError::BelowPassing {
                        grade,
                        passing: self.passing_grade,
                    });
                }
            }
            EnrollmentStatus::Reprobado => {
                let grade = final_grade.ok_or(TransitionError::MissingFinalGrade(to))?;
                if grade >= self.passing_grade {
                    return Err(TransitionError::AbovePassing {
                        grade,
                        passing: self.passing_grade,
                    });
                }
            }
            _ => {}
        }

        Ok(TransitionPlan {
            from,
            to,
            release_capacity: from.holds_capacity() && !to.holds_capacity(),
            aprobado: to == EnrollmentStatus::Aprobado,
            final_grade: final_grade.filter(|_| {
                matches!(to, EnrollmentStatus::Aprobado | EnrollmentStatus::Reprobado)
            }),
        })
    }

    /// Plan the terminal transition implied by a final grade.
    pub fn plan_final_grade(
        &self,
        from: EnrollmentStatus,
        grade: f32,
    ) -> Result<TransitionPlan, TransitionError> {
        if from != EnrollmentStatus::EnCurso {
            return Err(TransitionError::NotInProgress(from));
        }
        self.plan(from, self.outcome_for_grade(grade), Some(grade))
    }
}

impl Default for EnrollmentStateMachine {
    fn default() -> Self {
        Self::new(70.0)
    }
}

/// Rows whose status is driven by [`EnrollmentStateMachine`].
pub trait Lifecycle {
    fn student_id(&self) -> StudentId;
    fn status(&self) -> EnrollmentStatus;
    fn final_grade(&self) -> Option<f32>;
    fn ledger_target(&self) -> Option<CapacityTarget>;
    fn is_deleted(&self) -> bool;

    /// Write status, grade and approval flag together so `aprobado` never
    /// drifts from the grade.
    fn apply_plan(&mut self, plan: &TransitionPlan, at: DateTime<Utc>);

    fn soft_delete(&mut self, at: DateTime<Utc>);
}

impl Lifecycle for Enrollment {
    fn student_id(&self) -> StudentId {
        self.student_id
    }

    fn status(&self) -> EnrollmentStatus {
        self.status
    }

    fn final_grade(&self) -> Option<f32> {
        self.calificacion_final
    }

    fn ledger_target(&self) -> Option<CapacityTarget> {
        Some(Enrollment::capacity_target(self))
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn apply_plan(&mut self, plan: &TransitionPlan, at: DateTime<Utc>) {
        self.status = plan.to;
        if let Some(grade) = plan.final_grade {
            self.calificacion_final = Some(grade);
        }
        self.aprobado = plan.aprobado;
        self.updated_at = at;
    }

    fn soft_delete(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
        self.updated_at = at;
    }
}

impl Lifecycle for SpecialCourse {
    fn student_id(&self) -> StudentId {
        self.student_id
    }

    fn status(&self) -> EnrollmentStatus {
        self.status
    }

    fn final_grade(&self) -> Option<f32> {
        self.calificacion_final
    }

    fn ledger_target(&self) -> Option<CapacityTarget> {
        SpecialCourse::capacity_target(self)
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn apply_plan(&mut self, plan: &TransitionPlan, _at: DateTime<Utc>) {
        self.status = plan.to;
        if let Some(grade) = plan.final_grade {
            self.calificacion_final = Some(grade);
        }
        self.aprobado = plan.aprobado;
    }

    fn soft_delete(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
    }
}

impl Lifecycle for ExamRegistration {
    fn student_id(&self) -> StudentId {
        self.student_id
    }

    fn status(&self) -> EnrollmentStatus {
        self.status
    }

    fn final_grade(&self) -> Option<f32> {
        self.calificacion_final
    }

    fn ledger_target(&self) -> Option<CapacityTarget> {
        Some(ExamRegistration::capacity_target(self))
    }

    fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    fn apply_plan(&mut self, plan: &TransitionPlan, _at: DateTime<Utc>) {
        self.status = plan.to;
        if let Some(grade) = plan.final_grade {
            self.calificacion_final = Some(grade);
        }
        self.aprobado = plan.aprobado;
    }

    fn soft_delete(&mut self, at: DateTime<Utc>) {
        self.deleted_at = Some(at);
    }
}
