use serde::Serialize;

use super::super::domain::{GroupId, StudentStatus};
use super::availability::ExamPeriodAvailability;
use super::rules::EligibilitySignals;

/// Verdict for an enrollment request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EligibilityDecision {
    Allow,
    Deny(DenialReason),
}

impl EligibilityDecision {
    pub fn summary(&self) -> String {
        match self {
            EligibilityDecision::Allow => "eligible".to_string(),
            EligibilityDecision::Deny(reason) => reason.summary(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "code", rename_all = "snake_case")]
pub enum DenialReason {
    StudentInactive { status: StudentStatus },
    ExamPeriodUnavailable { availability: ExamPeriodAvailability },
    AlreadyRegisteredForExam,
    RequirementSatisfied,
    LevelMismatch { current: u8, requested: u8 },
    AlreadyEnrolledAtLevel { level: u8 },
    AlreadyEnrolledInGroup { group_id: GroupId },
    RegistrationClosed,
    MissingPrerequisites { claves: Vec<String> },
}

impl DenialReason {
    pub fn summary(&self) -> String {
        match self {
            DenialReason::StudentInactive { status } => {
                format!("student status is {}", status.label())
            }
            DenialReason::ExamPeriodUnavailable { availability } => format!(
                "exam period unavailable: {}",
                availability.failing_conditions().join(", ")
            ),
            DenialReason::AlreadyRegisteredForExam => {
                "already registered for this exam period".to_string()
            }
            DenialReason::RequirementSatisfied => {
                "English requirement already satisfied".to_string()
            }
            DenialReason::LevelMismatch { current, .. } => {
                format!("must enroll at current level {current}")
            }
            DenialReason::AlreadyEnrolledAtLevel { level } => {
                format!("already enrolled at level {level}")
            }
            DenialReason::AlreadyEnrolledInGroup { group_id } => {
                format!("already enrolled in group {group_id}")
            }
            DenialReason::RegistrationClosed => "group registration window is closed".to_string(),
            DenialReason::MissingPrerequisites { claves } => {
                format!("missing prerequisites: {}", claves.join(", "))
            }
        }
    }

    /// Denials caused by an existing record rather than by the target or the student.
    pub fn is_duplicate(&self) -> bool {
        matches!(
            self,
            DenialReason::AlreadyEnrolledAtLevel { .. }
                | DenialReason::AlreadyEnrolledInGroup { .. }
                | DenialReason::AlreadyRegisteredForExam
        )
    }
}

/// First failing rule wins. Level rules run before the exact-group rule so a
/// student sees the level they are stuck at rather than a group conflict.
pub(crate) fn decide_outcome(signals: &EligibilitySignals) -> EligibilityDecision {
    if signals.student_status != StudentStatus::Activo {
        return EligibilityDecision::Deny(DenialReason::StudentInactive {
            status: signals.student_status,
        });
    }

    if let Some(availability) = signals.exam_period {
        if !availability.esta_disponible {
            return EligibilityDecision::Deny(DenialReason::ExamPeriodUnavailable { availability });
        }
    }

    if signals.already_registered_for_exam {
        return EligibilityDecision::Deny(DenialReason::AlreadyRegisteredForExam);
    }

    if let Some(requested) = signals.requested_level {
        if signals.requirement_satisfied {
            return EligibilityDecision::Deny(DenialReason::RequirementSatisfied);
        }

        if requested != signals.current_level {
            return EligibilityDecision::Deny(DenialReason::LevelMismatch {
                current: signals.current_level,
                requested,
            });
        }

        if signals.active_at_level {
            return EligibilityDecision::Deny(DenialReason::AlreadyEnrolledAtLevel {
                level: requested,
            });
        }
    }

    if let Some(group_id) = signals.active_in_group {
        return EligibilityDecision::Deny(DenialReason::AlreadyEnrolledInGroup { group_id });
    }

    if signals.registration_open == Some(false) {
        return EligibilityDecision::Deny(DenialReason::RegistrationClosed);
    }

    if !signals.missing_prerequisites.is_empty() {
        return EligibilityDecision::Deny(DenialReason::MissingPrerequisites {
            claves: signals.missing_prerequisites.clone(),
        });
    }

    EligibilityDecision::Allow
}
