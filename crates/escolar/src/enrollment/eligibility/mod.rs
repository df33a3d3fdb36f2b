mod availability;
mod config;
mod policy;
mod rules;
mod snapshot;

pub use availability::ExamPeriodAvailability;
pub use config::EligibilityConfig;
pub use policy::{DenialReason, EligibilityDecision};
pub use snapshot::{EnrollmentTarget, RecordKind, RecordSummary, RequiredSubject, StudentSnapshot};

use policy::decide_outcome;
use serde::Serialize;

/// Pure evaluator: same snapshot and target always produce the same outcome.
#[derive(Debug, Clone)]
pub struct EligibilityEvaluator {
    config: EligibilityConfig,
}

impl EligibilityEvaluator {
    pub fn new(config: EligibilityConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EligibilityConfig {
        &self.config
    }

    pub fn evaluate(&self, snapshot: &StudentSnapshot, target: &EnrollmentTarget) -> EligibilityOutcome {
        let (checks, signals) = rules::run_checks(snapshot, target, &self.config);
        let decision = decide_outcome(&signals);

        EligibilityOutcome {
            student_id: snapshot.student_id,
            decision,
            checks,
        }
    }

    pub fn requirement(&self, snapshot: &StudentSnapshot) -> RequirementProgress {
        rules::english_requirement(snapshot, &self.config)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EligibilityRule {
    StudentActive,
    RequirementOutstanding,
    CurrentLevel,
    NoActiveRecordAtLevel,
    NoActiveRecordInGroup,
    GroupRegistrationWindow,
    PrerequisitesApproved,
    ExamPeriodStatusOpen,
    ExamPeriodNotDeleted,
    ExamPeriodRegistrationWindow,
    ExamPeriodCapacity,
    NoActiveExamRegistration,
}

/// One evaluated condition, reported whether it passed or not.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EligibilityCheck {
    pub rule: EligibilityRule,
    pub passed: bool,
    pub detail: String,
}

impl EligibilityCheck {
    pub(crate) fn new(rule: EligibilityRule, passed: bool, detail: String) -> Self {
        Self {
            rule,
            passed,
            detail,
        }
    }
}

/// Evaluation output: the verdict plus the full decision trail.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibilityOutcome {
    pub student_id: super::domain::StudentId,
    pub decision: EligibilityDecision,
    pub checks: Vec<EligibilityCheck>,
}

impl EligibilityOutcome {
    pub fn is_allowed(&self) -> bool {
        matches!(self.decision, EligibilityDecision::Allow)
    }

    pub fn denial(&self) -> Option<&DenialReason> {
        match &self.decision {
            EligibilityDecision::Allow => None,
            EligibilityDecision::Deny(reason) => Some(reason),
        }
    }

    pub fn check(&self, rule: EligibilityRule) -> Option<&EligibilityCheck> {
        self.checks.iter().find(|check| check.rule == rule)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementProgress {
    pub approved_levels: Vec<u8>,
    pub average: Option<f32>,
    pub satisfied: bool,
}
