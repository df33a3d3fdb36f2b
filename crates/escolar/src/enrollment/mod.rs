//! Enrollment, capacity and eligibility core.
//!
//! Requests flow through [`EnrollmentService`]: eligibility is evaluated on a
//! snapshot of the student's records, a capacity slot is reserved, and the
//! record is created in `INSCRITO`, all inside one store transaction. Status
//! changes go through [`EnrollmentStateMachine`], which decides when a slot
//! is given back.

pub mod capacity;
pub mod domain;
pub mod eligibility;
pub mod extract;
pub mod lifecycle;
pub mod listing;
pub mod matricula;
pub mod memory;
pub mod purge;
pub mod reporting;
pub mod repository;
pub mod requests;
pub mod roster;
pub mod router;
pub mod service;
pub mod tables;
pub mod validation;

#[cfg(test)]
mod tests;

pub use capacity::{CapacityError, CapacityTarget, CapacityTicket, CapacityUsage};
pub use domain::{
    EnrollmentStatus, ExamPeriodStatus, RecordRef, Role, StudentStatus, ENGLISH_LEVELS,
};
pub use eligibility::{
    DenialReason, EligibilityCheck, EligibilityConfig, EligibilityDecision, EligibilityEvaluator,
    EligibilityOutcome, EligibilityRule, EnrollmentTarget, ExamPeriodAvailability,
    RequirementProgress, StudentSnapshot,
};
pub use lifecycle::{EnrollmentStateMachine, TransitionError, TransitionPlan};
pub use listing::{Page, PageRequest, Pagination, SortOrder};
pub use matricula::Matricula;
pub use memory::MemoryStore;
pub use purge::{PurgeError, PurgeReport, PROTECTED_USERNAME};
pub use repository::{EntityStore, RepositoryError};
pub use roster::{AdminAccount, RosterEntry, RosterImportError, RosterImporter, SeedPlan, SeedReport};
pub use router::enrollment_router;
pub(crate) use router::error_response;
pub use service::{
    Clock, EnrollmentReceipt, EnrollmentService, EnrollmentServiceError, FixedClock,
    LifecycleRecord, SystemClock, TransitionReceipt,
};
pub use tables::Tables;
pub use validation::{AcademicPeriod, ValidationError};
