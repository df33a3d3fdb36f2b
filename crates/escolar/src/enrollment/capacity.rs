use std::fmt;

use serde::{Deserialize, Serialize};

use super::domain::{ExamPeriodId, GroupId};
use super::tables::Tables;

/// Anything with a `cupoActual`/`cupoMaximo` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum CapacityTarget {
    Group(GroupId),
    ExamPeriod(ExamPeriodId),
}

impl fmt::Display for CapacityTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CapacityTarget::Group(id) => write!(f, "group {id}"),
            CapacityTarget::ExamPeriod(id) => write!(f, "exam period {id}"),
        }
    }
}

/// Proof of a reserved slot, carrying the ledger state right after the reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityTicket {
    pub target: CapacityTarget,
    pub cupo_actual: u32,
    pub cupo_maximo: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityUsage {
    pub cupo_actual: u32,
    pub cupo_maximo: u32,
}

impl CapacityUsage {
    pub fn has_room(&self) -> bool {
        self.cupo_actual < self.cupo_maximo
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CapacityError {
    #[error("capacity exceeded for {target}: {cupo_actual} of {cupo_maximo} slots taken")]
    CapacityExceeded {
        target: CapacityTarget,
        cupo_actual: u32,
        cupo_maximo: u32,
    },
    #[error("no capacity ledger for {0}")]
    NotReserved(CapacityTarget),
}

fn slots_mut(tables: &mut Tables, target: CapacityTarget) -> Option<(&mut u32, u32)> {
    match target {
        CapacityTarget::Group(id) => tables
            .groups
            .get_mut(&id)
            .map(|group| (&mut group.cupo_actual, group.cupo_maximo)),
        CapacityTarget::ExamPeriod(id) => tables
            .exam_periods
            .get_mut(&id)
            .map(|period| (&mut period.cupo_actual, period.cupo_maximo)),
    }
}

pub fn usage(tables: &Tables, target: CapacityTarget) -> Result<CapacityUsage, CapacityError> {
    let (cupo_actual, cupo_maximo) = match target {
        CapacityTarget::Group(id) => tables
            .groups
            .get(&id)
            .map(|group| (group.cupo_actual, group.cupo_maximo)),
        CapacityTarget::ExamPeriod(id) => tables
            .exam_periods
            .get(&id)
            .map(|period| (period.cupo_actual, period.cupo_maximo)),
    }
    .ok_or(CapacityError::NotReserved(target))?;

    Ok(CapacityUsage {
        cupo_actual,
        cupo_maximo,
    })
}

/// Take one slot. Must run inside a store transaction so the check and the
/// increment are a single step for every other writer.
pub fn reserve(tables: &mut Tables, target: CapacityTarget) -> Result<CapacityTicket, CapacityError> {
    let (cupo_actual, cupo_maximo) =
        slots_mut(tables, target).ok_or(CapacityError::NotReserved(target))?;

    if *cupo_actual >= cupo_maximo {
        return Err(CapacityError::CapacityExceeded {
            target,
            cupo_actual: *cupo_actual,
            cupo_maximo,
        });
    }

    *cupo_actual += 1;
    Ok(CapacityTicket {
        target,
        cupo_actual: *cupo_actual,
        cupo_maximo,
    })
}

/// Give one slot back. Releasing an empty ledger is a no-op so retried
/// cancellations stay harmless.
pub fn release(tables: &mut Tables, target: CapacityTarget) -> Result<(), CapacityError> {
    let (cupo_actual, _) = slots_mut(tables, target).ok_or(CapacityError::NotReserved(target))?;
    *cupo_actual = cupo_actual.saturating_sub(1);
    Ok(())
}
