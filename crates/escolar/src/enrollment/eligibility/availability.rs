use chrono::{DateTime, Utc};
use serde::Serialize;

use super::super::domain::{ExamPeriod, ExamPeriodId, ExamPeriodStatus};

/// Each availability condition evaluated on its own so a denial can say exactly which failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamPeriodAvailability {
    pub exam_period_id: ExamPeriodId,
    pub is_open_status: bool,
    pub is_not_deleted: bool,
    pub is_in_registration_period: bool,
    pub has_capacity: bool,
    pub esta_disponible: bool,
}

impl ExamPeriodAvailability {
    pub fn assess(period: &ExamPeriod, now: DateTime<Utc>) -> Self {
        let is_open_status = period.estatus == ExamPeriodStatus::Abierto;
        let is_not_deleted = period.deleted_at.is_none();
        let is_in_registration_period =
            period.fecha_inscripcion_inicio <= now && now <= period.fecha_inscripcion_fin;
        let has_capacity = period.cupo_actual < period.cupo_maximo;

        Self {
            exam_period_id: period.id,
            is_open_status,
            is_not_deleted,
            is_in_registration_period,
            has_capacity,
            esta_disponible: is_open_status
                && is_not_deleted
                && is_in_registration_period
                && has_capacity,
        }
    }

    pub fn failing_conditions(&self) -> Vec<&'static str> {
        let mut failing = Vec::new();
        if !self.is_open_status {
            failing.push("status is not ABIERTO");
        }
        if !self.is_not_deleted {
            failing.push("period was deleted");
        }
        if !self.is_in_registration_period {
            failing.push("outside the registration window");
        }
        if !self.has_capacity {
            failing.push("no capacity left");
        }
        failing
    }
}
