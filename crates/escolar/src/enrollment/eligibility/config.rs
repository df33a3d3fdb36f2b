use serde::{Deserialize, Serialize};

use super::super::domain::ENGLISH_LEVELS;

/// Grading thresholds applied by the evaluator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibilityConfig {
    pub passing_grade: f32,
    pub english_levels: u8,
}

impl Default for EligibilityConfig {
    fn default() -> Self {
        Self {
            passing_grade: 70.0,
            english_levels: ENGLISH_LEVELS,
        }
    }
}
