use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use super::domain::ENGLISH_LEVELS;

/// Inputs rejected before any write is attempted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid matricula '{0}', expected YYYY-NNNNNN")]
    Matricula(String),
    #[error("matricula sequence exhausted for {year}")]
    MatriculaSequenceExhausted { year: i32 },
    #[error("invalid CURP '{0}'")]
    Curp(String),
    #[error("invalid period '{0}', expected YYYY-1 or YYYY-2")]
    Period(String),
    #[error("semester {0} outside 1-12")]
    Semester(u8),
    #[error("English level {0} outside 1-{}", ENGLISH_LEVELS)]
    EnglishLevel(u8),
    #[error("grade {0} outside 0-100")]
    Grade(f32),
    #[error("partial grade index {0} outside 1-3")]
    PartialIndex(u8),
    #[error("capacity bounds invalid: minimum {minimum}, maximum {maximum}")]
    CapacityBounds { minimum: u32, maximum: u32 },
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
    #[error("{field} window ends before it starts")]
    Window { field: &'static str },
    #[error("unknown sort field '{0}'")]
    UnknownSortField(String),
    #[error("page and limit must be positive")]
    Pagination,
    #[error("a subject cannot be its own prerequisite")]
    SelfPrerequisite,
    #[error("group teaches English level {group_level}, request was for level {requested}")]
    GroupLevelMismatch { group_level: u8, requested: u8 },
    #[error("group does not offer an English course")]
    NotAnEnglishGroup,
    #[error("provide exactly one of groupId, level or examPeriodId")]
    EligibilityTarget,
}

fn curp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[A-Z]{4}\d{6}[HM][A-Z]{5}[A-Z0-9]\d$").expect("valid curp pattern")
    })
}

fn period_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d{4}-[12]$").expect("valid period pattern"))
}

/// Academic term identifier, `YYYY-1` or `YYYY-2`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AcademicPeriod(String);

impl AcademicPeriod {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        if period_pattern().is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(ValidationError::Period(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AcademicPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for AcademicPeriod {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        AcademicPeriod::parse(&raw).map_err(serde::de::Error::custom)
    }
}

pub fn curp(raw: &str) -> Result<String, ValidationError> {
    let normalized = raw.trim().to_ascii_uppercase();
    if curp_pattern().is_match(&normalized) {
        Ok(normalized)
    } else {
        Err(ValidationError::Curp(raw.to_string()))
    }
}

pub fn semester(value: u8) -> Result<u8, ValidationError> {
    if (1..=12).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::Semester(value))
    }
}

pub fn english_level(value: u8) -> Result<u8, ValidationError> {
    if (1..=ENGLISH_LEVELS).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::EnglishLevel(value))
    }
}

pub fn grade(value: f32) -> Result<f32, ValidationError> {
    if value.is_finite() && (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::Grade(value))
    }
}

pub fn non_empty(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::EmptyField { field })
    } else {
        Ok(trimmed.to_string())
    }
}

pub fn capacity_bounds(minimum: u32, maximum: u32) -> Result<(), ValidationError> {
    if maximum == 0 || minimum > maximum {
        return Err(ValidationError::CapacityBounds { minimum, maximum });
    }
    Ok(())
}

pub fn window<T: PartialOrd>(field: &'static str, start: &T, end: &T) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::Window { field });
    }
    Ok(())
}
