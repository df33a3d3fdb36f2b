use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use super::tables::Tables;
use super::validation::ValidationError;

const MAX_SEQUENCE: u32 = 999_999;

fn matricula_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d{4})-(\d{6})$").expect("valid matricula pattern"))
}

/// Student enrollment number, `{year}-{sequence:06}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Matricula(String);

impl Matricula {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim();
        let captures = matricula_pattern()
            .captures(trimmed)
            .ok_or_else(|| ValidationError::Matricula(raw.to_string()))?;
        if &captures[2] == "000000" {
            return Err(ValidationError::Matricula(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn compose(year: i32, sequence: u32) -> Result<Self, ValidationError> {
        if !(1000..=9999).contains(&year) {
            return Err(ValidationError::Matricula(format!("{year}-{sequence:06}")));
        }
        if sequence == 0 || sequence > MAX_SEQUENCE {
            return Err(ValidationError::MatriculaSequenceExhausted { year });
        }
        Ok(Self(format!("{year}-{sequence:06}")))
    }

    pub fn year(&self) -> i32 {
        self.0[..4].parse().unwrap_or_default()
    }

    pub fn sequence(&self) -> u32 {
        self.0[5..].parse().unwrap_or_default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Matricula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Matricula {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Matricula::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Next matricula for `year`, one past the highest sequence already issued.
///
/// Soft-deleted students keep their numbers, so sequences are never reused.
pub fn next_matricula(tables: &Tables, year: i32) -> Result<Matricula, ValidationError> {
    let highest = tables
        .students
        .values()
        .filter(|student| student.matricula.year() == year)
        .map(|student| student.matricula.sequence())
        .max()
        .unwrap_or(0);

    Matricula::compose(year, highest + 1)
}
