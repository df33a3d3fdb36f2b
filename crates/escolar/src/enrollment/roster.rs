use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use super::domain::CareerId;
use super::requests::{NewCareer, NewStudent, NewTeacher};

#[derive(Debug)]
pub enum RosterImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io(err) => write!(f, "failed to read roster: {}", err),
            RosterImportError::Csv(err) => write!(f, "invalid roster CSV data: {}", err),
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io(err) => Some(err),
            RosterImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for RosterImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for RosterImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

/// The login that seeding creates first and purging never removes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub username: String,
    pub password_digest: String,
}

/// One student row of a roster file. Careers are referenced by clave.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RosterEntry {
    pub username: String,
    pub nombre: String,
    pub apellido_paterno: String,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub apellido_materno: Option<String>,
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub curp: Option<String>,
    pub career_clave: String,
    pub semester: u8,
    #[serde(default)]
    pub english_level: Option<u8>,
    #[serde(default)]
    pub enrollment_year: Option<i32>,
}

impl RosterEntry {
    pub fn to_request(&self, career_id: CareerId) -> NewStudent {
        NewStudent {
            username: self.username.clone(),
            password_digest: String::new(),
            nombre: self.nombre.clone(),
            apellido_paterno: self.apellido_paterno.clone(),
            apellido_materno: self.apellido_materno.clone(),
            curp: self.curp.clone(),
            career_id,
            semester: self.semester,
            english_level: self.english_level,
            enrollment_year: self.enrollment_year,
        }
    }
}

/// Everything `seed` should make sure exists.
#[derive(Debug, Clone, PartialEq)]
pub struct SeedPlan {
    pub admin: AdminAccount,
    pub careers: Vec<NewCareer>,
    pub teachers: Vec<NewTeacher>,
    pub students: Vec<RosterEntry>,
}

impl SeedPlan {
    pub fn with_admin(username: impl Into<String>) -> Self {
        Self {
            admin: AdminAccount {
                username: username.into(),
                password_digest: String::new(),
            },
            careers: Vec::new(),
            teachers: Vec::new(),
            students: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedReport {
    pub created: Vec<String>,
    pub skipped: Vec<String>,
}

pub struct RosterImporter;

impl RosterImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<RosterEntry>, RosterImportError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Headers: `username,nombre,apellido_paterno,apellido_materno,curp,career_clave,semester,english_level,enrollment_year`.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<RosterEntry>, RosterImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut entries = Vec::new();

        for record in csv_reader.deserialize::<RosterEntry>() {
            entries.push(record?);
        }

        Ok(entries)
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}
