mod environment;

pub use environment::{validate_deployment_env, validate_process_env, DeploymentEnvReport, EnvCheck};

use crate::enrollment::EligibilityConfig;
use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub storage: StorageConfig,
    pub academic: AcademicConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = env::var("APP_LOG_FORMAT")
            .map(|value| LogFormat::from_str(&value))
            .unwrap_or_default();

        let data_file = env::var("ESCOLAR_DATA_FILE")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let passing_grade = match env::var("ESCOLAR_PASSING_GRADE") {
            Ok(raw) => parse_passing_grade(&raw)?,
            Err(_) => AcademicConfig::DEFAULT_PASSING_GRADE,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            storage: StorageConfig { data_file },
            academic: AcademicConfig { passing_grade },
        })
    }
}

fn parse_passing_grade(raw: &str) -> Result<f32, ConfigError> {
    let value = raw
        .trim()
        .parse::<f32>()
        .map_err(|_| ConfigError::InvalidPassingGrade(raw.to_string()))?;
    if !(0.0..=100.0).contains(&value) {
        return Err(ConfigError::InvalidPassingGrade(raw.to_string()));
    }
    Ok(value)
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Pretty,
}

impl LogFormat {
    fn from_str(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("pretty") {
            Self::Pretty
        } else {
            Self::Compact
        }
    }
}

/// Where the entity store keeps its JSON snapshot. `None` keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    pub data_file: Option<PathBuf>,
}

/// Grading policy shared by eligibility and the enrollment lifecycle.
#[derive(Debug, Clone)]
pub struct AcademicConfig {
    pub passing_grade: f32,
}

impl AcademicConfig {
    pub const DEFAULT_PASSING_GRADE: f32 = 70.0;

    pub fn eligibility(&self) -> EligibilityConfig {
        EligibilityConfig {
            passing_grade: self.passing_grade,
            ..EligibilityConfig::default()
        }
    }
}

impl Default for AcademicConfig {
    fn default() -> Self {
        Self {
            passing_grade: Self::DEFAULT_PASSING_GRADE,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidPassingGrade(String),
    DeploymentEnv { failing: Vec<&'static str> },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidPassingGrade(raw) => write!(
                f,
                "ESCOLAR_PASSING_GRADE must be a number between 0 and 100 (found '{raw}')"
            ),
            ConfigError::DeploymentEnv { failing } => {
                write!(f, "deployment environment is incomplete: {}", failing.join(", "))
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidPassingGrade(_)
            | ConfigError::DeploymentEnv { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
