use crate::infra::{build_service, default_seed_plan, open_store, Service};
use clap::Args;
use escolar::config::{validate_process_env, AppConfig, ConfigError, DeploymentEnvReport};
use escolar::enrollment::{RosterImporter, SeedReport};
use escolar::error::AppError;
use escolar::telemetry;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Args, Debug, Default)]
pub(crate) struct SeedArgs {
    /// CSV roster of students to create after the base catalog
    #[arg(long)]
    pub(crate) roster: Option<PathBuf>,
}

#[derive(Args, Debug, Default)]
pub(crate) struct PurgeArgs {
    /// Skip the interactive confirmation
    #[arg(long)]
    pub(crate) yes: bool,
}

fn open_service() -> Result<Arc<Service>, AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    if config.storage.data_file.is_none() {
        warn!("ESCOLAR_DATA_FILE is not set; changes will not outlive this process");
    }
    let store = open_store(&config.storage)?;
    Ok(build_service(store, &config.academic))
}

pub(crate) fn run_seed(args: SeedArgs) -> Result<(), AppError> {
    let service = open_service()?;
    let mut plan = default_seed_plan();
    if let Some(path) = args.roster {
        plan.students = RosterImporter::from_path(&path)?;
        info!(path = %path.display(), students = plan.students.len(), "roster loaded");
    }

    let report = service.seed(&plan)?;
    render_seed_report(&report);
    Ok(())
}

fn render_seed_report(report: &SeedReport) {
    println!("Seed complete");
    for line in &report.created {
        println!("  created  {line}");
    }
    for line in &report.skipped {
        println!("  skipped  {line} (already present)");
    }
}

pub(crate) fn run_purge(args: PurgeArgs) -> Result<(), AppError> {
    if !args.yes {
        print!("This deletes every record except the admin login. Type 'yes' to continue: ");
        io::stdout().flush()?;
        if !confirmed(io::stdin().lock())? {
            println!("Purge cancelled");
            return Ok(());
        }
    }

    let service = open_service()?;
    let report = service.purge()?;
    println!("Purge complete ({} rows removed)", report.total_removed());
    for step in &report.steps {
        println!("  {:<22} {}", step.table, step.removed);
    }
    println!("  preserved users: {}", report.preserved_users.join(", "));
    Ok(())
}

fn confirmed<R: BufRead>(mut input: R) -> Result<bool, io::Error> {
    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim() == "yes")
}

pub(crate) fn run_check_env() -> Result<(), AppError> {
    let report = validate_process_env();
    render_env_report(&report);
    if report.is_valid() {
        Ok(())
    } else {
        Err(ConfigError::DeploymentEnv {
            failing: report.failures().map(|check| check.variable).collect(),
        }
        .into())
    }
}

fn render_env_report(report: &DeploymentEnvReport) {
    for check in &report.checks {
        let mark = if check.passed { "ok  " } else { "FAIL" };
        println!("[{mark}] {:<14} {}", check.variable, check.detail);
    }
}

pub(crate) fn run_report() -> Result<(), AppError> {
    let service = open_service()?;
    let report = service.occupancy_report()?;
    let rendered = serde_json::to_string_pretty(&report)
        .map_err(io::Error::from)?;
    println!("{rendered}");
    Ok(())
}
