use crate::admin::{run_check_env, run_purge, run_report, run_seed, PurgeArgs, SeedArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use escolar::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Escolar",
    about = "Run and administer the school enrollment service from the command line",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Create the admin login and base catalog; safe to run repeatedly
    Seed(SeedArgs),
    /// Delete every record except the admin login
    Purge(PurgeArgs),
    /// Validate the deployment environment variables
    CheckEnv,
    /// Print group occupancy and exam period availability as JSON
    Report,
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Seed(args) => run_seed(args),
        Command::Purge(args) => run_purge(args),
        Command::CheckEnv => run_check_env(),
        Command::Report => run_report(),
    }
}
