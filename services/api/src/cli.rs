use crate::demo::{run_demo, run_import_roster, run_report, DemoArgs, ImportRosterArgs, ReportArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use incident_desk::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Incident Desk",
    about = "Run the school incident dashboard service or build reports from the command line",
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
    /// Build a dashboard report from student and incident JSON exports
    Report(ReportArgs),
    /// Reconcile a roster CSV against an existing student list
    ImportRoster(ImportRosterArgs),
    /// Run an end-to-end demo over a seeded classroom
    Demo(DemoArgs),
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
        Command::Report(args) => run_report(args).await,
        Command::ImportRoster(args) => run_import_roster(args).await,
        Command::Demo(args) => run_demo(args).await,
    }
}
