use crate::demo::{run_demo, DemoArgs};
use crate::infra::{self, join_error};
use crate::server;
use clap::{Args, Parser, Subcommand};
use hirely::board::PRICING_TIERS;
use hirely::config::AppConfig;
use hirely::error::AppError;
use hirely::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "hirely",
    about = "Run the Hirely job board service and its background workflows",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service and the workflow runner (default command)
    Serve(ServeArgs),
    /// Operate on durable workflow runs
    Workflows {
        #[command(subcommand)]
        command: WorkflowsCommand,
    },
    /// Print the listing duration pricing tiers
    Pricing,
    /// Walk a listing through create, pay and expire on an in-memory database
    Demo(DemoArgs),
}

#[derive(Subcommand, Debug)]
enum WorkflowsCommand {
    /// Process every run that is due now, then exit
    Tick,
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
        Command::Workflows {
            command: WorkflowsCommand::Tick,
        } => run_tick().await,
        Command::Pricing => {
            print_pricing();
            Ok(())
        }
        Command::Demo(args) => run_demo(args).await,
    }
}

async fn run_tick() -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry, config.environment)?;

    // Blocking HTTP clients and SQLite calls stay off the async workers.
    let report = tokio::task::spawn_blocking(move || -> Result<_, AppError> {
        let store = infra::open_store(&config)?;
        let mailer = infra::configured_mailer(&config.mail)?;
        let runner =
            infra::build_runner(store, mailer, &config.server.public_url, &config.workflows);
        let now = chrono::Utc::now();
        runner.recover(now)?;
        Ok(runner.tick(now)?)
    })
    .await
    .map_err(join_error)??;

    println!(
        "processed {} run(s): {} completed, {} sleeping, {} retried, {} failed",
        report.processed, report.completed, report.sleeping, report.retried, report.failed
    );
    Ok(())
}

fn print_pricing() {
    println!("Listing durations");
    for tier in PRICING_TIERS.iter() {
        println!(
            "- {:>2} days  ${:>3}  {}",
            tier.days, tier.price, tier.description
        );
    }
}
