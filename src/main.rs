use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use heddle::commands::{plan, run};
use heddle::env::CancellationToken;
use heddle::logging;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "heddle")]
#[command(about = "Batch mutations across fleets of git repositories", long_about = None)]
#[command(version)]
struct Cli {
    /// Debug-level diagnostics on stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a workflow against every discovered repository
    Run {
        /// Workflow file (default: ./heddle.yaml)
        workflow: Option<PathBuf>,

        /// Repository root to search; replaces the workflow's roots (repeatable)
        #[arg(long = "root", value_name = "DIR")]
        roots: Vec<PathBuf>,

        /// Seed a variable (repeatable)
        #[arg(long = "var", value_name = "NAME=VALUE")]
        vars: Vec<String>,

        /// Report what would change without touching anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// Apply without asking for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Maximum repositories processed at once
        #[arg(short = 'p', long)]
        max_parallel: Option<usize>,

        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show the stages a workflow would run in
    Plan {
        /// Workflow file (default: ./heddle.yaml)
        workflow: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Commands::Run {
            workflow,
            roots,
            vars,
            dry_run,
            yes,
            max_parallel,
            json,
        } => {
            let cancel = CancellationToken::new();
            let handler_token = cancel.clone();
            ctrlc::set_handler(move || {
                eprintln!("Cancelling after the current repository...");
                handler_token.cancel();
            })
            .context("Failed to install Ctrl-C handler")?;

            let args = run::RunArgs {
                workflow,
                roots,
                vars,
                dry_run,
                yes,
                max_parallel,
                json,
                verbose: cli.verbose,
            };
            let summary = run::execute(args, cancel)?;
            Ok(if summary.has_failures() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Plan { workflow } => {
            plan::execute(workflow)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
