//! Run a workflow across the fleet
//! Usage: heddle run [WORKFLOW] [--root DIR]... [--var NAME=VALUE]... [--dry-run] [--yes]

use anyhow::{bail, Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use super::resolve_workflow;
use crate::env::{CancellationToken, Environment};
use crate::outcome::OutcomeKind;
use crate::plan::plan_operation_stages;
use crate::ports::{check_git_available, AutoConfirm, ConsoleReporter, Prompter, TerminalPrompter};
use crate::task::ActionRegistry;
use crate::workflow::{
    discover_repositories, expand_root, load_repositories, RunCoordinator, RunSummary,
    WorkflowConfig,
};

/// Worker threads per operation when neither the CLI nor the workflow says
pub const DEFAULT_MAX_PARALLEL: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub workflow: Option<PathBuf>,
    pub roots: Vec<PathBuf>,
    /// `NAME=VALUE` pairs seeded over the workflow's variables
    pub vars: Vec<String>,
    pub dry_run: bool,
    pub yes: bool,
    pub max_parallel: Option<usize>,
    pub json: bool,
    pub verbose: bool,
}

/// Split `NAME=VALUE`
pub fn parse_var(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once('=') else {
        bail!("Invalid variable '{raw}': expected NAME=VALUE");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("Invalid variable '{raw}': name is empty");
    }
    Ok((name.to_string(), value.to_string()))
}

pub fn execute(args: RunArgs, cancel: CancellationToken) -> Result<RunSummary> {
    check_git_available()?;

    let path = resolve_workflow(args.workflow.clone())?;
    let config = WorkflowConfig::load(&path)?;
    let actions = ActionRegistry::with_builtins();
    let nodes = config.build_nodes(&actions)?;
    let stages = plan_operation_stages(&nodes)?;

    let roots: Vec<PathBuf> = if args.roots.is_empty() {
        config.roots.iter().map(|r| expand_root(r)).collect()
    } else {
        args.roots.clone()
    };
    if roots.is_empty() {
        bail!("No repository roots: set `roots` in the workflow or pass --root");
    }

    let prompter: Arc<dyn Prompter> = if args.yes || args.dry_run {
        Arc::new(AutoConfirm)
    } else {
        Arc::new(TerminalPrompter::default())
    };
    let mut builder = Environment::builder()
        .actions(actions)
        .prompter(prompter)
        .reporter(Arc::new(ConsoleReporter::new(args.json, args.verbose)))
        .cancellation(cancel)
        .dry_run(args.dry_run);
    for (name, value) in config.seeds()? {
        builder = builder.seed(&name, &value);
    }
    for raw in &args.vars {
        let (name, value) = parse_var(raw)?;
        builder = builder.seed(&name, &value);
    }
    let env = builder.build();

    let discovered = discover_repositories(&roots)?;
    let repositories = load_repositories(&env, &discovered)?;
    tracing::info!(
        run_id = %env.run_id,
        repositories = repositories.len(),
        stages = stages.len(),
        dry_run = env.dry_run,
        "run started"
    );

    let max_parallel = args
        .max_parallel
        .or(config.max_parallel)
        .unwrap_or(DEFAULT_MAX_PARALLEL);
    let summary = RunCoordinator::new(&env, max_parallel)
        .run(&stages, repositories)
        .with_context(|| format!("Workflow {} did not complete", path.display()))?;

    if !args.json {
        print_summary(&summary);
    }
    Ok(summary)
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!("{}", "Summary".bold());
    println!(
        "  {} applied, {} no-op, {} skipped, {} failed",
        summary.count(OutcomeKind::Applied).to_string().green(),
        summary.count(OutcomeKind::NoOp),
        summary.count(OutcomeKind::Skipped).to_string().yellow(),
        summary.count(OutcomeKind::Failed).to_string().red()
    );
    for (path, reason) in &summary.skipped {
        println!("  {} {path}: {reason}", "skipped".yellow());
    }
    for failure in &summary.failures {
        println!("  {} {failure}", "✗".red().bold());
    }
}
