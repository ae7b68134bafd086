//! Show the stages a workflow would run in
//! Usage: heddle plan [WORKFLOW]

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use super::resolve_workflow;
use crate::plan::{plan_operation_stages, OperationStage};
use crate::task::ActionRegistry;
use crate::workflow::WorkflowConfig;

pub fn execute(workflow: Option<PathBuf>) -> Result<()> {
    let path = resolve_workflow(workflow)?;
    let config = WorkflowConfig::load(&path)?;
    let nodes = config.build_nodes(&ActionRegistry::with_builtins())?;
    let stages = plan_operation_stages(&nodes)?;

    println!("{} {}", "Workflow:".bold(), path.display());
    print!("{}", render_stages(&stages));
    Ok(())
}

/// One block per stage, each step with its operation kind and dependencies
pub fn render_stages(stages: &[OperationStage]) -> String {
    if stages.is_empty() {
        return format!("{}\n", "No steps".dimmed());
    }

    let mut out = String::new();
    for (index, stage) in stages.iter().enumerate() {
        out.push_str(&format!("{}\n", format!("Stage {}", index + 1).cyan().bold()));
        for op in &stage.operations {
            let after = if op.dependencies.is_empty() {
                String::new()
            } else {
                format!(" (after {})", op.dependencies.join(", "))
            };
            out.push_str(&format!(
                "  {} {} [{}]{}\n",
                "▶".green(),
                op.name,
                op.operation.kind().dimmed(),
                after.dimmed()
            ));
        }
    }
    out
}
