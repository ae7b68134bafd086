//! CLI command implementations

pub mod plan;
pub mod run;

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::workflow::{default_workflow_path, DEFAULT_WORKFLOW_FILE};

/// The workflow named on the command line, or the default location
pub fn resolve_workflow(path: Option<PathBuf>) -> Result<PathBuf> {
    if let Some(path) = path {
        if !path.is_file() {
            bail!("Workflow file not found: {}", path.display());
        }
        return Ok(path);
    }
    match default_workflow_path() {
        Some(path) => Ok(path),
        None => bail!("No workflow given and no {DEFAULT_WORKFLOW_FILE} found"),
    }
}
