//! Workflow loading, repository discovery and run coordination

mod config;
mod discovery;
mod runner;


pub use config::{default_workflow_path, StepConfig, WorkflowConfig, DEFAULT_WORKFLOW_FILE};
pub use discovery::{discover_repositories, expand_root, DiscoveredRepository};
pub use runner::{RunCoordinator, RunSummary, StepRecord};

use anyhow::Result;

use crate::env::Environment;
use crate::repository::RepositoryState;

/// Inspect discovered repositories. One that cannot be inspected is
/// reported and left out of the run.
pub fn load_repositories(
    env: &Environment,
    discovered: &[DiscoveredRepository],
) -> Result<Vec<RepositoryState>> {
    let mut repositories = Vec::with_capacity(discovered.len());
    for found in discovered {
        env.cancel.check()?;
        match RepositoryState::load(env, &found.path, found.depth, found.nested) {
            Ok(repository) => repositories.push(repository),
            Err(e) => {
                tracing::warn!(path = %found.path.display(), "skipping repository: {e:#}");
            }
        }
    }
    Ok(repositories)
}
