//! `tasks apply`: run declarative tasks in every repository

use anyhow::Result;

use super::{
    execute_each, operation_error, CleanPolicy, Operation, OperationDefaults,
    RepositoryScopedOperation,
};
use crate::env::Environment;
use crate::repository::RepositoryState;
use crate::task::{run_task, TaskDefinition, TaskOutcome};

#[derive(Debug, Clone)]
pub struct TaskApplyOperation {
    pub tasks: Vec<TaskDefinition>,
    pub clean: CleanPolicy,
}

impl Operation for TaskApplyOperation {
    fn name(&self) -> &str {
        "tasks apply"
    }

    fn kind(&self) -> &'static str {
        "task_apply"
    }

    fn execute(&self, env: &Environment, repositories: &mut [RepositoryState]) -> Result<()> {
        execute_each(self, env, repositories)
    }

    fn as_repository_scoped(&self) -> Option<&dyn RepositoryScopedOperation> {
        Some(self)
    }

    fn apply_defaults(&mut self, defaults: &OperationDefaults) {
        self.clean.apply_default(defaults);
    }
}

impl RepositoryScopedOperation for TaskApplyOperation {
    /// Tasks run in declared order. A task skipped for this repository does
    /// not stop the tasks after it; a hard stop or failure does.
    fn execute_for_repository(
        &self,
        env: &Environment,
        repository: &mut RepositoryState,
    ) -> Result<()> {
        if !self.clean.admits(env, repository)? {
            return Ok(());
        }

        for task in &self.tasks {
            let subject = repository.path.clone();
            let outcome = run_task(env, repository, task)
                .map_err(|e| operation_error(self.kind(), &subject, e))?;
            tracing::debug!(
                repository = %repository.path.display(),
                task = %task.name,
                ?outcome,
                "task finished"
            );
            if let TaskOutcome::SkippedMidExecution { action, reason } = &outcome {
                tracing::info!(task = %task.name, %action, "task stopped early: {reason}");
            }
        }
        Ok(())
    }
}
