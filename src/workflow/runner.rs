//! Run coordinator: executes planned stages across the fleet
//!
//! Stages run strictly in order. Within a stage, each operation runs in
//! turn; repository-scoped operations fan out over repositories in batches
//! of at most `max_parallel` worker threads. Every repository keeps one
//! derived [`Environment`] for the whole run, so variables it captures
//! stay with it from step to step and never reach its siblings.
//!
//! The coordinator owns repository isolation: once a repository raises
//! [`RepositorySkipped`], it is recorded in the shared state and passed over
//! by every later operation of the run.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::thread;

use crate::env::Environment;
use crate::errors::{format_operation_error, Cancelled, OperationError, RepositorySkipped};
use crate::operations::{record_repository_skip, RepositoryScopedOperation};
use crate::outcome::{
    final_outcome, step_summary_event, Event, EventCode, OutcomeKind, StepCompletion, StepOutcome,
};
use crate::plan::{OperationStage, ScheduledOperation};
use crate::repository::RepositoryState;

/// Final outcome of one step for one repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub repository: String,
    pub path: PathBuf,
    pub step: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// One record per (repository, step) that ran, in execution order
    pub records: Vec<StepRecord>,
    /// Hard-stopped repositories and the reason, keyed by normalized path
    pub skipped: BTreeMap<String, String>,
    /// Rendered operation errors
    pub failures: Vec<String>,
}

impl RunSummary {
    pub fn count(&self, kind: OutcomeKind) -> usize {
        self.records.iter().filter(|r| r.outcome.kind == kind).count()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn outcome(&self, path: &std::path::Path, step: &str) -> Option<&StepOutcome> {
        self.records
            .iter()
            .find(|r| r.path == path && r.step == step)
            .map(|r| &r.outcome)
    }
}

/// A repository and the environment derived for it
struct Lane {
    env: Environment,
    repository: RepositoryState,
}

enum LaneResult {
    /// Repository was already hard-stopped; nothing ran
    Passed,
    Finished(StepCompletion, Option<anyhow::Error>),
    Cancelled,
}

pub struct RunCoordinator<'a> {
    env: &'a Environment,
    max_parallel: usize,
}

impl<'a> RunCoordinator<'a> {
    pub fn new(env: &'a Environment, max_parallel: usize) -> Self {
        Self {
            env,
            max_parallel: max_parallel.max(1),
        }
    }

    /// Execute `stages` over `repositories`.
    ///
    /// Errors from repository-scoped operations are recorded per repository
    /// and the run continues. An error from a whole-run operation, or
    /// cancellation, ends the run.
    pub fn run(
        &self,
        stages: &[OperationStage],
        repositories: Vec<RepositoryState>,
    ) -> Result<RunSummary> {
        let mut lanes: Vec<Lane> = repositories
            .into_iter()
            .map(|repository| Lane {
                env: self.env.for_repository(),
                repository,
            })
            .collect();
        let mut summary = RunSummary::default();

        for (index, stage) in stages.iter().enumerate() {
            self.env.cancel.check()?;
            tracing::info!(stage = index + 1, steps = ?stage.names(), "stage started");

            for scheduled in &stage.operations {
                self.env.cancel.check()?;
                match scheduled.operation.as_repository_scoped() {
                    Some(operation) => {
                        self.run_scoped(scheduled, operation, &mut lanes, &mut summary)?
                    }
                    None => self.run_whole(scheduled, &mut lanes, &mut summary)?,
                }
            }

            tracing::info!(stage = index + 1, "stage finished");
        }

        summary.skipped = self.env.shared.skipped();
        Ok(summary)
    }

    fn run_scoped(
        &self,
        scheduled: &ScheduledOperation,
        operation: &dyn RepositoryScopedOperation,
        lanes: &mut [Lane],
        summary: &mut RunSummary,
    ) -> Result<()> {
        let step = scheduled.name.as_str();
        let mut results = Vec::with_capacity(lanes.len());

        for batch in lanes.chunks_mut(self.max_parallel) {
            let batch_results: Vec<LaneResult> = thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter_mut()
                    .map(|lane| scope.spawn(move || run_lane(step, operation, lane)))
                    .collect();
                handles
                    .into_iter()
                    .map(|handle| {
                        handle.join().unwrap_or_else(|_| {
                            LaneResult::Finished(
                                StepCompletion::Errored("worker thread panicked".to_string()),
                                None,
                            )
                        })
                    })
                    .collect()
            });
            results.extend(batch_results);
        }

        let known: Vec<RepositoryState> = lanes.iter().map(|l| l.repository.clone()).collect();
        let mut cancelled = false;
        for (lane, result) in lanes.iter().zip(results) {
            let (completion, error) = match result {
                LaneResult::Passed => continue,
                LaneResult::Cancelled => {
                    cancelled = true;
                    continue;
                }
                LaneResult::Finished(completion, error) => (completion, error),
            };

            if let Some(error) = error {
                let message = match error.downcast_ref::<OperationError>() {
                    Some(op_error) => format_operation_error(op_error, &known),
                    None => format!(
                        "{}: {} ({}) {error:#}",
                        scheduled.operation.kind(),
                        lane.repository.identifier(),
                        lane.repository.path.display()
                    ),
                };
                tracing::warn!(step, repository = %lane.repository.path.display(), "{message}");
                lane.env.for_step(step).emit(
                    Event::error(EventCode::OperationFailed, message.clone())
                        .for_repository(&lane.repository),
                );
                summary.failures.push(message);
            }

            self.summarize(step, lane, &completion, summary);
        }

        if cancelled {
            return Err(Cancelled.into());
        }
        Ok(())
    }

    fn run_whole(
        &self,
        scheduled: &ScheduledOperation,
        lanes: &mut [Lane],
        summary: &mut RunSummary,
    ) -> Result<()> {
        let step = scheduled.name.as_str();
        let active: Vec<usize> = (0..lanes.len())
            .filter(|&i| !self.env.shared.is_skipped(&lanes[i].repository.path))
            .collect();
        let mut repositories: Vec<RepositoryState> =
            active.iter().map(|&i| lanes[i].repository.clone()).collect();

        tracing::debug!(step, repositories = repositories.len(), "whole-run operation");
        scheduled
            .operation
            .execute(&self.env.for_step(step), &mut repositories)
            .with_context(|| format!("step '{step}' failed"))?;

        for (&i, repository) in active.iter().zip(repositories) {
            lanes[i].repository = repository;
            self.summarize(step, &lanes[i], &StepCompletion::Completed, summary);
        }
        Ok(())
    }

    fn summarize(
        &self,
        step: &str,
        lane: &Lane,
        completion: &StepCompletion,
        summary: &mut RunSummary,
    ) {
        let path = &lane.repository.path;
        let outcome = final_outcome(self.env.shared.outcome(path, step), completion);
        self.env
            .emit(step_summary_event(&lane.repository, step, &outcome));
        summary.records.push(StepRecord {
            repository: lane.repository.identifier(),
            path: path.clone(),
            step: step.to_string(),
            outcome,
        });
    }
}

fn run_lane(step: &str, operation: &dyn RepositoryScopedOperation, lane: &mut Lane) -> LaneResult {
    if lane.env.shared.is_skipped(&lane.repository.path) {
        return LaneResult::Passed;
    }
    if lane.env.cancel.is_cancelled() {
        return LaneResult::Cancelled;
    }

    let env = lane.env.for_step(step);
    match operation.execute_for_repository(&env, &mut lane.repository) {
        Ok(()) => LaneResult::Finished(StepCompletion::Completed, None),
        Err(error) => {
            if let Some(skipped) = error.downcast_ref::<RepositorySkipped>() {
                let reason = skipped.reason.clone();
                record_repository_skip(&env, &lane.repository, &reason);
                return LaneResult::Finished(StepCompletion::RepositorySkipped(reason), None);
            }
            if error.is::<Cancelled>() {
                return LaneResult::Cancelled;
            }
            LaneResult::Finished(StepCompletion::Errored(format!("{error:#}")), Some(error))
        }
    }
}
