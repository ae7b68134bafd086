//! Operations: the units of work a workflow step runs
//!
//! Every step builds one [`Operation`]. Most operations act on one
//! repository at a time and also implement [`RepositoryScopedOperation`];
//! the run coordinator then drives them repository by repository, so a
//! failure or skip stays with the repository it happened in. Operations
//! that only implement [`Operation`] see the whole fleet at once and their
//! errors halt the run.

mod audit;
mod builder;
mod canonical;
mod protocol;
mod rename;
mod tasks;

#[cfg(test)]
mod tests;

use anyhow::Result;
use std::path::Path;

use crate::env::Environment;
use crate::errors::{join_errors, Cancelled, OperationError, RepositorySkipped};
use crate::options::{OptionError, OptionMap};
use crate::outcome::{Event, EventCode};
use crate::repository::RepositoryState;
use crate::safeguards::{evaluate_safeguards, CleanRequirement, SafeguardSet, Verdict};

pub use audit::AuditReportOperation;
pub use builder::{build_operation, normalize_command_path, COMMAND_PATHS};
pub use canonical::{
    apply_remote_url, resolve_canonical_remote, CanonicalRemote, CanonicalizeRemoteOperation,
};
pub use protocol::ProtocolConvertOperation;
pub use rename::FolderRenameOperation;
pub use tasks::TaskApplyOperation;

pub trait Operation: Send + Sync {
    /// Intrinsic name, used as the step name when none is configured
    fn name(&self) -> &str;

    /// Event-style code identifying the operation in error reports
    fn kind(&self) -> &'static str;

    /// Run against every active repository of the run.
    fn execute(&self, env: &Environment, repositories: &mut [RepositoryState]) -> Result<()>;

    fn as_repository_scoped(&self) -> Option<&dyn RepositoryScopedOperation> {
        None
    }

    /// Fill fleet-wide fallbacks into fields the step did not set itself.
    fn apply_defaults(&mut self, _defaults: &OperationDefaults) {}
}

pub trait RepositoryScopedOperation: Operation {
    fn execute_for_repository(&self, env: &Environment, repository: &mut RepositoryState)
        -> Result<()>;

    fn is_repository_scoped(&self) -> bool {
        true
    }
}

/// Run a repository-scoped operation over each repository in turn.
///
/// Skipped repositories are passed over. A repository that raises
/// [`RepositorySkipped`] is recorded as skipped for the rest of the run,
/// exactly as the run coordinator does; errors from the rest are joined.
pub fn execute_each(
    operation: &dyn RepositoryScopedOperation,
    env: &Environment,
    repositories: &mut [RepositoryState],
) -> Result<()> {
    let mut errors = Vec::new();
    for repository in repositories.iter_mut() {
        env.cancel.check()?;
        if env.shared.is_skipped(&repository.path) {
            continue;
        }
        match operation.execute_for_repository(env, repository) {
            Ok(()) => {}
            Err(e) => match e.downcast::<RepositorySkipped>() {
                Ok(skipped) => record_repository_skip(env, repository, &skipped.reason),
                Err(e) => errors.push(e),
            },
        }
    }
    join_errors(errors)
}

/// Take a repository out of the rest of the run.
pub(crate) fn record_repository_skip(env: &Environment, repository: &RepositoryState, reason: &str) {
    env.shared.skip_repository(&repository.path, reason);
    tracing::info!(
        step = env.step().unwrap_or_default(),
        repository = %repository.path.display(),
        "repository skipped for the rest of the run: {reason}"
    );
    env.emit(
        Event::warn(EventCode::RepositorySkipped, reason)
            .for_repository(repository)
            .with_detail("reason", reason),
    );
}

/// Fleet-wide fallbacks from the workflow's `defaults` section
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationDefaults {
    pub require_clean: Option<bool>,
}

impl OperationDefaults {
    pub fn from_options(options: &OptionMap) -> Result<Self, OptionError> {
        Ok(Self {
            require_clean: options.bool("require_clean")?,
        })
    }
}

/// An operation's `require_clean` setting and whether the step set it.
///
/// The explicit flag keeps a configured `false` from being replaced by a
/// fleet-wide default.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanPolicy {
    pub requirement: CleanRequirement,
    pub explicit: bool,
}

impl CleanPolicy {
    pub fn from_options(options: &OptionMap) -> Result<Self, OptionError> {
        match options.raw("require_clean") {
            Some(value) => Ok(Self {
                requirement: CleanRequirement::from_value("require_clean", value)?,
                explicit: true,
            }),
            None => Ok(Self::default()),
        }
    }

    pub fn apply_default(&mut self, defaults: &OperationDefaults) {
        if self.explicit {
            return;
        }
        if let Some(enabled) = defaults.require_clean {
            self.requirement.enabled = enabled;
        }
    }

    /// Check the policy; a dirty repository skips the current step only.
    ///
    /// Returns false after emitting a skip event when the step must not run.
    pub fn admits(&self, env: &Environment, repository: &RepositoryState) -> Result<bool> {
        if !self.requirement.enabled {
            return Ok(true);
        }
        let set = SafeguardSet {
            require_clean: Some(self.requirement.clone()),
            ..SafeguardSet::default()
        };
        match evaluate_safeguards(env, repository, &set)? {
            Verdict::Pass => Ok(true),
            Verdict::Fail { reason } => {
                env.emit(
                    Event::warn(EventCode::StepSkipped, reason.clone())
                        .for_repository(repository)
                        .with_detail("reason", reason),
                );
                Ok(false)
            }
        }
    }
}

/// Attach operation context to an error, leaving control-flow signals intact.
pub(crate) fn operation_error(kind: &str, subject: &Path, error: anyhow::Error) -> anyhow::Error {
    if error.is::<RepositorySkipped>() || error.is::<Cancelled>() || error.is::<OperationError>() {
        return error;
    }
    OperationError::new(kind, subject, error).into()
}

/// Ask before mutating, emitting the declined event on "no".
pub(crate) fn confirm_change(
    env: &Environment,
    repository: &RepositoryState,
    question: &str,
) -> Result<bool> {
    if env.confirm(question)? {
        return Ok(true);
    }
    env.emit(Event::info(EventCode::UserDeclined, "user declined").for_repository(repository));
    Ok(false)
}
