//! Run environment and per-repository isolation
//!
//! The [`Environment`] is the single place collaborators are threaded
//! through execution. One base environment exists per run; the run
//! coordinator derives one clone per repository with
//! [`Environment::for_repository`]. Clones share every handle and the
//! [`SharedState`] by reference but own a fresh [`VariableStore`], so values
//! captured while processing one repository never leak into another.

mod cancel;
mod shared;
mod variables;

#[cfg(test)]
mod tests;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::outcome::{classify_step_outcome, Event};
use crate::ports::{
    AutoConfirm, Confirmation, ConsoleReporter, FileSystem, GitInspector, MetadataResolver, OfflineResolver,
    OsFileSystem, ProcessRunner, Prompter, Reporter, RepositoryInspector, SystemRunner,
};
use crate::task::ActionRegistry;

pub use cancel::CancellationToken;
pub use shared::{normalize_repository_path, SharedState};
pub use variables::VariableStore;

pub struct Environment {
    pub runner: Arc<dyn ProcessRunner>,
    pub fs: Arc<dyn FileSystem>,
    pub prompter: Arc<dyn Prompter>,
    pub reporter: Arc<dyn Reporter>,
    pub resolver: Arc<dyn MetadataResolver>,
    pub inspector: Arc<dyn RepositoryInspector>,
    pub actions: Arc<ActionRegistry>,
    pub variables: Arc<VariableStore>,
    pub shared: Arc<SharedState>,
    pub cancel: CancellationToken,
    pub dry_run: bool,
    pub run_id: String,
    /// Values seeded by run configuration; every repository clone starts from these
    seeds: Arc<BTreeMap<String, String>>,
    step: Option<String>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("run_id", &self.run_id)
            .field("dry_run", &self.dry_run)
            .field("step", &self.step)
            .field("variables", &self.variables)
            .finish_non_exhaustive()
    }
}

impl Environment {
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    /// Derive the environment for one repository of this run.
    ///
    /// Handles, shared state and cancellation are shared. The variable store
    /// is brand new and holds only the run's seeded values.
    pub fn for_repository(&self) -> Environment {
        Environment {
            variables: Arc::new(VariableStore::seeded(self.seeds.iter())),
            step: None,
            ..self.share()
        }
    }

    /// View of this environment tagged with the step being executed.
    ///
    /// The variable store is shared with `self`: use it for steps of the same
    /// repository (or of the whole run on the base environment) only.
    pub fn for_step(&self, step: &str) -> Environment {
        Environment {
            step: Some(step.to_string()),
            ..self.share()
        }
    }

    fn share(&self) -> Environment {
        Environment {
            runner: Arc::clone(&self.runner),
            fs: Arc::clone(&self.fs),
            prompter: Arc::clone(&self.prompter),
            reporter: Arc::clone(&self.reporter),
            resolver: Arc::clone(&self.resolver),
            inspector: Arc::clone(&self.inspector),
            actions: Arc::clone(&self.actions),
            variables: Arc::clone(&self.variables),
            shared: Arc::clone(&self.shared),
            cancel: self.cancel.clone(),
            dry_run: self.dry_run,
            run_id: self.run_id.clone(),
            seeds: Arc::clone(&self.seeds),
            step: self.step.clone(),
        }
    }

    pub fn step(&self) -> Option<&str> {
        self.step.as_deref()
    }

    pub fn seeds(&self) -> &BTreeMap<String, String> {
        &self.seeds
    }

    /// Ask for confirmation, honouring an earlier "all" answer.
    pub fn confirm(&self, question: &str) -> anyhow::Result<bool> {
        if self.shared.confirm_all() {
            return Ok(true);
        }
        let answer = self.prompter.confirm(question)?;
        if answer == Confirmation::All {
            self.shared.set_confirm_all();
        }
        Ok(answer.accepted())
    }

    /// Push an event: tag it with the current step, fold its classification
    /// into the shared outcome map, and hand it to the reporter.
    pub fn emit(&self, mut event: Event) {
        if event.step.is_none() {
            event.step = self.step.clone();
        }

        if let (Some(path), Some(step)) = (&event.repository_path, &event.step) {
            if let Some(observed) = classify_step_outcome(&event) {
                self.shared.record_outcome(path, step, observed);
            }
        }

        tracing::debug!(
            code = event.code.as_str(),
            repository = event.repository.as_deref().unwrap_or("-"),
            step = event.step.as_deref().unwrap_or("-"),
            "{}",
            event.message
        );
        self.reporter.report(&event);
    }
}

/// Builds the base environment of a run. Unset collaborators get the
/// real-system defaults.
#[derive(Default)]
pub struct EnvironmentBuilder {
    runner: Option<Arc<dyn ProcessRunner>>,
    fs: Option<Arc<dyn FileSystem>>,
    prompter: Option<Arc<dyn Prompter>>,
    reporter: Option<Arc<dyn Reporter>>,
    resolver: Option<Arc<dyn MetadataResolver>>,
    inspector: Option<Arc<dyn RepositoryInspector>>,
    actions: Option<ActionRegistry>,
    seeds: BTreeMap<String, String>,
    cancel: Option<CancellationToken>,
    dry_run: bool,
}

impl EnvironmentBuilder {
    pub fn runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn fs(mut self, fs: Arc<dyn FileSystem>) -> Self {
        self.fs = Some(fs);
        self
    }

    pub fn prompter(mut self, prompter: Arc<dyn Prompter>) -> Self {
        self.prompter = Some(prompter);
        self
    }

    pub fn reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn resolver(mut self, resolver: Arc<dyn MetadataResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn inspector(mut self, inspector: Arc<dyn RepositoryInspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn actions(mut self, actions: ActionRegistry) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn seed(mut self, name: &str, value: &str) -> Self {
        self.seeds.insert(name.trim().to_string(), value.to_string());
        self
    }

    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn build(self) -> Environment {
        let runner: Arc<dyn ProcessRunner> = self.runner.unwrap_or_else(|| Arc::new(SystemRunner));
        let inspector = self
            .inspector
            .unwrap_or_else(|| Arc::new(GitInspector::new(Arc::clone(&runner))));

        Environment {
            fs: self.fs.unwrap_or_else(|| Arc::new(OsFileSystem)),
            prompter: self.prompter.unwrap_or_else(|| Arc::new(AutoConfirm)),
            reporter: self
                .reporter
                .unwrap_or_else(|| Arc::new(ConsoleReporter::default())),
            resolver: self.resolver.unwrap_or_else(|| Arc::new(OfflineResolver)),
            inspector,
            actions: Arc::new(self.actions.unwrap_or_else(ActionRegistry::with_builtins)),
            variables: Arc::new(VariableStore::seeded(self.seeds.iter())),
            shared: Arc::new(SharedState::new()),
            cancel: self.cancel.unwrap_or_default(),
            dry_run: self.dry_run,
            run_id: uuid::Uuid::new_v4().to_string(),
            seeds: Arc::new(self.seeds),
            step: None,
            runner,
        }
    }
}
