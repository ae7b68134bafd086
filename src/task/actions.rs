//! Task actions, their guards, and the custom action registry

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::builtin;
use super::definition::normalize_action_type;
use crate::env::Environment;
use crate::errors::ConfigError;
use crate::options::OptionMap;
use crate::repository::RepositoryState;
use crate::safeguards::SafeguardBuckets;

#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    BranchPrepare,
    FileApply,
    Stage,
    Commit {
        /// Rendered when the commit runs, so captured variables are visible
        message: Option<String>,
    },
    Push,
    PullRequest,
    Shell {
        command: String,
        /// Variable that receives trimmed stdout
        capture: Option<String>,
        timeout: Option<Duration>,
    },
    Custom {
        kind: String,
        options: OptionMap,
    },
}

impl ActionKind {
    pub fn label(&self) -> String {
        match self {
            ActionKind::BranchPrepare => "branch.prepare".to_string(),
            ActionKind::FileApply => "files.apply".to_string(),
            ActionKind::Stage => "git.stage".to_string(),
            ActionKind::Commit { .. } => "git.commit".to_string(),
            ActionKind::Push => "git.push".to_string(),
            ActionKind::PullRequest => "pull_request.open".to_string(),
            ActionKind::Shell { .. } => "shell.run".to_string(),
            ActionKind::Custom { kind, .. } => kind.clone(),
        }
    }

    /// Whether the action can change what git sees in the repository
    pub fn changes_repository(&self) -> bool {
        !matches!(self, ActionKind::Push | ActionKind::PullRequest)
    }

    fn default_guards(&self) -> Vec<ActionGuard> {
        match self {
            ActionKind::BranchPrepare => vec![ActionGuard::BranchAbsent],
            ActionKind::Commit { .. } => vec![ActionGuard::HasChanges],
            ActionKind::Push | ActionKind::PullRequest => vec![ActionGuard::RemoteConfigured],
            _ => Vec::new(),
        }
    }
}

/// A precondition checked immediately before its action runs
#[derive(Debug, Clone, PartialEq)]
pub enum ActionGuard {
    CleanWorktree,
    BranchAbsent,
    RemoteConfigured,
    HasChanges,
    /// Ad hoc safeguards; bare maps default to soft-skip
    Safeguards(SafeguardBuckets),
}

impl FromStr for ActionGuard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "clean_worktree" | "clean" => Ok(ActionGuard::CleanWorktree),
            "branch_absent" => Ok(ActionGuard::BranchAbsent),
            "remote_configured" => Ok(ActionGuard::RemoteConfigured),
            "has_changes" => Ok(ActionGuard::HasChanges),
            other => Err(format!("unknown guard '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionSpec {
    pub kind: ActionKind,
    pub guards: Vec<ActionGuard>,
}

impl ActionSpec {
    /// An action with its kind's default guards
    pub fn new(kind: ActionKind) -> Self {
        let guards = kind.default_guards();
        Self { kind, guards }
    }

    pub fn label(&self) -> String {
        self.kind.label()
    }
}

/// Handler behind a custom action type
pub type ActionHandler =
    Arc<dyn Fn(&Environment, &mut RepositoryState, &OptionMap) -> Result<()> + Send + Sync>;

/// Custom action types by normalized dotted name.
///
/// Built once per run and carried by the environment.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    handlers: BTreeMap<String, ActionHandler>,
}

impl fmt::Debug for ActionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

impl ActionRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in custom actions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_builtins(&mut registry);
        registry
    }

    pub fn register<F>(&mut self, kind: &str, handler: F)
    where
        F: Fn(&Environment, &mut RepositoryState, &OptionMap) -> Result<()> + Send + Sync + 'static,
    {
        self.handlers
            .insert(normalize_action_type(kind), Arc::new(handler));
    }

    pub fn get(&self, kind: &str) -> Result<ActionHandler, ConfigError> {
        self.handlers
            .get(&normalize_action_type(kind))
            .cloned()
            .ok_or_else(|| ConfigError::UnknownAction(kind.trim().to_string()))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.handlers.contains_key(&normalize_action_type(kind))
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }
}
