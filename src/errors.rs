//! Error taxonomy for heddle runs
//!
//! Four families of failure flow through a run:
//! - Configuration errors ([`ConfigError`]) are fatal and surface before any
//!   repository is touched.
//! - Safeguard failures are expected. A hard-stop failure becomes a
//!   [`RepositorySkipped`] signal, a soft-skip failure becomes an
//!   [`ActionSkipped`] signal or a skip event.
//! - Operation errors ([`OperationError`]) wrap the underlying cause with the
//!   operation kind and the path it was working on.
//! - Execution errors (process, filesystem) propagate as `anyhow::Error`;
//!   several of them from one pass are collected into [`JoinedErrors`].

use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::options::OptionError;
use crate::repository::RepositoryState;

/// Owner placeholder used when an error cannot be attributed to a repository.
pub const UNKNOWN_OWNER: &str = "unknown/unknown";

/// Malformed workflow or operation configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("step {step} has no command path")]
    MissingCommandPath { step: String },

    #[error("duplicate step name '{0}'")]
    DuplicateName(String),

    #[error("step '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("step '{node}' depends on undefined step '{dependency}'")]
    UnknownDependency { node: String, dependency: String },

    #[error("unknown command path '{0}'")]
    UnknownCommand(String),

    #[error("unknown action type '{0}'")]
    UnknownAction(String),

    #[error("step '{step}': {source}")]
    InvalidOption {
        step: String,
        #[source]
        source: OptionError,
    },

    #[error("{context}: {message}")]
    Invalid { context: String, message: String },

    #[error("node {index} ('{name}') has no operation")]
    MissingOperation { index: usize, name: String },

    #[error("node {index} has an empty name")]
    EmptyName { index: usize },

    #[error("circular dependency detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
}

impl ConfigError {
    pub fn invalid(context: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            context: context.into(),
            message: message.into(),
        }
    }
}

/// Hard-stop signal: no further operation may run for this repository.
///
/// Raised by hard-stop safeguards or explicitly by actions. The run
/// coordinator recovers it with `downcast_ref` and isolates the repository
/// instead of failing the run.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("repository skipped: {reason}")]
pub struct RepositorySkipped {
    pub reason: String,
}

impl RepositorySkipped {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Soft-skip signal raised by an action guard.
///
/// Stops the remaining actions of one task for one repository. Actions
/// already applied stay applied.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("action '{action}' skipped: {reason}")]
pub struct ActionSkipped {
    pub action: String,
    /// Machine-readable reason code (e.g. `branch_exists`)
    pub code: String,
    pub reason: String,
}

/// The run was cancelled through its [`CancellationToken`](crate::env::CancellationToken).
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("run cancelled")]
pub struct Cancelled;

/// An operation failed while working on a subject path.
#[derive(Debug, Error)]
#[error("{kind} failed for {}: {source}", .subject.display())]
pub struct OperationError {
    /// Event-style code of the failing operation (e.g. `protocol_convert`)
    pub kind: String,
    pub subject: PathBuf,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync + 'static>,
}

impl OperationError {
    pub fn new(kind: impl Into<String>, subject: &Path, source: anyhow::Error) -> Self {
        Self {
            kind: kind.into(),
            subject: subject.to_path_buf(),
            source: source.into(),
        }
    }
}

/// Several independent failures from one pass over the fleet.
#[derive(Debug)]
pub struct JoinedErrors(pub Vec<anyhow::Error>);

impl fmt::Display for JoinedErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(|e| format!("{e:#}")).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl std::error::Error for JoinedErrors {}

/// Join a list of errors, returning `Ok` when the list is empty.
///
/// A single error is returned unchanged so its concrete type stays
/// downcastable.
pub fn join_errors(mut errors: Vec<anyhow::Error>) -> anyhow::Result<()> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(JoinedErrors(errors).into()),
    }
}

/// Turn an event or error code into readable words (`remote_update` -> `remote update`).
pub fn humanize_code(code: &str) -> String {
    code.split(['_', '-', '.'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Render an operation error as `<code>: <owner/repo> (<path>) <message>`.
///
/// The owning repository is the tracked repository whose path equals the
/// error subject, or failing that the one with the longest path that is a
/// prefix of the subject.
pub fn format_operation_error(error: &OperationError, repositories: &[RepositoryState]) -> String {
    let owner = attribute_repository(&error.subject, repositories);
    let (identifier, path) = match owner {
        Some(repo) => (repo.identifier(), repo.path.clone()),
        None => (UNKNOWN_OWNER.to_string(), error.subject.clone()),
    };

    let mut message = error.source.to_string();
    if message.trim().is_empty() {
        message = humanize_code(&error.kind);
    }

    format!(
        "{}: {} ({}) {}",
        error.kind,
        identifier,
        path.display(),
        message
    )
}

fn attribute_repository<'a>(
    subject: &Path,
    repositories: &'a [RepositoryState],
) -> Option<&'a RepositoryState> {
    if let Some(exact) = repositories.iter().find(|r| r.path == subject) {
        return Some(exact);
    }

    repositories
        .iter()
        .filter(|r| subject.starts_with(&r.path))
        .max_by_key(|r| r.path.components().count())
}
