//! Safeguard evaluation against one repository

use anyhow::{Context, Result};
use std::io;

use super::config::{SafeguardBuckets, SafeguardSet};
use crate::env::Environment;
use crate::errors::RepositorySkipped;
use crate::outcome::CHANGES_REQUIRED_MARKER;
use crate::ports::StatusEntry;
use crate::repository::RepositoryState;

/// Result of evaluating a set of directives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail { reason: String },
}

impl Verdict {
    pub fn fail(reason: impl Into<String>) -> Self {
        Verdict::Fail {
            reason: reason.into(),
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            Verdict::Pass => None,
            Verdict::Fail { reason } => Some(reason),
        }
    }
}

/// Evaluate `set` against the repository's current snapshot.
///
/// Directives are checked in a fixed order (clean, changes, branch,
/// branch_in, paths) and evaluation stops at the first failure. A stat
/// error other than "not found" while checking required paths is returned
/// as `Err`, not as a failed verdict.
pub fn evaluate_safeguards(
    env: &Environment,
    repo: &RepositoryState,
    set: &SafeguardSet,
) -> Result<Verdict> {
    env.cancel.check()?;

    if let Some(clean) = set.require_clean.as_ref().filter(|c| c.enabled) {
        let dirty = dirty_paths(&repo.snapshot.status, &clean.ignore_dirty_paths);
        if !dirty.is_empty() {
            return Ok(Verdict::fail(format!(
                "repository not clean: {}",
                dirty.join(", ")
            )));
        }
    }

    if set.require_changes && repo.snapshot.is_clean() {
        return Ok(Verdict::fail(format!(
            "{CHANGES_REQUIRED_MARKER}: repository has no changes"
        )));
    }

    let current = repo.snapshot.current_branch.as_deref();

    if let Some(required) = &set.branch {
        if current != Some(required.as_str()) {
            return Ok(Verdict::fail(format!(
                "branch {} does not match required branch {required}",
                current.unwrap_or("(detached)")
            )));
        }
    }

    if !set.branch_in.is_empty() && !current.is_some_and(|c| set.branch_in.iter().any(|b| b == c)) {
        return Ok(Verdict::fail(format!(
            "branch {} is not one of: {}",
            current.unwrap_or("(detached)"),
            set.branch_in.join(", ")
        )));
    }

    for relative in &set.paths {
        let full = repo.path.join(relative);
        match env.fs.stat(&full) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Verdict::fail(format!("required path {relative} is missing")));
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat {}", full.display()));
            }
        }
    }

    Ok(Verdict::Pass)
}

/// Evaluate both buckets of a safeguard split.
///
/// A hard-stop failure is returned as a [`RepositorySkipped`] error. A
/// soft-skip failure is returned as a failed verdict for the caller to
/// report and skip on.
pub fn enforce(
    env: &Environment,
    repo: &RepositoryState,
    buckets: &SafeguardBuckets,
) -> Result<Verdict> {
    if let Verdict::Fail { reason } = evaluate_safeguards(env, repo, &buckets.hard_stop)? {
        tracing::info!(
            repository = %repo.path.display(),
            "hard-stop safeguard failed: {reason}"
        );
        return Err(RepositorySkipped::new(reason).into());
    }

    let verdict = evaluate_safeguards(env, repo, &buckets.soft_skip)?;
    if let Some(reason) = verdict.reason() {
        tracing::debug!(
            repository = %repo.path.display(),
            "soft-skip safeguard failed: {reason}"
        );
    }
    Ok(verdict)
}

/// Dirty paths not covered by any ignore pattern.
///
/// A pattern matches as a glob (`*.lock`, `build/**`) or as a directory
/// prefix (`vendor` and `vendor/` both cover `vendor/x.rs`).
pub fn dirty_paths(status: &[StatusEntry], ignore_patterns: &[String]) -> Vec<String> {
    let globs: Vec<glob::Pattern> = ignore_patterns
        .iter()
        .filter_map(|p| glob::Pattern::new(p.trim()).ok())
        .collect();

    status
        .iter()
        .map(|entry| entry.path.as_str())
        .filter(|path| {
            let by_glob = globs.iter().any(|g| g.matches(path));
            let by_prefix = ignore_patterns.iter().any(|p| covers_directory(p, path));
            !by_glob && !by_prefix
        })
        .map(str::to_string)
        .collect()
}

fn covers_directory(pattern: &str, path: &str) -> bool {
    let dir = pattern.trim().trim_end_matches('/');
    if dir.is_empty() {
        return false;
    }
    path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}
