//! Repository inspection: the git-visible facts operations decide on

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use super::process::{run_git, run_git_bool, run_git_checked, ProcessRunner};
use super::remote::RemoteUrl;

/// One `git status --porcelain` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    /// Two-letter status code (`XY`), e.g. ` M`, `??`, `!!`
    pub code: String,
    pub path: String,
}

impl StatusEntry {
    pub fn new(code: &str, path: &str) -> Self {
        Self {
            code: code.to_string(),
            path: path.to_string(),
        }
    }

    pub fn is_untracked(&self) -> bool {
        self.code == "??"
    }

    pub fn is_ignored(&self) -> bool {
        self.code == "!!"
    }
}

/// Point-in-time facts about a repository
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InspectionSnapshot {
    /// `None` when HEAD is detached
    pub current_branch: Option<String>,
    pub default_branch: Option<String>,
    pub head: Option<String>,
    pub remotes: Vec<String>,
    pub origin_url: Option<String>,
    pub owner: Option<String>,
    pub name: Option<String>,
    pub status: Vec<StatusEntry>,
}

impl InspectionSnapshot {
    pub fn is_clean(&self) -> bool {
        self.status.is_empty()
    }

    pub fn has_remote(&self, remote: &str) -> bool {
        self.remotes.iter().any(|r| r == remote)
    }
}

pub trait RepositoryInspector: Send + Sync {
    fn inspect(&self, path: &Path) -> Result<InspectionSnapshot>;
}

/// Inspects repositories by running git
#[derive(Clone)]
pub struct GitInspector {
    runner: Arc<dyn ProcessRunner>,
}

impl GitInspector {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self { runner }
    }

    fn current_branch(&self, path: &Path) -> Option<String> {
        // symbolic-ref works on unborn branches too, unlike rev-parse
        let output = run_git(
            self.runner.as_ref(),
            &["symbolic-ref", "--short", "-q", "HEAD"],
            path,
        )
        .ok()?;
        let branch = output.stdout.trim();
        (output.success() && !branch.is_empty()).then(|| branch.to_string())
    }

    fn default_branch(&self, path: &Path, current: Option<&str>) -> Option<String> {
        let runner = self.runner.as_ref();
        if let Ok(head) = run_git_checked(
            runner,
            &["symbolic-ref", "--short", "refs/remotes/origin/HEAD"],
            path,
        ) {
            if let Some(branch) = head.strip_prefix("origin/") {
                return Some(branch.to_string());
            }
        }

        for candidate in ["main", "master"] {
            let reference = format!("refs/heads/{candidate}");
            if run_git_bool(runner, &["show-ref", "--verify", "--quiet", &reference], path) {
                return Some(candidate.to_string());
            }
        }

        current.map(str::to_string)
    }
}

impl RepositoryInspector for GitInspector {
    fn inspect(&self, path: &Path) -> Result<InspectionSnapshot> {
        let runner = self.runner.as_ref();

        // Not run_git_checked: trimming would eat the leading status column
        let status_output = run_git(
            runner,
            &["status", "--porcelain", "--untracked-files=all"],
            path,
        )
        .with_context(|| format!("Failed to read status of {}", path.display()))?;
        if !status_output.success() {
            bail!(
                "git status failed in {}: {}",
                path.display(),
                status_output.stderr.trim()
            );
        }
        let status = parse_porcelain(&status_output.stdout);

        let current_branch = self.current_branch(path);
        let default_branch = self.default_branch(path, current_branch.as_deref());
        let head = run_git_checked(runner, &["rev-parse", "--verify", "-q", "HEAD"], path).ok();

        let remotes: Vec<String> = run_git_checked(runner, &["remote"], path)
            .map(|out| {
                out.lines()
                    .map(|l| l.trim().to_string())
                    .filter(|l| !l.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let origin_url = if remotes.iter().any(|r| r == "origin") {
            run_git_checked(runner, &["remote", "get-url", "origin"], path).ok()
        } else {
            None
        };

        let parsed = origin_url.as_deref().and_then(RemoteUrl::parse);

        Ok(InspectionSnapshot {
            current_branch,
            default_branch,
            head,
            remotes,
            origin_url,
            owner: parsed.as_ref().map(|u| u.owner.clone()),
            name: parsed.map(|u| u.name),
            status,
        })
    }
}

/// Parse `git status --porcelain` (v1) output.
///
/// Renames (`R  old -> new`) are reported under the new path.
pub fn parse_porcelain(output: &str) -> Vec<StatusEntry> {
    output
        .lines()
        .filter(|line| line.len() > 3)
        .map(|line| {
            let code = &line[..2];
            let path = &line[3..];
            let path = path.rsplit_once(" -> ").map_or(path, |(_, new)| new);
            StatusEntry::new(code, path.trim_matches('"'))
        })
        .collect()
}

/// Inspector with scripted snapshots, for tests and dry planning
#[derive(Debug, Default)]
pub struct FixedInspector {
    snapshots: Mutex<HashMap<PathBuf, InspectionSnapshot>>,
}

impl FixedInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, path: impl Into<PathBuf>, snapshot: InspectionSnapshot) {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.into(), snapshot);
    }
}

impl RepositoryInspector for FixedInspector {
    fn inspect(&self, path: &Path) -> Result<InspectionSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(path)
            .cloned()
            .with_context(|| format!("No snapshot recorded for {}", path.display()))
    }
}
