//! Mutex-guarded state shared by every repository of a run

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::outcome::StepOutcome;

#[derive(Debug, Default)]
struct Inner {
    /// normalized repository path -> step name -> accumulated outcome
    outcomes: BTreeMap<String, BTreeMap<String, StepOutcome>>,
    /// normalized repository path -> hard-stop reason
    skipped: BTreeMap<String, String>,
    global_action_ran: bool,
    confirm_all: bool,
}

/// Run-wide state. Every method takes the lock for its own duration only.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<Inner>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fold `observed` into the outcome of (repository, step), returning the result.
    pub fn record_outcome(&self, repository: &Path, step: &str, observed: StepOutcome) -> StepOutcome {
        let mut inner = self.lock();
        let slot = inner
            .outcomes
            .entry(normalize_repository_path(repository))
            .or_default()
            .entry(step.to_string())
            .or_default();
        slot.absorb(observed);
        slot.clone()
    }

    pub fn outcome(&self, repository: &Path, step: &str) -> Option<StepOutcome> {
        self.lock()
            .outcomes
            .get(&normalize_repository_path(repository))
            .and_then(|steps| steps.get(step))
            .cloned()
    }

    pub fn outcomes(&self) -> BTreeMap<String, BTreeMap<String, StepOutcome>> {
        self.lock().outcomes.clone()
    }

    /// Mark a repository as hard-stopped. The first reason recorded is kept.
    pub fn skip_repository(&self, repository: &Path, reason: &str) {
        self.lock()
            .skipped
            .entry(normalize_repository_path(repository))
            .or_insert_with(|| reason.to_string());
    }

    pub fn skip_reason(&self, repository: &Path) -> Option<String> {
        self.lock()
            .skipped
            .get(&normalize_repository_path(repository))
            .cloned()
    }

    pub fn is_skipped(&self, repository: &Path) -> bool {
        self.skip_reason(repository).is_some()
    }

    pub fn skipped(&self) -> BTreeMap<String, String> {
        self.lock().skipped.clone()
    }

    /// Claim the run's one-shot global action.
    ///
    /// Returns true exactly once per run; every later caller gets false.
    pub fn claim_global_action(&self) -> bool {
        let mut inner = self.lock();
        if inner.global_action_ran {
            return false;
        }
        inner.global_action_ran = true;
        true
    }

    /// Whether the user answered "all" to a confirmation prompt
    pub fn confirm_all(&self) -> bool {
        self.lock().confirm_all
    }

    pub fn set_confirm_all(&self) {
        self.lock().confirm_all = true;
    }

    /// Move everything recorded for `from` to `to` after a directory rename
    pub fn rename_repository(&self, from: &Path, to: &Path) {
        let from = normalize_repository_path(from);
        let to = normalize_repository_path(to);
        let mut inner = self.lock();
        if let Some(steps) = inner.outcomes.remove(&from) {
            inner.outcomes.insert(to.clone(), steps);
        }
        if let Some(reason) = inner.skipped.remove(&from) {
            inner.skipped.insert(to, reason);
        }
    }
}

/// Lexically normalize a repository path for use as a map key.
///
/// Collapses `.` and `..` components and redundant separators without
/// touching the filesystem.
pub fn normalize_repository_path(path: &Path) -> String {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push("..");
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    if normalized.as_os_str().is_empty() {
        return ".".to_string();
    }
    normalized.to_string_lossy().to_string()
}
