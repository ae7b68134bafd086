//! Per-repository state carried through a run

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::env::Environment;
use crate::ports::InspectionSnapshot;

/// A repository being processed.
///
/// The snapshot is mutated in place by [`RepositoryState::refresh`] after any
/// action that changes git-visible state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    pub path: PathBuf,
    pub snapshot: InspectionSnapshot,
    /// Directory depth below the discovery root it was found under
    pub path_depth: usize,
    /// Whether the worktree was clean when the run started
    pub initially_clean: bool,
    /// Whether this repository lives inside another discovered repository
    pub nested: bool,
}

impl RepositoryState {
    pub fn new(path: PathBuf, path_depth: usize, nested: bool) -> Self {
        Self {
            path,
            snapshot: InspectionSnapshot::default(),
            path_depth,
            initially_clean: true,
            nested,
        }
    }

    /// Inspect a repository for the first time, recording whether it started clean
    pub fn load(env: &Environment, path: &Path, path_depth: usize, nested: bool) -> Result<Self> {
        let snapshot = env.inspector.inspect(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            initially_clean: snapshot.is_clean(),
            snapshot,
            path_depth,
            nested,
        })
    }

    pub fn refresh(&mut self, env: &Environment) -> Result<()> {
        self.snapshot = env.inspector.inspect(&self.path)?;
        Ok(())
    }

    /// Name of the repository: remote name when known, else the directory name
    pub fn name(&self) -> String {
        self.snapshot
            .name
            .clone()
            .unwrap_or_else(|| directory_name(&self.path))
    }

    pub fn owner(&self) -> Option<&str> {
        self.snapshot.owner.as_deref()
    }

    /// `owner/name`, or just the name when the owner is unknown
    pub fn identifier(&self) -> String {
        match self.owner() {
            Some(owner) => format!("{owner}/{}", self.name()),
            None => self.name(),
        }
    }

    pub fn default_branch(&self) -> &str {
        self.snapshot.default_branch.as_deref().unwrap_or("main")
    }
}

fn directory_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}
