//! Finding repositories below the configured roots

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Directories never descended into
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "target"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredRepository {
    pub path: PathBuf,
    /// Directory levels between the root and the repository (0 = the root itself)
    pub depth: usize,
    /// Found inside another discovered repository
    pub nested: bool,
}

/// Expand a leading `~` to the home directory
pub fn expand_root(raw: &str) -> PathBuf {
    let raw = raw.trim();
    if raw == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(raw)
}

/// Walk every root and return the repositories found, sorted by path.
///
/// A directory is a repository when it contains a `.git` entry (directory
/// or worktree file). Symlinked directories are not followed. A repository
/// reachable from two roots is reported once, with its shallowest depth.
pub fn discover_repositories(roots: &[PathBuf]) -> Result<Vec<DiscoveredRepository>> {
    let mut found: BTreeMap<PathBuf, DiscoveredRepository> = BTreeMap::new();

    for root in roots {
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "discovery root is not a directory");
            continue;
        }
        let mut pending = vec![(root.clone(), 0usize, false)];
        while let Some((dir, depth, inside_repository)) = pending.pop() {
            let is_repository = dir.join(".git").exists();
            if is_repository {
                let entry = DiscoveredRepository {
                    path: dir.clone(),
                    depth,
                    nested: inside_repository,
                };
                found
                    .entry(dir.clone())
                    .and_modify(|existing| {
                        if depth < existing.depth {
                            existing.depth = depth;
                        }
                    })
                    .or_insert(entry);
            }

            for child in child_directories(&dir)? {
                pending.push((child, depth + 1, inside_repository || is_repository));
            }
        }
    }

    tracing::debug!(count = found.len(), "repositories discovered");
    Ok(found.into_values().collect())
}

fn child_directories(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            tracing::warn!(dir = %dir.display(), "skipping unreadable directory");
            return Ok(Vec::new());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read directory {}", dir.display()))
        }
    };

    let mut children = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read entry in {}", dir.display()))?;
        let file_type = entry.file_type()?;
        if !file_type.is_dir() {
            continue;
        }
        let name = entry.file_name();
        if SKIP_DIRS.iter().any(|skip| name == *skip) {
            continue;
        }
        children.push(entry.path());
    }
    Ok(children)
}
