//! Built-in custom actions

use anyhow::{Context, Result};
use std::path::Path;

use super::actions::ActionRegistry;
use crate::env::Environment;
use crate::errors::ActionSkipped;
use crate::operations::{apply_remote_url, resolve_canonical_remote, CanonicalRemote};
use crate::options::OptionMap;
use crate::outcome::{Event, EventCode};
use crate::ports::{run_git_bool, run_git_checked, RemoteProtocol};
use crate::repository::RepositoryState;

/// Staged files named individually in a generated commit message
const SUMMARIZED_FILES: usize = 3;

pub(super) fn register_builtins(registry: &mut ActionRegistry) {
    registry.register("remote.update-canonical", update_canonical_remote);
    registry.register("namespace.rewrite", rewrite_namespace);
    registry.register("release.tag", tag_release);
    registry.register("branch.cleanup", cleanup_branches);
    registry.register("commit.message.generate", generate_commit_message);
}

fn skipped(action: &str, code: &str, reason: impl Into<String>) -> anyhow::Error {
    ActionSkipped {
        action: action.to_string(),
        code: code.to_string(),
        reason: reason.into(),
    }
    .into()
}

/// Point a remote at the canonical location known to the metadata resolver.
fn update_canonical_remote(
    env: &Environment,
    repository: &mut RepositoryState,
    options: &OptionMap,
) -> Result<()> {
    let remote = options.string("remote")?.unwrap_or_else(|| "origin".to_string());
    let protocol = options
        .string("protocol")?
        .map(|p| p.parse::<RemoteProtocol>())
        .transpose()
        .map_err(anyhow::Error::msg)?;

    match resolve_canonical_remote(env, repository, &remote, protocol)? {
        CanonicalRemote::Unavailable { reason } => Err(skipped(
            "remote.update-canonical",
            "metadata_unavailable",
            reason,
        )),
        CanonicalRemote::AlreadyCanonical { url } => {
            tracing::debug!(remote = %remote, url = %url, "remote already canonical");
            Ok(())
        }
        CanonicalRemote::Change { from, to } => {
            apply_remote_url(env, repository, &remote, &to)?;
            env.emit(
                Event::info(EventCode::RemoteUpdated, format!("{remote}: {from} -> {to}"))
                    .for_repository(repository)
                    .with_detail("from", from)
                    .with_detail("to", to),
            );
            Ok(())
        }
    }
}

/// Replace one namespace string with another in every matching file.
fn rewrite_namespace(
    env: &Environment,
    repository: &mut RepositoryState,
    options: &OptionMap,
) -> Result<()> {
    let from = options.require_string("from")?;
    let to = options.require_string("to")?;
    let mut patterns = options.string_list("files")?;
    if patterns.is_empty() {
        patterns.push("**/*".to_string());
    }

    let mut changed = Vec::new();
    for pattern in &patterns {
        let full = repository.path.join(pattern);
        let entries = glob::glob(&full.to_string_lossy())
            .with_context(|| format!("invalid file pattern '{pattern}'"))?;
        for entry in entries.flatten() {
            let relative = entry.strip_prefix(&repository.path).unwrap_or(&entry);
            if is_git_internal(relative) || env.fs.stat(&entry)?.is_dir {
                continue;
            }
            // Binary or unreadable files are left alone
            let Ok(content) = env.fs.read_to_string(&entry) else {
                continue;
            };
            if !content.contains(&from) {
                continue;
            }
            env.fs
                .write(&entry, &content.replace(&from, &to))
                .with_context(|| format!("Failed to write {}", entry.display()))?;
            changed.push(relative.display().to_string());
        }
    }

    if changed.is_empty() {
        return Err(skipped(
            "namespace.rewrite",
            "no_matches",
            format!("no files reference {from}"),
        ));
    }

    changed.sort();
    changed.dedup();
    env.variables.set("rewritten_files", &changed.join(","));
    repository.refresh(env)
}

fn is_git_internal(relative: &Path) -> bool {
    relative.components().any(|c| c.as_os_str() == ".git")
}

/// Create an annotated tag, optionally pushing it.
fn tag_release(env: &Environment, repository: &mut RepositoryState, options: &OptionMap) -> Result<()> {
    let tag = options.require_string("tag")?.trim().to_string();
    let message = options.string("message")?.unwrap_or_else(|| tag.clone());
    let runner = env.runner.as_ref();
    let path = repository.path.as_path();

    let reference = format!("refs/tags/{tag}");
    if run_git_bool(runner, &["rev-parse", "--verify", "--quiet", &reference], path) {
        return Err(skipped(
            "release.tag",
            "tag_exists",
            format!("tag {tag} already exists"),
        ));
    }

    run_git_checked(runner, &["tag", "-a", &tag, "-m", &message], path)?;
    if options.bool("push")?.unwrap_or(false) {
        let remote = options.string("remote")?.unwrap_or_else(|| "origin".to_string());
        run_git_checked(runner, &["push", &remote, &tag], path)?;
    }

    env.variables.set("release_tag", &tag);
    Ok(())
}

/// Delete local branches already merged into the base branch.
fn cleanup_branches(
    env: &Environment,
    repository: &mut RepositoryState,
    options: &OptionMap,
) -> Result<()> {
    let base = options
        .string("base")?
        .unwrap_or_else(|| repository.default_branch().to_string());
    let mut keep = options.string_list("keep")?;
    keep.push(base.clone());
    keep.push(repository.default_branch().to_string());
    if let Some(current) = &repository.snapshot.current_branch {
        keep.push(current.clone());
    }

    let runner = env.runner.as_ref();
    let merged = run_git_checked(
        runner,
        &["branch", "--merged", &base, "--format=%(refname:short)"],
        &repository.path,
    )?;

    let mut deleted = Vec::new();
    for branch in merged.lines().map(str::trim).filter(|b| !b.is_empty()) {
        if keep.iter().any(|k| k == branch) {
            continue;
        }
        run_git_checked(runner, &["branch", "-d", branch], &repository.path)?;
        deleted.push(branch.to_string());
    }

    tracing::debug!(repository = %repository.path.display(), ?deleted, "merged branches removed");
    env.variables.set("deleted_branches", &deleted.join(","));
    if !deleted.is_empty() {
        repository.refresh(env)?;
    }
    Ok(())
}

/// Capture a commit message summarizing the staged files.
fn generate_commit_message(
    env: &Environment,
    repository: &mut RepositoryState,
    options: &OptionMap,
) -> Result<()> {
    let variable = options
        .string("variable")?
        .unwrap_or_else(|| "commit_message".to_string());
    let prefix = options
        .string("prefix")?
        .unwrap_or_else(|| "chore: update".to_string());

    let staged = run_git_checked(
        env.runner.as_ref(),
        &["diff", "--cached", "--name-only"],
        &repository.path,
    )?;
    let files: Vec<&str> = staged.lines().filter(|l| !l.trim().is_empty()).collect();
    if files.is_empty() {
        return Err(skipped(
            "commit.message.generate",
            "no_staged_changes",
            "nothing is staged",
        ));
    }

    env.variables.set(&variable, &summarize_files(&prefix, &files));
    Ok(())
}

fn summarize_files(prefix: &str, files: &[&str]) -> String {
    let named = files[..files.len().min(SUMMARIZED_FILES)].join(", ");
    match files.len().saturating_sub(SUMMARIZED_FILES) {
        0 => format!("{prefix} {named}"),
        rest => format!("{prefix} {named} and {rest} more"),
    }
}
