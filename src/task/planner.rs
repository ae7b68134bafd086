//! Render a task against one repository into a concrete plan

use anyhow::{bail, Context, Result};
use std::path::{Component, Path, PathBuf};

use super::actions::{ActionKind, ActionSpec};
use super::definition::{FileMode, TaskDefinition};
use super::template::{sanitize_branch_name, TemplateContext};
use crate::env::Environment;
use crate::ports::{run_git, run_git_bool};
use crate::repository::RepositoryState;

pub const NO_CHANGES_REASON: &str = "no changes";
pub const UNCHANGED_REASON: &str = "unchanged";
pub const EXISTS_REASON: &str = "exists";

/// One declared file, resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    /// Repository-relative path
    pub path: String,
    pub absolute: PathBuf,
    /// Full content to write when `apply` is set
    pub content: String,
    pub mode: FileMode,
    pub apply: bool,
    pub skip_reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPullRequest {
    pub title: String,
    pub body: String,
    pub base: String,
    pub draft: bool,
}

/// A task resolved for one repository
#[derive(Debug, Clone, PartialEq)]
pub struct TaskPlan {
    pub task: String,
    pub branch: Option<String>,
    pub start_point: Option<String>,
    pub push_remote: String,
    pub commit_message: String,
    pub files: Vec<FileChange>,
    /// Actions to run in order
    pub actions: Vec<ActionSpec>,
    pub pull_request: Option<RenderedPullRequest>,
    pub skipped: bool,
    pub skip_reason: Option<String>,
}

impl TaskPlan {
    pub fn applicable_files(&self) -> impl Iterator<Item = &FileChange> {
        self.files.iter().filter(|f| f.apply)
    }

    pub fn has_file_changes(&self) -> bool {
        self.files.iter().any(|f| f.apply)
    }
}

/// Build the plan for `task` in `repository`.
///
/// Reads current file contents through the environment's filesystem. A
/// plan in which no file applies and no action was declared is marked
/// skipped with reason "no changes".
pub fn plan_task(
    env: &Environment,
    repository: &RepositoryState,
    task: &TaskDefinition,
) -> Result<TaskPlan> {
    let context = TemplateContext::for_repository(repository, &task.name, &env.variables);
    let render = |field: &str, template: &str| {
        context
            .render(template)
            .with_context(|| format!("task '{}': failed to render {field}", task.name))
    };

    let (branch, start_point, push_remote) = match &task.branch {
        Some(spec) => {
            let name = sanitize_branch_name(&render("branch name", &spec.name)?);
            if name.is_empty() {
                bail!("task '{}': branch name renders empty", task.name);
            }
            let start = match &spec.start_point {
                Some(start) => render("branch start point", start)?,
                None => repository.default_branch().to_string(),
            };
            (Some(name), Some(start), spec.push_remote.clone())
        }
        None => (None, None, "origin".to_string()),
    };

    let commit_message = render("commit message", &task.commit_message)?;

    let mut files = Vec::with_capacity(task.files.len());
    for spec in &task.files {
        let path = render("file path", &spec.path)?;
        let absolute = resolve_in_repository(&repository.path, &path)?;
        let content = render("file content", &spec.content)?;
        let existing = match base_ref(repository, start_point.as_deref()) {
            Some(start) => read_at_ref(env, repository, start, &path)?,
            None => env
                .fs
                .read_optional(&absolute)
                .with_context(|| format!("Failed to read {}", absolute.display()))?,
        };
        files.push(plan_file(path, absolute, content, spec.mode, existing));
    }

    let pull_request = task
        .pull_request
        .as_ref()
        .map(|pr| -> Result<RenderedPullRequest> {
            Ok(RenderedPullRequest {
                title: render("pull request title", &pr.title)?,
                body: render("pull request body", &pr.body)?,
                base: match &pr.base {
                    Some(base) => render("pull request base", base)?,
                    None => repository.default_branch().to_string(),
                },
                draft: pr.draft,
            })
        })
        .transpose()?;

    let mut plan = TaskPlan {
        task: task.name.clone(),
        branch,
        start_point,
        push_remote,
        commit_message,
        files,
        actions: Vec::new(),
        pull_request,
        skipped: false,
        skip_reason: None,
    };

    if !task.actions.is_empty() {
        plan.actions = task.actions.clone();
    } else if plan.has_file_changes() {
        plan.actions = default_pipeline(&plan);
    } else {
        plan.skipped = true;
        plan.skip_reason = Some(NO_CHANGES_REASON.to_string());
    }

    Ok(plan)
}

fn plan_file(
    path: String,
    absolute: PathBuf,
    rendered: String,
    mode: FileMode,
    existing: Option<String>,
) -> FileChange {
    let skip = |content: String, reason: &str| FileChange {
        path: path.clone(),
        absolute: absolute.clone(),
        content,
        mode,
        apply: false,
        skip_reason: Some(reason.to_string()),
    };

    let content = match (mode, existing.as_deref()) {
        (FileMode::SkipIfExists, Some(current)) => return skip(current.to_string(), EXISTS_REASON),
        (FileMode::AppendIfMissing, Some(current)) => append_missing_lines(current, &rendered),
        _ => rendered,
    };

    if existing.as_deref() == Some(content.as_str()) {
        return skip(content, UNCHANGED_REASON);
    }

    FileChange {
        path,
        absolute,
        content,
        mode,
        apply: true,
        skip_reason: None,
    }
}

/// The ref files must be compared against when the task branches off
/// something other than what is checked out.
fn base_ref<'a>(repository: &RepositoryState, start_point: Option<&'a str>) -> Option<&'a str> {
    let start = start_point?;
    (repository.snapshot.current_branch.as_deref() != Some(start)).then_some(start)
}

/// Content of `path` as committed at `start`, `None` when it is not there.
///
/// A start point that does not resolve falls back to the worktree; the
/// branch checkout will report it.
fn read_at_ref(
    env: &Environment,
    repository: &RepositoryState,
    start: &str,
    path: &str,
) -> Result<Option<String>> {
    let runner = env.runner.as_ref();
    let commit = format!("{start}^{{commit}}");
    if !run_git_bool(runner, &["rev-parse", "--verify", "--quiet", &commit], &repository.path) {
        let absolute = repository.path.join(path);
        return env
            .fs
            .read_optional(&absolute)
            .with_context(|| format!("Failed to read {}", absolute.display()));
    }

    let object = format!("{start}:{}", path.trim().trim_start_matches("./"));
    if !run_git_bool(runner, &["cat-file", "-e", &object], &repository.path) {
        return Ok(None);
    }
    let output = run_git(runner, &["show", &object], &repository.path)?;
    if !output.success() {
        bail!("git show {object} failed: {}", output.stderr.trim());
    }
    Ok(Some(output.stdout))
}

/// Append the lines of `addition` that `current` lacks, keeping `current` intact.
fn append_missing_lines(current: &str, addition: &str) -> String {
    let present: Vec<&str> = current.lines().collect();
    let missing: Vec<&str> = addition
        .lines()
        .filter(|line| !line.is_empty() && !present.contains(line))
        .collect();
    if missing.is_empty() {
        return current.to_string();
    }

    let mut content = current.to_string();
    if !content.is_empty() && !content.ends_with('\n') {
        content.push('\n');
    }
    for line in missing {
        content.push_str(line);
        content.push('\n');
    }
    content
}

fn resolve_in_repository(root: &Path, relative: &str) -> Result<PathBuf> {
    let relative = Path::new(relative.trim());
    let escapes = relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if relative.as_os_str().is_empty() || escapes {
        bail!(
            "file path '{}' must be relative to the repository",
            relative.display()
        );
    }
    Ok(root.join(relative))
}

/// Actions for a task that declares files but no actions
fn default_pipeline(plan: &TaskPlan) -> Vec<ActionSpec> {
    let mut actions = Vec::new();
    if plan.branch.is_some() {
        actions.push(ActionSpec::new(ActionKind::BranchPrepare));
    }
    actions.push(ActionSpec::new(ActionKind::FileApply));
    actions.push(ActionSpec::new(ActionKind::Stage));
    actions.push(ActionSpec::new(ActionKind::Commit { message: None }));
    if plan.branch.is_some() {
        actions.push(ActionSpec::new(ActionKind::Push));
        if plan.pull_request.is_some() {
            actions.push(ActionSpec::new(ActionKind::PullRequest));
        }
    }
    actions
}
