//! Run a task against one repository

use anyhow::{bail, Context, Result};

use super::actions::{ActionGuard, ActionKind, ActionSpec};
use super::definition::TaskDefinition;
use super::planner::{plan_task, TaskPlan, NO_CHANGES_REASON};
use super::template::TemplateContext;
use crate::env::Environment;
use crate::errors::{ActionSkipped, Cancelled, RepositorySkipped};
use crate::outcome::{Event, EventCode};
use crate::ports::{run_git_bool, run_git_checked};
use crate::repository::RepositoryState;
use crate::safeguards::{dirty_paths, enforce, Verdict};

const DECLINED_REASON: &str = "user declined";

/// How a task ended for one repository.
///
/// A failure is the `Err` side of [`run_task`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Nothing was touched: a safeguard, cleanliness check, empty plan or
    /// the user stopped the task
    SkippedBeforeStart { reason: String },
    Applied,
    /// A guard stopped the remaining actions; earlier actions stay applied
    SkippedMidExecution { action: String, reason: String },
    /// Dry run: the plan was reported, nothing was executed
    Planned,
}

/// Run `task` against `repository`.
///
/// Order: whole-task safeguards, the clean-worktree requirement, planning,
/// confirmation, then each planned action with its guards checked
/// immediately before it. A hard-stop safeguard failure is returned as a
/// [`RepositorySkipped`] error.
pub fn run_task(
    env: &Environment,
    repository: &mut RepositoryState,
    task: &TaskDefinition,
) -> Result<TaskOutcome> {
    env.cancel.check()?;

    if let Verdict::Fail { reason } = enforce(env, repository, &task.safeguards)? {
        return Ok(skip_task(env, repository, task, reason));
    }

    if requires_clean(env, task) && !repository.snapshot.is_clean() {
        let dirty = dirty_paths(&repository.snapshot.status, &[]);
        let reason = format!("repository not clean: {}", dirty.join(", "));
        return Ok(skip_task(env, repository, task, reason));
    }

    let plan = plan_task(env, repository, task)?;
    if plan.skipped {
        let reason = plan
            .skip_reason
            .clone()
            .unwrap_or_else(|| NO_CHANGES_REASON.to_string());
        env.emit(
            Event::info(EventCode::NoChanges, format!("task {}: {reason}", task.name))
                .for_repository(repository)
                .with_detail("task", task.name.clone())
                .with_detail("reason", reason.clone()),
        );
        return Ok(TaskOutcome::SkippedBeforeStart { reason });
    }

    if env.dry_run {
        report_plan(env, repository, &plan);
        return Ok(TaskOutcome::Planned);
    }

    let question = format!("Apply task '{}' to {}?", task.name, repository.identifier());
    if !env.confirm(&question)? {
        env.emit(
            Event::info(EventCode::UserDeclined, format!("task {}: {DECLINED_REASON}", task.name))
                .for_repository(repository)
                .with_detail("task", task.name.clone())
                .with_detail("reason", DECLINED_REASON),
        );
        return Ok(TaskOutcome::SkippedBeforeStart {
            reason: DECLINED_REASON.to_string(),
        });
    }

    for action in &plan.actions {
        env.cancel.check()?;
        let label = action.label();

        match run_action(env, repository, &plan, action) {
            Ok(()) => env.emit(
                Event::info(EventCode::ActionApplied, format!("{label} applied"))
                    .for_repository(repository)
                    .with_detail("task", task.name.clone())
                    .with_detail("action", label),
            ),
            Err(err) if err.is::<RepositorySkipped>() || err.is::<Cancelled>() => return Err(err),
            Err(err) => match err.downcast::<ActionSkipped>() {
                Ok(skip) => {
                    tracing::debug!(
                        repository = %repository.path.display(),
                        action = %label,
                        code = %skip.code,
                        "action skipped: {}",
                        skip.reason
                    );
                    env.emit(
                        Event::warn(
                            EventCode::ActionSkipped,
                            format!("task {}: {label} skipped, {}", task.name, skip.reason),
                        )
                        .for_repository(repository)
                        .with_detail("task", task.name.clone())
                        .with_detail("action", label.clone())
                        .with_detail("reason", skip.code),
                    );
                    return Ok(TaskOutcome::SkippedMidExecution {
                        action: label,
                        reason: skip.reason,
                    });
                }
                Err(err) => {
                    return Err(err.context(format!("task '{}': {label} failed", task.name)));
                }
            },
        }
    }

    env.emit(
        Event::info(EventCode::TaskApplied, format!("task {} applied", task.name))
            .for_repository(repository)
            .with_detail("task", task.name.clone()),
    );
    Ok(TaskOutcome::Applied)
}

fn skip_task(
    env: &Environment,
    repository: &RepositoryState,
    task: &TaskDefinition,
    reason: String,
) -> TaskOutcome {
    env.emit(
        Event::warn(EventCode::TaskSkipped, format!("task {}: {reason}", task.name))
            .for_repository(repository)
            .with_detail("task", task.name.clone())
            .with_detail("reason", reason.clone()),
    );
    TaskOutcome::SkippedBeforeStart { reason }
}

/// `ensure_clean`, unless its override variable holds a recognizable flag
fn requires_clean(env: &Environment, task: &TaskDefinition) -> bool {
    task.ensure_clean_variable
        .as_deref()
        .and_then(|name| env.variables.get(name))
        .and_then(|value| parse_flag(&value))
        .unwrap_or(task.ensure_clean)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Some(true),
        "false" | "no" | "off" | "0" => Some(false),
        _ => None,
    }
}

fn report_plan(env: &Environment, repository: &RepositoryState, plan: &TaskPlan) {
    let files: Vec<&str> = plan.applicable_files().map(|f| f.path.as_str()).collect();
    let mut event = Event::info(
        EventCode::TaskPlanned,
        format!(
            "task {} would change {} file(s){}",
            plan.task,
            files.len(),
            plan.branch
                .as_deref()
                .map(|b| format!(" on branch {b}"))
                .unwrap_or_default()
        ),
    )
    .for_repository(repository)
    .with_detail("task", plan.task.clone())
    .with_detail("files", files.join(","));
    if let Some(branch) = &plan.branch {
        event = event.with_detail("branch", branch.clone());
    }
    env.emit(event);

    for action in &plan.actions {
        env.emit(
            Event::info(EventCode::ActionPlanned, format!("would run {}", action.label()))
                .for_repository(repository)
                .with_detail("task", plan.task.clone())
                .with_detail("action", action.label()),
        );
    }
}

fn check_guard(
    env: &Environment,
    repository: &RepositoryState,
    plan: &TaskPlan,
    action: &str,
    guard: &ActionGuard,
) -> Result<()> {
    let skip = |code: &str, reason: String| -> anyhow::Error {
        ActionSkipped {
            action: action.to_string(),
            code: code.to_string(),
            reason,
        }
        .into()
    };

    match guard {
        ActionGuard::CleanWorktree => {
            if !repository.snapshot.is_clean() {
                let dirty = dirty_paths(&repository.snapshot.status, &[]);
                return Err(skip(
                    "dirty_worktree",
                    format!("repository not clean: {}", dirty.join(", ")),
                ));
            }
        }
        ActionGuard::BranchAbsent => {
            if let Some(branch) = &plan.branch {
                let reference = format!("refs/heads/{branch}");
                if run_git_bool(
                    env.runner.as_ref(),
                    &["show-ref", "--verify", "--quiet", &reference],
                    &repository.path,
                ) {
                    return Err(skip("branch_exists", format!("branch {branch} already exists")));
                }
            }
        }
        ActionGuard::RemoteConfigured => {
            if !repository.snapshot.has_remote(&plan.push_remote) {
                return Err(skip(
                    "remote_missing",
                    format!("remote {} is not configured", plan.push_remote),
                ));
            }
        }
        ActionGuard::HasChanges => {
            if repository.snapshot.is_clean() {
                return Err(skip("no_changes", "nothing to commit".to_string()));
            }
        }
        ActionGuard::Safeguards(buckets) => {
            if let Verdict::Fail { reason } = enforce(env, repository, buckets)? {
                return Err(skip("safeguard_failed", reason));
            }
        }
    }
    Ok(())
}

fn run_action(
    env: &Environment,
    repository: &mut RepositoryState,
    plan: &TaskPlan,
    action: &ActionSpec,
) -> Result<()> {
    let label = action.label();
    for guard in &action.guards {
        check_guard(env, repository, plan, &label, guard)?;
    }

    let runner = env.runner.as_ref();
    let path = repository.path.clone();
    let context = || TemplateContext::for_repository(repository, &plan.task, &env.variables);

    match &action.kind {
        ActionKind::BranchPrepare => {
            let Some(branch) = &plan.branch else {
                bail!("{label} needs a branch");
            };
            let start = plan
                .start_point
                .clone()
                .unwrap_or_else(|| repository.default_branch().to_string());
            run_git_checked(runner, &["checkout", "-b", branch, &start], &path)?;
            env.variables.set("branch", branch);
        }
        ActionKind::FileApply => {
            for change in plan.applicable_files() {
                env.fs
                    .write(&change.absolute, &change.content)
                    .with_context(|| format!("Failed to write {}", change.absolute.display()))?;
            }
        }
        ActionKind::Stage => {
            let files: Vec<&str> = plan.applicable_files().map(|f| f.path.as_str()).collect();
            if files.is_empty() {
                run_git_checked(runner, &["add", "-A"], &path)?;
            } else {
                let mut args = vec!["add", "--"];
                args.extend(files);
                run_git_checked(runner, &args, &path)?;
            }
        }
        ActionKind::Commit { message } => {
            let message = match message {
                Some(template) => context().render(template)?,
                None => plan.commit_message.clone(),
            };
            run_git_checked(runner, &["commit", "-m", &message], &path)?;
            let head = run_git_checked(runner, &["rev-parse", "HEAD"], &path)?;
            env.variables.set("commit", &head);
        }
        ActionKind::Push => {
            let Some(branch) = plan
                .branch
                .clone()
                .or_else(|| repository.snapshot.current_branch.clone())
            else {
                bail!("{label} needs a branch, HEAD is detached");
            };
            run_git_checked(
                runner,
                &["push", "--set-upstream", &plan.push_remote, &branch],
                &path,
            )?;
        }
        ActionKind::PullRequest => {
            let (Some(pr), Some(branch)) = (&plan.pull_request, &plan.branch) else {
                bail!("{label} needs a branch and a pull_request section");
            };
            let mut args = vec![
                "pr",
                "create",
                "--title",
                pr.title.as_str(),
                "--body",
                pr.body.as_str(),
                "--base",
                pr.base.as_str(),
                "--head",
                branch.as_str(),
            ];
            if pr.draft {
                args.push("--draft");
            }
            let output = runner.run("gh", &args, &path)?;
            if !output.success() {
                bail!("gh pr create failed: {}", output.stderr.trim());
            }
            env.variables.set("pull_request_url", output.stdout.trim());
        }
        ActionKind::Shell {
            command,
            capture,
            timeout,
        } => {
            let command = context().render(command)?;
            let output = runner.run_shell(&command, &path, *timeout)?;
            if output.timed_out {
                bail!("command timed out: {command}");
            }
            if !output.success() {
                bail!(
                    "command exited with {}: {}",
                    output
                        .exit_code
                        .map_or_else(|| "signal".to_string(), |c| c.to_string()),
                    output.stderr.trim()
                );
            }
            if let Some(variable) = capture {
                env.variables.set(variable, output.stdout.trim());
            }
        }
        ActionKind::Custom { kind, options } => {
            let handler = env.actions.get(kind)?;
            let rendered = {
                let context = context();
                options.try_map_strings(&mut |value| context.render(value))?
            };
            handler(env, repository, &rendered)?;
        }
    }

    if action.kind.changes_repository() {
        repository.refresh(env)?;
    }
    Ok(())
}
