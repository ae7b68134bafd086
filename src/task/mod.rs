//! Tasks: templated, guarded per-repository mutations
//!
//! A [`TaskDefinition`] is rendered against one repository by
//! [`plan_task`] into a [`TaskPlan`], which [`run_task`] executes action by
//! action. Custom action types resolve through the run's [`ActionRegistry`].

mod actions;
mod builtin;
mod definition;
mod executor;
mod planner;
mod template;


pub use actions::{ActionGuard, ActionHandler, ActionKind, ActionRegistry, ActionSpec};
pub use definition::{
    normalize_action_type, BranchSpec, FileMode, FileSpec, PullRequestSpec, TaskDefinition,
};
pub use executor::{run_task, TaskOutcome};
pub use planner::{plan_task, FileChange, RenderedPullRequest, TaskPlan, NO_CHANGES_REASON};
pub use template::{sanitize_branch_name, TemplateContext, TemplateError};
