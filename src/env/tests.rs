//! Tests for environment isolation and event recording

use super::*;
use crate::outcome::{EventCode, OutcomeKind};
use crate::ports::RecordingReporter;
use crate::repository::RepositoryState;
use std::path::PathBuf;

fn base() -> (Environment, Arc<RecordingReporter>) {
    let reporter = Arc::new(RecordingReporter::new());
    let env = Environment::builder()
        .reporter(reporter.clone())
        .seed("owner", "acme")
        .build();
    (env, reporter)
}

#[test]
fn test_repository_clones_do_not_share_captures() {
    let (env, _) = base();
    env.variables.set("branch", "base-value");

    let first = env.for_repository();
    let second = env.for_repository();
    first.variables.set("branch", "first-value");
    second.variables.set("branch", "second-value");

    assert_eq!(first.variables.get("branch").as_deref(), Some("first-value"));
    assert_eq!(second.variables.get("branch").as_deref(), Some("second-value"));
    assert_eq!(env.variables.get("branch").as_deref(), Some("base-value"));
    assert!(!Arc::ptr_eq(&first.variables, &second.variables));
    assert!(!Arc::ptr_eq(&first.variables, &env.variables));
}

#[test]
fn test_repository_clone_does_not_see_base_capture() {
    let (env, _) = base();
    env.variables.set("generated", "x");
    let clone = env.for_repository();
    assert_eq!(clone.variables.get("generated"), None);
}

#[test]
fn test_seeds_are_identical_across_clones() {
    let (env, _) = base();
    let first = env.for_repository();
    let second = env.for_repository();
    assert_eq!(first.variables.get("owner").as_deref(), Some("acme"));
    assert_eq!(second.variables.get("owner").as_deref(), Some("acme"));
    assert!(first.variables.is_seeded("owner"));
}

#[test]
fn test_clones_share_handles_and_state() {
    let (env, _) = base();
    let clone = env.for_repository();
    assert!(Arc::ptr_eq(&env.shared, &clone.shared));
    assert!(Arc::ptr_eq(&env.reporter, &clone.reporter));
    assert_eq!(env.run_id, clone.run_id);

    clone.cancel.cancel();
    assert!(env.cancel.is_cancelled());
}

#[test]
fn test_for_step_shares_variables() {
    let (env, _) = base();
    let repo_env = env.for_repository();
    let step_env = repo_env.for_step("convert");
    step_env.variables.set("branch", "b");
    assert_eq!(repo_env.variables.get("branch").as_deref(), Some("b"));
    assert_eq!(step_env.step(), Some("convert"));
}

#[test]
fn test_emit_tags_step_and_records_outcome() {
    let (env, reporter) = base();
    let repo = RepositoryState::new(PathBuf::from("/src/acme/api"), 1, false);
    let step_env = env.for_repository().for_step("convert");

    step_env.emit(Event::info(EventCode::NoChanges, "nothing to do").for_repository(&repo));
    step_env.emit(Event::info(EventCode::ProtocolConverted, "origin now ssh").for_repository(&repo));

    let recorded = env.shared.outcome(&repo.path, "convert").unwrap();
    assert_eq!(recorded.kind, OutcomeKind::Applied);

    let events = reporter.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.step.as_deref() == Some("convert")));
}

#[test]
fn test_confirm_all_skips_later_prompts() {
    use crate::ports::{Confirmation, ScriptedPrompter};

    let prompter = Arc::new(ScriptedPrompter::new([Confirmation::No, Confirmation::All]));
    let env = Environment::builder().prompter(prompter.clone()).build();
    let repo_env = env.for_repository();

    assert!(!repo_env.confirm("first?").unwrap());
    assert!(repo_env.confirm("second?").unwrap());
    assert!(env.for_repository().confirm("third?").unwrap());
    assert_eq!(prompter.questions().len(), 2);
}

#[test]
fn test_emit_without_repository_records_nothing() {
    let (env, reporter) = base();
    env.for_step("audit")
        .emit(Event::info(EventCode::AuditReport, "3 repositories"));
    assert!(env.shared.outcomes().is_empty());
    assert_eq!(reporter.events().len(), 1);
}
