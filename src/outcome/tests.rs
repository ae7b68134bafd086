//! Tests for outcome classification and accumulation

use super::*;
use crate::repository::RepositoryState;
use std::path::PathBuf;

fn outcome(kind: OutcomeKind) -> StepOutcome {
    StepOutcome::new(kind, None)
}

#[test]
fn test_severity_order() {
    assert!(OutcomeKind::Failed > OutcomeKind::Applied);
    assert!(OutcomeKind::Applied > OutcomeKind::Skipped);
    assert!(OutcomeKind::Skipped > OutcomeKind::NoOp);
    assert!(OutcomeKind::NoOp > OutcomeKind::Unknown);
}

#[test]
fn test_noop_then_applied_is_applied() {
    let mut acc = StepOutcome::default();
    acc.absorb(outcome(OutcomeKind::NoOp));
    acc.absorb(outcome(OutcomeKind::Applied));
    assert_eq!(acc.kind, OutcomeKind::Applied);
}

#[test]
fn test_failed_always_wins() {
    for first in [
        OutcomeKind::Unknown,
        OutcomeKind::NoOp,
        OutcomeKind::Skipped,
        OutcomeKind::Applied,
    ] {
        let mut acc = outcome(first);
        acc.absorb(outcome(OutcomeKind::Failed));
        acc.absorb(outcome(OutcomeKind::Applied));
        assert_eq!(acc.kind, OutcomeKind::Failed);
    }
}

#[test]
fn test_lower_severity_never_downgrades() {
    let mut acc = StepOutcome::new(OutcomeKind::Applied, Some("remote updated".into()));
    acc.absorb(StepOutcome::new(OutcomeKind::Skipped, Some("dirty".into())));
    assert_eq!(acc.kind, OutcomeKind::Applied);
    assert_eq!(acc.reason.as_deref(), Some("remote updated"));
}

#[test]
fn test_equal_severity_only_fills_missing_reason() {
    let mut acc = outcome(OutcomeKind::Skipped);
    acc.absorb(StepOutcome::new(OutcomeKind::Skipped, Some("first".into())));
    acc.absorb(StepOutcome::new(OutcomeKind::Skipped, Some("second".into())));
    assert_eq!(acc.reason.as_deref(), Some("first"));
}

#[test]
fn test_escalation_keeps_first_reason() {
    let mut acc = StepOutcome::new(OutcomeKind::Applied, Some("first".into()));
    acc.absorb(StepOutcome::new(OutcomeKind::Failed, Some("second".into())));
    assert_eq!(acc.kind, OutcomeKind::Failed);
    assert_eq!(acc.reason.as_deref(), Some("first"));

    let mut acc = outcome(OutcomeKind::NoOp);
    acc.absorb(StepOutcome::new(OutcomeKind::Skipped, Some("dirty".into())));
    assert_eq!(acc.kind, OutcomeKind::Skipped);
    assert_eq!(acc.reason.as_deref(), Some("dirty"));
}

#[test]
fn test_classify_applied_codes() {
    let event = Event::info(EventCode::ProtocolConverted, "origin converted to ssh");
    let classified = classify_step_outcome(&event).unwrap();
    assert_eq!(classified.kind, OutcomeKind::Applied);
}

#[test]
fn test_classify_declined_default_reason() {
    let event = Event::info(EventCode::UserDeclined, "");
    let classified = classify_step_outcome(&event).unwrap();
    assert_eq!(classified.kind, OutcomeKind::Skipped);
    assert_eq!(classified.reason.as_deref(), Some("user declined"));
}

#[test]
fn test_classify_skip_mentioning_require_changes_is_noop() {
    let event = Event::info(
        EventCode::StepSkipped,
        "require_changes: repository has no changes",
    );
    assert_eq!(classify_step_outcome(&event).unwrap().kind, OutcomeKind::NoOp);

    let other = Event::info(EventCode::StepSkipped, "repository not clean: a.txt");
    assert_eq!(
        classify_step_outcome(&other).unwrap().kind,
        OutcomeKind::Skipped
    );
}

#[test]
fn test_classify_error_level_wins_over_code() {
    let event = Event::error(EventCode::RemoteUpdated, "push rejected");
    assert_eq!(
        classify_step_outcome(&event).unwrap().kind,
        OutcomeKind::Failed
    );
}

#[test]
fn test_classify_reason_prefers_detail() {
    let event = Event::warn(EventCode::ActionSkipped, "action 'commit' skipped")
        .with_detail("reason", "no_changes");
    assert_eq!(
        classify_step_outcome(&event).unwrap().reason.as_deref(),
        Some("no_changes")
    );
}

#[test]
fn test_summary_is_not_classified() {
    let event = Event::info(EventCode::StepSummary, "convert: ok");
    assert!(classify_step_outcome(&event).is_none());
}

#[test]
fn test_informational_is_unknown() {
    let event = Event::info(EventCode::TaskPlanned, "would write README.md");
    assert_eq!(
        classify_step_outcome(&event).unwrap(),
        StepOutcome::default()
    );
}

#[test]
fn test_final_outcome_defaults() {
    let ok = final_outcome(None, &StepCompletion::Completed);
    assert_eq!(ok.summary_label(), "ok");

    let skipped = final_outcome(None, &StepCompletion::RepositorySkipped("dirty".into()));
    assert_eq!(skipped.kind, OutcomeKind::Skipped);
    assert_eq!(skipped.reason.as_deref(), Some("dirty"));

    let failed = final_outcome(
        Some(outcome(OutcomeKind::Applied)),
        &StepCompletion::Errored("boom".into()),
    );
    assert_eq!(failed.kind, OutcomeKind::Failed);
    assert_eq!(failed.reason.as_deref(), Some("boom"));
}

#[test]
fn test_step_summary_event_carries_classification() {
    let repo = RepositoryState::new(PathBuf::from("/src/acme/api"), 1, false);
    let event = step_summary_event(
        &repo,
        "convert",
        &StepOutcome::new(OutcomeKind::Skipped, Some("dirty".into())),
    );

    assert_eq!(event.code, EventCode::StepSummary);
    assert_eq!(event.level, EventLevel::Warn);
    assert_eq!(event.step.as_deref(), Some("convert"));
    assert_eq!(event.detail("outcome"), Some("skipped"));
    assert_eq!(event.detail("reason"), Some("dirty"));
}
