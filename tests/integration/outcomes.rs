//! Per-step outcome classification as seen in the run summary

use heddle::outcome::{EventCode, OutcomeKind};

use super::helpers::*;

#[test]
fn test_dry_run_changes_nothing() {
    let fleet = Fleet::new();
    let api = fleet.add_repo("api");

    let run = run_workflow(
        &fleet,
        r#"
steps:
  - name: convert
    command: remote protocol-convert
    with: {from: https, to: ssh}
  - name: license
    command: tasks apply
    with:
      tasks:
        - name: license
          branch: true
          files:
            - {path: LICENSE, content: "MIT\n"}
"#,
        true,
    );

    assert_eq!(
        git(&api, &["remote", "get-url", "origin"]),
        "https://github.com/acme/api.git"
    );
    assert!(!api.join("LICENSE").exists());
    assert_eq!(git(&api, &["branch", "--show-current"]), "main");

    let convert = run.summary.outcome(&api, "convert").unwrap();
    assert_eq!(convert.kind, OutcomeKind::Unknown);
    assert_eq!(convert.summary_label(), "ok");
    assert_eq!(run.reporter.events_with_code(EventCode::OperationPlanned).len(), 1);
    assert_eq!(run.reporter.events_with_code(EventCode::TaskPlanned).len(), 1);
    assert!(!run.reporter.events_with_code(EventCode::ActionPlanned).is_empty());
}

#[test]
fn test_noop_and_changes_required_outcomes() {
    let fleet = Fleet::new();
    let api = fleet.add_repo("api");

    let run = run_workflow(
        &fleet,
        r##"
steps:
  - name: convert
    command: remote protocol-convert
    with: {from: ssh, to: https}
  - name: follow-up
    command: tasks apply
    with:
      tasks:
        - name: follow-up
          ensure_clean: false
          safeguards: {soft_skip: {require_changes: true}}
          files:
            - {path: FOLLOW_UP, content: "x\n"}
  - name: readme
    command: tasks apply
    with:
      tasks:
        - name: readme
          files:
            - {path: README.md, content: "# api\n"}
"##,
        false,
    );

    let convert = run.summary.outcome(&api, "convert").unwrap();
    assert_eq!(convert.kind, OutcomeKind::NoOp);

    let follow_up = run.summary.outcome(&api, "follow-up").unwrap();
    assert_eq!(follow_up.kind, OutcomeKind::NoOp);
    assert!(!api.join("FOLLOW_UP").exists());

    let readme = run.summary.outcome(&api, "readme").unwrap();
    assert_eq!(readme.kind, OutcomeKind::NoOp);
    assert_eq!(readme.reason.as_deref(), Some("no changes"));

    assert_eq!(run.summary.count(OutcomeKind::NoOp), 3);
    assert_eq!(run.reporter.events_with_code(EventCode::StepSummary).len(), 3);
}

#[test]
fn test_failed_action_is_reported_and_run_continues() {
    let fleet = Fleet::new();
    let api = fleet.add_repo("api");
    let web = fleet.add_repo("web");

    let run = run_workflow(
        &fleet,
        r#"
steps:
  - name: check
    command: tasks apply
    with:
      tasks:
        - name: check
          actions:
            - {type: shell, command: "test \"$(basename \"$(pwd)\")\" != web"}
  - name: convert
    after: [check]
    command: remote protocol-convert
    with: {from: https, to: ssh}
"#,
        false,
    );

    assert_eq!(
        run.summary.outcome(&web, "check").map(|o| o.kind),
        Some(OutcomeKind::Failed)
    );
    assert_eq!(
        run.summary.outcome(&api, "check").map(|o| o.kind),
        Some(OutcomeKind::Applied)
    );
    assert_eq!(run.summary.failures.len(), 1);
    assert!(run.summary.failures[0].starts_with("task_apply: acme/web ("));

    // A failure is not a hard stop
    assert_eq!(
        run.summary.outcome(&web, "convert").map(|o| o.kind),
        Some(OutcomeKind::Applied)
    );
    assert_eq!(
        git(&api, &["remote", "get-url", "origin"]),
        "git@github.com:acme/api.git"
    );
}
