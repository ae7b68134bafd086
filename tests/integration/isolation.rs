//! A hard-stopped repository drops out of the run; its siblings carry on

use heddle::env::normalize_repository_path;
use heddle::outcome::{EventCode, OutcomeKind};
use std::fs;

use super::helpers::*;

const LICENSE_THEN_CONVERT: &str = r#"
steps:
  - name: license
    command: tasks apply
    with:
      tasks:
        - name: add-license
          safeguards: {require_clean: true}
          files:
            - {path: LICENSE, content: "MIT License\n"}
          commit: Add LICENSE
  - name: convert
    after: [license]
    command: remote protocol-convert
    with: {from: https, to: ssh}
  - name: report
    after: [convert]
    command: audit report
"#;

#[test]
fn test_dirty_repository_is_excluded_from_later_steps() {
    let fleet = Fleet::new();
    let api = fleet.add_repo("api");
    let web = fleet.add_repo("web");
    let cli = fleet.add_repo("cli");
    fs::write(web.join("scratch.txt"), "work in progress").unwrap();

    let run = run_workflow(&fleet, LICENSE_THEN_CONVERT, false);

    for repo in [&api, &cli] {
        assert_eq!(git(repo, &["log", "-1", "--format=%s"]), "Add LICENSE");
        assert_eq!(
            git(repo, &["remote", "get-url", "origin"]),
            format!(
                "git@github.com:acme/{}.git",
                repo.file_name().unwrap().to_string_lossy()
            )
        );
        assert_eq!(
            run.summary.outcome(repo, "convert").map(|o| o.kind),
            Some(OutcomeKind::Applied)
        );
    }

    assert!(!web.join("LICENSE").exists());
    assert_eq!(
        git(&web, &["remote", "get-url", "origin"]),
        "https://github.com/acme/web.git"
    );
    let skipped = run.summary.outcome(&web, "license").unwrap();
    assert_eq!(skipped.kind, OutcomeKind::Skipped);
    assert!(skipped.reason.as_deref().unwrap().contains("scratch.txt"));
    assert!(run.summary.outcome(&web, "convert").is_none());
    assert!(run.summary.outcome(&web, "report").is_none());
    assert!(run
        .summary
        .skipped
        .contains_key(&normalize_repository_path(&web)));

    let report = run.reporter.events_with_code(EventCode::AuditReport);
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].detail("repositories"), Some("2"));
    assert!(!run.summary.has_failures());
}

#[test]
fn test_earlier_outcomes_survive_a_later_hard_stop() {
    let fleet = Fleet::new();
    let api = fleet.add_repo("api");
    let web = fleet.add_repo("web");
    fs::write(api.join("release.toml"), "version = 1\n").unwrap();
    git(&api, &["add", "release.toml"]);
    git(&api, &["commit", "-m", "Add release config"]);

    let run = run_workflow(
        &fleet,
        r##"
steps:
  - name: convert
    command: remote protocol-convert
    with: {from: https, to: ssh}
  - name: changelog
    after: [convert]
    command: tasks apply
    with:
      tasks:
        - name: changelog
          safeguards: {hard_stop: {file_exists: [release.toml]}}
          files:
            - {path: CHANGELOG.md, content: "# Changelog\n"}
          commit: Add changelog
  - name: notice
    after: [changelog]
    command: tasks apply
    with:
      tasks:
        - name: notice
          files:
            - {path: NOTICE, content: "acme\n"}
"##,
        false,
    );

    assert_eq!(
        run.summary.outcome(&web, "convert").map(|o| o.kind),
        Some(OutcomeKind::Applied)
    );
    assert_eq!(
        run.env.shared.outcome(&web, "convert").map(|o| o.kind),
        Some(OutcomeKind::Applied)
    );
    assert_eq!(
        run.summary.outcome(&web, "changelog").map(|o| o.kind),
        Some(OutcomeKind::Skipped)
    );
    assert!(run.summary.outcome(&web, "notice").is_none());
    assert!(!web.join("NOTICE").exists());

    assert_eq!(
        run.summary.outcome(&api, "notice").map(|o| o.kind),
        Some(OutcomeKind::Applied)
    );
    assert!(api.join("CHANGELOG.md").exists());
    assert!(api.join("NOTICE").exists());
}
