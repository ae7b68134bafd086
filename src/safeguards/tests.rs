//! Tests for safeguard parsing and evaluation

use super::*;
use crate::env::Environment;
use crate::errors::RepositorySkipped;
use crate::options::OptionMap;
use crate::ports::StatusEntry;
use crate::repository::RepositoryState;
use serde_json::json;
use std::path::PathBuf;
use tempfile::TempDir;

fn options(value: serde_json::Value) -> OptionMap {
    OptionMap::from_value("safeguards", &value).unwrap()
}

fn repo_with_status(path: PathBuf, status: &[(&str, &str)]) -> RepositoryState {
    let mut repo = RepositoryState::new(path, 1, false);
    repo.snapshot.current_branch = Some("main".to_string());
    repo.snapshot.status = status
        .iter()
        .map(|(code, path)| StatusEntry::new(code, path))
        .collect();
    repo
}

fn clean_required(ignore: &[&str]) -> SafeguardSet {
    SafeguardSet {
        require_clean: Some(CleanRequirement {
            enabled: true,
            ignore_dirty_paths: ignore.iter().map(|s| s.to_string()).collect(),
        }),
        ..Default::default()
    }
}

#[test]
fn test_require_clean_fails_on_dirty_tree() {
    let env = Environment::builder().build();
    let repo = repo_with_status(
        PathBuf::from("/src/api"),
        &[(" M", "src/lib.rs"), ("??", "notes.txt")],
    );

    let verdict = evaluate_safeguards(&env, &repo, &clean_required(&[])).unwrap();
    assert_eq!(
        verdict,
        Verdict::fail("repository not clean: src/lib.rs, notes.txt")
    );
}

#[test]
fn test_require_clean_passes_when_every_dirty_path_is_ignored() {
    let env = Environment::builder().build();
    let repo = repo_with_status(
        PathBuf::from("/src/api"),
        &[(" M", "Cargo.lock"), ("??", "target/debug/app"), ("??", "vendor/x.rs")],
    );

    let set = clean_required(&["*.lock", "target/**", "vendor/"]);
    assert_eq!(evaluate_safeguards(&env, &repo, &set).unwrap(), Verdict::Pass);
}

#[test]
fn test_require_clean_partial_ignore_lists_remaining() {
    let env = Environment::builder().build();
    let repo = repo_with_status(
        PathBuf::from("/src/api"),
        &[(" M", "Cargo.lock"), (" M", "src/main.rs")],
    );

    let verdict = evaluate_safeguards(&env, &repo, &clean_required(&["Cargo.lock"])).unwrap();
    assert_eq!(verdict.reason(), Some("repository not clean: src/main.rs"));
}

#[test]
fn test_require_changes_fails_on_clean_tree() {
    let env = Environment::builder().build();
    let repo = repo_with_status(PathBuf::from("/src/api"), &[]);
    let set = SafeguardSet {
        require_changes: true,
        ..Default::default()
    };

    let verdict = evaluate_safeguards(&env, &repo, &set).unwrap();
    assert!(verdict.reason().unwrap().starts_with("require_changes"));
}

#[test]
fn test_clean_and_changes_are_evaluated_independently() {
    let env = Environment::builder().build();
    let set = SafeguardSet {
        require_clean: Some(CleanRequirement::enabled()),
        require_changes: true,
        ..Default::default()
    };

    let dirty = repo_with_status(PathBuf::from("/src/api"), &[(" M", "a")]);
    assert!(evaluate_safeguards(&env, &dirty, &set)
        .unwrap()
        .reason()
        .unwrap()
        .starts_with("repository not clean"));

    let clean = repo_with_status(PathBuf::from("/src/api"), &[]);
    assert!(evaluate_safeguards(&env, &clean, &set)
        .unwrap()
        .reason()
        .unwrap()
        .starts_with("require_changes"));
}

#[test]
fn test_branch_and_branch_in() {
    let env = Environment::builder().build();
    let repo = repo_with_status(PathBuf::from("/src/api"), &[]);

    let exact = SafeguardSet {
        branch: Some("develop".into()),
        ..Default::default()
    };
    assert_eq!(
        evaluate_safeguards(&env, &repo, &exact).unwrap().reason(),
        Some("branch main does not match required branch develop")
    );

    let member = SafeguardSet {
        branch_in: vec!["master".into(), "main".into()],
        ..Default::default()
    };
    assert!(evaluate_safeguards(&env, &repo, &member).unwrap().passed());

    let mut detached = repo.clone();
    detached.snapshot.current_branch = None;
    assert!(!evaluate_safeguards(&env, &detached, &member).unwrap().passed());
}

#[test]
fn test_required_paths() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("go.mod"), "module x\n").unwrap();
    let env = Environment::builder().build();
    let repo = repo_with_status(dir.path().to_path_buf(), &[]);

    let present = SafeguardSet {
        paths: vec!["go.mod".into()],
        ..Default::default()
    };
    assert!(evaluate_safeguards(&env, &repo, &present).unwrap().passed());

    let missing = SafeguardSet {
        paths: vec!["go.mod".into(), "go.sum".into()],
        ..Default::default()
    };
    assert_eq!(
        evaluate_safeguards(&env, &repo, &missing).unwrap().reason(),
        Some("required path go.sum is missing")
    );
}

#[test]
fn test_set_from_options() {
    let set = SafeguardSet::from_options(&options(json!({
        "Require-Clean": {"ignore_dirty_paths": ["*.log"]},
        "branch_in": ["main"],
        "file_exists": "Makefile",
        "paths": ["go.mod"],
    })))
    .unwrap();

    assert_eq!(
        set.require_clean,
        Some(CleanRequirement {
            enabled: true,
            ignore_dirty_paths: vec!["*.log".into()],
        })
    );
    assert_eq!(set.paths, vec!["go.mod", "Makefile"]);
    assert!(!set.is_empty());
}

#[test]
fn test_set_rejects_unknown_and_mistyped_directives() {
    let unknown = SafeguardSet::from_options(&options(json!({"require_tests": true})));
    assert!(unknown.unwrap_err().to_string().contains("unknown safeguard"));

    let mistyped = SafeguardSet::from_options(&options(json!({"require_changes": "often"})));
    assert_eq!(
        mistyped.unwrap_err().to_string(),
        "option require_changes must be a boolean"
    );
}

#[test]
fn test_buckets_default_placement() {
    let map = options(json!({"require_clean": true}));

    let task = SafeguardBuckets::from_options(&map, DefaultBucket::HardStop).unwrap();
    assert!(!task.hard_stop.is_empty());
    assert!(task.soft_skip.is_empty());

    let action = SafeguardBuckets::from_options(&map, DefaultBucket::SoftSkip).unwrap();
    assert!(action.hard_stop.is_empty());
    assert!(!action.soft_skip.is_empty());
}

#[test]
fn test_buckets_explicit_keys_win() {
    let map = options(json!({
        "hard_stop": {"branch": "main"},
        "soft_skip": {"require_changes": true},
    }));
    let buckets = SafeguardBuckets::from_options(&map, DefaultBucket::SoftSkip).unwrap();
    assert_eq!(buckets.hard_stop.branch.as_deref(), Some("main"));
    assert!(buckets.soft_skip.require_changes);

    let mixed = options(json!({"hard_stop": {"branch": "main"}, "require_clean": true}));
    assert!(SafeguardBuckets::from_options(&mixed, DefaultBucket::HardStop).is_err());
}

#[test]
fn test_enforce_hard_stop_raises_repository_skipped() {
    let env = Environment::builder().build();
    let repo = repo_with_status(PathBuf::from("/src/api"), &[(" M", "a")]);
    let buckets = SafeguardBuckets::hard_stop(clean_required(&[]));

    let err = enforce(&env, &repo, &buckets).unwrap_err();
    let skipped = err.downcast_ref::<RepositorySkipped>().unwrap();
    assert_eq!(skipped.reason, "repository not clean: a");
}

#[test]
fn test_enforce_soft_skip_returns_verdict() {
    let env = Environment::builder().build();
    let repo = repo_with_status(PathBuf::from("/src/api"), &[(" M", "a")]);
    let buckets = SafeguardBuckets::soft_skip(clean_required(&[]));

    let verdict = enforce(&env, &repo, &buckets).unwrap();
    assert!(!verdict.passed());
}

#[test]
fn test_evaluation_honours_cancellation() {
    let env = Environment::builder().build();
    env.cancel.cancel();
    let repo = repo_with_status(PathBuf::from("/src/api"), &[]);
    assert!(evaluate_safeguards(&env, &repo, &SafeguardSet::default()).is_err());
}

#[test]
fn test_dirty_paths_prefix_does_not_match_sibling() {
    let status = vec![StatusEntry::new("??", "vendored.txt")];
    assert_eq!(dirty_paths(&status, &["vendor".into()]), vec!["vendored.txt"]);
}
