use super::*;
use crate::env::Environment;
use crate::errors::ConfigError;
use crate::options::{OptionError, OptionMap};
use crate::outcome::{EventCode, OutcomeKind};
use crate::ports::{RecordingReporter, RemoteProtocol, RepositoryMetadata, StaticResolver};
use crate::task::ActionRegistry;
use crate::test_support::{git, init_repo_at};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

struct Fleet {
    root: TempDir,
    base: Environment,
    reporter: Arc<RecordingReporter>,
}

impl Fleet {
    fn new(configure: impl FnOnce(crate::env::EnvironmentBuilder) -> crate::env::EnvironmentBuilder) -> Self {
        let root = TempDir::new().unwrap();
        let reporter = Arc::new(RecordingReporter::new());
        let base = configure(Environment::builder().reporter(reporter.clone())).build();
        Self {
            root,
            base,
            reporter,
        }
    }

    /// Create a repository under the fleet root with `origin` set to `url`
    fn repo(&self, dir: &str, origin: Option<&str>) -> RepositoryState {
        let path = self.root.path().join(dir);
        init_repo_at(&path);
        if let Some(url) = origin {
            git(&path, &["remote", "add", "origin", url]);
        }
        RepositoryState::load(&self.base, &path, 1, false).unwrap()
    }

    fn outcome(&self, repo: &RepositoryState, step: &str) -> OutcomeKind {
        self.base
            .shared
            .outcome(&repo.path, step)
            .map(|o| o.kind)
            .unwrap_or_default()
    }
}

fn options(value: serde_json::Value) -> OptionMap {
    OptionMap::from_value("with", &value).unwrap()
}

fn build(command: &str, value: serde_json::Value) -> Result<Box<dyn Operation>, ConfigError> {
    build_operation("step", command, &options(value), &ActionRegistry::with_builtins())
}

/// The configuration error a command is rejected with
fn build_err(command: &str, value: serde_json::Value) -> ConfigError {
    match build(command, value) {
        Ok(op) => panic!("'{command}' unexpectedly built a {} operation", op.kind()),
        Err(err) => err,
    }
}

fn protocol_op(from: RemoteProtocol, to: RemoteProtocol) -> ProtocolConvertOperation {
    ProtocolConvertOperation {
        from,
        to,
        remote: "origin".into(),
        clean: CleanPolicy::default(),
    }
}

#[test]
fn test_normalize_command_path() {
    assert_eq!(normalize_command_path("  Remote   Protocol-Convert "), "remote protocol-convert");
    assert_eq!(normalize_command_path("folder/rename"), "folder rename");
    assert_eq!(normalize_command_path("   "), "");
}

#[test]
fn test_build_known_commands() {
    let op = build("remote protocol-convert", json!({"from": "https", "to": "ssh"})).unwrap();
    assert_eq!(op.kind(), "protocol_convert");
    assert!(op.as_repository_scoped().is_some());

    let op = build("Folder Rename", json!({"include_owner": true})).unwrap();
    assert_eq!(op.name(), "folder rename");

    let op = build("audit report", json!({})).unwrap();
    assert!(op.as_repository_scoped().is_none());

    for path in COMMAND_PATHS {
        let with = match *path {
            "remote protocol-convert" => json!({"from": "ssh", "to": "https"}),
            "tasks apply" => json!({"tasks": [{"name": "t", "files": [{"path": "a", "content": "b"}]}]}),
            _ => json!({}),
        };
        assert!(build(path, with).is_ok(), "{path} should build");
    }
}

#[test]
fn test_build_rejects_unknown_command() {
    assert_eq!(
        build_err("repo teleport", json!({})),
        ConfigError::UnknownCommand("repo teleport".into())
    );
    assert_eq!(
        build_err("  ", json!({})),
        ConfigError::MissingCommandPath { step: "step".into() }
    );
}

#[test]
fn test_build_protocol_requires_distinct_recognized_protocols() {
    let err = build_err("remote protocol-convert", json!({"to": "ssh"}));
    assert_eq!(
        err,
        ConfigError::InvalidOption {
            step: "step".into(),
            source: OptionError::Missing { field: "from".into() },
        }
    );

    let err = build_err("remote protocol-convert", json!({"from": "ftp", "to": "ssh"}));
    assert!(err.to_string().contains("unrecognized protocol 'ftp'"));

    let err = build_err("remote protocol-convert", json!({"from": "ssh", "to": "SSH"}));
    assert!(err.to_string().contains("must differ"));
}

#[test]
fn test_build_tasks_apply_needs_tasks() {
    let err = build_err("tasks apply", json!({}));
    assert!(matches!(err, ConfigError::Invalid { .. }));

    let err = build_err("tasks apply", json!({"tasks": [{"name": "empty"}]}));
    assert!(matches!(err, ConfigError::Invalid { .. }));
}

#[test]
fn test_build_rejects_malformed_require_clean() {
    let err = build_err("folder rename", json!({"require_clean": "sometimes"}));
    assert!(matches!(err, ConfigError::InvalidOption { .. }));
}

#[test]
fn test_defaults_do_not_override_explicit_setting() {
    let defaults = OperationDefaults { require_clean: Some(true) };

    let mut explicit = CleanPolicy::from_options(&options(json!({"require_clean": false}))).unwrap();
    explicit.apply_default(&defaults);
    assert!(!explicit.requirement.enabled);

    let mut unset = CleanPolicy::from_options(&OptionMap::new()).unwrap();
    unset.apply_default(&defaults);
    assert!(unset.requirement.enabled);
    assert!(!unset.explicit);
}

#[test]
fn test_protocol_convert_updates_remote() {
    let fleet = Fleet::new(|b| b);
    let mut repo = fleet.repo("api", Some("https://github.com/acme/api.git"));
    let env = fleet.base.for_repository().for_step("convert");

    protocol_op(RemoteProtocol::Https, RemoteProtocol::Ssh)
        .execute_for_repository(&env, &mut repo)
        .unwrap();

    assert_eq!(
        git(&repo.path, &["remote", "get-url", "origin"]),
        "git@github.com:acme/api.git"
    );
    assert_eq!(repo.snapshot.origin_url.as_deref(), Some("git@github.com:acme/api.git"));
    assert_eq!(fleet.outcome(&repo, "convert"), OutcomeKind::Applied);
    let converted = fleet.reporter.events_with_code(EventCode::ProtocolConverted);
    assert_eq!(converted[0].detail("to"), Some("ssh"));
}

#[test]
fn test_protocol_convert_other_protocol_is_noop() {
    let fleet = Fleet::new(|b| b);
    let mut repo = fleet.repo("api", Some("git@github.com:acme/api.git"));
    let env = fleet.base.for_repository().for_step("convert");

    protocol_op(RemoteProtocol::Https, RemoteProtocol::Ssh)
        .execute_for_repository(&env, &mut repo)
        .unwrap();

    assert_eq!(fleet.outcome(&repo, "convert"), OutcomeKind::NoOp);
}

#[test]
fn test_protocol_convert_missing_remote_skips_step() {
    let fleet = Fleet::new(|b| b);
    let mut repo = fleet.repo("api", None);
    let env = fleet.base.for_repository().for_step("convert");

    protocol_op(RemoteProtocol::Https, RemoteProtocol::Ssh)
        .execute_for_repository(&env, &mut repo)
        .unwrap();

    assert_eq!(fleet.outcome(&repo, "convert"), OutcomeKind::Skipped);
    assert!(!fleet.base.shared.is_skipped(&repo.path));
}

#[test]
fn test_protocol_convert_dry_run_leaves_remote() {
    let fleet = Fleet::new(|b| b.dry_run(true));
    let mut repo = fleet.repo("api", Some("https://github.com/acme/api.git"));
    let env = fleet.base.for_repository().for_step("convert");

    protocol_op(RemoteProtocol::Https, RemoteProtocol::Ssh)
        .execute_for_repository(&env, &mut repo)
        .unwrap();

    assert_eq!(
        git(&repo.path, &["remote", "get-url", "origin"]),
        "https://github.com/acme/api.git"
    );
    assert_eq!(fleet.reporter.events_with_code(EventCode::OperationPlanned).len(), 1);
}

#[test]
fn test_require_clean_skips_dirty_repository_for_step_only() {
    let fleet = Fleet::new(|b| b);
    let mut repo = fleet.repo("api", Some("https://github.com/acme/api.git"));
    std::fs::write(repo.path.join("scratch.txt"), "wip").unwrap();
    repo.refresh(&fleet.base).unwrap();
    let env = fleet.base.for_repository().for_step("convert");

    let mut op = protocol_op(RemoteProtocol::Https, RemoteProtocol::Ssh);
    op.apply_defaults(&OperationDefaults { require_clean: Some(true) });
    op.execute_for_repository(&env, &mut repo).unwrap();

    assert_eq!(
        git(&repo.path, &["remote", "get-url", "origin"]),
        "https://github.com/acme/api.git"
    );
    let skipped = fleet.reporter.events_with_code(EventCode::StepSkipped);
    assert!(skipped[0].message.contains("scratch.txt"));
    assert!(!fleet.base.shared.is_skipped(&repo.path));
}

#[test]
fn test_canonicalize_uses_resolver() {
    let metadata = RepositoryMetadata {
        owner: "acme-corp".into(),
        name: "api-server".into(),
        canonical_url: None,
        default_branch: Some("main".into()),
    };
    let resolver = StaticResolver::new()
        .with("acme", "api", metadata.clone())
        .with("acme-corp", "api-server", metadata);
    let fleet = Fleet::new(|b| b.resolver(Arc::new(resolver)));
    let mut repo = fleet.repo("api", Some("git@github.com:acme/api.git"));
    let env = fleet.base.for_repository().for_step("canonical");

    let op = CanonicalizeRemoteOperation {
        remote: "origin".into(),
        protocol: None,
        clean: CleanPolicy::default(),
    };
    op.execute_for_repository(&env, &mut repo).unwrap();

    assert_eq!(
        git(&repo.path, &["remote", "get-url", "origin"]),
        "git@github.com:acme-corp/api-server.git"
    );
    assert_eq!(fleet.outcome(&repo, "canonical"), OutcomeKind::Applied);

    // Second pass finds nothing to do
    let env = env.for_step("again");
    op.execute_for_repository(&env, &mut repo).unwrap();
    assert_eq!(fleet.outcome(&repo, "again"), OutcomeKind::NoOp);
}

#[test]
fn test_canonicalize_unknown_repository_skips() {
    let fleet = Fleet::new(|b| b);
    let mut repo = fleet.repo("api", Some("git@github.com:acme/api.git"));
    let env = fleet.base.for_repository().for_step("canonical");

    let op = CanonicalizeRemoteOperation {
        remote: "origin".into(),
        protocol: Some(RemoteProtocol::Https),
        clean: CleanPolicy::default(),
    };
    op.execute_for_repository(&env, &mut repo).unwrap();

    assert_eq!(fleet.outcome(&repo, "canonical"), OutcomeKind::Skipped);
    assert_eq!(
        git(&repo.path, &["remote", "get-url", "origin"]),
        "git@github.com:acme/api.git"
    );
}

#[test]
fn test_folder_rename_moves_directory_and_records() {
    let fleet = Fleet::new(|b| b);
    let mut repo = fleet.repo("local-name", Some("https://github.com/acme/api.git"));
    let old = repo.path.clone();
    let env = fleet.base.for_repository().for_step("rename");

    FolderRenameOperation::default()
        .execute_for_repository(&env, &mut repo)
        .unwrap();

    assert_eq!(repo.path, fleet.root.path().join("api"));
    assert!(repo.path.join(".git").exists());
    assert!(!old.exists());
    assert_eq!(fleet.outcome(&repo, "rename"), OutcomeKind::Applied);
}

#[test]
fn test_folder_rename_target_with_owner() {
    let op = FolderRenameOperation {
        include_owner: true,
        clean: CleanPolicy::default(),
    };
    let mut repo = RepositoryState::new(PathBuf::from("/src/local"), 1, false);
    repo.snapshot.owner = Some("acme".into());
    repo.snapshot.name = Some("api".into());
    assert_eq!(op.target_path(&repo), Some(PathBuf::from("/src/acme/api")));

    repo.path = PathBuf::from("/src/acme/local");
    assert_eq!(op.target_path(&repo), Some(PathBuf::from("/src/acme/api")));

    repo.snapshot.name = None;
    assert_eq!(op.target_path(&repo), None);
}

#[test]
fn test_folder_rename_existing_target_skips() {
    let fleet = Fleet::new(|b| b);
    let mut repo = fleet.repo("local-name", Some("https://github.com/acme/api.git"));
    std::fs::create_dir(fleet.root.path().join("api")).unwrap();
    let env = fleet.base.for_repository().for_step("rename");

    FolderRenameOperation::default()
        .execute_for_repository(&env, &mut repo)
        .unwrap();

    assert_eq!(repo.path, fleet.root.path().join("local-name"));
    assert_eq!(fleet.outcome(&repo, "rename"), OutcomeKind::Skipped);
}

#[test]
fn test_audit_report_runs_once_per_run() {
    let fleet = Fleet::new(|b| b);
    let mut repos = vec![
        fleet.repo("api", Some("https://github.com/acme/api.git")),
        fleet.repo("web", None),
    ];
    std::fs::write(repos[1].path.join("dirty.txt"), "x").unwrap();
    repos[1].refresh(&fleet.base).unwrap();
    let output = fleet.root.path().join("audit.json");

    let op = AuditReportOperation {
        output: Some(output.clone()),
    };
    op.execute(&fleet.base.for_step("audit"), &mut repos).unwrap();
    op.execute(&fleet.base.for_step("audit-again"), &mut repos).unwrap();

    let reports = fleet.reporter.events_with_code(EventCode::AuditReport);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].detail("dirty"), Some("1"));

    let rows: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(output).unwrap()).unwrap();
    assert_eq!(rows.as_array().unwrap().len(), 2);
    assert_eq!(rows[0]["protocol"], "https");
}

#[test]
fn test_execute_each_passes_over_skipped_repositories() {
    let fleet = Fleet::new(|b| b);
    let mut repos = vec![
        fleet.repo("a", Some("https://github.com/acme/a.git")),
        fleet.repo("b", Some("https://github.com/acme/b.git")),
    ];
    fleet.base.shared.skip_repository(&repos[0].path, "dirty");
    let env = fleet.base.for_step("convert");

    protocol_op(RemoteProtocol::Https, RemoteProtocol::Ssh)
        .execute(&env, &mut repos)
        .unwrap();

    assert_eq!(
        git(&repos[0].path, &["remote", "get-url", "origin"]),
        "https://github.com/acme/a.git"
    );
    assert_eq!(
        git(&repos[1].path, &["remote", "get-url", "origin"]),
        "git@github.com:acme/b.git"
    );
}

#[test]
fn test_execute_each_records_hard_stopped_repositories() {
    let fleet = Fleet::new(|b| b);
    let mut repos = vec![
        fleet.repo("a", Some("https://github.com/acme/a.git")),
        fleet.repo("b", Some("https://github.com/acme/b.git")),
    ];
    std::fs::write(repos[1].path.join("keep.me"), "").unwrap();
    git(&repos[1].path, &["add", "keep.me"]);
    git(&repos[1].path, &["commit", "-m", "Keep"]);
    repos[1].refresh(&fleet.base).unwrap();

    let op = build(
        "tasks apply",
        json!({"tasks": [{
            "name": "notice",
            "safeguards": {"hard_stop": {"paths": ["keep.me"]}},
            "files": [{"path": "NOTICE", "content": "acme\n"}],
            "commit": "Add NOTICE"
        }]}),
    )
    .unwrap();
    op.execute(&fleet.base.for_step("notice"), &mut repos).unwrap();

    assert!(fleet.base.shared.is_skipped(&repos[0].path));
    assert!(!fleet.base.shared.is_skipped(&repos[1].path));
    assert!(!repos[0].path.join("NOTICE").exists());
    assert!(repos[1].path.join("NOTICE").exists());

    let skipped = fleet.reporter.events_with_code(EventCode::RepositorySkipped);
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].detail("reason"), Some("required path keep.me is missing"));
}

#[test]
fn test_operation_error_keeps_signals() {
    let subject = std::path::Path::new("/src/api");

    let skipped = operation_error("task_apply", subject, RepositorySkipped::new("dirty").into());
    assert!(skipped.is::<RepositorySkipped>());

    let cancelled = operation_error("task_apply", subject, Cancelled.into());
    assert!(cancelled.is::<Cancelled>());

    let wrapped = operation_error("task_apply", subject, anyhow::anyhow!("boom"));
    let inner = wrapped.downcast_ref::<OperationError>().unwrap();
    assert_eq!(inner.kind, "task_apply");

    let again = operation_error("other", subject, wrapped);
    assert_eq!(again.downcast_ref::<OperationError>().unwrap().kind, "task_apply");
}
