//! Shared helpers: throwaway fleets of git repositories

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use tempfile::TempDir;

use heddle::env::Environment;
use heddle::plan::plan_operation_stages;
use heddle::ports::{AutoConfirm, RecordingReporter};
use heddle::workflow::{
    discover_repositories, load_repositories, RunCoordinator, RunSummary, WorkflowConfig,
};

/// Run git in `dir`, panicking on failure, returning trimmed stdout
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {} failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// A temporary directory holding several repositories
pub struct Fleet {
    pub root: TempDir,
}

impl Fleet {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Create `<root>/<name>` with one commit on `main` and an https origin
    pub fn add_repo(&self, name: &str) -> PathBuf {
        let repo_root = self.root.path().join(name);
        fs::create_dir_all(&repo_root).expect("Failed to create repo dir");
        git(&repo_root, &["init"]);
        git(&repo_root, &["config", "user.email", "test@test.com"]);
        git(&repo_root, &["config", "user.name", "Test User"]);
        git(&repo_root, &["config", "commit.gpgsign", "false"]);
        fs::write(repo_root.join("README.md"), format!("# {name}\n"))
            .expect("Failed to write README.md");
        git(&repo_root, &["add", "."]);
        git(&repo_root, &["commit", "-m", "Initial commit"]);
        git(&repo_root, &["branch", "-M", "main"]);
        let origin = format!("https://github.com/acme/{name}.git");
        git(&repo_root, &["remote", "add", "origin", &origin]);
        repo_root
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }
}

/// Result of one workflow run against a fleet
pub struct Run {
    pub summary: RunSummary,
    pub reporter: Arc<RecordingReporter>,
    pub env: Environment,
}

/// Parse `yaml`, discover the fleet and run every stage
pub fn run_workflow(fleet: &Fleet, yaml: &str, dry_run: bool) -> Run {
    let config = WorkflowConfig::from_yaml_str(yaml).expect("Failed to parse workflow");
    let reporter = Arc::new(RecordingReporter::new());
    let mut builder = Environment::builder()
        .reporter(reporter.clone())
        .prompter(Arc::new(AutoConfirm))
        .dry_run(dry_run);
    for (name, value) in config.seeds().expect("Invalid variables") {
        builder = builder.seed(&name, &value);
    }
    let env = builder.build();

    let nodes = config
        .build_nodes(&env.actions)
        .expect("Failed to build workflow");
    let stages = plan_operation_stages(&nodes).expect("Failed to plan stages");
    let discovered =
        discover_repositories(&[fleet.root.path().to_path_buf()]).expect("Discovery failed");
    let repositories = load_repositories(&env, &discovered).expect("Inspection failed");

    let summary = RunCoordinator::new(&env, config.max_parallel.unwrap_or(2))
        .run(&stages, repositories)
        .expect("Run failed");
    Run {
        summary,
        reporter,
        env,
    }
}
