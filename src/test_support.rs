//! Shared fixtures for unit tests

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::TempDir;

/// Run git in `dir`, panicking on failure
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

/// Create a temporary git repository on `main` with one commit
pub fn init_test_repo() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    init_repo_at(temp_dir.path());
    temp_dir
}

/// Initialise a repository with one commit at an existing directory
pub fn init_repo_at(repo_root: &Path) {
    fs::create_dir_all(repo_root).expect("Failed to create repo dir");
    git(repo_root, &["init"]);
    git(repo_root, &["config", "user.email", "test@test.com"]);
    git(repo_root, &["config", "user.name", "Test User"]);
    git(repo_root, &["config", "commit.gpgsign", "false"]);
    fs::write(repo_root.join("README.md"), "# Test Repository\n").expect("Failed to write README.md");
    git(repo_root, &["add", "."]);
    git(repo_root, &["commit", "-m", "Initial commit"]);
    git(repo_root, &["branch", "-M", "main"]);
}
