//! Process execution
//!
//! [`ProcessRunner`] is the single seam through which heddle runs `git`,
//! `gh`, and shell commands. The free functions at the bottom mirror the
//! usual git call shapes (raw output, checked stdout, boolean status).

use anyhow::{bail, Context, Result};
use shell_escape::escape;
use std::borrow::Cow;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;
use wait_timeout::ChildExt;

/// Timeout for collecting output from child process pipes
const OUTPUT_COLLECTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Maximum captured size per stream (10MB)
const MAX_OUTPUT_SIZE: usize = 10 * 1024 * 1024;

const TRUNCATION_MARKER: &str = "\n[output truncated at 10MB]";

/// Captured result of a finished (or killed) process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }
}

pub trait ProcessRunner: Send + Sync {
    /// Run `program` with `args` in `cwd`, capturing output.
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput>;

    /// Run a command line through the platform shell.
    ///
    /// When `timeout` elapses the process is killed and the output is marked
    /// `timed_out`. No timeout is imposed when `None`.
    fn run_shell(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput>;
}

/// Runs real processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], cwd: &Path) -> Result<CommandOutput> {
        tracing::trace!(cwd = %cwd.display(), "{}", command_line(program, args));
        let output = Command::new(program)
            .args(args)
            .current_dir(cwd)
            .output()
            .with_context(|| format!("Failed to execute: {}", command_line(program, args)))?;

        Ok(CommandOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            timed_out: false,
        })
    }

    fn run_shell(
        &self,
        command: &str,
        cwd: &Path,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput> {
        let mut child = spawn_shell_command(command, cwd)?;

        // Drain the pipes while waiting, otherwise a chatty child blocks on a
        // full pipe buffer and never exits.
        let stdout_rx = drain(child.stdout.take());
        let stderr_rx = drain(child.stderr.take());

        let status = match timeout {
            Some(limit) => child
                .wait_timeout(limit)
                .with_context(|| format!("Failed to wait for command: {command}"))?,
            None => Some(
                child
                    .wait()
                    .with_context(|| format!("Failed to wait for command: {command}"))?,
            ),
        };

        let timed_out = status.is_none();
        if timed_out {
            let _ = child.kill();
            let _ = child.wait();
        }

        let stdout = stdout_rx
            .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
            .unwrap_or_else(|_| "[output collection timed out]".to_string());
        let mut stderr = stderr_rx
            .recv_timeout(OUTPUT_COLLECTION_TIMEOUT)
            .unwrap_or_else(|_| "[output collection timed out]".to_string());

        if let (true, Some(limit)) = (timed_out, timeout) {
            stderr.push_str(&format!(
                "\n[Process killed after {}s timeout]",
                limit.as_secs()
            ));
        }

        Ok(CommandOutput {
            exit_code: status.and_then(|s| s.code()),
            stdout,
            stderr,
            timed_out,
        })
    }
}

/// Render a command as a copy-pasteable shell line
pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .map(|part| escape(Cow::Borrowed(part)).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

fn spawn_shell_command(command: &str, cwd: &Path) -> Result<Child> {
    let mut cmd = if cfg!(target_family = "unix") {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    } else {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    };

    cmd.current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("Failed to spawn command: {command}"))
}

fn drain<R: Read + Send + 'static>(stream: Option<R>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel();
    match stream {
        Some(stream) => {
            thread::spawn(move || {
                let _ = tx.send(read_stream_to_string(stream));
            });
        }
        None => {
            let _ = tx.send(String::new());
        }
    }
    rx
}

fn read_stream_to_string<R: Read>(stream: R) -> String {
    read_capped(stream, MAX_OUTPUT_SIZE)
}

/// Keep the first `limit` bytes of `stream`.
///
/// The rest is read and discarded so the child never writes into a closed
/// pipe (SIGPIPE); a marker is appended when anything was dropped.
fn read_capped<R: Read>(mut stream: R, limit: usize) -> String {
    let mut buffer = Vec::new();
    let read = (&mut stream).take(limit as u64).read_to_end(&mut buffer);
    if read.is_err() && buffer.is_empty() {
        return "[error reading output]".to_string();
    }

    let dropped = io::copy(&mut stream, &mut io::sink()).unwrap_or(0);
    let mut text = String::from_utf8_lossy(&buffer).into_owned();
    if dropped > 0 {
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

/// Run a git command and return the raw output.
pub fn run_git(runner: &dyn ProcessRunner, args: &[&str], repo_root: &Path) -> Result<CommandOutput> {
    runner.run("git", args, repo_root)
}

/// Run a git command, check for success, and return stdout trimmed.
pub fn run_git_checked(runner: &dyn ProcessRunner, args: &[&str], repo_root: &Path) -> Result<String> {
    let output = run_git(runner, args, repo_root)?;
    if !output.success() {
        let cmd = args.first().unwrap_or(&"");
        bail!("git {cmd} failed: {}", output.stderr.trim());
    }
    Ok(output.stdout.trim().to_string())
}

/// Run a git command and return true if it exited 0. Errors count as false.
pub fn run_git_bool(runner: &dyn ProcessRunner, args: &[&str], repo_root: &Path) -> bool {
    run_git(runner, args, repo_root)
        .map(|output| output.success())
        .unwrap_or(false)
}

/// Check that a `git` binary is on PATH
pub fn check_git_available() -> Result<()> {
    which::which("git").context("Git is not installed or not in PATH")?;
    Ok(())
}
