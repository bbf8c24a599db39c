//! Shell execution of test commands.
//!
//! Test commands are opaque strings interpreted by the host shell; arbitrary
//! user-supplied commands are a deliberate capability, and this module is the
//! one place such strings are executed. Output streams straight through to
//! the operator (inherited stdio, drained by the terminal) and is never
//! analyzed; only the exit status feeds back into control flow.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Result of running a command sequence against one checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestOutcome {
    pub passed: bool,
    /// Index of the first failing command, when `passed` is false.
    pub failed_at: Option<usize>,
}

impl TestOutcome {
    pub fn pass() -> Self {
        Self {
            passed: true,
            failed_at: None,
        }
    }

    pub fn fail_at(index: usize) -> Self {
        Self {
            passed: false,
            failed_at: Some(index),
        }
    }
}

/// Abstraction over test execution so controller policy is testable without
/// spawning shells.
pub trait TestRunner {
    fn run(&self, commands: &[String], cwd: &Path) -> Result<TestOutcome>;
}

/// Runs each command through `sh -c`, in order, stopping at the first
/// non-zero exit. In dry-run mode nothing is spawned; the runner narrates
/// what it would run and reports success.
pub struct ShellRunner {
    /// Kill a command that runs longer than this; counts as a failure.
    pub timeout: Option<Duration>,
    pub dry_run: bool,
}

impl TestRunner for ShellRunner {
    #[instrument(skip_all, fields(commands = commands.len(), cwd = %cwd.display()))]
    fn run(&self, commands: &[String], cwd: &Path) -> Result<TestOutcome> {
        if self.dry_run {
            for command in commands {
                println!("would run: {command}");
            }
            return Ok(TestOutcome::pass());
        }

        for (index, command) in commands.iter().enumerate() {
            debug!(index, command = %command, "running test command");
            let mut child = Command::new("sh")
                .arg("-c")
                .arg(command)
                .current_dir(cwd)
                .spawn()
                .with_context(|| format!("spawn test command `{command}`"))?;

            let status = match self.timeout {
                Some(timeout) => {
                    match child.wait_timeout(timeout).context("wait for test command")? {
                        Some(status) => status,
                        None => {
                            warn!(
                                timeout_secs = timeout.as_secs(),
                                index, "test command timed out, killing"
                            );
                            child.kill().context("kill test command")?;
                            child.wait().context("wait test command after kill")?;
                            return Ok(TestOutcome::fail_at(index));
                        }
                    }
                }
                None => child.wait().context("wait for test command")?,
            };

            if !status.success() {
                debug!(index, exit_code = ?status.code(), "test command failed");
                return Ok(TestOutcome::fail_at(index));
            }
        }
        Ok(TestOutcome::pass())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runner() -> ShellRunner {
        ShellRunner {
            timeout: None,
            dry_run: false,
        }
    }

    fn commands(specs: &[&str]) -> Vec<String> {
        specs.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn all_commands_pass_in_order() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = runner()
            .run(&commands(&["true", "true"]), temp.path())
            .expect("run");
        assert_eq!(outcome, TestOutcome::pass());
    }

    #[test]
    fn stops_at_the_first_failing_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let marker = temp.path().join("ran-after-failure");
        let second = format!("touch {}", marker.display());

        let outcome = runner()
            .run(&commands(&["false", &second]), temp.path())
            .expect("run");
        assert_eq!(outcome, TestOutcome::fail_at(0));
        assert!(!marker.exists());
    }

    #[test]
    fn reports_the_index_of_a_later_failure() {
        let temp = tempfile::tempdir().expect("tempdir");
        let outcome = runner()
            .run(&commands(&["true", "true", "exit 3"]), temp.path())
            .expect("run");
        assert_eq!(outcome, TestOutcome::fail_at(2));
    }

    #[test]
    fn commands_run_in_the_given_working_directory() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("present.txt"), "x").expect("write");
        let outcome = runner()
            .run(&commands(&["test -f present.txt"]), temp.path())
            .expect("run");
        assert_eq!(outcome, TestOutcome::pass());
    }

    #[test]
    fn timeout_counts_as_failure_of_that_command() {
        let temp = tempfile::tempdir().expect("tempdir");
        let runner = ShellRunner {
            timeout: Some(Duration::from_millis(200)),
            dry_run: false,
        };
        let outcome = runner
            .run(&commands(&["sleep 5"]), temp.path())
            .expect("run");
        assert_eq!(outcome, TestOutcome::fail_at(0));
    }

    #[test]
    fn dry_run_spawns_nothing_and_passes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let marker = temp.path().join("dry-ran");
        let command = format!("touch {}", marker.display());
        let runner = ShellRunner {
            timeout: None,
            dry_run: true,
        };

        let outcome = runner
            .run(&commands(&[&command, "exit 1"]), temp.path())
            .expect("run");
        assert_eq!(outcome, TestOutcome::pass());
        assert!(!marker.exists());
    }
}
