//! Test-only helpers: throwaway git repositories and scripted test runners.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, anyhow};
use tempfile::TempDir;

use crate::io::process::{TestOutcome, TestRunner};

/// A real git repository in a temp directory, with identity configured so
/// commits work in CI environments.
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("tempdir")?;
        let repo = Self { dir };
        repo.git(&["init", "-q", "-b", "main"])?;
        repo.git(&["config", "user.name", "Test"])?;
        repo.git(&["config", "user.email", "test@example.com"])?;
        repo.git(&["config", "commit.gpgsign", "false"])?;
        Ok(repo)
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Run a git command in the repo, returning stdout; errors on non-zero exit.
    pub fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(self.root())
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// Write `contents` to `name`, commit everything, and return the new
    /// commit's full sha.
    pub fn commit_file(&self, name: &str, contents: &str, message: &str) -> Result<String> {
        fs::write(self.root().join(name), contents)
            .with_context(|| format!("write {name}"))?;
        self.git(&["add", "-A"])?;
        self.git(&["commit", "-q", "-m", message])?;
        let sha = self.git(&["rev-parse", "HEAD"])?;
        Ok(sha.trim().to_string())
    }
}

/// Test runner returning predetermined outcomes without spawning processes.
///
/// A scripted runner panics when called more times than its script allows,
/// which doubles as an assertion that cached commits never reach the runner.
pub struct ScriptedRunner {
    outcomes: RefCell<VecDeque<TestOutcome>>,
    always_pass: bool,
    calls: Cell<usize>,
}

impl ScriptedRunner {
    pub fn new(outcomes: Vec<TestOutcome>) -> Self {
        Self {
            outcomes: RefCell::new(outcomes.into()),
            always_pass: false,
            calls: Cell::new(0),
        }
    }

    /// A runner that passes every invocation.
    pub fn passing() -> Self {
        Self {
            outcomes: RefCell::new(VecDeque::new()),
            always_pass: true,
            calls: Cell::new(0),
        }
    }

    /// Number of times the controller invoked this runner.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl TestRunner for ScriptedRunner {
    fn run(&self, _commands: &[String], _cwd: &Path) -> Result<TestOutcome> {
        self.calls.set(self.calls.get() + 1);
        if self.always_pass {
            return Ok(TestOutcome::pass());
        }
        self.outcomes
            .borrow_mut()
            .pop_front()
            .ok_or_else(|| anyhow!("scripted runner exhausted after {} calls", self.calls.get()))
    }
}
