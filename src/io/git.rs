//! Git adapter for range resolution, the notes store, and worktree plumbing.
//!
//! Everything goes through the `git` binary; the version-control system is
//! invoked, never reimplemented. Destructive operations are confined to the
//! auxiliary worktree and the dedicated notes ref, so the user's primary
//! working copy and history are never touched.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

/// Notes ref holding cached verdicts, keyed by tree object.
pub const NOTES_REF: &str = "refs/notes/testall";

/// Wrapper for executing git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Expand a range expression to an oldest-first commit list.
    ///
    /// An empty result is not an error here; the caller decides whether an
    /// empty range is fatal.
    #[instrument(skip_all, fields(range))]
    pub fn resolve_range(&self, range: &str) -> Result<Vec<String>> {
        let out = self
            .run_capture(&["rev-list", "--reverse", range])
            .with_context(|| format!("resolve range '{range}'"))?;
        let commits: Vec<String> = out
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();
        debug!(count = commits.len(), "resolved range");
        Ok(commits)
    }

    /// Content-tree id for a commit.
    ///
    /// Two commits with identical file contents share a tree id regardless of
    /// author, message, or parents, so this is the cache key.
    pub fn tree_id(&self, commit: &str) -> Result<String> {
        let spec = format!("{commit}^{{tree}}");
        let out = self.run_capture(&["rev-parse", "--verify", &spec])?;
        Ok(out.trim().to_string())
    }

    /// Abbreviated commit id for display.
    pub fn short_sha(&self, commit: &str) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "--short", commit])?;
        Ok(out.trim().to_string())
    }

    /// First line of the commit message, for display.
    pub fn subject(&self, commit: &str) -> Result<String> {
        let out = self.run_capture(&["log", "-1", "--format=%s", commit])?;
        Ok(out.trim().to_string())
    }

    /// Read the note attached to `tree`, or `None` if no note exists.
    pub fn note_read(&self, tree: &str) -> Result<Option<String>> {
        let output = self.run(&["notes", "--ref", NOTES_REF, "show", tree])?;
        // `git notes show` exits 1 when the object has no note.
        match output.status.code() {
            Some(0) => Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            )),
            Some(1) => Ok(None),
            _ => Err(command_failure("notes show", &output)),
        }
    }

    /// Attach `value` as a note on `tree`, overwriting any existing note.
    pub fn note_write(&self, tree: &str, value: &str) -> Result<()> {
        self.run_checked(&["notes", "--ref", NOTES_REF, "add", "-f", "-m", value, tree])?;
        Ok(())
    }

    /// Remove the note on `tree`; no-op if absent.
    pub fn note_remove(&self, tree: &str) -> Result<()> {
        self.run_checked(&["notes", "--ref", NOTES_REF, "remove", "--ignore-missing", tree])?;
        Ok(())
    }

    /// All values for a multi-valued config key; empty when unset.
    pub fn config_get_all(&self, key: &str) -> Result<Vec<String>> {
        let output = self.run(&["config", "--get-all", key])?;
        // `git config` exits 1 when the key is unset.
        match output.status.code() {
            Some(0) => Ok(String::from_utf8_lossy(&output.stdout)
                .lines()
                .map(|line| line.to_string())
                .filter(|line| !line.is_empty())
                .collect()),
            Some(1) => Ok(Vec::new()),
            _ => Err(command_failure("config --get-all", &output)),
        }
    }

    /// Single-valued config key; `None` when unset.
    pub fn config_get(&self, key: &str) -> Result<Option<String>> {
        let output = self.run(&["config", "--get", key])?;
        match output.status.code() {
            Some(0) => Ok(Some(
                String::from_utf8_lossy(&output.stdout).trim().to_string(),
            )),
            Some(1) => Ok(None),
            _ => Err(command_failure("config --get", &output)),
        }
    }

    /// Location of the repository's shared metadata directory.
    pub fn git_common_dir(&self) -> Result<PathBuf> {
        let out = self.run_capture(&["rev-parse", "--git-common-dir"])?;
        let dir = PathBuf::from(out.trim());
        if dir.is_absolute() {
            Ok(dir)
        } else {
            Ok(self.workdir.join(dir))
        }
    }

    /// Drop worktree registrations whose checkout directories are gone.
    pub fn worktree_prune(&self) -> Result<()> {
        self.run_checked(&["worktree", "prune"])?;
        Ok(())
    }

    /// Register a new detached worktree at `path`.
    #[instrument(skip_all, fields(path = %path.display()))]
    pub fn worktree_add_detached(&self, path: &Path) -> Result<()> {
        debug!("registering auxiliary worktree");
        self.run_checked(&["worktree", "add", "--detach", path_str(path)?])?;
        Ok(())
    }

    /// Discard tracked-file changes in this working directory.
    pub fn reset_hard(&self) -> Result<()> {
        self.run_checked(&["reset", "--hard", "--quiet"])?;
        Ok(())
    }

    /// Purge untracked files and directories, including ignored ones.
    pub fn clean_fdx(&self) -> Result<()> {
        self.run_checked(&["clean", "-fdx", "--quiet"])?;
        Ok(())
    }

    /// Force a detached checkout of `commit` in this working directory.
    #[instrument(skip_all, fields(commit))]
    pub fn checkout_detached(&self, commit: &str) -> Result<()> {
        debug!("detached checkout");
        self.run_checked(&["checkout", "--quiet", "--force", "--detach", commit])?;
        Ok(())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run_checked(args)?;
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run_checked(&self, args: &[&str]) -> Result<Output> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(output)
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

fn command_failure(label: &str, output: &Output) -> anyhow::Error {
    let stderr = String::from_utf8_lossy(&output.stderr);
    anyhow!("git {label} failed: {}", stderr.trim())
}

fn path_str(path: &Path) -> Result<&str> {
    path.to_str()
        .ok_or_else(|| anyhow!("non-UTF-8 path {}", path.display()))
}
