//! Run controller: resolve the range, plan against the cache, lock and
//! prepare the worktree, then test each commit in oldest-first order.
//!
//! The run is fully sequential; one commit's command sequence finishes (or
//! fails) before the next begins. Pre-flight problems (empty range, no test
//! commands, lock held) abort before any commit is touched. A failing test
//! command is data, not an error: it marks the commit `not ok` and either
//! halts the run or, with keep-going, moves on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::io::cache::ResultCache;
use crate::io::git::Git;
use crate::io::lock::WorktreeLock;
use crate::io::process::TestRunner;
use crate::io::worktree::WorkingTree;
use crate::report::Reporter;

/// Multi-valued repo config key supplying test commands.
pub const CONFIG_COMMAND: &str = "testall.command";
/// Repo config key overriding the auxiliary worktree location.
pub const CONFIG_CHECKOUT: &str = "testall.checkout";
/// Repo config key for the per-command timeout, in seconds.
pub const CONFIG_TIMEOUT: &str = "testall.timeout";

/// Immutable per-run configuration, from flags and repository config.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Range expression, e.g. `master..HEAD`.
    pub range: String,
    /// Explicit test commands; when non-empty they fully replace the
    /// config-sourced ones.
    pub commands: Vec<String>,
    /// Auxiliary worktree location override.
    pub checkout: Option<PathBuf>,
    /// Purge untracked files before each test.
    pub clean: bool,
    /// Narrate only; zero worktree and cache mutation.
    pub dry_run: bool,
    /// Continue past per-commit failures.
    pub keep_going: bool,
    /// Ignore cached successes and re-test every commit.
    pub force: bool,
    /// Per-command timeout, applied by the shell runner.
    pub timeout: Option<Duration>,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            range: "master..HEAD".to_string(),
            commands: Vec::new(),
            checkout: None,
            clean: false,
            dry_run: false,
            keep_going: false,
            force: false,
            timeout: None,
        }
    }
}

/// Raised when the range expression resolves to no commits.
#[derive(Debug)]
pub struct EmptyRangeError {
    pub range: String,
}

impl fmt::Display for EmptyRangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no commits to test in range '{}'", self.range)
    }
}

impl std::error::Error for EmptyRangeError {}

/// Raised when neither `--test` flags nor `testall.command` supply commands.
#[derive(Debug)]
pub struct NoTestCommandsError;

impl fmt::Display for NoTestCommandsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "no test commands configured (use --test or set {CONFIG_COMMAND})"
        )
    }
}

impl std::error::Error for NoTestCommandsError {}

/// Per-commit verdict within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitStatus {
    /// Tested in this run and every command passed.
    Ok,
    /// Skipped because its tree already has a cached success.
    OkCached,
    /// A command failed.
    NotOk,
    /// Never attempted (an earlier commit failed without keep-going).
    Skipped,
}

/// One commit in the resolved plan.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub commit: String,
    pub short: String,
    pub subject: String,
    pub tree: String,
    /// Whether the cache held a success for this tree at planning time.
    pub cached: bool,
}

/// Aggregate outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunVerdict {
    pub success: bool,
    /// Parallel to the resolved range, oldest first.
    pub statuses: Vec<CommitStatus>,
    /// Index of the last commit attempted, for stop-on-first-failure runs.
    pub last_attempted: Option<usize>,
}

/// Execute a full run against the repository at `repo_root`.
#[instrument(skip_all, fields(range = %opts.range, dry_run = opts.dry_run))]
pub fn run_range<R: TestRunner>(
    repo_root: &Path,
    opts: &RunOptions,
    runner: &R,
    reporter: &Reporter,
) -> Result<RunVerdict> {
    let git = Git::new(repo_root);

    // RESOLVING: every pre-flight check happens before any mutation.
    let commands = resolve_commands(&git, &opts.commands)?;
    let checkout = resolve_checkout_path(&git, opts.checkout.as_deref())?;
    let commits = git.resolve_range(&opts.range)?;
    if commits.is_empty() {
        return Err(EmptyRangeError {
            range: opts.range.clone(),
        }
        .into());
    }
    info!(
        commits = commits.len(),
        commands = commands.len(),
        checkout = %checkout.display(),
        "run resolved"
    );

    // PLANNING: tree ids and cached verdicts for the whole range.
    let cache = ResultCache::new(&git);
    let mut plan = Vec::with_capacity(commits.len());
    for commit in &commits {
        let tree = git.tree_id(commit)?;
        let cached = cache.is_success(&tree)?;
        plan.push(PlanEntry {
            short: git.short_sha(commit)?,
            subject: git.subject(commit)?,
            commit: commit.clone(),
            tree,
            cached,
        });
    }
    reporter.plan(&opts.range, &plan);

    // LOCKING / PREPARING. Dry runs are fully read-only, so they neither
    // take the lock nor register the worktree.
    let _lock = if opts.dry_run {
        None
    } else {
        Some(WorktreeLock::acquire(&checkout)?)
    };
    let worktree = WorkingTree::new(Git::new(repo_root), checkout, opts.clean, opts.dry_run);
    worktree.prepare()?;

    // TESTING, strictly oldest to newest.
    let mut statuses = vec![CommitStatus::Skipped; plan.len()];
    let mut success = true;
    let mut last_attempted = None;
    for (index, entry) in plan.iter().enumerate() {
        last_attempted = Some(index);

        // Re-check the cache at test time: an earlier commit in this run may
        // have marked the same tree.
        let cached_now =
            !opts.force && (entry.cached || cache.is_success(&entry.tree)?);
        if cached_now {
            statuses[index] = CommitStatus::OkCached;
            reporter.status(entry, CommitStatus::OkCached);
            continue;
        }

        worktree.checkout(&entry.commit)?;
        let outcome = runner
            .run(&commands, worktree.path())
            .with_context(|| format!("run tests for {}", entry.short))?;

        if outcome.passed {
            if !opts.dry_run {
                cache.mark_success(&entry.tree)?;
            }
            statuses[index] = CommitStatus::Ok;
            reporter.status(entry, CommitStatus::Ok);
        } else {
            statuses[index] = CommitStatus::NotOk;
            reporter.status(entry, CommitStatus::NotOk);
            // A stale cached success here means the commit was re-tested
            // under --force and now fails; drop it so an un-forced run
            // re-tests this tree.
            if !opts.dry_run && entry.cached {
                cache.invalidate(&entry.tree)?;
            }
            success = false;
            if !opts.keep_going {
                break;
            }
        }
    }

    let verdict = RunVerdict {
        success,
        statuses,
        last_attempted,
    };
    reporter.summary(&verdict);
    Ok(verdict)
}

fn resolve_commands(git: &Git, explicit: &[String]) -> Result<Vec<String>> {
    if !explicit.is_empty() {
        return Ok(explicit.to_vec());
    }
    let configured = git.config_get_all(CONFIG_COMMAND)?;
    if configured.is_empty() {
        return Err(NoTestCommandsError.into());
    }
    debug!(commands = configured.len(), "using configured test commands");
    Ok(configured)
}

fn resolve_checkout_path(git: &Git, flag: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = flag {
        return Ok(path.to_path_buf());
    }
    if let Some(configured) = git.config_get(CONFIG_CHECKOUT)? {
        let path = PathBuf::from(configured);
        return Ok(if path.is_absolute() {
            path
        } else {
            git.workdir().join(path)
        });
    }
    Ok(git.git_common_dir()?.join("testall").join("worktree"))
}

/// Per-command timeout from the flag, falling back to `testall.timeout`.
pub fn resolve_timeout(git: &Git, flag: Option<u64>) -> Result<Option<Duration>> {
    let secs = match flag {
        Some(secs) => Some(secs),
        None => git
            .config_get(CONFIG_TIMEOUT)?
            .map(|raw| {
                raw.parse::<u64>()
                    .with_context(|| format!("parse {CONFIG_TIMEOUT} value '{raw}'"))
            })
            .transpose()?,
    };
    Ok(secs.map(Duration::from_secs))
}
