//! CLI entry point for `git-testall`.
//!
//! Installed on `PATH` the binary also works as a git subcommand
//! (`git testall`). Exit codes are stable for scripting; see
//! [`git_testall::exit_codes`].

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use console::style;

use git_testall::exit_codes;
use git_testall::io::git::Git;
use git_testall::io::lock::LockHeldError;
use git_testall::io::process::ShellRunner;
use git_testall::report::Reporter;
use git_testall::run::{RunOptions, resolve_timeout, run_range};

#[derive(Parser, Debug)]
#[command(
    name = "git-testall",
    version,
    about = "Run the test suite against every commit in a range, not just the tip"
)]
struct Cli {
    /// Range of commits to test.
    #[arg(value_name = "RANGE", default_value = "master..HEAD")]
    range: String,

    /// Test command to run (repeatable; replaces testall.command config).
    #[arg(short = 't', long = "test", value_name = "COMMAND")]
    test: Vec<String>,

    /// Narrate what would be done without touching the worktree or cache.
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Keep testing remaining commits after a failure.
    #[arg(short = 'k', long)]
    keep_going: bool,

    /// Re-test commits even when a cached success exists.
    #[arg(short = 'f', long)]
    force: bool,

    /// Purge untracked files from the worktree before each test.
    #[arg(short = 'c', long)]
    clean: bool,

    /// Location of the auxiliary worktree (overrides testall.checkout config).
    #[arg(short = 'w', long = "checkout", value_name = "PATH")]
    checkout: Option<PathBuf>,

    /// Per-command timeout in seconds (overrides testall.timeout config).
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,
}

fn main() {
    git_testall::logging::init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(true) => std::process::exit(exit_codes::OK),
        Ok(false) => std::process::exit(exit_codes::FAILED),
        Err(err) => {
            eprintln!("{}: {:#}", style("error").red().bold(), err);
            let code = if err.downcast_ref::<LockHeldError>().is_some() {
                exit_codes::LOCKED
            } else {
                exit_codes::INVALID
            };
            std::process::exit(code);
        }
    }
}

fn run(cli: &Cli) -> Result<bool> {
    let repo_root = std::env::current_dir().context("determine current directory")?;
    let git = Git::new(&repo_root);
    let timeout = resolve_timeout(&git, cli.timeout)?;

    let opts = RunOptions {
        range: cli.range.clone(),
        commands: cli.test.clone(),
        checkout: cli.checkout.clone(),
        clean: cli.clean,
        dry_run: cli.dry_run,
        keep_going: cli.keep_going,
        force: cli.force,
        timeout,
    };
    let runner = ShellRunner {
        timeout: opts.timeout,
        dry_run: opts.dry_run,
    };

    let verdict = run_range(&repo_root, &opts, &runner, &Reporter::new())?;
    Ok(verdict.success)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_defaults() {
        let cli = Cli::parse_from(["git-testall"]);
        assert_eq!(cli.range, "master..HEAD");
        assert!(cli.test.is_empty());
        assert!(!cli.dry_run);
        assert!(!cli.keep_going);
        assert!(!cli.force);
        assert!(!cli.clean);
        assert_eq!(cli.checkout, None);
        assert_eq!(cli.timeout, None);
    }

    #[test]
    fn parse_repeatable_test_flag() {
        let cli = Cli::parse_from(["git-testall", "-t", "make", "-t", "make check"]);
        assert_eq!(cli.test, vec!["make".to_string(), "make check".to_string()]);
    }

    #[test]
    fn parse_full_invocation() {
        let cli = Cli::parse_from([
            "git-testall",
            "origin/main..HEAD",
            "-t",
            "cargo test",
            "-n",
            "-k",
            "-f",
            "-c",
            "-w",
            "/tmp/wt",
            "--timeout",
            "600",
        ]);
        assert_eq!(cli.range, "origin/main..HEAD");
        assert!(cli.dry_run && cli.keep_going && cli.force && cli.clean);
        assert_eq!(cli.checkout, Some(PathBuf::from("/tmp/wt")));
        assert_eq!(cli.timeout, Some(600));
    }

    #[test]
    fn rejects_a_second_positional_argument() {
        let err = Cli::try_parse_from(["git-testall", "a..b", "c..d"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::UnknownArgument);
    }
}
