//! Test every commit in a range of git history, not just the tip.
//!
//! `git-testall` walks a linear commit range oldest-first, checks each commit
//! out into a private auxiliary worktree, runs a configured command sequence
//! against it, and memoizes successes as git notes keyed by tree id so
//! commits with unchanged content are never re-tested. The architecture
//! keeps a strict separation:
//!
//! - **[`run`]**: the sequential state machine deciding what gets tested and
//!   how the verdict aggregates.
//! - **[`io`]**: side-effecting operations (git subprocesses, the worktree,
//!   the lock, shell execution). Isolated behind small types and the
//!   `TestRunner` trait to enable scripted fakes in tests.

pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod report;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
