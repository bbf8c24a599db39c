//! Side-effecting operations: git subprocesses, the auxiliary worktree, the
//! advisory lock, and shell execution of test commands.

pub mod cache;
pub mod git;
pub mod lock;
pub mod process;
pub mod worktree;
