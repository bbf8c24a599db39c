//! Stable exit codes for scripting around `git-testall`.

/// Every commit in the range ended `ok` or `ok (cached)`.
pub const OK: i32 = 0;
/// At least one commit ended `not ok`.
pub const FAILED: i32 = 1;
/// Pre-flight or infrastructure error: bad range, no test commands, git failure.
pub const INVALID: i32 = 2;
/// Another run already holds the worktree lock.
pub const LOCKED: i32 = 3;
