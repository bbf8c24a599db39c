//! Advisory lock guarding the auxiliary worktree.
//!
//! Exactly one run may own a given worktree path at a time. The lock file
//! lives next to the checkout (`<path>.lock`) and is held for the whole run;
//! the OS releases it on process exit by any path, and dropping the guard
//! releases it on normal return.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use tracing::debug;

/// Raised when another run already holds the worktree lock.
#[derive(Debug)]
pub struct LockHeldError {
    pub path: PathBuf,
}

impl fmt::Display for LockHeldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "worktree is locked by another run ({})",
            self.path.display()
        )
    }
}

impl std::error::Error for LockHeldError {}

/// Exclusive lock over an auxiliary worktree path.
#[derive(Debug)]
pub struct WorktreeLock {
    _file: File,
}

impl WorktreeLock {
    /// Non-blocking acquire of `<worktree>.lock`.
    ///
    /// Fails fast with [`LockHeldError`] if another process holds it;
    /// concurrent runs are refused, not queued.
    pub fn acquire(worktree: &Path) -> Result<Self> {
        let lock_path = lock_path_for(worktree);
        if let Some(parent) = lock_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create lock dir {}", parent.display()))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("open lock file {}", lock_path.display()))?;

        if file.try_lock_exclusive().is_err() {
            return Err(LockHeldError { path: lock_path }.into());
        }
        debug!(path = %lock_path.display(), "acquired worktree lock");
        Ok(Self { _file: file })
    }
}

/// The lock file sits adjacent to the checkout it guards.
pub fn lock_path_for(worktree: &Path) -> PathBuf {
    let mut raw = worktree.as_os_str().to_os_string();
    raw.push(".lock");
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_while_held() {
        let temp = tempfile::tempdir().expect("tempdir");
        let worktree = temp.path().join("worktree");

        let lock = WorktreeLock::acquire(&worktree).expect("acquire");
        let err = WorktreeLock::acquire(&worktree).unwrap_err();
        assert!(err.downcast_ref::<LockHeldError>().is_some());

        drop(lock);
        let _relock = WorktreeLock::acquire(&worktree).expect("reacquire after drop");
    }

    #[test]
    fn lock_path_sits_next_to_the_checkout() {
        let path = lock_path_for(Path::new("/repo/.git/testall/worktree"));
        assert_eq!(path, Path::new("/repo/.git/testall/worktree.lock"));
    }
}
