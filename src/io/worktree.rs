//! Auxiliary worktree lifecycle: prepare once per run, checkout per commit.
//!
//! The checkout is private infrastructure, never the user's main working
//! copy, so every mutation here is deliberately destructive to local state
//! in that tree. Under dry-run the manager narrates but performs zero
//! filesystem mutation.

use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, instrument};

use crate::io::git::Git;

pub struct WorkingTree {
    /// Adapter rooted at the main repository, for worktree registration.
    repo: Git,
    /// Adapter rooted at the checkout itself, for in-tree mutations.
    tree: Git,
    path: PathBuf,
    clean: bool,
    dry_run: bool,
}

impl WorkingTree {
    pub fn new(repo: Git, path: PathBuf, clean: bool, dry_run: bool) -> Self {
        let tree = Git::new(&path);
        Self {
            repo,
            tree,
            path,
            clean,
            dry_run,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Idempotent: reset an existing checkout in place, or register a new
    /// detached worktree at the configured path.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn prepare(&self) -> Result<()> {
        if self.dry_run {
            debug!("dry-run: would prepare worktree");
            return Ok(());
        }
        if self.path.join(".git").exists() {
            debug!("resetting existing worktree");
            self.tree.reset_hard()?;
            if self.clean {
                self.tree.clean_fdx()?;
            }
        } else {
            // A registration whose checkout directory was deleted blocks
            // `worktree add`, so prune stale entries first.
            self.repo.worktree_prune()?;
            self.repo.worktree_add_detached(&self.path)?;
        }
        Ok(())
    }

    /// Forced detached checkout of `commit`, discarding tracked-file changes.
    /// Untracked files are purged only when the clean option is set.
    pub fn checkout(&self, commit: &str) -> Result<()> {
        if self.dry_run {
            debug!(commit, "dry-run: would checkout");
            return Ok(());
        }
        self.tree.checkout_detached(commit)?;
        if self.clean {
            self.tree.clean_fdx()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;
    use std::fs;

    fn worktree(repo: &TestRepo, clean: bool, dry_run: bool) -> WorkingTree {
        let path = repo.root().join(".git").join("testall").join("worktree");
        WorkingTree::new(Git::new(repo.root()), path, clean, dry_run)
    }

    #[test]
    fn prepare_registers_a_detached_checkout_once() {
        let repo = TestRepo::new().expect("repo");
        repo.commit_file("a.txt", "1", "first").expect("c1");

        let wt = worktree(&repo, false, false);
        wt.prepare().expect("prepare");
        assert!(wt.path().join("a.txt").exists());

        // Second prepare resets in place instead of re-registering.
        fs::write(wt.path().join("a.txt"), "drifted").expect("write");
        wt.prepare().expect("prepare again");
        let contents = fs::read_to_string(wt.path().join("a.txt")).expect("read");
        assert_eq!(contents, "1");
    }

    #[test]
    fn checkout_switches_the_tree_between_commits() {
        let repo = TestRepo::new().expect("repo");
        let c1 = repo.commit_file("a.txt", "one", "first").expect("c1");
        let c2 = repo.commit_file("a.txt", "two", "second").expect("c2");

        let wt = worktree(&repo, false, false);
        wt.prepare().expect("prepare");

        wt.checkout(&c1).expect("checkout c1");
        assert_eq!(
            fs::read_to_string(wt.path().join("a.txt")).expect("read"),
            "one"
        );
        wt.checkout(&c2).expect("checkout c2");
        assert_eq!(
            fs::read_to_string(wt.path().join("a.txt")).expect("read"),
            "two"
        );
    }

    #[test]
    fn clean_purges_untracked_files_between_checkouts() {
        let repo = TestRepo::new().expect("repo");
        let c1 = repo.commit_file("a.txt", "one", "first").expect("c1");

        let wt = worktree(&repo, true, false);
        wt.prepare().expect("prepare");
        fs::write(wt.path().join("scratch.txt"), "leftover").expect("write");

        wt.checkout(&c1).expect("checkout");
        assert!(!wt.path().join("scratch.txt").exists());
    }

    #[test]
    fn untracked_files_survive_without_the_clean_option() {
        let repo = TestRepo::new().expect("repo");
        let c1 = repo.commit_file("a.txt", "one", "first").expect("c1");

        let wt = worktree(&repo, false, false);
        wt.prepare().expect("prepare");
        fs::write(wt.path().join("scratch.txt"), "leftover").expect("write");

        wt.checkout(&c1).expect("checkout");
        assert!(wt.path().join("scratch.txt").exists());
    }

    #[test]
    fn dry_run_never_touches_the_filesystem() {
        let repo = TestRepo::new().expect("repo");
        let c1 = repo.commit_file("a.txt", "one", "first").expect("c1");

        let wt = worktree(&repo, false, true);
        wt.prepare().expect("prepare");
        wt.checkout(&c1).expect("checkout");
        assert!(!wt.path().exists());
    }
}
