//! Result cache: tree id to `SUCCESS`, persisted as git notes on tree objects.
//!
//! Keying by tree rather than commit means a rebase or amend that leaves file
//! contents untouched keeps its cached verdict. The cache stores only success;
//! absence means untested. Failures are never recorded, so an invalidated
//! entry is simply removed and the tree is re-tested on the next run.

use anyhow::Result;
use tracing::debug;

use crate::io::git::Git;

/// Literal note value recorded for a passing tree.
pub const SUCCESS: &str = "SUCCESS";

/// Thin layer over the notes store in [`crate::io::git::NOTES_REF`].
pub struct ResultCache<'a> {
    git: &'a Git,
}

impl<'a> ResultCache<'a> {
    pub fn new(git: &'a Git) -> Self {
        Self { git }
    }

    /// True if `tree` has a recorded success.
    pub fn is_success(&self, tree: &str) -> Result<bool> {
        Ok(self.git.note_read(tree)?.as_deref() == Some(SUCCESS))
    }

    /// Record a success for `tree`, overwriting any stale entry.
    pub fn mark_success(&self, tree: &str) -> Result<()> {
        debug!(tree, "caching success");
        self.git.note_write(tree, SUCCESS)
    }

    /// Drop the entry for `tree`, leaving it untested; no-op if absent.
    pub fn invalidate(&self, tree: &str) -> Result<()> {
        debug!(tree, "invalidating cached success");
        self.git.note_remove(tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::TestRepo;

    #[test]
    fn mark_then_invalidate_round_trips() {
        let repo = TestRepo::new().expect("repo");
        let commit = repo.commit_file("a.txt", "1", "first").expect("c1");
        let git = Git::new(repo.root());
        let tree = git.tree_id(&commit).expect("tree");
        let cache = ResultCache::new(&git);

        assert!(!cache.is_success(&tree).expect("lookup"));
        cache.mark_success(&tree).expect("mark");
        assert!(cache.is_success(&tree).expect("lookup"));

        cache.invalidate(&tree).expect("invalidate");
        assert!(!cache.is_success(&tree).expect("lookup"));
        // Invalidating an absent entry stays a no-op.
        cache.invalidate(&tree).expect("invalidate again");
    }

    #[test]
    fn unexpected_note_values_do_not_count_as_success() {
        let repo = TestRepo::new().expect("repo");
        let commit = repo.commit_file("a.txt", "1", "first").expect("c1");
        let git = Git::new(repo.root());
        let tree = git.tree_id(&commit).expect("tree");

        git.note_write(&tree, "garbage").expect("write");
        let cache = ResultCache::new(&git);
        assert!(!cache.is_success(&tree).expect("lookup"));
    }
}
