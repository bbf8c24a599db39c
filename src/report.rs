//! Operator-facing status output.
//!
//! Product output goes to stdout, independent of `RUST_LOG` tracing: the
//! commit plan before anything is mutated, one colored status line per
//! commit, and a final aggregate verdict.

use console::style;

use crate::run::{CommitStatus, PlanEntry, RunVerdict};

pub struct Reporter;

impl Reporter {
    pub fn new() -> Self {
        Self
    }

    /// Display the ordered commit list before any mutation. Preview only,
    /// never a confirmation gate.
    pub fn plan(&self, range: &str, entries: &[PlanEntry]) {
        println!(
            "testing {} commit(s) in {}",
            entries.len(),
            style(range).cyan()
        );
        for entry in entries {
            let cached = if entry.cached { " (cached)" } else { "" };
            println!(
                "  {} {}{}",
                style(&entry.short).yellow(),
                entry.subject,
                style(cached).dim()
            );
        }
    }

    pub fn status(&self, entry: &PlanEntry, status: CommitStatus) {
        let label = match status {
            CommitStatus::Ok => style("ok").green().to_string(),
            CommitStatus::OkCached => style("ok (cached)").green().to_string(),
            CommitStatus::NotOk => style("not ok").red().bold().to_string(),
            CommitStatus::Skipped => style("skipped").dim().to_string(),
        };
        println!("{} {}: {}", style(&entry.short).yellow(), entry.subject, label);
    }

    pub fn summary(&self, verdict: &RunVerdict) {
        let total = verdict.statuses.len();
        if verdict.success {
            println!("{}", style(format!("all {total} commit(s) ok")).green());
        } else {
            let failed = verdict
                .statuses
                .iter()
                .filter(|status| **status == CommitStatus::NotOk)
                .count();
            println!(
                "{}",
                style(format!("{failed} of {total} commit(s) not ok"))
                    .red()
                    .bold()
            );
        }
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::new()
    }
}
