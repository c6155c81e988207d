//! Orphan demonstrator: the parent leaves before its child finishes.

use super::RoleContext;
use crate::config::types::{Result, Timings};
use crate::kernel::process::fork_child;
use crate::observability::journal::{Journal, LogCategory};
use crate::{journal, journal_warn};
use nix::unistd::getppid;
use std::thread;

const PARENT_TAG: &str = "ORPHAN-PARENT";
const GRANDCHILD_TAG: &str = "GRANDCHILD";
const ORPHAN_TAG: &str = "ORPHAN";

/// Fork a grandchild, linger briefly, then exit without waiting for it.
/// The grandchild notices its parent id change and reports the adoption.
pub fn run_orphan_demonstrator(ctx: &RoleContext) -> Result<()> {
    let journal = &ctx.journal;
    journal!(journal, LogCategory::Orphan, PARENT_TAG, "creating grandchild process");

    let child_journal = ctx.journal.clone();
    let timings = ctx.timings.clone();
    let grandchild = match fork_child("orphan", move || watch_for_adoption(&child_journal, &timings)) {
        Ok(pid) => pid,
        Err(e) => {
            journal_warn!(journal, LogCategory::Orphan, PARENT_TAG, "fork failed: {}", e);
            return Err(e);
        }
    };
    journal!(journal, LogCategory::Process, PARENT_TAG, "forked grandchild {}", grandchild);

    thread::sleep(ctx.timings.orphan_parent_delay());
    journal!(
        journal,
        LogCategory::Orphan,
        PARENT_TAG,
        "exiting now; grandchild {} will be orphaned",
        grandchild
    );
    Ok(())
}

/// Grandchild body: poll the parent id a fixed number of times
fn watch_for_adoption(journal: &Journal, timings: &Timings) -> i32 {
    let original = getppid();
    journal!(journal, LogCategory::Orphan, GRANDCHILD_TAG, "started under parent {}", original);

    let mut last = original;
    for check in 1..=timings.orphan_checks {
        thread::sleep(timings.orphan_check_interval());
        let current = getppid();
        if current != last {
            journal!(journal, LogCategory::Orphan, ORPHAN_TAG, "re-parented: {} -> {}", last, current);
            last = current;
        } else if current == original {
            journal!(
                journal,
                LogCategory::Orphan,
                GRANDCHILD_TAG,
                "check {}: parent {} still here",
                check,
                current
            );
        }
    }

    journal!(
        journal,
        LogCategory::Orphan,
        ORPHAN_TAG,
        "finished after {} checks; adopted by {}",
        timings.orphan_checks,
        last
    );
    0
}
