//! Zombie demonstrator: the child dies at once and is never waited for.

use super::RoleContext;
use crate::config::types::Result;
use crate::kernel::process::{fork_child, read_stat};
use crate::observability::journal::LogCategory;
use crate::{journal, journal_warn};
use std::thread;

const PARENT_TAG: &str = "ZOMBIE-PARENT";
const CHILD_TAG: &str = "ZOMBIE-TO-BE";

/// Fork a child that exits immediately, then hold it unreaped for the
/// observation window. Whoever adopts it after we exit does the reaping.
pub fn run_zombie_demonstrator(ctx: &RoleContext) -> Result<()> {
    let journal = &ctx.journal;
    journal!(journal, LogCategory::Zombie, PARENT_TAG, "creating child that will become a zombie");

    let child_journal = ctx.journal.clone();
    let child = match fork_child("zombie", move || {
        journal!(child_journal, LogCategory::Zombie, CHILD_TAG, "exiting immediately");
        0
    }) {
        Ok(pid) => pid,
        Err(e) => {
            journal_warn!(journal, LogCategory::Zombie, PARENT_TAG, "fork failed: {}", e);
            return Err(e);
        }
    };
    journal!(journal, LogCategory::Process, PARENT_TAG, "forked child {}", child);

    thread::sleep(ctx.timings.zombie_settle());
    match read_stat(child) {
        Ok(Some(stat)) => journal!(
            journal,
            LogCategory::Zombie,
            PARENT_TAG,
            "zombie child {} state={}; not calling wait",
            child,
            stat.state.letter()
        ),
        Ok(None) => journal_warn!(
            journal,
            LogCategory::Zombie,
            PARENT_TAG,
            "child {} already left the process table",
            child
        ),
        Err(e) => journal_warn!(journal, LogCategory::Zombie, PARENT_TAG, "cannot inspect child {}: {}", child, e),
    }

    thread::sleep(ctx.timings.zombie_observation());
    journal!(
        journal,
        LogCategory::Zombie,
        PARENT_TAG,
        "exiting; zombie {} passes to the next reaper",
        child
    );
    Ok(())
}
