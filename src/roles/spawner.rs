//! Worker spawner: a middle process that forks a batch of file workers and
//! then parks. It is in the controller's group, so the broadcast ends it
//! together with its workers.

use super::{exit_code, worker, RoleContext};
use crate::config::types::Result;
use crate::kernel::process::fork_child;
use crate::observability::journal::LogCategory;
use crate::{journal, journal_warn};
use nix::unistd::getpid;
use std::thread;
use std::time::Duration;

const TAG: &str = "WORKER-SPAWNER";
const PARK_INTERVAL: Duration = Duration::from_secs(60);

/// Fork `workers_per_spawner` workers, staggered, then sleep until killed.
/// Returns only if a fork fails.
pub fn run_worker_spawner(ctx: &RoleContext) -> Result<()> {
    journal!(
        ctx.journal,
        LogCategory::Process,
        TAG,
        "spawner {} forking {} workers",
        getpid(),
        ctx.workers_per_spawner
    );

    for index in 0..ctx.workers_per_spawner {
        if index > 0 {
            thread::sleep(ctx.timings.spawner_stagger());
        }

        let worker_ctx = ctx.clone();
        let forked = fork_child("worker", move || {
            let outcome = worker::run_file_worker(&worker_ctx, None);
            exit_code(worker::TAG, &worker_ctx, outcome)
        });
        match forked {
            Ok(pid) => journal!(ctx.journal, LogCategory::Process, TAG, "forked worker {}", pid),
            Err(e) => {
                journal_warn!(ctx.journal, LogCategory::Process, TAG, "fork of worker {} failed: {}", index + 1, e);
                return Err(e);
            }
        }
    }

    // Workers are never waited for here; the controller's teardown kills the
    // whole group and init collects whatever outlives us.
    loop {
        thread::sleep(PARK_INTERVAL);
    }
}
