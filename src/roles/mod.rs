//! Child roles forked by the controller.
//!
//! Each role runs in its own process with default SIGINT/SIGTERM
//! dispositions, so the controller's group-wide SIGTERM ends it directly.
//! None of them checks a cooperative stop flag.

pub mod orphan;
pub mod spawner;
pub mod worker;
pub mod zombie;

use crate::config::types::{DemoConfig, Result, Timings};
use crate::journal_warn;
use crate::kernel::signal;
use crate::observability::journal::{Journal, LogCategory};
use crate::safety::layout::RunLayout;
use std::fmt;

/// What a forked child does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Orphan,
    Zombie,
    Worker,
    Spawner,
}

impl Role {
    /// Journal tag used by the role's top-level process
    pub fn tag(self) -> &'static str {
        match self {
            Self::Orphan => "ORPHAN-PARENT",
            Self::Zombie => "ZOMBIE-PARENT",
            Self::Worker => "WORKER",
            Self::Spawner => "WORKER-SPAWNER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Orphan => "orphan",
            Self::Zombie => "zombie",
            Self::Worker => "worker",
            Self::Spawner => "spawner",
        };
        f.write_str(name)
    }
}

/// Everything a role needs, cloned into each child at fork
#[derive(Debug, Clone)]
pub struct RoleContext {
    pub layout: RunLayout,
    pub journal: Journal,
    pub timings: Timings,
    pub workers_per_spawner: u32,
}

impl RoleContext {
    pub fn from_config(config: &DemoConfig) -> Self {
        let layout = RunLayout::from_config(config);
        let journal = Journal::new(layout.log_dir());
        Self {
            layout,
            journal,
            timings: config.timings.clone(),
            workers_per_spawner: config.roles.workers_per_spawner,
        }
    }
}

/// Run `role` in the calling process until it finishes.
/// Workers and spawners only return on error.
pub fn run_role(role: Role, ctx: &RoleContext) -> Result<()> {
    match role {
        Role::Orphan => orphan::run_orphan_demonstrator(ctx),
        Role::Zombie => zombie::run_zombie_demonstrator(ctx),
        Role::Worker => worker::run_file_worker(ctx, None),
        Role::Spawner => spawner::run_worker_spawner(ctx),
    }
}

/// Entry point of a freshly forked role child; returns its exit code
pub fn enter_forked_role(role: Role, ctx: &RoleContext) -> i32 {
    if let Err(e) = signal::reset_to_default() {
        journal_warn!(ctx.journal, LogCategory::Process, role.tag(), "cannot reset signal dispositions: {}", e);
        return 1;
    }
    exit_code(role.tag(), ctx, run_role(role, ctx))
}

pub(crate) fn exit_code(tag: &str, ctx: &RoleContext, outcome: Result<()>) -> i32 {
    match outcome {
        Ok(()) => 0,
        Err(e) => {
            journal_warn!(ctx.journal, LogCategory::Process, tag, "aborting: {}", e);
            1
        }
    }
}
