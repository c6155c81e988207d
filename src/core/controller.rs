//! Controller lifecycle
//!
//! INIT -> RUNNING -> SHUTTING_DOWN -> TERMINATED
//!
//! Each step consumes the previous state. Only `Controller<ShuttingDown>`
//! can broadcast, so the group gets SIGTERM at most once per run.

use crate::config::types::{DemoConfig, ProcError, Result};
use crate::config::validator::validate_config;
use crate::core::types::{
    ChildTable, CleanupOutcome, ControllerState, ReapRecord, ShutdownSummary,
};
use crate::kernel::process::{
    become_group_leader, fork_child, reap_any, signal_group, ReapPoll, ReapedChild,
};
use crate::kernel::signal::{interruptible_sleep, ShutdownFlag, SignalBlockGuard};
use crate::observability::journal::LogCategory;
use crate::roles::{self, Role, RoleContext};
use crate::{journal, journal_warn};
use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use std::marker::PhantomData;
use std::thread;
use std::time::{Duration, Instant};

const TAG: &str = "CONTROLLER";

/// Gap between non-blocking reap attempts inside the grace period
const REAP_POLL: Duration = Duration::from_millis(50);

/// Type-state marker: configured, nothing forked yet
pub struct Init;

/// Type-state marker: roles forked, waiting for a signal
pub struct Running;

/// Type-state marker: signal seen, broadcast not yet sent
pub struct ShuttingDown;

/// Type-state marker: every direct child reaped
pub struct Terminated;

/// Maps a marker to its runtime state value
pub trait Phase {
    const STATE: ControllerState;
}

impl Phase for Init {
    const STATE: ControllerState = ControllerState::Init;
}

impl Phase for Running {
    const STATE: ControllerState = ControllerState::Running;
}

impl Phase for ShuttingDown {
    const STATE: ControllerState = ControllerState::ShuttingDown;
}

impl Phase for Terminated {
    const STATE: ControllerState = ControllerState::Terminated;
}

pub struct Controller<S> {
    config: DemoConfig,
    ctx: RoleContext,
    flag: ShutdownFlag,
    pgid: Pid,
    children: ChildTable,
    reaped: Vec<ReapRecord>,
    killed: Vec<Pid>,
    _state: PhantomData<S>,
}

impl<S: Phase> Controller<S> {
    pub fn state(&self) -> ControllerState {
        S::STATE
    }

    fn advance<T: Phase>(self) -> Controller<T> {
        log::info!("controller: {} -> {}", S::STATE, T::STATE);
        Controller {
            config: self.config,
            ctx: self.ctx,
            flag: self.flag,
            pgid: self.pgid,
            children: self.children,
            reaped: self.reaped,
            killed: self.killed,
            _state: PhantomData,
        }
    }
}

impl Controller<Init> {
    /// Validate the config, create the layout, take group leadership and
    /// install the shutdown handlers.
    pub fn new(config: DemoConfig) -> Result<Self> {
        validate_config(&config)?;

        let ctx = RoleContext::from_config(&config);
        ctx.layout.ensure()?;
        let pgid = become_group_leader()?;
        let flag = ShutdownFlag::install()?;

        journal!(
            ctx.journal,
            LogCategory::Process,
            TAG,
            "controller started; group {}; {} direct children planned",
            pgid,
            config.roles.direct_children()
        );

        Ok(Self {
            config,
            ctx,
            flag,
            pgid,
            children: ChildTable::new(),
            reaped: Vec::new(),
            killed: Vec::new(),
            _state: PhantomData,
        })
    }

    /// Fork order: orphans, zombies, spawners, workers
    fn spawn_plan(&self) -> Vec<Role> {
        let roles = &self.config.roles;
        let mut plan = Vec::with_capacity(roles.direct_children() as usize);
        plan.extend(std::iter::repeat(Role::Orphan).take(roles.orphans as usize));
        plan.extend(std::iter::repeat(Role::Zombie).take(roles.zombies as usize));
        plan.extend(std::iter::repeat(Role::Spawner).take(roles.spawners as usize));
        plan.extend(std::iter::repeat(Role::Worker).take(roles.workers as usize));
        plan
    }

    /// Fork every configured role. A failed fork tears down what was
    /// already started and surfaces the error.
    pub fn spawn_roles(self) -> Result<Controller<Running>> {
        self.spawn_roles_with(fork_role)
    }

    /// Like `spawn_roles`, with `start` creating each child. The returned
    /// pid must be a direct child of this process.
    pub fn spawn_roles_with<F>(mut self, mut start: F) -> Result<Controller<Running>>
    where
        F: FnMut(Role, &RoleContext) -> Result<Pid>,
    {
        for role in self.spawn_plan() {
            match start(role, &self.ctx) {
                Ok(pid) => {
                    self.children.insert(pid, role);
                    journal!(self.ctx.journal, LogCategory::Process, TAG, "forked {} {}", role, pid);
                }
                Err(e) => {
                    journal_warn!(self.ctx.journal, LogCategory::Process, TAG, "cannot fork {}: {}", role, e);
                    let shutting_down: Controller<ShuttingDown> = self.advance();
                    if let Err(reap_err) = shutting_down.broadcast_and_reap() {
                        log::error!("controller: reaping after fork failure: {}", reap_err);
                    }
                    return Err(e);
                }
            }
        }
        Ok(self.advance())
    }
}

impl Controller<Running> {
    /// Sleep in poll-sized slices until the shutdown flag is raised
    pub fn wait_for_shutdown(self) -> Controller<ShuttingDown> {
        let poll = self.config.timings.controller_poll();
        while !self.flag.is_raised() {
            interruptible_sleep(poll);
        }

        let signal = self
            .flag
            .signal()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown signal".to_string());
        journal!(self.ctx.journal, LogCategory::Process, TAG, "shutdown requested by {}", signal);
        self.advance()
    }
}

impl Controller<ShuttingDown> {
    /// SIGTERM the whole group once, then reap until no children remain.
    /// Direct children still alive after the grace period get SIGKILL.
    pub fn broadcast_and_reap(mut self) -> Result<Controller<Terminated>> {
        match signal_group(self.pgid, Signal::SIGTERM) {
            Ok(()) => journal!(self.ctx.journal, LogCategory::Process, TAG, "broadcast SIGTERM to group {}", self.pgid),
            Err(e) => journal_warn!(self.ctx.journal, LogCategory::Process, TAG, "group broadcast failed: {}", e),
        }

        let deadline = Instant::now() + self.config.timings.reap_grace();
        loop {
            match reap_any(false)? {
                ReapPoll::Reaped(child) => self.record_reaped(child),
                ReapPoll::NoChildren => break,
                ReapPoll::StillRunning if Instant::now() >= deadline => {
                    self.kill_outstanding();
                    self.reap_blocking()?;
                    break;
                }
                ReapPoll::StillRunning => thread::sleep(REAP_POLL),
            }
        }

        journal!(
            self.ctx.journal,
            LogCategory::Process,
            TAG,
            "reaped {} children; none left",
            self.reaped.len()
        );
        Ok(self.advance())
    }

    fn record_reaped(&mut self, child: ReapedChild) {
        let record = ReapRecord {
            role: self.children.mark_reaped(child.pid),
            child,
        };
        journal!(self.ctx.journal, LogCategory::Process, TAG, "reaped {}", record);
        self.reaped.push(record);
    }

    fn kill_outstanding(&mut self) {
        let stragglers: Vec<_> = self.children.outstanding().to_vec();
        for record in stragglers {
            match kill(record.pid, Signal::SIGKILL) {
                Ok(()) => {}
                Err(Errno::ESRCH) => continue,
                Err(e) => {
                    journal_warn!(self.ctx.journal, LogCategory::Process, TAG, "SIGKILL {} failed: {}", record.pid, e);
                    continue;
                }
            }
            journal_warn!(
                self.ctx.journal,
                LogCategory::Process,
                TAG,
                "{} {} outlived the grace period; sent SIGKILL",
                record.role,
                record.pid
            );
            self.killed.push(record.pid);
        }
    }

    fn reap_blocking(&mut self) -> Result<()> {
        loop {
            match reap_any(true)? {
                ReapPoll::Reaped(child) => self.record_reaped(child),
                ReapPoll::NoChildren => return Ok(()),
                ReapPoll::StillRunning => {
                    return Err(ProcError::Process(
                        "blocking wait reported a running child".to_string(),
                    ))
                }
            }
        }
    }
}

impl Controller<Terminated> {
    /// Remove the output tree and summarize the run. Cleanup problems are
    /// reported in the summary, never as an error.
    pub fn teardown(self) -> ShutdownSummary {
        let cleanup = match self.ctx.layout.teardown_output() {
            Ok(report) => {
                journal!(
                    self.ctx.journal,
                    LogCategory::Process,
                    TAG,
                    "removed {} ({} entries)",
                    self.ctx.layout.output_dir().display(),
                    report.removed
                );
                CleanupOutcome::Clean {
                    removed: report.removed,
                }
            }
            Err(e) => {
                journal_warn!(self.ctx.journal, LogCategory::Process, TAG, "cleanup incomplete: {}", e);
                CleanupOutcome::from_error(e)
            }
        };

        journal!(self.ctx.journal, LogCategory::Process, TAG, "controller terminated");
        ShutdownSummary {
            signal: self.flag.signal(),
            reaped: self.reaped,
            killed: self.killed,
            cleanup,
        }
    }
}

/// Fork `role` with shutdown signals blocked across the fork, so the child
/// resets its dispositions before it can observe one.
fn fork_role(role: Role, ctx: &RoleContext) -> Result<Pid> {
    let _blocked = SignalBlockGuard::block()?;
    let ctx = ctx.clone();
    fork_child(&role.to_string(), move || roles::enter_forked_role(role, &ctx))
}

/// Full lifecycle: fork roles, wait for SIGINT/SIGTERM, broadcast, reap,
/// clean up.
pub fn run(config: DemoConfig) -> Result<ShutdownSummary> {
    let running = Controller::new(config)?.spawn_roles()?;
    let terminated = running.wait_for_shutdown().broadcast_and_reap()?;
    Ok(terminated.teardown())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::RoleCounts;
    use std::path::PathBuf;

    #[test]
    fn invalid_config_fails_before_touching_disk() {
        let root = std::env::temp_dir().join(format!("proclife_ctl_invalid_{}", std::process::id()));
        let mut config = DemoConfig {
            root: root.clone(),
            ..DemoConfig::default()
        };
        config.timings.controller_poll_ms = 0;

        let err = Controller::new(config).err().unwrap();
        assert!(matches!(err, ProcError::Config(_)));
        assert!(!root.exists());
    }

    #[test]
    fn phase_constants_follow_markers() {
        assert_eq!(<Init as Phase>::STATE, ControllerState::Init);
        assert_eq!(<Running as Phase>::STATE, ControllerState::Running);
        assert_eq!(<ShuttingDown as Phase>::STATE, ControllerState::ShuttingDown);
        assert_eq!(<Terminated as Phase>::STATE, ControllerState::Terminated);
    }

    #[test]
    fn spawn_plan_orders_roles() {
        let config = DemoConfig {
            root: PathBuf::from("/nonexistent"),
            roles: RoleCounts {
                orphans: 1,
                zombies: 1,
                workers: 2,
                spawners: 1,
                workers_per_spawner: 2,
            },
            ..DemoConfig::default()
        };
        let controller = Controller::<Init> {
            ctx: RoleContext::from_config(&config),
            config,
            flag: ShutdownFlag,
            pgid: Pid::from_raw(1),
            children: ChildTable::new(),
            reaped: Vec::new(),
            killed: Vec::new(),
            _state: PhantomData,
        };
        assert_eq!(
            controller.spawn_plan(),
            vec![Role::Orphan, Role::Zombie, Role::Spawner, Role::Worker, Role::Worker]
        );
        assert_eq!(controller.state(), ControllerState::Init);
    }
}
