use crate::config::types::ProcError;
use crate::kernel::process::ReapedChild;
use crate::roles::Role;
use nix::sys::signal::Signal;
use nix::unistd::Pid;
use std::fmt;

/// Runtime mirror of the controller's type-state, for logs and summaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Init,
    Running,
    ShuttingDown,
    Terminated,
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Init => "INIT",
            Self::Running => "RUNNING",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Terminated => "TERMINATED",
        };
        f.write_str(name)
    }
}

/// A direct child the controller forked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildRecord {
    pub pid: Pid,
    pub role: Role,
}

/// Diagnostic table of direct children. Reaping never consults it to
/// decide whom to wait for; it only names what wait-any returned.
#[derive(Debug, Default, Clone)]
pub struct ChildTable {
    outstanding: Vec<ChildRecord>,
}

impl ChildTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, pid: Pid, role: Role) {
        self.outstanding.push(ChildRecord { pid, role });
    }

    /// Drop `pid` from the table, returning its role if it was ours
    pub fn mark_reaped(&mut self, pid: Pid) -> Option<Role> {
        let index = self.outstanding.iter().position(|r| r.pid == pid)?;
        Some(self.outstanding.swap_remove(index).role)
    }

    /// Children forked but not yet reaped
    pub fn outstanding(&self) -> &[ChildRecord] {
        &self.outstanding
    }
}

/// One wait-any result, labelled when the pid was in the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapRecord {
    pub child: ReapedChild,
    pub role: Option<Role>,
}

impl fmt::Display for ReapRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.role {
            Some(role) => write!(f, "{} {} {}", role, self.child.pid, self.child.outcome),
            None => write!(f, "untracked {} {}", self.child.pid, self.child.outcome),
        }
    }
}

/// How the final output teardown went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupOutcome {
    Clean { removed: usize },
    Failed { failed: usize, first: String },
}

impl CleanupOutcome {
    pub fn from_error(err: ProcError) -> Self {
        match err {
            ProcError::Cleanup { failed, first } => Self::Failed { failed, first },
            other => Self::Failed {
                failed: 1,
                first: other.to_string(),
            },
        }
    }

    pub fn is_clean(&self) -> bool {
        matches!(self, Self::Clean { .. })
    }
}

/// What a full controller run did
#[derive(Debug, Clone)]
pub struct ShutdownSummary {
    /// Signal that started the shutdown; `None` after a fork failure
    pub signal: Option<Signal>,
    pub reaped: Vec<ReapRecord>,
    /// Direct children that outlived the grace period and got SIGKILL
    pub killed: Vec<Pid>,
    pub cleanup: CleanupOutcome,
}
