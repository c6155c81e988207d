//! Process identity, fork, group signalling and reaping.

use crate::config::types::{ProcError, Result};
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{fork, getpgrp, getpid, getppid, setpgid, ForkResult, Pid};
use std::fs;

fn to_process_error(prefix: &str, err: impl std::fmt::Display) -> ProcError {
    ProcError::Process(format!("{prefix}: {err}"))
}

/// Who the calling process is, as written into every journal line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessIdentity {
    pub pid: Pid,
    pub ppid: Pid,
    pub pgid: Pid,
}

impl ProcessIdentity {
    pub fn current() -> Self {
        Self {
            pid: getpid(),
            ppid: getppid(),
            pgid: getpgrp(),
        }
    }
}

/// Fork and run `child` in the new process, exiting with its return code.
/// The parent gets the child's pid back.
pub fn fork_child<F>(label: &str, child: F) -> Result<Pid>
where
    F: FnOnce() -> i32,
{
    // SAFETY: the binary is single-threaded; the child only runs role code
    // and leaves through process::exit.
    match unsafe { fork() }.map_err(|e| to_process_error(&format!("fork({label})"), e))? {
        ForkResult::Child => {
            let code = child();
            std::process::exit(code);
        }
        ForkResult::Parent { child } => Ok(child),
    }
}

/// Make the caller a process-group leader unless it already is one.
/// Returns the group id in effect afterwards.
pub fn become_group_leader() -> Result<Pid> {
    let pid = getpid();
    if getpgrp() == pid {
        return Ok(pid);
    }
    setpgid(Pid::from_raw(0), Pid::from_raw(0)).map_err(|e| to_process_error("setpgid", e))?;
    Ok(getpgrp())
}

/// Send `sig` to every member of process group `pgid`, caller included
/// when it belongs to that group
pub fn signal_group(pgid: Pid, sig: Signal) -> Result<()> {
    signal::killpg(pgid, sig).map_err(|e| to_process_error(&format!("killpg({pgid})"), e))
}

/// How a reaped child ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Exited(i32),
    Signaled(Signal),
}

impl std::fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(code) => write!(f, "exited({})", code),
            Self::Signaled(sig) => write!(f, "killed by {}", sig),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReapedChild {
    pub pid: Pid,
    pub outcome: ExitOutcome,
}

/// Result of one wait-any attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReapPoll {
    Reaped(ReapedChild),
    /// Children exist but none has terminated (non-blocking mode only)
    StillRunning,
    /// ECHILD: nothing left to wait for
    NoChildren,
}

/// Wait for any child. With `block == false` this never sleeps.
pub fn reap_any(block: bool) -> Result<ReapPoll> {
    let flags = if block { None } else { Some(WaitPidFlag::WNOHANG) };
    loop {
        match waitpid(Pid::from_raw(-1), flags) {
            Ok(WaitStatus::StillAlive) => return Ok(ReapPoll::StillRunning),
            Ok(WaitStatus::Exited(pid, code)) => {
                return Ok(ReapPoll::Reaped(ReapedChild {
                    pid,
                    outcome: ExitOutcome::Exited(code),
                }))
            }
            Ok(WaitStatus::Signaled(pid, sig, _)) => {
                return Ok(ReapPoll::Reaped(ReapedChild {
                    pid,
                    outcome: ExitOutcome::Signaled(sig),
                }))
            }
            // Stop/continue notifications are not terminations.
            Ok(_) => continue,
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(ReapPoll::NoChildren),
            Err(e) => return Err(to_process_error("waitpid(-1)", e)),
        }
    }
}

/// Scheduler state letter from `/proc/<pid>/stat`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Running,
    Sleeping,
    DiskSleep,
    Stopped,
    Zombie,
    Dead,
    Other(char),
}

impl ProcState {
    fn from_letter(letter: char) -> Self {
        match letter {
            'R' => Self::Running,
            'S' => Self::Sleeping,
            'D' => Self::DiskSleep,
            'T' | 't' => Self::Stopped,
            'Z' => Self::Zombie,
            'X' | 'x' => Self::Dead,
            other => Self::Other(other),
        }
    }

    pub fn letter(self) -> char {
        match self {
            Self::Running => 'R',
            Self::Sleeping => 'S',
            Self::DiskSleep => 'D',
            Self::Stopped => 'T',
            Self::Zombie => 'Z',
            Self::Dead => 'X',
            Self::Other(c) => c,
        }
    }
}

/// The subset of `/proc/<pid>/stat` this crate cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatSnapshot {
    pub state: ProcState,
    pub ppid: Pid,
    pub pgrp: Pid,
}

/// Parse a stat line. The command name may contain spaces and parentheses,
/// so fields are read after the last `)`.
pub fn parse_stat(line: &str) -> Option<StatSnapshot> {
    let rest = &line[line.rfind(')')? + 1..];
    let mut fields = rest.split_whitespace();
    let state = fields.next()?.chars().next()?;
    let ppid: i32 = fields.next()?.parse().ok()?;
    let pgrp: i32 = fields.next()?.parse().ok()?;
    Some(StatSnapshot {
        state: ProcState::from_letter(state),
        ppid: Pid::from_raw(ppid),
        pgrp: Pid::from_raw(pgrp),
    })
}

/// Snapshot of another process, `None` once it is gone from the table
pub fn read_stat(pid: Pid) -> Result<Option<StatSnapshot>> {
    let path = format!("/proc/{}/stat", pid);
    let line = match fs::read_to_string(&path) {
        Ok(line) => line,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(to_process_error(&format!("read {}", path), e)),
    };
    parse_stat(&line)
        .map(Some)
        .ok_or_else(|| ProcError::Process(format!("unparseable {}: {:?}", path, line)))
}
