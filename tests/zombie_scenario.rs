//! Zombie demonstrator: the dead child stays in state Z while its parent
//! lives, and only its new reaper can collect it.
//!
//! The test process makes itself a child subreaper so the zombie is handed
//! to it, which keeps the final reap deterministic. It is the only test in
//! this binary because the subreaper bit is process-wide.

mod common;

use common::*;
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;
use proclife::kernel::process::{read_stat, ProcState};
use std::time::Duration;

#[test]
fn test_zombie_persists_until_adopted_and_reaped() {
    become_subreaper();

    let root = scratch_root("zombie");
    let config = quick_config(&root);
    let cfg = write_config(&config);

    let mut parent = proclife(&cfg).arg("zombie").spawn().unwrap();
    let parent_pid = Pid::from_raw(parent.id() as i32);

    let observed = wait_for(Duration::from_secs(5), || {
        read_log(&root, "zombie.log").contains("zombie child ")
    });
    let log = read_log(&root, "zombie.log");
    assert!(observed, "zombie never reported:\n{}", log);

    let zombie: i32 = token_after(&log, "zombie child ").unwrap().parse().unwrap();
    let zombie = Pid::from_raw(zombie);
    assert!(log.contains(&format!("zombie child {} state=Z", zombie)), "{}", log);

    // Parent still in its observation window.
    assert!(parent.try_wait().unwrap().is_none());
    let stat = read_stat(zombie).unwrap().expect("zombie left the process table early");
    assert_eq!(stat.state, ProcState::Zombie);
    assert_eq!(stat.ppid, parent_pid);
    assert_eq!(
        waitpid(zombie, Some(WaitPidFlag::WNOHANG)),
        Err(Errno::ECHILD),
        "only the parent may reap its child"
    );

    assert!(parent.wait().unwrap().success());
    assert!(read_log(&root, "zombie.log").contains("passes to the next reaper"));

    // The parent is gone, so the zombie now belongs to us.
    let mut reaped = None;
    wait_for(Duration::from_secs(5), || match waitpid(zombie, Some(WaitPidFlag::WNOHANG)) {
        Ok(WaitStatus::Exited(pid, code)) => {
            reaped = Some((pid, code));
            true
        }
        _ => false,
    });
    assert_eq!(reaped, Some((zombie, 0)));

    let _ = proclife::safety::safe_cleanup::remove_tree(&root);
}
