//! Orphan demonstrator: the grandchild sees its parent id change once the
//! orphan parent has exited.

mod common;

use common::*;
use std::time::Duration;

#[test]
fn test_grandchild_reports_reparenting_away_from_exited_parent() {
    let root = scratch_root("orphan");
    let config = quick_config(&root);
    let cfg = write_config(&config);

    let mut parent = proclife(&cfg).arg("orphan").spawn().unwrap();
    let parent_pid = parent.id().to_string();
    assert!(parent.wait().unwrap().success());

    let finished = wait_for(Duration::from_secs(10), || {
        read_log(&root, "orphan.log").contains("finished after 3 checks")
    });
    let log = read_log(&root, "orphan.log");
    assert!(finished, "orphan log never finished:\n{}", log);

    assert_eq!(token_after(&log, "started under parent "), Some(parent_pid.as_str()));
    assert!(read_log(&root, "process.log").contains("forked grandchild"));
    assert!(log.contains("will be orphaned"));

    let transition = log
        .lines()
        .find(|l| l.contains("re-parented: "))
        .unwrap_or_else(|| panic!("no re-parent line:\n{}", log));
    assert!(transition.contains("[ORPHAN] "));
    assert_eq!(token_after(transition, "re-parented: "), Some(parent_pid.as_str()));
    let adopter = token_after(transition, " -> ").unwrap();
    assert_ne!(adopter, parent_pid);
    assert!(adopter.parse::<i32>().unwrap() > 0);

    assert_eq!(token_after(&log, "adopted by "), Some(adopter));

    let _ = proclife::safety::safe_cleanup::remove_tree(&root);
}
