//! Shared helpers for the scenario tests. Each scenario runs the real binary
//! so forks happen in a single-threaded process, never in the test harness.

#![allow(dead_code)]

use proclife::safety::safe_cleanup;
use proclife::DemoConfig;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Fresh, empty directory unique to this test process
pub fn scratch_root(name: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("proclife_it_{}_{}", name, std::process::id()));
    let _ = safe_cleanup::remove_tree(&root);
    fs::create_dir_all(&root).unwrap();
    root
}

/// Config with every delay shrunk to test scale and no roles enabled
pub fn quick_config(root: &Path) -> DemoConfig {
    let mut config = DemoConfig {
        root: root.to_path_buf(),
        ..DemoConfig::default()
    };
    config.roles.orphans = 0;
    config.roles.zombies = 0;
    config.roles.workers = 0;
    config.roles.spawners = 0;

    let t = &mut config.timings;
    t.orphan_parent_delay_ms = 100;
    t.orphan_check_interval_ms = 400;
    t.orphan_checks = 3;
    t.zombie_settle_ms = 200;
    t.zombie_observation_ms = 1_500;
    t.worker_interval_min_ms = 20;
    t.worker_interval_max_ms = 60;
    t.spawner_stagger_ms = 20;
    t.controller_poll_ms = 100;
    t.reap_grace_ms = 2_000;
    config
}

/// Serialize `config` next to its root and return the file path
pub fn write_config(config: &DemoConfig) -> PathBuf {
    let path = config.root.join("proclife.json");
    fs::write(&path, serde_json::to_string_pretty(config).unwrap()).unwrap();
    path
}

pub fn proclife(config_path: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_proclife"));
    cmd.arg("--config")
        .arg(config_path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

/// Poll `check` until it holds or `timeout` passes
pub fn wait_for(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(25));
    }
}

pub fn read_log(root: &Path, file: &str) -> String {
    fs::read_to_string(root.join("log").join(file)).unwrap_or_default()
}

/// First whitespace-delimited token after `marker` in `text`
pub fn token_after<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    let start = text.find(marker)? + marker.len();
    text[start..].split_whitespace().next()
}

pub fn count_files(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };
    entries
        .flatten()
        .map(|e| {
            let path = e.path();
            if path.is_dir() {
                count_files(&path)
            } else {
                1
            }
        })
        .sum()
}

/// Become a child subreaper so re-parented descendants land on us
pub fn become_subreaper() {
    let rc = unsafe { libc::prctl(libc::PR_SET_CHILD_SUBREAPER, 1, 0, 0, 0) };
    assert_eq!(rc, 0, "prctl(PR_SET_CHILD_SUBREAPER) failed");
}
