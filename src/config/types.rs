/// Core types and structures for proclife
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Name of the per-category log directory under the run root
pub const LOG_DIR_NAME: &str = "log";
/// Name of the artifact tree under the run root
pub const OUTPUT_DIR_NAME: &str = "output";
/// Originals live here, relative to the output tree
pub const ORIGINAL_DIR_NAME: &str = "original";
/// Ciphered copies live in numbered buckets under here
pub const OBFUSCATED_DIR_NAME: &str = "obfuscated";
/// Buckets are chosen from `0..OBFUSCATED_BUCKETS`
pub const OBFUSCATED_BUCKETS: u32 = 1000;
/// Upper bound on the controller's direct children, and on one spawner batch
pub const MAX_CHILDREN: u64 = 4096;

/// How many of each role the controller forks
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoleCounts {
    /// Orphan demonstrators
    pub orphans: u32,
    /// Zombie demonstrators
    pub zombies: u32,
    /// File workers forked directly by the controller
    pub workers: u32,
    /// Worker spawners (each forks its own batch of file workers)
    pub spawners: u32,
    /// Batch size for each worker spawner
    pub workers_per_spawner: u32,
}

impl Default for RoleCounts {
    fn default() -> Self {
        Self {
            orphans: 1,
            zombies: 1,
            workers: 2,
            spawners: 0,
            workers_per_spawner: 3,
        }
    }
}

impl RoleCounts {
    /// Number of direct children the controller will fork. Widened so any
    /// combination of counts sums without overflow.
    pub fn direct_children(&self) -> u64 {
        [self.orphans, self.zombies, self.workers, self.spawners]
            .iter()
            .map(|&n| u64::from(n))
            .sum()
    }
}

/// Scripted delays, all in milliseconds
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Timings {
    /// Orphan parent lingers this long before exiting
    pub orphan_parent_delay_ms: u64,
    /// Gap between two parent-id checks in the orphaned grandchild
    pub orphan_check_interval_ms: u64,
    /// Number of parent-id checks before the grandchild exits
    pub orphan_checks: u32,
    /// Zombie parent waits this long before inspecting its dead child
    pub zombie_settle_ms: u64,
    /// Zombie parent then holds the zombie open this long
    pub zombie_observation_ms: u64,
    /// Lower bound of the file worker sleep
    pub worker_interval_min_ms: u64,
    /// Upper bound of the file worker sleep
    pub worker_interval_max_ms: u64,
    /// Gap between forks inside a worker spawner
    pub spawner_stagger_ms: u64,
    /// Controller wakes at least this often to check the shutdown flag
    pub controller_poll_ms: u64,
    /// Grace period before unreaped children get SIGKILL
    pub reap_grace_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            orphan_parent_delay_ms: 5_000,
            orphan_check_interval_ms: 6_000,
            orphan_checks: 5,
            zombie_settle_ms: 10_000,
            zombie_observation_ms: 30_000,
            worker_interval_min_ms: 10_000,
            worker_interval_max_ms: 10_000,
            spawner_stagger_ms: 1_000,
            controller_poll_ms: 1_000,
            reap_grace_ms: 5_000,
        }
    }
}

impl Timings {
    pub fn orphan_parent_delay(&self) -> Duration {
        Duration::from_millis(self.orphan_parent_delay_ms)
    }

    pub fn orphan_check_interval(&self) -> Duration {
        Duration::from_millis(self.orphan_check_interval_ms)
    }

    pub fn zombie_settle(&self) -> Duration {
        Duration::from_millis(self.zombie_settle_ms)
    }

    pub fn zombie_observation(&self) -> Duration {
        Duration::from_millis(self.zombie_observation_ms)
    }

    pub fn spawner_stagger(&self) -> Duration {
        Duration::from_millis(self.spawner_stagger_ms)
    }

    pub fn controller_poll(&self) -> Duration {
        Duration::from_millis(self.controller_poll_ms)
    }

    pub fn reap_grace(&self) -> Duration {
        Duration::from_millis(self.reap_grace_ms)
    }

    /// Pick a worker sleep inside the configured range
    pub fn worker_interval(&self) -> Duration {
        let lo = self.worker_interval_min_ms.min(self.worker_interval_max_ms);
        let hi = self.worker_interval_min_ms.max(self.worker_interval_max_ms);
        Duration::from_millis(fastrand::u64(lo..=hi))
    }
}

/// Full run configuration, loadable from JSON
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DemoConfig {
    /// Directory that holds `log/` and `output/`
    pub root: PathBuf,
    pub roles: RoleCounts,
    pub timings: Timings,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            roles: RoleCounts::default(),
            timings: Timings::default(),
        }
    }
}

impl DemoConfig {
    pub fn log_dir(&self) -> PathBuf {
        self.root.join(LOG_DIR_NAME)
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR_NAME)
    }

    pub fn original_dir(&self) -> PathBuf {
        self.output_dir().join(ORIGINAL_DIR_NAME)
    }

    pub fn obfuscated_dir(&self) -> PathBuf {
        self.output_dir().join(OBFUSCATED_DIR_NAME)
    }
}

/// Custom error types for proclife
#[derive(Error, Debug)]
pub enum ProcError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Signal error: {0}")]
    Signal(String),

    #[error("Filesystem error: {0}")]
    Filesystem(String),

    #[error("Cleanup failed for {failed} entries (first: {first})")]
    Cleanup { failed: usize, first: String },
}

impl From<nix::errno::Errno> for ProcError {
    fn from(err: nix::errno::Errno) -> Self {
        ProcError::Process(err.to_string())
    }
}

/// Result type alias for proclife operations
pub type Result<T> = std::result::Result<T, ProcError>;
