//! File worker: create an artifact, copy it into a random bucket, cipher the
//! copy, sleep, repeat.

use super::RoleContext;
use crate::config::types::{Result, OBFUSCATED_BUCKETS};
use crate::observability::journal::LogCategory;
use crate::utils::obfuscate::xor_cipher_file;
use crate::{journal, journal_warn};
use chrono::Local;
use nix::unistd::{getpid, Pid};
use std::fs;
use std::path::PathBuf;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

pub(crate) const TAG: &str = "WORKER";

/// Timestamp part of artifact names; no colons so the names stay portable
pub const ARTIFACT_TIME_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// `<timestamp>_process_<pid>.txt`
pub fn artifact_name(timestamp: &str, pid: Pid) -> String {
    format!("{}_process_{}.txt", timestamp, pid)
}

/// What one iteration managed to produce
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IterationOutcome {
    pub original: Option<PathBuf>,
    pub obfuscated: Option<PathBuf>,
    /// Bytes run through the cipher, set only when the copy was ciphered
    pub ciphered_bytes: Option<u64>,
}

impl IterationOutcome {
    pub fn is_complete(&self) -> bool {
        self.original.is_some() && self.obfuscated.is_some() && self.ciphered_bytes.is_some()
    }
}

/// One create -> copy -> cipher pass. Failures are journaled and cut the
/// iteration short; they never propagate.
pub fn run_iteration(ctx: &RoleContext) -> IterationOutcome {
    let journal = &ctx.journal;
    let mut outcome = IterationOutcome::default();

    let pid = getpid();
    let timestamp = Local::now().format(ARTIFACT_TIME_FORMAT).to_string();
    let name = artifact_name(&timestamp, pid);

    let original = ctx.layout.original_dir().join(&name);
    let body = format!(
        "{}.\n- Created by {} at {}.",
        fastrand::u32(..),
        pid,
        timestamp
    );
    if let Err(e) = fs::write(&original, body) {
        journal_warn!(journal, LogCategory::FileMaking, TAG, "cannot create {}: {}", original.display(), e);
        return outcome;
    }
    journal!(journal, LogCategory::FileMaking, TAG, "Created file: {}", original.display());
    outcome.original = Some(original.clone());

    let bucket_dir = ctx.layout.bucket_dir(fastrand::u32(0..OBFUSCATED_BUCKETS));
    if let Err(e) = fs::create_dir_all(&bucket_dir) {
        journal_warn!(journal, LogCategory::FileMaking, TAG, "cannot create bucket {}: {}", bucket_dir.display(), e);
        return outcome;
    }

    let obfuscated = bucket_dir.join(&name);
    match fs::copy(&original, &obfuscated) {
        Ok(bytes) => journal!(
            journal,
            LogCategory::FileMaking,
            TAG,
            "Copied file from {} to {} ({} bytes)",
            original.display(),
            obfuscated.display(),
            bytes
        ),
        Err(e) => {
            journal_warn!(
                journal,
                LogCategory::FileMaking,
                TAG,
                "cannot copy {} to {}: {}",
                original.display(),
                obfuscated.display(),
                e
            );
            return outcome;
        }
    }
    outcome.obfuscated = Some(obfuscated.clone());

    match xor_cipher_file(&obfuscated) {
        Ok(bytes) => {
            journal!(journal, LogCategory::Obfuscation, TAG, "Obfuscated file: {} ({} bytes)", obfuscated.display(), bytes);
            outcome.ciphered_bytes = Some(bytes);
        }
        Err(e) => journal_warn!(journal, LogCategory::Obfuscation, TAG, "cipher pass failed: {}", e),
    }

    outcome
}

/// Seed the RNG from time and pid; forked siblings would otherwise share
/// the parent's sequence.
fn reseed_rng(pid: Pid) {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or_default();
    fastrand::seed(nanos ^ pid.as_raw() as u64);
}

/// Worker loop. Unbounded when `max_iterations` is `None`; then it only ends
/// when a signal kills the process.
pub fn run_file_worker(ctx: &RoleContext, max_iterations: Option<u64>) -> Result<()> {
    let pid = getpid();
    reseed_rng(pid);
    journal!(ctx.journal, LogCategory::Process, TAG, "Worker process started with PID {}", pid);

    let mut completed: u64 = 0;
    loop {
        let outcome = run_iteration(ctx);
        if !outcome.is_complete() {
            log::debug!("worker {}: iteration {} incomplete", pid, completed + 1);
        }
        completed += 1;

        if max_iterations.is_some_and(|max| completed >= max) {
            break;
        }
        thread::sleep(ctx.timings.worker_interval());
    }

    journal!(ctx.journal, LogCategory::Process, TAG, "stopping after {} iterations", completed);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::types::DemoConfig;
    use crate::observability::journal::LogCategory;
    use crate::safety::safe_cleanup;
    use crate::utils::obfuscate::xor_in_place;

    fn context(name: &str) -> RoleContext {
        let root = std::env::temp_dir().join(format!("proclife_worker_{}_{}", name, std::process::id()));
        let _ = safe_cleanup::remove_tree(&root);
        let mut config = DemoConfig {
            root,
            ..DemoConfig::default()
        };
        config.timings.worker_interval_min_ms = 1;
        config.timings.worker_interval_max_ms = 1;
        let ctx = RoleContext::from_config(&config);
        ctx.layout.ensure().unwrap();
        ctx
    }

    #[test]
    fn artifact_name_pattern() {
        assert_eq!(
            artifact_name("2026-10-19_08-30-00", Pid::from_raw(77)),
            "2026-10-19_08-30-00_process_77.txt"
        );
    }

    #[test]
    fn iteration_produces_matching_ciphered_copy() {
        let ctx = context("iteration");
        let outcome = run_iteration(&ctx);
        assert!(outcome.is_complete());

        let original = outcome.original.unwrap();
        let obfuscated = outcome.obfuscated.unwrap();
        assert_eq!(original.parent().unwrap(), ctx.layout.original_dir());
        assert_eq!(original.file_name(), obfuscated.file_name());

        let bucket: u32 = obfuscated
            .parent()
            .unwrap()
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(bucket < OBFUSCATED_BUCKETS);

        let plain = fs::read(&original).unwrap();
        let mut ciphered = fs::read(&obfuscated).unwrap();
        assert_eq!(ciphered.len(), plain.len());
        assert_eq!(outcome.ciphered_bytes, Some(plain.len() as u64));
        xor_in_place(&mut ciphered);
        assert_eq!(ciphered, plain);

        let text = String::from_utf8(plain).unwrap();
        assert!(text.contains(&format!("Created by {}", std::process::id())));

        let making = fs::read_to_string(ctx.journal.path_for(LogCategory::FileMaking)).unwrap();
        assert!(making.contains("Created file:"));
        assert!(making.contains("Copied file from"));
        let obf = fs::read_to_string(ctx.journal.path_for(LogCategory::Obfuscation)).unwrap();
        assert!(obf.contains("Obfuscated file:"));

        let _ = safe_cleanup::remove_tree(ctx.layout.root());
    }

    #[test]
    fn missing_output_tree_skips_iteration() {
        let ctx = context("missing");
        assert!(safe_cleanup::remove_tree(ctx.layout.output_dir()).is_clean());

        let outcome = run_iteration(&ctx);
        assert_eq!(outcome, IterationOutcome::default());

        let making = fs::read_to_string(ctx.journal.path_for(LogCategory::FileMaking)).unwrap();
        assert!(making.contains("WARN cannot create"));
        let _ = safe_cleanup::remove_tree(ctx.layout.root());
    }

    #[test]
    fn bounded_worker_stops() {
        let ctx = context("bounded");
        run_file_worker(&ctx, Some(2)).unwrap();

        let process = fs::read_to_string(ctx.journal.path_for(LogCategory::Process)).unwrap();
        assert!(process.contains("stopping after 2 iterations"));
        assert!(fs::read_dir(ctx.layout.original_dir()).unwrap().count() >= 1);
        let _ = safe_cleanup::remove_tree(ctx.layout.root());
    }
}
