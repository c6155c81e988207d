//! Async-safe shutdown signalling for the controller
//!
//! The handler only stores two atomics and writes one fixed message with
//! `write(2)`. Broadcast, reaping, cleanup and logging all happen on the main
//! path after it observes the flag.
use crate::config::types::{ProcError, Result};
use log::info;
use nix::sys::signal::{self, SaFlags, SigAction, SigHandler, SigSet, Signal};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::time::Duration;

/// Global shutdown flag (async-safe atomic)
static SHUTDOWN_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Last shutdown signal received, 0 if none
static SIGNAL_RECEIVED: AtomicI32 = AtomicI32::new(0);

/// Signals that request a graceful shutdown
pub const SHUTDOWN_SIGNALS: [Signal; 2] = [Signal::SIGINT, Signal::SIGTERM];

const HANDLER_MESSAGE: &[u8] = b"\n[CONTROLLER] shutdown signal received\n";

/// Handle to the process-wide shutdown flag
#[derive(Debug, Clone, Copy)]
pub struct ShutdownFlag;

impl ShutdownFlag {
    /// Install the flag handler for SIGINT and SIGTERM
    /// Must be called before any child is forked
    pub fn install() -> Result<Self> {
        let sig_action = SigAction::new(
            SigHandler::Handler(shutdown_handler),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );

        for sig in SHUTDOWN_SIGNALS {
            // SAFETY: the handler only touches atomics and calls write(2).
            unsafe { signal::sigaction(sig, &sig_action) }
                .map_err(|e| ProcError::Signal(format!("Failed to install {} handler: {}", sig, e)))?;
        }

        info!("Shutdown handlers installed (SIGINT, SIGTERM)");
        Ok(Self)
    }

    /// Whether a shutdown signal has been observed
    pub fn is_raised(&self) -> bool {
        SHUTDOWN_REQUESTED.load(Ordering::SeqCst)
    }

    /// The most recent shutdown signal, if any
    pub fn signal(&self) -> Option<Signal> {
        match SIGNAL_RECEIVED.load(Ordering::SeqCst) {
            0 => None,
            raw => Signal::try_from(raw).ok(),
        }
    }

    /// Reset flag (for testing)
    #[cfg(test)]
    pub(crate) fn reset(&self) {
        SHUTDOWN_REQUESTED.store(false, Ordering::SeqCst);
        SIGNAL_RECEIVED.store(0, Ordering::SeqCst);
    }
}

/// Only atomics and write(2) here: no allocation, no locks, no formatting
extern "C" fn shutdown_handler(sig: libc::c_int) {
    SIGNAL_RECEIVED.store(sig, Ordering::SeqCst);
    SHUTDOWN_REQUESTED.store(true, Ordering::SeqCst);

    unsafe {
        libc::write(
            libc::STDERR_FILENO,
            HANDLER_MESSAGE.as_ptr() as *const libc::c_void,
            HANDLER_MESSAGE.len(),
        );
    }
}

/// Restore default dispositions for the shutdown signals and unblock them.
/// Called first thing in every forked role so the group-wide SIGTERM kills it.
pub fn reset_to_default() -> Result<()> {
    let default_action = SigAction::new(SigHandler::SigDfl, SaFlags::empty(), SigSet::empty());
    for sig in SHUTDOWN_SIGNALS {
        // SAFETY: SIG_DFL installs no Rust code.
        unsafe { signal::sigaction(sig, &default_action) }
            .map_err(|e| ProcError::Signal(format!("Failed to reset {}: {}", sig, e)))?;
    }

    signal::sigprocmask(signal::SigmaskHow::SIG_UNBLOCK, Some(&shutdown_mask()), None)
        .map_err(|e| ProcError::Signal(format!("Failed to unblock shutdown signals: {}", e)))?;
    Ok(())
}

fn shutdown_mask() -> SigSet {
    let mut mask = SigSet::empty();
    for sig in SHUTDOWN_SIGNALS {
        mask.add(sig);
    }
    mask
}

/// Block shutdown signals for a critical section (used around fork)
/// Returns guard that will unblock on drop
pub struct SignalBlockGuard {
    _marker: (),
}

impl SignalBlockGuard {
    pub fn block() -> Result<Self> {
        signal::sigprocmask(signal::SigmaskHow::SIG_BLOCK, Some(&shutdown_mask()), None)
            .map_err(|e| ProcError::Signal(format!("Failed to block signals: {}", e)))?;

        Ok(Self { _marker: () })
    }
}

impl Drop for SignalBlockGuard {
    fn drop(&mut self) {
        let _ = signal::sigprocmask(signal::SigmaskHow::SIG_UNBLOCK, Some(&shutdown_mask()), None);
    }
}

/// Sleep that returns early when a signal handler runs.
/// Returns true if the sleep was interrupted.
pub fn interruptible_sleep(duration: Duration) -> bool {
    let request = libc::timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    };
    let mut remaining = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };

    // nanosleep is never restarted by SA_RESTART, which is what we want here.
    let rc = unsafe { libc::nanosleep(&request, &mut remaining) };
    rc != 0 && std::io::Error::last_os_error().raw_os_error() == Some(libc::EINTR)
}
