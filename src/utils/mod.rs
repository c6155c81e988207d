//! Utilities
//!
//! I/O helpers used by the file worker.

pub mod obfuscate;
