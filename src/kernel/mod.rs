//! Thin wrappers around POSIX process and signal primitives.

pub mod process;
pub mod signal;
