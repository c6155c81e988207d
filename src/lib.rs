//! proclife: POSIX process lifecycle demonstrator
//!
//! A controller forks a group of child roles that show orphan adoption,
//! zombie retention and ordinary file work, then tears everything down on
//! SIGINT/SIGTERM: one group-wide SIGTERM, reaping until `ECHILD`, and a
//! symlink-safe removal of the output tree.
//!
//! # Architecture
//!
//! ## Kernel Primitives ([`kernel`])
//! - [`kernel::signal`]: Async-safe shutdown flag, signal blocking around fork
//! - [`kernel::process`]: Fork, group signalling, wait-any reaping, `/proc` state
//!
//! ## Controller ([`core`])
//! - [`core::controller`]: Type-state lifecycle INIT -> RUNNING -> SHUTTING_DOWN -> TERMINATED
//! - [`core::types`]: Child table, reap records, shutdown summary
//!
//! ## Child Roles ([`roles`])
//! - [`roles::orphan`]: Parent exits early, grandchild reports its new parent
//! - [`roles::zombie`]: Child exits, parent never waits
//! - [`roles::worker`]: Create, copy and cipher artifacts in a loop
//! - [`roles::spawner`]: Forks a batch of workers and parks
//!
//! ## Safety & Cleanup ([`safety`])
//! - [`safety::safe_cleanup`]: Directory reaper with aggregate failure reporting
//! - [`safety::layout`]: Run-scoped `log/` and `output/` directories
//!
//! ## Observability ([`observability`])
//! - [`observability::journal`]: Per-category append-only event logs
//!
//! ## Configuration ([`config`])
//! - [`config::types`]: Config, timings, error type
//! - [`config::loader`]: JSON loading with defaults
//! - [`config::validator`]: Startup validation
//!
//! ## Utilities ([`utils`])
//! - [`utils::obfuscate`]: Self-inverse XOR pass over a file

// Kernel Primitives
pub mod kernel;

// Controller
pub mod core;

// Child roles
pub mod roles;

// Safety & Cleanup
pub mod safety;

// Observability
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the proclife binary
pub mod cli;

pub use config::types::{DemoConfig, ProcError, Result};
