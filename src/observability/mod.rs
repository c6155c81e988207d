//! Observability
//!
//! Per-category event journal written by every process of a run.

pub mod journal;
