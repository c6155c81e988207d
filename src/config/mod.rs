//! Configuration
//!
//! Typed run configuration, JSON loading, and startup validation.

pub mod loader;
pub mod types;
pub mod validator;
