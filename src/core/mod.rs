//! Controller: forks the roles, waits for a shutdown signal, broadcasts,
//! reaps and tears the output tree down.

pub mod controller;
pub mod types;
