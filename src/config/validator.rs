// Config validation
// Fail fast at startup with every problem listed, not just the first one.

use crate::config::types::{DemoConfig, ProcError, Result, MAX_CHILDREN};

/// Validation result with detailed errors
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, error: String) {
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validate config at startup; errors are fatal, warnings are logged
pub fn validate_config(config: &DemoConfig) -> Result<ValidationResult> {
    let mut result = ValidationResult::new();

    validate_roles(config, &mut result);
    validate_timings(config, &mut result);

    for warning in &result.warnings {
        log::warn!("config: {}", warning);
    }

    if !result.is_valid() {
        return Err(ProcError::Config(format!(
            "Config validation failed:\n{}",
            result.errors.join("\n")
        )));
    }

    Ok(result)
}

fn validate_roles(config: &DemoConfig, result: &mut ValidationResult) {
    let roles = &config.roles;
    if roles.direct_children() == 0 {
        result.add_warning("no roles configured; controller will only wait for a signal".to_string());
    }
    if roles.spawners > 0 && roles.workers_per_spawner == 0 {
        result.add_error("workers_per_spawner must be > 0 when spawners are configured".to_string());
    }
    if roles.direct_children() > MAX_CHILDREN {
        result.add_error(format!(
            "{} direct children requested; at most {} allowed",
            roles.direct_children(),
            MAX_CHILDREN
        ));
    }
    if u64::from(roles.workers_per_spawner) > MAX_CHILDREN {
        result.add_error(format!(
            "workers_per_spawner ({}) exceeds {}",
            roles.workers_per_spawner, MAX_CHILDREN
        ));
    }
}

fn validate_timings(config: &DemoConfig, result: &mut ValidationResult) {
    let t = &config.timings;
    if t.controller_poll_ms == 0 {
        result.add_error("controller_poll_ms must be > 0".to_string());
    }
    if t.worker_interval_min_ms > t.worker_interval_max_ms {
        result.add_error(format!(
            "worker_interval_min_ms ({}) exceeds worker_interval_max_ms ({})",
            t.worker_interval_min_ms, t.worker_interval_max_ms
        ));
    }
    if config.roles.orphans > 0 {
        let grandchild_window = t.orphan_check_interval_ms.saturating_mul(t.orphan_checks as u64);
        if t.orphan_checks == 0 {
            result.add_error("orphan_checks must be > 0".to_string());
        } else if t.orphan_parent_delay_ms >= grandchild_window {
            // Re-parenting would happen after the grandchild stopped looking.
            result.add_warning(format!(
                "orphan_parent_delay_ms ({}) is not shorter than the grandchild's check window ({} ms)",
                t.orphan_parent_delay_ms, grandchild_window
            ));
        }
    }
}
