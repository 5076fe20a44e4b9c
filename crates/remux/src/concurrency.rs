//! Concurrency planning for the discovery phase
//!
//! Derives the inspection pool size from the host core count and configuration.

use crate::config::Config;

/// Concurrency plan derived from configuration and system resources
#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyPlan {
    /// Total logical CPU cores available
    pub total_cores: u32,
    /// Number of discs inspected at once
    pub discovery_workers: u32,
}

impl ConcurrencyPlan {
    /// Derive a concurrency plan from configuration
    ///
    /// Uses `discovery.workers` when non-zero, otherwise one worker per
    /// logical core.
    pub fn derive(cfg: &Config) -> Self {
        Self::derive_with_cores(cfg, num_cpus::get() as u32)
    }

    fn derive_with_cores(cfg: &Config, detected_cores: u32) -> Self {
        let total_cores = detected_cores.max(1);
        let discovery_workers = if cfg.discovery.workers > 0 {
            cfg.discovery.workers
        } else {
            total_cores
        };

        Self {
            total_cores,
            discovery_workers,
        }
    }
}

/// Public function to derive a concurrency plan from configuration
pub fn derive_plan(cfg: &Config) -> ConcurrencyPlan {
    ConcurrencyPlan::derive(cfg)
}
