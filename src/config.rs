// src/config.rs
// Runtime knobs for a reconciliation run, read from the environment.

use log::info;
use std::env;

// Tier-2 oracle calls park workers on network latency, so the pool
// oversubscribes the core count.
const WORKER_HEADROOM: usize = 4;
const DEFAULT_PERSIST_BATCH_SIZE: usize = 10;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub max_workers: usize,
    pub persist_batch_size: usize,
    pub vendor_filter: Vec<String>,
    pub run_description: Option<String>,
}

impl PipelineConfig {
    pub fn from_env() -> Self {
        let max_workers = env::var("RECONCILE_MAX_WORKERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or_else(|| num_cpus::get() + WORKER_HEADROOM);

        let persist_batch_size = env::var("RECONCILE_PERSIST_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|&v| v > 0)
            .unwrap_or(DEFAULT_PERSIST_BATCH_SIZE);

        let vendor_filter = env::var("VENDOR_FILTER")
            .unwrap_or_else(|_| String::new())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let run_description = env::var("RECONCILE_RUN_DESCRIPTION")
            .ok()
            .filter(|s| !s.trim().is_empty());

        Self {
            max_workers,
            persist_batch_size,
            vendor_filter,
            run_description,
        }
    }

    pub fn log_config(&self) {
        info!("⚙️ Pipeline config:");
        info!("   Max workers: {}", self.max_workers);
        info!("   Persist batch size: {}", self.persist_batch_size);
        if self.vendor_filter.is_empty() {
            info!("   Vendor filter: none (all vendors)");
        } else {
            info!("   Vendor filter: {:?}", self.vendor_filter);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global, so defaults and overrides share one test.
    #[test]
    fn from_env_defaults_and_overrides() {
        env::remove_var("RECONCILE_MAX_WORKERS");
        env::remove_var("RECONCILE_PERSIST_BATCH_SIZE");
        env::remove_var("VENDOR_FILTER");
        env::remove_var("RECONCILE_RUN_DESCRIPTION");
        let config = PipelineConfig::from_env();
        assert_eq!(config.max_workers, num_cpus::get() + WORKER_HEADROOM);
        assert_eq!(config.persist_batch_size, DEFAULT_PERSIST_BATCH_SIZE);
        assert!(config.vendor_filter.is_empty());
        assert!(config.run_description.is_none());

        env::set_var("RECONCILE_MAX_WORKERS", "3");
        env::set_var("RECONCILE_PERSIST_BATCH_SIZE", "25");
        env::set_var("VENDOR_FILTER", "techland, ultratech ,,");
        let config = PipelineConfig::from_env();
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.persist_batch_size, 25);
        assert_eq!(config.vendor_filter, vec!["techland", "ultratech"]);

        // Zero and garbage fall back to the defaults.
        env::set_var("RECONCILE_MAX_WORKERS", "0");
        env::set_var("RECONCILE_PERSIST_BATCH_SIZE", "lots");
        let config = PipelineConfig::from_env();
        assert_eq!(config.max_workers, num_cpus::get() + WORKER_HEADROOM);
        assert_eq!(config.persist_batch_size, DEFAULT_PERSIST_BATCH_SIZE);

        env::remove_var("RECONCILE_MAX_WORKERS");
        env::remove_var("RECONCILE_PERSIST_BATCH_SIZE");
        env::remove_var("VENDOR_FILTER");
    }
}
