//! Scheduled anchor refresh - background task for periodic re-encoding.

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;

use crate::refresh::service::RefreshService;
use crate::types::now_ms;
use log::{error, info};

/// Configuration for the scheduled refresh service.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between refresh operations
    pub refresh_interval: Duration,
    /// Whether the scheduler is enabled
    pub enabled: bool,
    /// Tenants refreshed on every tick
    pub tenants: Vec<String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(5 * 60),
            enabled: true,
            tenants: Vec::new(),
        }
    }
}

/// Periodically refreshes the anchor cache of every configured tenant.
pub struct RefreshScheduler {
    service: Arc<RefreshService>,
    config: SchedulerConfig,
    /// Timestamp of the last cycle in which every tenant refreshed
    last_refresh_at: Arc<RwLock<Option<u64>>>,
}

impl RefreshScheduler {
    pub fn new(service: Arc<RefreshService>, config: SchedulerConfig) -> Self {
        Self {
            service,
            config,
            last_refresh_at: Arc::new(RwLock::new(None)),
        }
    }

    pub fn last_refresh(&self) -> Option<u64> {
        *self.last_refresh_at.read()
    }

    /// Runs until the task is dropped; spawn it on the runtime.
    pub async fn start(self: Arc<Self>) {
        if !self.config.enabled {
            info!("Scheduled refresh is disabled, skipping");
            return;
        }

        info!(
            "Starting scheduled refresh for {} tenants with {}-second interval",
            self.config.tenants.len(),
            self.config.refresh_interval.as_secs()
        );

        let mut ticker = interval(self.config.refresh_interval);

        loop {
            ticker.tick().await;
            self.run_once().await;
        }
    }

    /// One refresh cycle over all tenants. Failures are logged and do not stop
    /// the remaining tenants. Returns the number of tenants refreshed.
    pub async fn run_once(&self) -> usize {
        let mut succeeded = 0;
        for tenant_id in &self.config.tenants {
            match self.service.refresh_tenant(tenant_id).await {
                Ok(_) => succeeded += 1,
                Err(e) => error!("Scheduled refresh of tenant '{}' failed: {}", tenant_id, e),
            }
        }

        if succeeded == self.config.tenants.len() {
            *self.last_refresh_at.write() = Some(now_ms());
        }
        succeeded
    }
}
