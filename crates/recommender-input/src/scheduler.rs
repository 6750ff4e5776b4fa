//! Reconciliation cadence
//!
//! Drives the feeder's entry points on fixed intervals: a frequent
//! reconciliation pass (targets, then workloads, then metrics — targets
//! first so attribution and checkpoints see the current target set) and a
//! slower checkpoint garbage-collection sweep. Entry points are invoked one
//! at a time, which is the mutual-exclusion contract the feeder relies on.

use std::time::Duration;

use tokio::time::interval;
use tracing::{info, warn};

use crate::feeder::ClusterStateFeeder;

/// Default interval between reconciliation passes.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(60);

/// Default interval between checkpoint garbage-collection sweeps.
pub const DEFAULT_GC_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Configuration for the feeder scheduler.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    /// Interval between reconciliation passes.
    pub sync_interval: Duration,
    /// Interval between checkpoint garbage-collection sweeps.
    pub gc_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sync_interval: DEFAULT_SYNC_INTERVAL,
            gc_interval: DEFAULT_GC_INTERVAL,
        }
    }
}

/// Owns the feeder and invokes its entry points on a fixed cadence.
pub struct FeederScheduler {
    feeder: ClusterStateFeeder,
    config: ScheduleConfig,
}

impl FeederScheduler {
    pub fn new(feeder: ClusterStateFeeder, config: ScheduleConfig) -> Self {
        Self { feeder, config }
    }

    pub fn feeder(&self) -> &ClusterStateFeeder {
        &self.feeder
    }

    pub fn feeder_mut(&mut self) -> &mut ClusterStateFeeder {
        &mut self.feeder
    }

    /// Run the cadence loop until the shutdown signal fires.
    pub async fn run(mut self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        info!(
            sync_interval_secs = self.config.sync_interval.as_secs(),
            gc_interval_secs = self.config.gc_interval.as_secs(),
            "starting feeder scheduler"
        );

        let mut sync_tick = interval(self.config.sync_interval);
        let mut gc_tick = interval(self.config.gc_interval);

        loop {
            tokio::select! {
                _ = sync_tick.tick() => {
                    self.run_once().await;
                }
                _ = gc_tick.tick() => {
                    if let Err(e) = self.feeder.garbage_collect_checkpoints().await {
                        warn!(error = %e, "checkpoint garbage collection failed");
                    }
                }
                _ = shutdown.recv() => {
                    info!("shutting down feeder scheduler");
                    break;
                }
            }
        }
    }

    /// One reconciliation pass. A failed target sync skips the rest of the
    /// pass, since workload attribution depends on the current target set.
    pub async fn run_once(&mut self) {
        if let Err(e) = self.feeder.sync_targets().await {
            warn!(error = %e, "target sync failed, skipping reconciliation pass");
            return;
        }
        if let Err(e) = self.feeder.sync_workloads().await {
            warn!(error = %e, "workload sync failed");
        }
        self.feeder.ingest_metrics().await;
    }
}
