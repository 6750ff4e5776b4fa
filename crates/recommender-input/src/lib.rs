//! Input layer for the vertical autoscaling recommender
//!
//! This crate reconciles cluster state from several independent, partially
//! unreliable sources into one in-memory model consumed by the
//! recommendation engine:
//! - Workload spec synchronization (pods and containers)
//! - Autoscaling target synchronization with selector precedence
//! - Real-time usage ingestion and non-blocking OOM event draining
//! - Checkpoint warm-start and garbage collection
//! - A background eviction watcher feeding the OOM queue

pub mod feeder;
pub mod model;
pub mod observability;
pub mod oom;
pub mod scheduler;
pub mod selector;
pub mod sources;

pub use feeder::{ClusterStateFeeder, ClusterStateFeederBuilder};
pub use model::{ClusterModel, ModelError};
pub use observability::FeederMetrics;
pub use oom::{EvictionWatcher, OomQueue, WatchConfig};
pub use scheduler::{FeederScheduler, ScheduleConfig};
