//! Collaborator contracts consumed by the reconciliation core
//!
//! Every external truth source is behind one of these traits: workload
//! specs, historical usage, real-time usage, cluster events, target
//! objects, selector resolution, checkpoints and namespaces. Transport,
//! authentication and retry policy live in the implementations, not here.

use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_stream::Stream;

use crate::model::{
    ContainerId, LabelSet, PodId, PodPhase, ResourceAmount, ResourceKind, ResourceRequest,
    Selector, TargetId,
};

/// One pod specification as observed by the workload spec source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodSpec {
    pub id: PodId,
    pub labels: LabelSet,
    pub phase: PodPhase,
    pub containers: Vec<ContainerSpec>,
}

/// One container specification within a pod spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSpec {
    pub id: ContainerId,
    pub request: ResourceRequest,
}

/// Archived usage history of one pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodHistory {
    /// Labels the pod carried when last observed.
    pub last_labels: LabelSet,
    /// Archived samples per container name.
    pub samples: BTreeMap<String, Vec<HistorySample>>,
}

/// One archived usage measurement; the owning container is the map key in
/// [`PodHistory::samples`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub resource: ResourceKind,
    pub measured_at: DateTime<Utc>,
    pub amount: ResourceAmount,
}

/// Point-in-time usage of one container across all resource kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerUsageSnapshot {
    pub id: ContainerId,
    pub taken_at: DateTime<Utc>,
    pub usage: BTreeMap<ResourceKind, ResourceAmount>,
}

/// An autoscaling target object as listed from the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetObject {
    pub id: TargetId,
    /// Modern mechanism: reference to the workload the target governs.
    pub target_ref: Option<TargetRef>,
    /// Deprecated mechanism: label selector attaching the target to pods.
    pub label_selector: Option<LabelSet>,
}

/// Reference to the workload object an autoscaling target governs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRef {
    pub kind: String,
    pub name: String,
    pub api_version: Option<String>,
}

/// A persisted checkpoint of aggregated usage state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointObject {
    pub namespace: String,
    /// Name of the checkpoint object itself.
    pub name: String,
    /// Name of the target the checkpoint belongs to.
    pub target_name: String,
    /// Name of the container the state was aggregated for.
    pub container_name: String,
    /// Serialized aggregated state, decoded into an
    /// [`AggregateSnapshot`](crate::model::AggregateSnapshot) on load.
    pub state: serde_json::Value,
}

/// Kind of a cluster event notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Added,
    Modified,
    Deleted,
}

/// One notification from the cluster event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterEvent {
    pub kind: EventKind,
    pub reason: String,
    /// Container the event is attributed to.
    pub container: ContainerId,
    pub occurred_at: DateTime<Utc>,
    /// Memory usage reported with the event, in bytes.
    pub memory: ResourceAmount,
}

/// Stream of cluster events; ends when the source closes the subscription.
pub type EventStream = Pin<Box<dyn Stream<Item = ClusterEvent> + Send>>;

/// Archived usage, consumed once at startup to seed the model.
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    async fn get_cluster_history(&self) -> Result<HashMap<PodId, PodHistory>>;
}

/// Complete current set of pod specifications.
#[async_trait]
pub trait SpecSource: Send + Sync {
    async fn get_pod_specs(&self) -> Result<Vec<PodSpec>>;
}

/// Real-time container usage snapshots. Best-effort telemetry.
#[async_trait]
pub trait MetricsSource: Send + Sync {
    async fn get_container_metrics(&self) -> Result<Vec<ContainerUsageSnapshot>>;
}

/// Cluster event subscriptions, filtered by event reason.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn subscribe(&self, reason: &str) -> Result<EventStream>;
}

/// All target objects visible to the control loop.
#[async_trait]
pub trait TargetLister: Send + Sync {
    async fn list(&self) -> Result<Vec<TargetObject>>;
}

/// Resolves the selector governing a target object.
///
/// Two instances are consumed: a legacy fetcher deriving a selector from
/// the deprecated label-selector field and a modern fetcher deriving one
/// from the target reference. `Ok(None)` means the mechanism is not in use
/// for this target.
#[async_trait]
pub trait SelectorFetcher: Send + Sync {
    async fn fetch(&self, target: &TargetObject) -> Result<Option<Selector>>;
}

/// Persisted checkpoints, scoped per namespace.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn list(&self, namespace: &str) -> Result<Vec<CheckpointObject>>;
    async fn delete(&self, namespace: &str, name: &str) -> Result<()>;
}

/// All namespaces in the cluster, used by checkpoint garbage collection.
#[async_trait]
pub trait NamespaceLister: Send + Sync {
    async fn list_namespaces(&self) -> Result<Vec<String>>;
}
