//! Core data model for the recommender input layer
//!
//! Identities, records and usage facts tracked by the in-memory cluster
//! model, plus the transactional store itself ([`ClusterModel`]).

mod store;

pub use store::{ClusterModel, ModelError};

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a pod: unique within the cluster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PodId {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for PodId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identity of a container within a pod.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContainerId {
    pub pod: PodId,
    pub name: String,
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.pod, self.name)
    }
}

/// Identity of an autoscaling target object.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Lifecycle phase of a pod, as reported by the workload spec source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PodPhase {
    Pending,
    Running,
    Succeeded,
    Failed,
    Unknown,
}

/// Resource dimensions tracked by the recommender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Cpu,
    Memory,
}

/// Amount of a resource: CPU in millicores, memory in bytes.
pub type ResourceAmount = i64;

/// Declared resource request of a container.
pub type ResourceRequest = BTreeMap<ResourceKind, ResourceAmount>;

/// Pod label set.
pub type LabelSet = BTreeMap<String, String>;

/// Label selector governing which pods a target applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    /// Matches no pods. Used when a target's configuration cannot be resolved.
    Nothing,
    /// Matches pods whose labels contain every listed pair.
    MatchLabels(LabelSet),
}

impl Selector {
    pub fn nothing() -> Self {
        Selector::Nothing
    }

    pub fn match_labels<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Selector::MatchLabels(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Whether the selector matches the given pod label set.
    pub fn matches(&self, labels: &LabelSet) -> bool {
        match self {
            Selector::Nothing => false,
            Selector::MatchLabels(required) => required
                .iter()
                .all(|(k, v)| labels.get(k).map(String::as_str) == Some(v.as_str())),
        }
    }
}

/// Status conditions surfacing configuration problems on a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConditionKind {
    ConfigUnsupported,
    ConfigDeprecated,
}

/// One observed usage measurement for a container. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    pub container: ContainerId,
    pub resource: ResourceKind,
    pub measured_at: DateTime<Utc>,
    pub amount: ResourceAmount,
}

/// A container termination for exceeding its memory bound. Consumed once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OomEvent {
    pub container: ContainerId,
    pub occurred_at: DateTime<Utc>,
    /// Memory usage at the time of the kill, in bytes.
    pub memory: ResourceAmount,
}

/// Aggregated usage state decoded from a persisted checkpoint.
///
/// Interpreted by the recommendation engine; this layer only decodes it and
/// attaches it to the owning target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    /// Number of usage samples folded into this state.
    pub total_samples_count: u64,
    /// Start of the aggregated sample window.
    pub first_sample_at: Option<DateTime<Utc>>,
    /// End of the aggregated sample window.
    pub last_sample_at: Option<DateTime<Utc>>,
    /// Peak memory usage observed over the window, in bytes.
    pub memory_peak: ResourceAmount,
    /// CPU usage distribution, bucket label to weight.
    #[serde(default)]
    pub cpu_histogram: BTreeMap<String, f64>,
    /// Memory usage distribution, bucket label to weight.
    #[serde(default)]
    pub memory_histogram: BTreeMap<String, f64>,
}

/// A tracked pod and its containers.
///
/// Containers are recreated from the latest spec whenever the pod is
/// upserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodRecord {
    pub id: PodId,
    pub labels: LabelSet,
    pub phase: PodPhase,
    /// Containers keyed by name, in declaration order.
    pub containers: BTreeMap<String, ContainerRecord>,
}

/// A tracked container, owned by its pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub id: ContainerId,
    pub request: ResourceRequest,
}

/// A tracked autoscaling target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetRecord {
    pub id: TargetId,
    /// Selector governing which pods the target applies to.
    pub selector: Selector,
    /// Whether the target is configured through the deprecated legacy API.
    pub via_legacy_api: bool,
    /// Present conditions, keyed by kind.
    pub conditions: BTreeMap<ConditionKind, String>,
    /// Per-container aggregated state seeded from checkpoints, keyed by
    /// container name. Enriched by checkpoint loads, never implicitly
    /// cleared.
    pub initial_state: BTreeMap<String, AggregateSnapshot>,
}

impl TargetRecord {
    pub fn new(id: TargetId) -> Self {
        Self {
            id,
            selector: Selector::Nothing,
            via_legacy_api: false,
            conditions: BTreeMap::new(),
            initial_state: BTreeMap::new(),
        }
    }
}
