//! Cluster state reconciliation
//!
//! [`ClusterStateFeeder`] is the facade the control loop's scheduler drives.
//! Each entry point recomputes its slice of model state from a fresh fetch:
//! a failed top-level fetch aborts the pass and leaves the prior state
//! intact, while per-item failures are logged and skipped so one bad entity
//! never corrupts the rest of a pass. Entry points are invoked one at a
//! time; the feeder performs no locking of its own.


use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use tracing::{debug, info, warn};

use crate::model::{
    AggregateSnapshot, ClusterModel, ContainerId, PodId, PodPhase, ResourceRequest, TargetId,
    UsageSample,
};
use crate::observability::FeederMetrics;
use crate::oom::OomQueue;
use crate::selector::{self, ConditionDelta};
use crate::sources::{
    CheckpointObject, CheckpointStore, ContainerUsageSnapshot, HistoryProvider, MetricsSource,
    NamespaceLister, SelectorFetcher, SpecSource, TargetLister,
};

/// Reconciliation facade over the cluster model.
pub struct ClusterStateFeeder {
    model: ClusterModel,
    spec_source: Arc<dyn SpecSource>,
    metrics_source: Arc<dyn MetricsSource>,
    target_lister: Arc<dyn TargetLister>,
    legacy_selector_fetcher: Arc<dyn SelectorFetcher>,
    selector_fetcher: Arc<dyn SelectorFetcher>,
    checkpoint_store: Arc<dyn CheckpointStore>,
    namespace_lister: Arc<dyn NamespaceLister>,
    oom_queue: Arc<OomQueue>,
    metrics: FeederMetrics,
}

impl ClusterStateFeeder {
    pub fn builder() -> ClusterStateFeederBuilder {
        ClusterStateFeederBuilder::new()
    }

    /// The canonical cluster state, for the downstream recommendation engine.
    pub fn model(&self) -> &ClusterModel {
        &self.model
    }

    pub fn model_mut(&mut self) -> &mut ClusterModel {
        &mut self.model
    }

    /// The queue the eviction watcher produces into.
    pub fn oom_queue(&self) -> Arc<OomQueue> {
        Arc::clone(&self.oom_queue)
    }

    /// Seed the model from archived usage. Called once at startup.
    pub async fn init_from_history(&mut self, provider: &dyn HistoryProvider) -> Result<()> {
        info!("initializing cluster state from history provider");
        let history = provider
            .get_cluster_history()
            .await
            .context("cannot get cluster history")?;

        for (pod_id, pod_history) in history {
            debug!(pod = %pod_id, "seeding pod from history");
            self.model
                .add_or_update_pod(pod_id.clone(), pod_history.last_labels, PodPhase::Unknown);
            for (container_name, samples) in pod_history.samples {
                let container = ContainerId {
                    pod: pod_id.clone(),
                    name: container_name,
                };
                // Archived samples predate any live spec; track the container
                // with an empty request so they stay attributable.
                if let Err(e) = self
                    .model
                    .add_or_update_container(container.clone(), ResourceRequest::new())
                {
                    warn!(container = %container, error = %e, "cannot track container from history");
                    continue;
                }
                debug!(container = %container, samples = samples.len(), "replaying archived samples");
                for sample in samples {
                    let keyed = UsageSample {
                        container: container.clone(),
                        resource: sample.resource,
                        measured_at: sample.measured_at,
                        amount: sample.amount,
                    };
                    if let Err(e) = self.model.add_sample(keyed) {
                        warn!(container = %container, error = %e, "dropping archived sample");
                    }
                }
            }
        }
        Ok(())
    }

    /// Reconcile the model's pods and containers against the latest spec set.
    pub async fn sync_workloads(&mut self) -> Result<()> {
        let started = Instant::now();
        let specs = self
            .spec_source
            .get_pod_specs()
            .await
            .context("cannot fetch pod specs")?;

        // Deletions are computed against the pre-pass snapshot; their keys
        // are disjoint from the upserts below by construction.
        let live: HashSet<&PodId> = specs.iter().map(|spec| &spec.id).collect();
        let stale: Vec<PodId> = self
            .model
            .pods()
            .keys()
            .filter(|id| !live.contains(*id))
            .cloned()
            .collect();
        for id in stale {
            debug!(pod = %id, "deleting pod absent from latest spec set");
            self.model.delete_pod(&id);
        }

        for spec in specs {
            self.model
                .add_or_update_pod(spec.id.clone(), spec.labels, spec.phase);
            for container in spec.containers {
                if let Err(e) = self
                    .model
                    .add_or_update_container(container.id.clone(), container.request)
                {
                    warn!(container = %container.id, error = %e, "cannot track container");
                }
            }
        }

        self.update_tracked_gauges();
        self.metrics
            .observe_pass_latency("workloads", started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Reconcile the model's targets against the latest listing, resolving
    /// selector precedence and applying status conditions per target.
    pub async fn sync_targets(&mut self) -> Result<()> {
        let started = Instant::now();
        let objects = self
            .target_lister
            .list()
            .await
            .context("cannot list autoscaling targets")?;
        debug!(count = objects.len(), "fetched autoscaling targets");

        let mut live: HashSet<TargetId> = HashSet::new();
        for object in &objects {
            let legacy = match self.legacy_selector_fetcher.fetch(object).await {
                Ok(selector) => selector,
                Err(e) => {
                    warn!(target = %object.id, error = %e, "cannot fetch legacy selector");
                    None
                }
            };
            let (modern, fetch_error) = match self.selector_fetcher.fetch(object).await {
                Ok(selector) => (selector, None),
                Err(e) => {
                    warn!(target = %object.id, error = %e, "cannot fetch selector from targetRef");
                    (None, Some(e.to_string()))
                }
            };

            let resolution = selector::resolve(modern, legacy.is_some(), fetch_error.as_deref());
            debug!(target = %object.id, selector = ?resolution.selector, "resolved target selector");

            if let Err(e) = self.model.add_or_update_target(object, resolution.selector) {
                warn!(target = %object.id, error = %e, "skipping target");
                continue;
            }
            live.insert(object.id.clone());
            self.model.set_target_legacy_api(&object.id, legacy.is_some());
            if let Some(record) = self.model.target_mut(&object.id) {
                for delta in resolution.conditions {
                    match delta {
                        ConditionDelta::Set { kind, message } => {
                            record.conditions.insert(kind, message);
                        }
                        ConditionDelta::Clear { kind } => {
                            record.conditions.remove(&kind);
                        }
                    }
                }
            }
        }

        let stale: Vec<TargetId> = self
            .model
            .target_ids()
            .into_iter()
            .filter(|id| !live.contains(id))
            .collect();
        for id in stale {
            debug!(target = %id, "deleting target absent from latest listing");
            self.model.delete_target(&id);
        }
        self.model.set_observed_targets(objects);

        self.update_tracked_gauges();
        self.metrics
            .observe_pass_latency("targets", started.elapsed().as_secs_f64());
        Ok(())
    }

    /// Record the current usage snapshot, then drain pending OOM events
    /// without blocking.
    ///
    /// Both sources are best-effort telemetry: a snapshot fetch failure is
    /// logged and the pass continues, so this entry point never fails.
    pub async fn ingest_metrics(&mut self) {
        let started = Instant::now();
        let snapshots = match self.metrics_source.get_container_metrics().await {
            Ok(snapshots) => snapshots,
            Err(e) => {
                warn!(error = %e, "cannot fetch container usage snapshot");
                Vec::new()
            }
        };

        let container_count = snapshots.len();
        let mut sample_count = 0u64;
        for snapshot in snapshots {
            for sample in samples_from_snapshot(snapshot) {
                match self.model.add_sample(sample) {
                    Ok(()) => sample_count += 1,
                    Err(e) => debug!(error = %e, "dropping unattributable usage sample"),
                }
            }
        }
        debug!(
            samples = sample_count,
            containers = container_count,
            "recorded usage samples"
        );
        self.metrics.inc_usage_samples(sample_count);

        // Drain whatever the watcher has queued so far; the moment the queue
        // is empty we stop rather than wait on the producer.
        let mut oom_count = 0u64;
        while let Some(event) = self.oom_queue.try_pop() {
            debug!(container = %event.container, "OOM detected");
            match self.model.record_oom(event) {
                Ok(()) => oom_count += 1,
                Err(e) => warn!(error = %e, "dropping OOM event"),
            }
        }
        if oom_count > 0 {
            debug!(events = oom_count, "recorded OOM facts");
        }
        self.metrics.inc_oom_facts(oom_count);
        self.metrics
            .observe_pass_latency("metrics", started.elapsed().as_secs_f64());
    }

    /// Warm-start targets from persisted checkpoints.
    ///
    /// Targets are synchronized first so checkpoints resolve against the
    /// current target set. A checkpoint that fails to apply is retried on
    /// the next invocation.
    pub async fn init_from_checkpoints(&mut self) -> Result<()> {
        let started = Instant::now();
        info!("initializing targets from checkpoints");
        self.sync_targets().await?;

        let namespaces: BTreeSet<String> = self
            .model
            .targets()
            .keys()
            .map(|id| id.namespace.clone())
            .collect();

        for namespace in namespaces {
            debug!(namespace = %namespace, "fetching checkpoints");
            let checkpoints = match self.checkpoint_store.list(&namespace).await {
                Ok(list) => list,
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "cannot list checkpoints");
                    continue;
                }
            };
            for checkpoint in checkpoints {
                match self.apply_checkpoint(&checkpoint) {
                    Ok(()) => self.metrics.inc_checkpoints_loaded(),
                    Err(e) => warn!(
                        namespace = %checkpoint.namespace,
                        checkpoint = %checkpoint.name,
                        error = %e,
                        "cannot load checkpoint"
                    ),
                }
            }
        }
        self.metrics
            .observe_pass_latency("checkpoints", started.elapsed().as_secs_f64());
        Ok(())
    }

    fn apply_checkpoint(&mut self, checkpoint: &CheckpointObject) -> Result<()> {
        let target_id = TargetId {
            namespace: checkpoint.namespace.clone(),
            name: checkpoint.target_name.clone(),
        };
        let record = self
            .model
            .target_mut(&target_id)
            .ok_or_else(|| anyhow!("no tracked target {target_id} for checkpoint"))?;
        let snapshot: AggregateSnapshot = serde_json::from_value(checkpoint.state.clone())
            .with_context(|| format!("cannot decode checkpoint state for target {target_id}"))?;
        record
            .initial_state
            .insert(checkpoint.container_name.clone(), snapshot);
        debug!(
            target = %target_id,
            container = %checkpoint.container_name,
            "loaded checkpoint"
        );
        Ok(())
    }

    /// Delete checkpoints whose target no longer exists.
    ///
    /// Unlike loading, the sweep covers every namespace in the cluster, so
    /// checkpoints stranded in namespaces without any live target are found.
    pub async fn garbage_collect_checkpoints(&mut self) -> Result<()> {
        let started = Instant::now();
        info!("starting garbage collection of checkpoints");
        self.sync_targets().await?;

        let namespaces = self
            .namespace_lister
            .list_namespaces()
            .await
            .context("cannot list namespaces")?;

        for namespace in namespaces {
            let checkpoints = match self.checkpoint_store.list(&namespace).await {
                Ok(list) => list,
                Err(e) => {
                    warn!(namespace = %namespace, error = %e, "cannot list checkpoints");
                    continue;
                }
            };
            for checkpoint in checkpoints {
                let target_id = TargetId {
                    namespace: namespace.clone(),
                    name: checkpoint.target_name.clone(),
                };
                if self.model.contains_target(&target_id) {
                    continue;
                }
                match self.checkpoint_store.delete(&namespace, &checkpoint.name).await {
                    Ok(()) => {
                        debug!(
                            namespace = %namespace,
                            checkpoint = %checkpoint.name,
                            "deleted orphaned checkpoint"
                        );
                        self.metrics.inc_checkpoints_deleted();
                    }
                    Err(e) => warn!(
                        namespace = %namespace,
                        checkpoint = %checkpoint.name,
                        error = %e,
                        "cannot delete checkpoint"
                    ),
                }
            }
        }
        self.metrics
            .observe_pass_latency("gc", started.elapsed().as_secs_f64());
        Ok(())
    }

    fn update_tracked_gauges(&self) {
        self.metrics.set_tracked(
            self.model.pods().len() as i64,
            self.model.targets().len() as i64,
        );
    }
}

/// One usage sample per resource kind in the snapshot, all stamped with the
/// snapshot time.
fn samples_from_snapshot(snapshot: ContainerUsageSnapshot) -> Vec<UsageSample> {
    let ContainerUsageSnapshot { id, taken_at, usage } = snapshot;
    usage
        .into_iter()
        .map(|(resource, amount)| UsageSample {
            container: id.clone(),
            resource,
            measured_at: taken_at,
            amount,
        })
        .collect()
}

/// Builder for [`ClusterStateFeeder`]. Every collaborator is required; the
/// model and OOM queue default to fresh instances.
#[derive(Default)]
pub struct ClusterStateFeederBuilder {
    model: Option<ClusterModel>,
    spec_source: Option<Arc<dyn SpecSource>>,
    metrics_source: Option<Arc<dyn MetricsSource>>,
    target_lister: Option<Arc<dyn TargetLister>>,
    legacy_selector_fetcher: Option<Arc<dyn SelectorFetcher>>,
    selector_fetcher: Option<Arc<dyn SelectorFetcher>>,
    checkpoint_store: Option<Arc<dyn CheckpointStore>>,
    namespace_lister: Option<Arc<dyn NamespaceLister>>,
    oom_queue: Option<Arc<OomQueue>>,
}

impl ClusterStateFeederBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: ClusterModel) -> Self {
        self.model = Some(model);
        self
    }

    pub fn spec_source(mut self, source: Arc<dyn SpecSource>) -> Self {
        self.spec_source = Some(source);
        self
    }

    pub fn metrics_source(mut self, source: Arc<dyn MetricsSource>) -> Self {
        self.metrics_source = Some(source);
        self
    }

    pub fn target_lister(mut self, lister: Arc<dyn TargetLister>) -> Self {
        self.target_lister = Some(lister);
        self
    }

    pub fn legacy_selector_fetcher(mut self, fetcher: Arc<dyn SelectorFetcher>) -> Self {
        self.legacy_selector_fetcher = Some(fetcher);
        self
    }

    pub fn selector_fetcher(mut self, fetcher: Arc<dyn SelectorFetcher>) -> Self {
        self.selector_fetcher = Some(fetcher);
        self
    }

    pub fn checkpoint_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.checkpoint_store = Some(store);
        self
    }

    pub fn namespace_lister(mut self, lister: Arc<dyn NamespaceLister>) -> Self {
        self.namespace_lister = Some(lister);
        self
    }

    pub fn oom_queue(mut self, queue: Arc<OomQueue>) -> Self {
        self.oom_queue = Some(queue);
        self
    }

    pub fn build(self) -> Result<ClusterStateFeeder> {
        Ok(ClusterStateFeeder {
            model: self.model.unwrap_or_default(),
            spec_source: self
                .spec_source
                .ok_or_else(|| anyhow!("a pod spec source is required"))?,
            metrics_source: self
                .metrics_source
                .ok_or_else(|| anyhow!("a metrics source is required"))?,
            target_lister: self
                .target_lister
                .ok_or_else(|| anyhow!("a target lister is required"))?,
            legacy_selector_fetcher: self
                .legacy_selector_fetcher
                .ok_or_else(|| anyhow!("a legacy selector fetcher is required"))?,
            selector_fetcher: self
                .selector_fetcher
                .ok_or_else(|| anyhow!("a selector fetcher is required"))?,
            checkpoint_store: self
                .checkpoint_store
                .ok_or_else(|| anyhow!("a checkpoint store is required"))?,
            namespace_lister: self
                .namespace_lister
                .ok_or_else(|| anyhow!("a namespace lister is required"))?,
            oom_queue: self.oom_queue.unwrap_or_default(),
            metrics: FeederMetrics::new(),
        })
    }
}
