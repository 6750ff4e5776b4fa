//! In-memory cluster model store
//!
//! The store exposes transactional upsert/delete operations and performs no
//! locking of its own; reconciliation entry points are invoked one at a time
//! by the external scheduler, so mutual exclusion belongs to the caller.

use std::collections::HashMap;

use thiserror::Error;

use super::{
    ContainerId, ContainerRecord, LabelSet, OomEvent, PodId, PodPhase, PodRecord, ResourceRequest,
    Selector, TargetId, TargetRecord, UsageSample,
};
use crate::sources::TargetObject;

/// Rejections surfaced by the store. All of them are per-item: callers log
/// and continue the pass.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("pod {0} is not tracked")]
    UnknownPod(PodId),
    #[error("container {0} is not tracked")]
    UnknownContainer(ContainerId),
    #[error("target identity must carry a namespace and a name")]
    InvalidTargetIdentity,
}

/// Canonical in-memory cluster state consumed by the recommendation engine.
#[derive(Debug, Default)]
pub struct ClusterModel {
    pods: HashMap<PodId, PodRecord>,
    targets: HashMap<TargetId, TargetRecord>,
    samples: Vec<UsageSample>,
    ooms: Vec<OomEvent>,
    observed_targets: Vec<TargetObject>,
}

impl ClusterModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert a pod. The container set is recreated from the latest spec, so
    /// an upsert resets it; callers re-add containers in the same pass.
    pub fn add_or_update_pod(&mut self, id: PodId, labels: LabelSet, phase: PodPhase) {
        let record = PodRecord {
            id: id.clone(),
            labels,
            phase,
            containers: Default::default(),
        };
        self.pods.insert(id, record);
    }

    pub fn delete_pod(&mut self, id: &PodId) -> Option<PodRecord> {
        self.pods.remove(id)
    }

    /// Upsert a container under its already-tracked pod.
    pub fn add_or_update_container(
        &mut self,
        id: ContainerId,
        request: ResourceRequest,
    ) -> Result<(), ModelError> {
        let pod = self
            .pods
            .get_mut(&id.pod)
            .ok_or_else(|| ModelError::UnknownPod(id.pod.clone()))?;
        pod.containers
            .insert(id.name.clone(), ContainerRecord { id, request });
        Ok(())
    }

    /// Append a usage sample. The container must be tracked; a sample for an
    /// unknown container is an attribution failure and is never synthesized
    /// into a record.
    pub fn add_sample(&mut self, sample: UsageSample) -> Result<(), ModelError> {
        if !self.contains_container(&sample.container) {
            return Err(ModelError::UnknownContainer(sample.container));
        }
        self.samples.push(sample);
        Ok(())
    }

    /// Append an OOM fact. Same attribution contract as [`add_sample`].
    ///
    /// [`add_sample`]: ClusterModel::add_sample
    pub fn record_oom(&mut self, event: OomEvent) -> Result<(), ModelError> {
        if !self.contains_container(&event.container) {
            return Err(ModelError::UnknownContainer(event.container));
        }
        self.ooms.push(event);
        Ok(())
    }

    /// Upsert a target. An update replaces the selector but preserves the
    /// stored conditions and per-container initial state.
    pub fn add_or_update_target(
        &mut self,
        object: &TargetObject,
        selector: Selector,
    ) -> Result<(), ModelError> {
        if object.id.namespace.is_empty() || object.id.name.is_empty() {
            return Err(ModelError::InvalidTargetIdentity);
        }
        let record = self
            .targets
            .entry(object.id.clone())
            .or_insert_with(|| TargetRecord::new(object.id.clone()));
        record.selector = selector;
        Ok(())
    }

    pub fn set_target_legacy_api(&mut self, id: &TargetId, via_legacy_api: bool) {
        if let Some(record) = self.targets.get_mut(id) {
            record.via_legacy_api = via_legacy_api;
        }
    }

    pub fn delete_target(&mut self, id: &TargetId) -> Option<TargetRecord> {
        self.targets.remove(id)
    }

    pub fn contains_target(&self, id: &TargetId) -> bool {
        self.targets.contains_key(id)
    }

    pub fn contains_container(&self, id: &ContainerId) -> bool {
        self.pods
            .get(&id.pod)
            .is_some_and(|pod| pod.containers.contains_key(&id.name))
    }

    pub fn target_mut(&mut self, id: &TargetId) -> Option<&mut TargetRecord> {
        self.targets.get_mut(id)
    }

    pub fn pods(&self) -> &HashMap<PodId, PodRecord> {
        &self.pods
    }

    pub fn targets(&self) -> &HashMap<TargetId, TargetRecord> {
        &self.targets
    }

    pub fn target_ids(&self) -> Vec<TargetId> {
        self.targets.keys().cloned().collect()
    }

    pub fn samples(&self) -> &[UsageSample] {
        &self.samples
    }

    pub fn ooms(&self) -> &[OomEvent] {
        &self.ooms
    }

    /// Replace the snapshot of the most recently listed target objects.
    pub fn set_observed_targets(&mut self, objects: Vec<TargetObject>) {
        self.observed_targets = objects;
    }

    pub fn observed_targets(&self) -> &[TargetObject] {
        &self.observed_targets
    }
}
