//! Background eviction event watcher
//!
//! Maintains a perpetual subscription to the cluster event stream filtered
//! to eviction events, translating every added event into an OOM event on
//! the queue. The subscription is reopened whenever the source closes it;
//! open failures retry with capped exponential backoff and jitter.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::queue::OomQueue;
use crate::model::OomEvent;
use crate::observability::FeederMetrics;
use crate::sources::{EventKind, EventSource, EventStream};

/// Event reason identifying container evictions.
pub const EVICTION_REASON: &str = "Evicted";

/// Configuration for the eviction watcher.
#[derive(Debug, Clone)]
pub struct WatchConfig {
    /// Event reason the subscription is filtered to.
    pub reason: String,
    /// Initial backoff after a failed subscription open.
    pub initial_backoff: Duration,
    /// Backoff ceiling.
    pub max_backoff: Duration,
    /// Maximum jitter added to each backoff sleep.
    pub jitter: Duration,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            reason: EVICTION_REASON.to_string(),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(300),
            jitter: Duration::from_secs(1),
        }
    }
}

/// Perpetual watcher feeding the OOM queue from the cluster event stream.
pub struct EvictionWatcher {
    source: Arc<dyn EventSource>,
    queue: Arc<OomQueue>,
    config: WatchConfig,
    metrics: FeederMetrics,
}

impl EvictionWatcher {
    pub fn new(source: Arc<dyn EventSource>, queue: Arc<OomQueue>, config: WatchConfig) -> Self {
        Self {
            source,
            queue,
            config,
            metrics: FeederMetrics::new(),
        }
    }

    /// Spawn the watcher onto the runtime. The task never terminates on its
    /// own; abort the handle at shutdown.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Watch loop: subscribe, consume until the stream closes, resubscribe.
    pub async fn run(self) {
        let mut backoff = self.config.initial_backoff;
        loop {
            match self.source.subscribe(&self.config.reason).await {
                Ok(stream) => {
                    backoff = self.config.initial_backoff;
                    self.metrics.inc_watch_subscribes();
                    self.consume(stream).await;
                    debug!("eviction event stream closed, resubscribing");
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        backoff_ms = backoff.as_millis() as u64,
                        "cannot subscribe to eviction events"
                    );
                    tokio::time::sleep(backoff + rand_jitter(self.config.jitter)).await;
                    backoff = (backoff * 2).min(self.config.max_backoff);
                }
            }
        }
    }

    async fn consume(&self, mut stream: EventStream) {
        while let Some(event) = stream.next().await {
            if event.kind != EventKind::Added || event.reason != self.config.reason {
                continue;
            }
            debug!(container = %event.container, "observed eviction event");
            let oom = OomEvent {
                container: event.container,
                occurred_at: event.occurred_at,
                memory: event.memory,
            };
            if self.queue.push(oom) {
                self.metrics.inc_oom_events_dropped();
                warn!(
                    dropped_total = self.queue.dropped(),
                    "OOM queue full, dropped oldest pending event"
                );
            }
        }
    }
}

fn rand_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }

    // Simple pseudo-random based on current time
    // In production, use a proper RNG
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;

    Duration::from_millis(now % max_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerId, PodId};
    use crate::sources::ClusterEvent;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn cluster_event(kind: EventKind, reason: &str, pod: &str) -> ClusterEvent {
        ClusterEvent {
            kind,
            reason: reason.to_string(),
            container: ContainerId {
                pod: PodId {
                    namespace: "default".to_string(),
                    name: pod.to_string(),
                },
                name: "main".to_string(),
            },
            occurred_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            memory: 256 * 1024 * 1024,
        }
    }

    /// Fails the first subscribe, then yields a fixed batch of events, then
    /// pends forever so the watcher parks on its third attempt.
    struct ScriptedEventSource {
        calls: AtomicUsize,
        events: Vec<ClusterEvent>,
    }

    #[async_trait]
    impl EventSource for ScriptedEventSource {
        async fn subscribe(&self, _reason: &str) -> Result<EventStream> {
            match self.calls.fetch_add(1, Ordering::SeqCst) {
                0 => bail!("event source unavailable"),
                1 => Ok(Box::pin(tokio_stream::iter(self.events.clone()))),
                _ => Ok(Box::pin(tokio_stream::pending::<ClusterEvent>())),
            }
        }
    }

    #[tokio::test]
    async fn test_forwards_matching_added_events_after_retry() {
        let source = Arc::new(ScriptedEventSource {
            calls: AtomicUsize::new(0),
            events: vec![
                cluster_event(EventKind::Added, EVICTION_REASON, "web-0"),
                cluster_event(EventKind::Modified, EVICTION_REASON, "web-1"),
                cluster_event(EventKind::Added, "Scheduled", "web-2"),
                cluster_event(EventKind::Added, EVICTION_REASON, "web-3"),
            ],
        });
        let queue = Arc::new(OomQueue::default());
        let config = WatchConfig {
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
            jitter: Duration::ZERO,
            ..Default::default()
        };

        let handle = EvictionWatcher::new(source, Arc::clone(&queue), config).spawn();
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.abort();

        // Only the two added eviction events made it through.
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.try_pop().unwrap().container.pod.name, "web-0");
        assert_eq!(queue.try_pop().unwrap().container.pod.name, "web-3");
    }
}
