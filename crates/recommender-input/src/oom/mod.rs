//! OOM event plumbing
//!
//! This module connects the push-based cluster event stream to the
//! poll-based metrics ingestion pass:
//! - A bounded drop-oldest queue holding pending OOM events
//! - A perpetual background watcher subscribing to eviction events and
//!   feeding the queue, reconnecting with capped backoff

mod queue;
mod watcher;

pub use queue::{OomQueue, DEFAULT_QUEUE_CAPACITY};
pub use watcher::{EvictionWatcher, WatchConfig, EVICTION_REASON};
