use crate::MetricsHub;
use prometheus::IntGauge;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};
use weather_packet::Reading;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("subscriber queue full")]
    Full,
    #[error("subscriber gone")]
    Closed,
    #[error("delivery failed: {0}")]
    Other(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl std::fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Callback = Arc<dyn Fn(&Reading) -> Result<(), DeliveryError> + Send + Sync>;

/// Live subscriber set. Publishing snapshots the set and delivers outside
/// the lock, so registration never waits on a slow callback.
pub struct Broadcaster {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<SubscriberId, Callback>>,
    gauge: Option<IntGauge>,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl Broadcaster {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            subscribers: Mutex::new(HashMap::new()),
            gauge: None,
        }
    }

    pub fn with_metrics(metrics: &MetricsHub) -> Self {
        Self {
            gauge: Some(metrics.station.subscribers.clone()),
            ..Self::new()
        }
    }

    pub fn register<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&Reading) -> Result<(), DeliveryError> + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let mut subs = self.lock();
        subs.insert(id, Arc::new(callback));
        self.update_gauge(subs.len());
        debug!("registered subscriber {}", id);
        id
    }

    /// Remove `id`. Returns false if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let mut subs = self.lock();
        let removed = subs.remove(&id).is_some();
        self.update_gauge(subs.len());
        if removed {
            debug!("unregistered subscriber {}", id);
        }
        removed
    }

    /// Deliver `reading` to every registered subscriber; subscribers whose
    /// delivery fails are dropped. Returns the number of successful deliveries.
    pub fn publish(&self, reading: &Reading) -> usize {
        let snapshot: Vec<(SubscriberId, Callback)> = self
            .lock()
            .iter()
            .map(|(id, cb)| (*id, Arc::clone(cb)))
            .collect();

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, callback) in snapshot {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(reading)))
                .unwrap_or_else(|_| Err(DeliveryError::Other("subscriber panicked".into())));
            match outcome {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!("dropping subscriber {}: {}", id, e);
                    failed.push(id);
                }
            }
        }

        if !failed.is_empty() {
            let mut subs = self.lock();
            for id in failed {
                subs.remove(&id);
            }
            self.update_gauge(subs.len());
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<SubscriberId, Callback>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn update_gauge(&self, len: usize) {
        if let Some(gauge) = &self.gauge {
            gauge.set(len as i64);
        }
    }
}
