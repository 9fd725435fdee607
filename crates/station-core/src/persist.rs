use crate::{MetricsHub, ReadingStore};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use weather_packet::Reading;

/// How long readings are kept and how often a prune is attempted.
#[derive(Debug, Clone, PartialEq)]
pub struct RetentionPolicy {
    pub horizon: time::Duration,
    /// Chance of pruning after each successful insert.
    pub prune_probability: f64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            horizon: time::Duration::hours(24),
            prune_probability: 0.01,
        }
    }
}

/// Sending side of the persistence queue. Never blocks.
#[derive(Clone)]
pub struct PersistHandle {
    tx: mpsc::Sender<Reading>,
    metrics: MetricsHub,
}

impl PersistHandle {
    /// Queue `reading` for storage. Returns false if it had to be dropped.
    pub fn dispatch(&self, reading: Reading) -> bool {
        match self.tx.try_send(reading) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("persistence queue full, reading not stored");
                self.metrics.station.persist_failures.inc();
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("persistence worker stopped, reading not stored");
                self.metrics.station.persist_failures.inc();
                false
            }
        }
    }
}

/// Start the single task that writes readings in arrival order.
pub fn spawn_persist_worker(
    store: Arc<dyn ReadingStore>,
    policy: RetentionPolicy,
    metrics: MetricsHub,
    capacity: usize,
) -> (PersistHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let handle = PersistHandle {
        tx,
        metrics: metrics.clone(),
    };
    let task = tokio::spawn(persist_loop(store, policy, metrics, rx));
    (handle, task)
}

async fn persist_loop(
    store: Arc<dyn ReadingStore>,
    policy: RetentionPolicy,
    metrics: MetricsHub,
    mut rx: mpsc::Receiver<Reading>,
) {
    let mut rng = StdRng::from_entropy();
    let p = if (0.0..=1.0).contains(&policy.prune_probability) {
        policy.prune_probability
    } else {
        0.0
    };

    while let Some(reading) = rx.recv().await {
        match store.insert(&reading).await {
            Ok(id) => debug!("stored reading {}", id),
            Err(e) => {
                warn!("failed to store reading: {}", e);
                metrics.station.persist_failures.inc();
                continue;
            }
        }

        if rng.gen_bool(p) {
            let cutoff = OffsetDateTime::now_utc() - policy.horizon;
            match store.delete_older_than(cutoff).await {
                Ok(n) => {
                    metrics.station.prunes.inc();
                    if n > 0 {
                        info!("pruned {} readings older than {}", n, cutoff);
                    }
                }
                Err(e) => warn!("retention prune failed: {}", e),
            }
        }
    }
    debug!("persistence worker exiting");
}
