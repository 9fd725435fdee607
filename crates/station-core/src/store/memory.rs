//! In-memory reading store.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use weather_packet::Reading;

use super::{ReadingStore, StoredReading};
use crate::StoreError;

#[derive(Default)]
struct Inner {
    next_id: u64,
    rows: Vec<StoredReading>,
}

/// Non-durable store. Used for `--memory` runs and tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.rows.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert(&self, reading: &Reading) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        inner.next_id += 1;
        let id = inner.next_id;
        inner.rows.push(StoredReading {
            id,
            stored_at: OffsetDateTime::now_utc(),
            reading: reading.clone(),
        });
        Ok(id)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredReading>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.rows.iter().rev().take(limit).cloned().collect())
    }

    async fn delete_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let mut inner = self.inner.write().await;
        let before = inner.rows.len();
        inner.rows.retain(|row| row.stored_at >= cutoff);
        Ok((before - inner.rows.len()) as u64)
    }
}
