//! ReadingStore trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use weather_packet::Reading;

use crate::StoreError;

/// A reading as the store keeps it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    /// Monotonically increasing, assigned by the store, never reused.
    pub id: u64,
    /// Assigned by the store at insert; normally equal to `reading.captured_at`.
    #[serde(with = "time::serde::rfc3339")]
    pub stored_at: OffsetDateTime,
    pub reading: Reading,
}

/// Trait for durable reading storage.
///
/// The ingestion pipeline only appends and prunes; `list_recent` serves
/// consumers outside the pipeline.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Append a reading, returning its id.
    async fn insert(&self, reading: &Reading) -> Result<u64, StoreError>;

    /// Up to `limit` readings, most recent first.
    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredReading>, StoreError>;

    /// Delete every reading stored before `cutoff`, returning how many went.
    async fn delete_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError>;
}
