//! Append-only JSON-lines reading store.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, warn};
use weather_packet::Reading;

use super::{ReadingStore, StoredReading};
use crate::StoreError;

/// One [`StoredReading`] per line. Appends are serialized through a mutex,
/// so ids and file order both follow insert order. Pruning rewrites the file
/// through a temporary sibling and a rename.
///
/// The highest id ever issued is kept in a `<name>.seq` sibling, so ids keep
/// increasing across restarts even if the data file is emptied or truncated.
pub struct JsonlStore {
    path: PathBuf,
    next_id: Mutex<u64>,
}

impl JsonlStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let rows = read_rows(&path).await?;
        let last_row = rows.iter().map(|r| r.id).max().unwrap_or(0);
        let last_id = last_row.max(read_high_water(&seq_path(&path)).await?);
        info!(
            "reading store {} holds {} readings",
            path.display(),
            rows.len()
        );
        Ok(Self {
            path,
            next_id: Mutex::new(last_id + 1),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ReadingStore for JsonlStore {
    async fn insert(&self, reading: &Reading) -> Result<u64, StoreError> {
        let mut next_id = self.next_id.lock().await;
        let row = StoredReading {
            id: *next_id,
            stored_at: OffsetDateTime::now_utc(),
            reading: reading.clone(),
        };
        let mut line = serde_json::to_vec(&row)?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        fs::write(seq_path(&self.path), row.id.to_string()).await?;

        *next_id += 1;
        Ok(row.id)
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<StoredReading>, StoreError> {
        let _guard = self.next_id.lock().await;
        let rows = read_rows(&self.path).await?;
        Ok(rows.into_iter().rev().take(limit).collect())
    }

    async fn delete_older_than(&self, cutoff: OffsetDateTime) -> Result<u64, StoreError> {
        let _guard = self.next_id.lock().await;
        let rows = read_rows(&self.path).await?;
        let before = rows.len();
        let kept: Vec<StoredReading> = rows.into_iter().filter(|r| r.stored_at >= cutoff).collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let mut buf = Vec::new();
        for row in &kept {
            serde_json::to_writer(&mut buf, row)?;
            buf.push(b'\n');
        }
        let tmp = tmp_path(&self.path);
        fs::write(&tmp, &buf).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(removed as u64)
    }
}

async fn read_rows(path: &Path) -> Result<Vec<StoredReading>, StoreError> {
    let contents = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut rows = Vec::new();
    for (n, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<StoredReading>(line) {
            Ok(row) => rows.push(row),
            // a torn final write after a crash should not poison the store
            Err(e) => warn!("{}:{}: skipping unreadable row: {}", path.display(), n + 1, e),
        }
    }
    Ok(rows)
}

async fn read_high_water(path: &Path) -> Result<u64, StoreError> {
    let contents = match fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };
    match contents.trim().parse() {
        Ok(id) => Ok(id),
        Err(e) => {
            warn!("{}: ignoring unreadable id mark: {}", path.display(), e);
            Ok(0)
        }
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    path.with_file_name(name)
}

fn tmp_path(path: &Path) -> PathBuf {
    sibling(path, ".tmp")
}

fn seq_path(path: &Path) -> PathBuf {
    sibling(path, ".seq")
}
