use crate::{Broadcaster, MetricsHub, PersistHandle};
use serial_link::{LineSource, LinkError};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use weather_packet::Reading;

/// Decodes lines and hands each reading to the broadcaster and the store.
#[derive(Clone)]
pub struct Ingestor {
    broadcaster: Arc<Broadcaster>,
    persist: PersistHandle,
    metrics: MetricsHub,
}

impl Ingestor {
    pub fn new(broadcaster: Arc<Broadcaster>, persist: PersistHandle, metrics: MetricsHub) -> Self {
        Self {
            broadcaster,
            persist,
            metrics,
        }
    }

    /// Process one line. Malformed lines are dropped quietly.
    pub fn handle_line(&self, line: &str) -> Option<Reading> {
        self.metrics.station.lines.inc();
        let reading = match weather_packet::decode(line) {
            Ok(r) => r,
            Err(e) => {
                debug!("discarding line {:?}: {}", line, e);
                self.metrics.station.rejected.inc();
                return None;
            }
        };
        self.metrics.station.readings.inc();
        self.broadcaster.publish(&reading);
        self.persist.dispatch(reading.clone());
        Some(reading)
    }

    /// Consume lines until the link reports an error, returning it.
    pub async fn run(&self, mut lines: mpsc::Receiver<Result<String, LinkError>>) -> LinkError {
        while let Some(item) = lines.recv().await {
            match item {
                Ok(line) => {
                    self.handle_line(&line);
                }
                Err(e) => return e,
            }
        }
        LinkError::Closed
    }
}

/// Drive a blocking `source` on the blocking pool, forwarding lines.
///
/// The thread stops after forwarding the first error, or once the receiver
/// is dropped.
pub fn spawn_reader(
    mut source: Box<dyn LineSource>,
    capacity: usize,
) -> (mpsc::Receiver<Result<String, LinkError>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let task = tokio::task::spawn_blocking(move || loop {
        match source.read_line() {
            Ok(Some(line)) => {
                if tx.blocking_send(Ok(line)).is_err() {
                    break;
                }
            }
            Ok(None) => {
                if tx.is_closed() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.blocking_send(Err(e));
                break;
            }
        }
    });
    (rx, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{spawn_persist_worker, MemoryStore, RetentionPolicy, ReadingStore};
    use serial_link::{Connector, MockConnector, MockOpen};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_lines_flow_to_subscribers_and_store() -> anyhow::Result<()> {
        let metrics = MetricsHub::new()?;
        let store = Arc::new(MemoryStore::new());
        let broadcaster = Arc::new(Broadcaster::new());
        let (persist, worker) = spawn_persist_worker(
            store.clone(),
            RetentionPolicy::default(),
            metrics.clone(),
            16,
        );
        let ingestor = Ingestor::new(broadcaster.clone(), persist, metrics.clone());

        let seen = Arc::new(AtomicUsize::new(0));
        let s = seen.clone();
        broadcaster.register(move |_: &Reading| {
            s.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let connector = MockConnector::with_script(
            vec![],
            vec![MockOpen::Lines(vec![
                "[RAW] c090s002g007t074r010p010h46b09960*30".into(),
                "bad-data".into(),
                "".into(),
                "c135s000g005t073r000p000h45b09960*3A".into(),
            ])],
        );
        let source = connector.open("/dev/mock", 115200)?;
        let (rx, reader) = spawn_reader(source, 8);

        let reason = ingestor.run(rx).await;
        assert_eq!(reason, LinkError::Closed);
        reader.await?;

        drop(ingestor);
        worker.await?;

        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(metrics.station.lines.get(), 4);
        assert_eq!(metrics.station.rejected.get(), 2);
        assert_eq!(metrics.station.readings.get(), 2);
        let stored = store.list_recent(10).await?;
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].reading.wind_direction_deg, 135);
        assert_eq!(stored[1].reading.raw, "c090s002g007t074r010p010h46b09960*30");
        Ok(())
    }

    #[tokio::test]
    async fn test_reader_stops_when_loop_goes_away() -> anyhow::Result<()> {
        let connector =
            MockConnector::with_script(vec![], vec![MockOpen::LinesThenIdle(Vec::new())]);
        let source = connector.open("/dev/mock", 115200)?;
        let (rx, reader) = spawn_reader(source, 8);
        drop(rx);
        reader.await?;
        Ok(())
    }
}
