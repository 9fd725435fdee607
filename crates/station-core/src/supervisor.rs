use crate::{
    spawn_reader, Backoff, BackoffConfig, ConnectionStatus, Ingestor, LinkPhase, MetricsHub,
    SupervisorError,
};
use serial_link::{resolve_port, Connector, LineSource, LinkError, PortChoice};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{info, warn};

/// Baud rate of the station bridge's USB console.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

const LINE_QUEUE: usize = 64;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SupervisorConfig {
    /// Operator port override; skips discovery.
    pub port: Option<String>,
    pub baud_rate: Option<u32>,
    pub backoff: BackoffConfig,
}

/// Sole owner of the serial connection.
///
/// [`Supervisor::run`] keeps exactly one connection attempt or open link at a
/// time and retries forever with capped exponential backoff. Everyone else
/// observes the connection through [`Supervisor::subscribe_status`].
pub struct Supervisor {
    connector: Arc<dyn Connector>,
    config: SupervisorConfig,
    status: watch::Sender<ConnectionStatus>,
    running: AtomicBool,
    metrics: MetricsHub,
}

struct RunGuard<'a>(&'a AtomicBool);

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Supervisor {
    pub fn new(connector: Arc<dyn Connector>, config: SupervisorConfig, metrics: MetricsHub) -> Self {
        let baud_rate = config.baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
        let (status, _) = watch::channel(ConnectionStatus::closed(baud_rate));
        Self {
            connector,
            config,
            status,
            running: AtomicBool::new(false),
            metrics,
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    /// Connect, ingest, and reconnect until the future is dropped.
    pub async fn run(&self, ingestor: Ingestor) -> Result<(), SupervisorError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SupervisorError::AlreadyRunning);
        }
        let _guard = RunGuard(&self.running);

        let baud_rate = self.config.baud_rate.unwrap_or(DEFAULT_BAUD_RATE);
        let port_override = self.config.port.clone();
        let mut backoff = Backoff::new(&self.config.backoff);

        loop {
            self.status.send_modify(|s| {
                s.phase = LinkPhase::Opening;
                s.next_retry_at = None;
            });

            let (choice, opened) = self.open(port_override.clone(), baud_rate).await;
            let port = choice.as_ref().map(|c| c.path().to_string());
            self.status.send_modify(|s| s.port = port.clone());
            let port = port.unwrap_or_default();

            match opened {
                Ok(source) => {
                    backoff.reset();
                    info!("serial link open on {} at {} baud", port, baud_rate);
                    self.metrics.station.link_open.set(1);
                    self.status.send_modify(|s| {
                        s.phase = LinkPhase::Open;
                        s.last_error = None;
                        s.retry_delay_ms = 0;
                    });

                    let (lines, _reader) = spawn_reader(source, LINE_QUEUE);
                    let reason = ingestor.run(lines).await;

                    self.metrics.station.link_open.set(0);
                    warn!("serial link on {} ended: {}", port, reason);
                    self.status.send_modify(|s| {
                        s.phase = if reason == LinkError::Closed {
                            LinkPhase::Closed
                        } else {
                            LinkPhase::Error
                        };
                        s.last_error = Some(reason.to_string());
                    });
                }
                Err(e) => {
                    self.metrics.station.open_failures.inc();
                    if e.is_busy() {
                        warn!(
                            "{} is held by another process (close any serial monitor); will retry",
                            port
                        );
                    } else {
                        warn!("cannot open {}: {}", port, e);
                    }
                    self.status.send_modify(|s| {
                        s.phase = LinkPhase::Error;
                        s.last_error = Some(e.to_string());
                    });
                }
            }

            let delay = backoff.next_delay();
            self.schedule_retry(delay);
            tokio::time::sleep(delay).await;
        }
    }

    async fn open(
        &self,
        port_override: Option<String>,
        baud_rate: u32,
    ) -> (Option<PortChoice>, Result<Box<dyn LineSource>, LinkError>) {
        let connector = Arc::clone(&self.connector);
        let attempt = tokio::task::spawn_blocking(move || {
            let choice = resolve_port(port_override.as_deref(), connector.as_ref());
            let opened = connector.open(choice.path(), baud_rate);
            (choice, opened)
        })
        .await;
        match attempt {
            Ok((choice, opened)) => (Some(choice), opened),
            Err(e) => (None, Err(LinkError::Io(format!("open task failed: {e}")))),
        }
    }

    fn schedule_retry(&self, delay: Duration) {
        let at = OffsetDateTime::now_utc() + delay;
        info!("retrying serial link in {:?}", delay);
        self.status.send_modify(|s| {
            s.retry_delay_ms = nearest_millis(delay);
            s.next_retry_at = Some(at);
        });
    }
}

/// Whole milliseconds, halves rounded up.
fn nearest_millis(delay: Duration) -> u64 {
    ((delay.as_micros() + 500) / 1000) as u64
}
