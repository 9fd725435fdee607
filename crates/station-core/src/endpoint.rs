//! HTTP endpoint streaming readings as server-sent events.
//!
//! Routes:
//! - `GET /events`: `text/event-stream`; a `status` event on connect and on
//!   every connection change, a `reading` event per published reading, and a
//!   `: keep-alive` comment every keep-alive interval
//! - `GET /status`: connection status and subscriber count as JSON
//! - `GET /metrics`: Prometheus text exposition

use crate::{Broadcaster, ConnectionStatus, DeliveryError, MetricsHub, SubscriberId};
use serde::Serialize;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Take};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, Instant};
use tracing::{debug, info, warn};
use weather_packet::Reading;

const MAX_HEAD_BYTES: usize = 8 * 1024;

const SSE_HEAD: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/event-stream\r\n\
Cache-Control: no-cache\r\n\
Connection: keep-alive\r\n\
Access-Control-Allow-Origin: *\r\n\r\n";

#[derive(Debug, Clone, PartialEq)]
pub struct EndpointConfig {
    pub keepalive: Duration,
    /// Readings buffered per session before it counts as a failed subscriber.
    pub queue_capacity: usize,
    pub head_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            keepalive: Duration::from_secs(15),
            queue_capacity: 64,
            head_timeout: Duration::from_secs(10),
        }
    }
}

pub struct SubscriptionServer {
    broadcaster: Arc<Broadcaster>,
    status: watch::Receiver<ConnectionStatus>,
    metrics: MetricsHub,
    config: EndpointConfig,
}

/// Unregisters its subscriber however the session ends.
struct SessionGuard<'a> {
    broadcaster: &'a Broadcaster,
    id: SubscriberId,
}

impl Drop for SessionGuard<'_> {
    fn drop(&mut self) {
        self.broadcaster.unregister(self.id);
    }
}

#[derive(Debug)]
struct RequestHead {
    method: String,
    path: String,
}

#[derive(Serialize)]
struct StatusBody<'a> {
    connection: &'a ConnectionStatus,
    subscribers: usize,
}

impl SubscriptionServer {
    pub fn new(
        broadcaster: Arc<Broadcaster>,
        status: watch::Receiver<ConnectionStatus>,
        metrics: MetricsHub,
        config: EndpointConfig,
    ) -> Self {
        Self {
            broadcaster,
            status,
            metrics,
            config,
        }
    }

    /// Accept clients forever.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> io::Result<()> {
        info!("subscription endpoint listening on {}", listener.local_addr()?);
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let server = Arc::clone(&self);
                    tokio::spawn(async move {
                        server.handle_connection(stream, peer).await;
                    });
                }
                Err(e) => warn!("accept failed: {}", e),
            }
        }
    }

    async fn handle_connection(&self, stream: TcpStream, peer: SocketAddr) {
        let (rd, mut wr) = stream.into_split();
        let mut reader = BufReader::new(rd);

        let head = match timeout(self.config.head_timeout, read_head(&mut reader)).await {
            Ok(Ok(head)) => head,
            Ok(Err(e)) => {
                debug!("bad request from {}: {}", peer, e);
                let _ = respond(&mut wr, "400 Bad Request", "text/plain", b"bad request\n").await;
                return;
            }
            Err(_) => {
                debug!("request head from {} timed out", peer);
                return;
            }
        };

        let result = match (head.method.as_str(), head.path.as_str()) {
            ("GET", "/events") => self.stream_events(reader, wr, peer).await,
            ("GET", "/status") => {
                let status = self.status.borrow().clone();
                let body = StatusBody {
                    connection: &status,
                    subscribers: self.broadcaster.len(),
                };
                match serde_json::to_vec(&body) {
                    Ok(json) => respond(&mut wr, "200 OK", "application/json", &json).await,
                    Err(e) => Err(io::Error::other(e)),
                }
            }
            ("GET", "/metrics") => {
                let text = self.metrics.encode_text();
                respond(
                    &mut wr,
                    "200 OK",
                    "text/plain; version=0.0.4",
                    text.as_bytes(),
                )
                .await
            }
            ("GET", _) => respond(&mut wr, "404 Not Found", "text/plain", b"not found\n").await,
            _ => {
                respond(
                    &mut wr,
                    "405 Method Not Allowed",
                    "text/plain",
                    b"method not allowed\n",
                )
                .await
            }
        };
        if let Err(e) = result {
            debug!("connection from {} ended with error: {}", peer, e);
        }
    }

    async fn stream_events(
        &self,
        mut reader: BufReader<OwnedReadHalf>,
        mut wr: OwnedWriteHalf,
        peer: SocketAddr,
    ) -> io::Result<()> {
        wr.write_all(SSE_HEAD).await?;

        let mut status = self.status.clone();
        let current = status.borrow_and_update().clone();
        write_event(&mut wr, "status", &current).await?;

        let (tx, mut rx) = mpsc::channel::<Reading>(self.config.queue_capacity.max(1));
        let id = self.broadcaster.register(move |reading: &Reading| {
            tx.try_send(reading.clone()).map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
                mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
            })
        });
        let _session = SessionGuard {
            broadcaster: &self.broadcaster,
            id,
        };
        info!("subscriber {} connected from {}", id, peer);

        let period = self.config.keepalive;
        let mut keepalive = interval_at(Instant::now() + period, period);
        let mut status_live = true;
        let mut scratch = [0u8; 256];

        loop {
            tokio::select! {
                next = rx.recv() => match next {
                    Some(reading) => write_event(&mut wr, "reading", &reading).await?,
                    // dropped by the broadcaster after a failed delivery
                    None => break,
                },
                changed = status.changed(), if status_live => match changed {
                    Ok(()) => {
                        let s = status.borrow_and_update().clone();
                        write_event(&mut wr, "status", &s).await?;
                    }
                    Err(_) => status_live = false,
                },
                _ = keepalive.tick() => {
                    wr.write_all(b": keep-alive\n\n").await?;
                    wr.flush().await?;
                }
                read = reader.read(&mut scratch) => match read {
                    Ok(0) | Err(_) => break,
                    Ok(_) => {}
                },
            }
        }

        info!("subscriber {} disconnected", id);
        Ok(())
    }
}

async fn read_head(reader: &mut BufReader<OwnedReadHalf>) -> io::Result<RequestHead> {
    // bounds what a client can make us buffer
    let mut head = (&mut *reader).take(MAX_HEAD_BYTES as u64);

    let mut request_line = String::new();
    read_head_line(&mut head, &mut request_line).await?;

    // drain headers; none of them change the response
    let mut line = String::new();
    loop {
        line.clear();
        read_head_line(&mut head, &mut line).await?;
        if line == "\r\n" || line == "\n" {
            break;
        }
    }

    let mut parts = request_line.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(method), Some(target), Some(version)) if version.starts_with("HTTP/") => {
            let path = target.split('?').next().unwrap_or(target);
            Ok(RequestHead {
                method: method.to_string(),
                path: path.to_string(),
            })
        }
        _ => Err(io::Error::new(io::ErrorKind::InvalidData, "bad request line")),
    }
}

async fn read_head_line(
    head: &mut Take<&mut BufReader<OwnedReadHalf>>,
    line: &mut String,
) -> io::Result<()> {
    let n = head.read_line(line).await?;
    if line.ends_with('\n') {
        return Ok(());
    }
    if n > 0 && head.limit() == 0 {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "head too large"));
    }
    Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated head"))
}

async fn respond(
    wr: &mut OwnedWriteHalf,
    status: &str,
    content_type: &str,
    body: &[u8],
) -> io::Result<()> {
    let head = format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    wr.write_all(head.as_bytes()).await?;
    wr.write_all(body).await?;
    wr.shutdown().await
}

async fn write_event<T: Serialize>(wr: &mut OwnedWriteHalf, event: &str, value: &T) -> io::Result<()> {
    let data = serde_json::to_string(value).map_err(io::Error::other)?;
    wr.write_all(format!("event: {event}\ndata: {data}\n\n").as_bytes())
        .await?;
    wr.flush().await
}
