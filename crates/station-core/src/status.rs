use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkPhase {
    Closed,
    Opening,
    Open,
    Error,
}

/// Snapshot of the serial connection, written only by the supervisor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConnectionStatus {
    pub phase: LinkPhase,
    pub port: Option<String>,
    pub baud_rate: u32,
    /// Pending backoff delay, to the nearest millisecond.
    pub retry_delay_ms: u64,
    /// Set while a reconnect sleep is pending.
    #[serde(with = "time::serde::rfc3339::option")]
    pub next_retry_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
}

impl ConnectionStatus {
    pub fn closed(baud_rate: u32) -> Self {
        Self {
            phase: LinkPhase::Closed,
            port: None,
            baud_rate,
            retry_delay_ms: 0,
            next_retry_at: None,
            last_error: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.phase == LinkPhase::Open
    }
}
