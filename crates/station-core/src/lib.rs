//! station-core: the weather station ingestion pipeline
//!
//! This crate wires the pieces between the serial port and the outside world:
//! - [`Supervisor`] owns the one serial connection and retries with backoff
//! - [`Ingestor`] decodes lines and hands readings on
//! - [`Broadcaster`] fans readings out to live subscribers
//! - [`ReadingStore`] implementations and the persistence worker keep history
//! - [`SubscriptionServer`] streams status and readings to HTTP clients

mod error;
pub use error::{ConfigError, StoreError, SupervisorError};

pub mod config;
pub use config::{BackoffConfig, StationConfig};

mod backoff;
pub use backoff::Backoff;

mod status;
pub use status::{ConnectionStatus, LinkPhase};

mod metrics;
pub use metrics::{MetricsHub, StationMetrics};

mod broadcast;
pub use broadcast::{Broadcaster, DeliveryError, SubscriberId};

pub mod store;
pub use store::{JsonlStore, MemoryStore, ReadingStore, StoredReading};

mod persist;
pub use persist::{spawn_persist_worker, PersistHandle, RetentionPolicy};

mod ingest;
pub use ingest::{spawn_reader, Ingestor};

mod supervisor;
pub use supervisor::{Supervisor, SupervisorConfig, DEFAULT_BAUD_RATE};

mod endpoint;
pub use endpoint::{EndpointConfig, SubscriptionServer};

pub use weather_packet::Reading;
