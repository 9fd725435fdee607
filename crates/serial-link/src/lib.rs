//! serial-link: line-oriented serial connections
//!
//! This crate provides the [`Connector`]/[`LineSource`] pair used to reach a
//! weather station over a serial port, port discovery over the host's device
//! list, and feature-gated backends. The default build enables a `mock`
//! backend so that binaries and tests run on any host without hardware.

mod types;
pub use types::{PortInfo, PortKind};

mod error;
pub use error::{LinkError, Result};

mod traits;
pub use traits::{Connector, LineSource};

mod framing;
pub use framing::{LineBuffer, MAX_LINE_LEN};

pub mod discover;
pub use discover::{resolve_port, select_port, PortChoice, FALLBACK_PORT, KNOWN_ADAPTERS};

#[cfg(feature = "mock")]
mod mock;

#[cfg(feature = "mock")]
pub use mock::{MockConnector, MockOpen};

#[cfg(feature = "serial")]
mod serial;

#[cfg(feature = "serial")]
pub use serial::SerialConnector;
