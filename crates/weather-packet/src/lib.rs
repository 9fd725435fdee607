//! weather-packet: decoder for SEN0186 weather station packets
//!
//! The station emits one fixed-width ASCII line per sample, for example
//! `c090s002g007t074r010p010h46b09960*30`. [`decode`] turns such a line into
//! a [`Reading`] with every measurement in both imperial and metric units.
//! Decoding is pure: no I/O, no state.

mod types;
pub use types::{Pressure, Rainfall, Reading, Temperature, Wind};

mod error;
pub use error::Rejected;

pub mod units;

mod decode;
pub use decode::{decode, decode_at, strip_debug_prefix, DEBUG_PREFIX, MIN_PACKET_LEN};
