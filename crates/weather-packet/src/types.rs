use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::units;

/// Wind speed or gust. `mph` is what the station sends.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub mph: u16,
    pub ms: f64,
}

impl Wind {
    pub fn from_mph(mph: u16) -> Self {
        Self {
            mph,
            ms: units::mph_to_ms(mph),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Temperature {
    pub fahrenheit: u16,
    pub celsius: f64,
}

impl Temperature {
    pub fn from_fahrenheit(fahrenheit: u16) -> Self {
        Self {
            fahrenheit,
            celsius: units::fahrenheit_to_celsius(fahrenheit),
        }
    }
}

/// Accumulated rainfall; the station counts hundredths of an inch.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rainfall {
    pub hundredths_in: u16,
    pub inches: f64,
    pub mm: f64,
}

impl Rainfall {
    /// Raw value the firmware reports when the rain gauge is not responding.
    pub const SENSOR_FAULT: u16 = 453;

    pub fn from_hundredths(hundredths_in: u16) -> Self {
        Self {
            hundredths_in,
            inches: units::hundredths_to_inches(hundredths_in),
            mm: units::hundredths_to_mm(hundredths_in),
        }
    }

    pub fn is_sensor_fault(&self) -> bool {
        self.hundredths_in == Self::SENSOR_FAULT
    }
}

/// Barometric pressure; the station counts tenths of a millibar.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pressure {
    pub tenths_mbar: u32,
    pub mbar: f64,
    pub inhg: f64,
}

impl Pressure {
    pub fn from_tenths(tenths_mbar: u32) -> Self {
        Self {
            tenths_mbar,
            mbar: units::tenths_to_mbar(tenths_mbar),
            inhg: units::tenths_to_inhg(tenths_mbar),
        }
    }
}

/// One decoded sample. Immutable once produced; consumers get copies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub wind_direction_deg: u16,
    /// 1-minute average.
    pub wind_speed: Wind,
    /// 5-minute maximum.
    pub wind_gust: Wind,
    pub temperature: Temperature,
    pub rainfall_1h: Rainfall,
    pub rainfall_24h: Rainfall,
    /// False when either rainfall field carries the gauge fault value.
    pub rainfall_valid: bool,
    pub humidity_pct: u8,
    pub pressure: Pressure,
    /// Packet text after trimming and prefix stripping.
    pub raw: String,
    /// Token after `*`, carried through unverified.
    pub checksum: String,
    #[serde(with = "time::serde::rfc3339")]
    pub captured_at: OffsetDateTime,
}
