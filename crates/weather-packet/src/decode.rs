use time::OffsetDateTime;

use crate::{Pressure, Rainfall, Reading, Rejected, Temperature, Wind};

/// Marker the station bridge prepends when echoing raw packets.
pub const DEBUG_PREFIX: &str = "[RAW]";

/// Shortest line that can hold every fixed field plus a 2-char checksum.
pub const MIN_PACKET_LEN: usize = 36;

const TERMINATOR: char = '*';

// (name, offset, len) into the trimmed packet
const DIRECTION: (&str, usize, usize) = ("wind_direction", 1, 3);
const SPEED: (&str, usize, usize) = ("wind_speed", 5, 3);
const GUST: (&str, usize, usize) = ("wind_gust", 9, 3);
const TEMPERATURE: (&str, usize, usize) = ("temperature", 13, 3);
const RAIN_1H: (&str, usize, usize) = ("rainfall_1h", 17, 3);
const RAIN_24H: (&str, usize, usize) = ("rainfall_24h", 21, 3);
const HUMIDITY: (&str, usize, usize) = ("humidity", 25, 2);
const PRESSURE: (&str, usize, usize) = ("pressure", 28, 5);

/// Trim the line and drop the bridge's debug prefix if present.
pub fn strip_debug_prefix(line: &str) -> &str {
    let trimmed = line.trim();
    match trimmed.strip_prefix(DEBUG_PREFIX) {
        Some(rest) => rest.trim_start(),
        None => trimmed,
    }
}

/// Decode one line, stamping the reading with the current UTC time.
pub fn decode(line: &str) -> Result<Reading, Rejected> {
    decode_at(line, OffsetDateTime::now_utc())
}

/// Decode one line with an explicit capture time.
pub fn decode_at(line: &str, captured_at: OffsetDateTime) -> Result<Reading, Rejected> {
    let packet = strip_debug_prefix(line);

    if packet.len() < MIN_PACKET_LEN {
        return Err(Rejected::TooShort(packet.len()));
    }
    if !packet.starts_with('c') {
        return Err(Rejected::BadStartMarker);
    }
    let terminators = packet.matches(TERMINATOR).count();
    if terminators != 1 {
        return Err(Rejected::TerminatorCount(terminators));
    }
    // Offsets below are byte offsets; multi-byte chars would shift them.
    if !packet.is_ascii() {
        return Err(Rejected::NotAscii);
    }

    let direction = field(packet, DIRECTION)?;
    let speed = field(packet, SPEED)?;
    let gust = field(packet, GUST)?;
    let temperature = field(packet, TEMPERATURE)?;
    let rain_1h = field(packet, RAIN_1H)?;
    let rain_24h = field(packet, RAIN_24H)?;
    let humidity = field(packet, HUMIDITY)?;
    let pressure = field(packet, PRESSURE)?;

    let checksum = packet
        .split_once(TERMINATOR)
        .map(|(_, tail)| tail.to_string())
        .unwrap_or_default();

    let rainfall_1h = Rainfall::from_hundredths(narrow(rain_1h, RAIN_1H.0)?);
    let rainfall_24h = Rainfall::from_hundredths(narrow(rain_24h, RAIN_24H.0)?);

    Ok(Reading {
        wind_direction_deg: narrow(direction, DIRECTION.0)?,
        wind_speed: Wind::from_mph(narrow(speed, SPEED.0)?),
        wind_gust: Wind::from_mph(narrow(gust, GUST.0)?),
        temperature: Temperature::from_fahrenheit(narrow(temperature, TEMPERATURE.0)?),
        rainfall_valid: !(rainfall_1h.is_sensor_fault() || rainfall_24h.is_sensor_fault()),
        rainfall_1h,
        rainfall_24h,
        humidity_pct: narrow(humidity, HUMIDITY.0)?,
        pressure: Pressure::from_tenths(pressure),
        raw: packet.to_string(),
        checksum,
        captured_at,
    })
}

fn field(packet: &str, (name, offset, len): (&'static str, usize, usize)) -> Result<u32, Rejected> {
    let digits = packet
        .get(offset..offset + len)
        .ok_or(Rejected::BadField(name))?;
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Rejected::BadField(name));
    }
    digits.parse::<u32>().map_err(|_| Rejected::BadField(name))
}

fn narrow<T: TryFrom<u32>>(value: u32, name: &'static str) -> Result<T, Rejected> {
    T::try_from(value).map_err(|_| Rejected::BadField(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time() -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(1_771_400_000).unwrap()
    }

    #[test]
    fn test_decode_reference_packet() {
        let r = decode_at("c090s002g007t074r010p010h46b09960*30", fixed_time()).unwrap();

        assert_eq!(r.wind_direction_deg, 90);
        assert_eq!(r.wind_speed.mph, 2);
        assert_eq!(r.wind_speed.ms, 0.89);
        assert_eq!(r.wind_gust.mph, 7);
        assert_eq!(r.wind_gust.ms, 3.13);
        assert_eq!(r.temperature.fahrenheit, 74);
        assert_eq!(r.temperature.celsius, 23.3);
        assert_eq!(r.rainfall_1h.inches, 0.1);
        assert_eq!(r.rainfall_1h.mm, 2.5);
        assert_eq!(r.rainfall_24h.inches, 0.1);
        assert_eq!(r.humidity_pct, 46);
        assert_eq!(r.pressure.mbar, 996.0);
        assert_eq!(r.pressure.inhg, 29.41);
        assert_eq!(r.checksum, "30");
        assert_eq!(r.raw, "c090s002g007t074r010p010h46b09960*30");
        assert!(r.rainfall_valid);
        assert_eq!(r.captured_at, fixed_time());
    }

    #[test]
    fn test_debug_prefix_is_stripped() {
        let prefixed =
            decode_at("[RAW] c135s000g005t073r000p000h45b09960*3A", fixed_time()).unwrap();
        let bare = decode_at("c135s000g005t073r000p000h45b09960*3A", fixed_time()).unwrap();

        assert_eq!(prefixed, bare);
        assert_eq!(prefixed.wind_direction_deg, 135);
        assert_eq!(prefixed.wind_speed.mph, 0);
        assert_eq!(prefixed.wind_speed.ms, 0.0);
        assert_eq!(prefixed.checksum, "3A");
    }

    #[test]
    fn test_surrounding_whitespace_and_crlf() {
        let r = decode_at("  c000s000g000t086r000p000h53b10020*3E\r\n", fixed_time()).unwrap();
        assert_eq!(r.raw, "c000s000g000t086r000p000h53b10020*3E");
        assert_eq!(r.pressure.mbar, 1002.0);
        assert_eq!(r.temperature.celsius, 30.0);
    }

    #[test]
    fn test_rejections() {
        assert_eq!(decode("bad-data"), Err(Rejected::TooShort(8)));
        assert_eq!(
            decode("x090s002g007t074r010p010h46b09960*30"),
            Err(Rejected::BadStartMarker)
        );
        assert_eq!(
            decode("c090s002g007t074r010p010h46b0996030X"),
            Err(Rejected::TerminatorCount(0))
        );
        assert_eq!(
            decode("c090s002g007t074r010p010h46b09960*3*"),
            Err(Rejected::TerminatorCount(2))
        );
        assert_eq!(
            decode("c09Xs002g007t074r010p010h46b09960*30"),
            Err(Rejected::BadField("wind_direction"))
        );
        assert_eq!(
            decode("c090s002g007t074r010p010h46b0996*030"),
            Err(Rejected::BadField("pressure"))
        );
        assert_eq!(
            decode("c090s002g007t0é4r010p010h46b09960*30"),
            Err(Rejected::NotAscii)
        );
        assert_eq!(decode(""), Err(Rejected::TooShort(0)));
    }

    #[test]
    fn test_short_after_prefix_strip() {
        assert_eq!(
            decode("[RAW] c090s002g007t074r010p010h46b099"),
            Err(Rejected::TooShort(31))
        );
    }

    #[test]
    fn test_rain_gauge_fault_marks_rainfall_invalid() {
        let r = decode_at("c000s000g000t075r453p453h45b09830*3A", fixed_time()).unwrap();
        assert!(!r.rainfall_valid);
        assert_eq!(r.rainfall_1h.hundredths_in, 453);
        assert_eq!(r.pressure.mbar, 983.0);
    }

    #[test]
    fn test_decode_is_deterministic() {
        let line = "c270s013g021t041r037p112h88b10135*5F";
        let a = decode_at(line, fixed_time()).unwrap();
        let b = decode_at(line, fixed_time()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.wind_speed.ms.to_bits(), b.wind_speed.ms.to_bits());
        assert_eq!(a.pressure.inhg.to_bits(), b.pressure.inhg.to_bits());
    }

    /// `value` must equal `units / 10^places` exactly as a decimal.
    fn assert_decimal(value: f64, units: i64, places: usize) {
        let scale = 10i64.pow(places as u32);
        let sign = if units < 0 { "-" } else { "" };
        let whole = (units / scale).abs();
        let frac = (units % scale).abs();
        let expected = format!("{sign}{whole}.{frac:0>places$}");
        assert_eq!(format!("{value:.places$}"), expected);
        assert_eq!(value, expected.parse::<f64>().unwrap());
    }

    /// Half-away-from-zero division kept separate from the crate's helper.
    fn half_away(num: i64, den: i64) -> i64 {
        let (q, r) = (num / den, num % den);
        if 2 * r.abs() >= den {
            q + num.signum()
        } else {
            q
        }
    }

    #[test]
    fn test_derived_units_recompute_exactly() {
        for speed in [0u16, 1, 2, 7, 13, 55, 120, 999] {
            for temp in [0u16, 14, 31, 32, 73, 74, 101, 999] {
                for rain in [0u16, 1, 5, 10, 25, 37, 75, 175, 453, 575, 725, 999] {
                    let line = format!(
                        "c180s{speed:03}g{speed:03}t{temp:03}r{rain:03}p{rain:03}h50b10013*00"
                    );
                    let r = decode_at(&line, fixed_time()).unwrap();
                    let speed = i64::from(speed);
                    let temp = i64::from(temp);
                    let rain = i64::from(rain);
                    assert_decimal(r.wind_speed.ms, half_away(speed * 44_704, 1_000), 2);
                    assert_decimal(r.wind_gust.ms, half_away(speed * 44_704, 1_000), 2);
                    assert_decimal(r.temperature.celsius, half_away((temp - 32) * 50, 9), 1);
                    assert_decimal(r.rainfall_24h.inches, rain, 2);
                    assert_decimal(r.rainfall_24h.mm, half_away(rain * 254, 100), 1);
                    assert_decimal(r.pressure.mbar, 10_013, 1);
                    assert_decimal(r.pressure.inhg, half_away(10_013 * 2_953, 10_000), 2);
                }
            }
        }
    }

    #[test]
    fn test_rain_mm_half_cases_round_away_from_zero() {
        for (raw, mm) in [(25, 6.4), (75, 19.1), (175, 44.5), (575, 146.1), (725, 184.2)] {
            let line = format!("c000s000g000t070r{raw:03}p{raw:03}h40b10000*00");
            let r = decode_at(&line, fixed_time()).unwrap();
            assert_eq!(r.rainfall_1h.mm, mm, "raw {raw}");
            assert_eq!(r.rainfall_24h.mm, mm, "raw {raw}");
        }
    }

    #[test]
    fn test_pressure_recomputes_across_range() {
        for tenths in (0..100_000i64).step_by(7) {
            let line = format!("c000s000g000t070r000p000h40b{tenths:05}*00");
            let r = decode_at(&line, fixed_time()).unwrap();
            assert_decimal(r.pressure.mbar, tenths, 1);
            assert_decimal(r.pressure.inhg, half_away(tenths * 2_953, 10_000), 2);
        }
    }

    #[test]
    fn test_reading_serializes_with_rfc3339_timestamp() {
        let r = decode_at("c090s002g007t074r010p010h46b09960*30", fixed_time()).unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["captured_at"], "2026-02-18T07:33:20Z");
        assert_eq!(json["wind_speed"]["ms"], 0.89);
        let back: Reading = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
