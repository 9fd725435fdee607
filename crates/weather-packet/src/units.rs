//! Fixed conversions from the station's canonical integers.
//!
//! Each derived value is computed as an integer count of its last decimal
//! place, rounded half away from zero, and only then scaled to `f64`. Binary
//! float error never decides a rounding.

/// `num / den` rounded half away from zero. `den` must be positive.
pub fn div_round(num: i64, den: i64) -> i64 {
    let q = (2 * num.abs() + den) / (2 * den);
    if num < 0 {
        -q
    } else {
        q
    }
}

fn scaled(units: i64, places: i32) -> f64 {
    units as f64 / 10f64.powi(places)
}

/// Miles per hour to metres per second (x 0.44704), 2 decimals.
pub fn mph_to_ms(mph: u16) -> f64 {
    scaled(div_round(i64::from(mph) * 44_704, 1_000), 2)
}

/// Degrees Fahrenheit to Celsius, 1 decimal.
pub fn fahrenheit_to_celsius(fahrenheit: u16) -> f64 {
    scaled(div_round((i64::from(fahrenheit) - 32) * 50, 9), 1)
}

/// Hundredths of an inch to inches, 2 decimals.
pub fn hundredths_to_inches(hundredths: u16) -> f64 {
    scaled(i64::from(hundredths), 2)
}

/// Hundredths of an inch to millimetres (x 25.4), 1 decimal.
pub fn hundredths_to_mm(hundredths: u16) -> f64 {
    scaled(div_round(i64::from(hundredths) * 254, 100), 1)
}

/// Tenths of a millibar to millibars, 1 decimal.
pub fn tenths_to_mbar(tenths: u32) -> f64 {
    scaled(i64::from(tenths), 1)
}

/// Tenths of a millibar to inches of mercury (mbar x 0.02953), 2 decimals.
pub fn tenths_to_inhg(tenths: u32) -> f64 {
    scaled(div_round(i64::from(tenths) * 2_953, 10_000), 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_div_round_halves_away_from_zero() {
        assert_eq!(div_round(5, 10), 1);
        assert_eq!(div_round(-5, 10), -1);
        assert_eq!(div_round(4, 10), 0);
        assert_eq!(div_round(-1600, 9), -178);
        assert_eq!(div_round(0, 7), 0);
    }

    #[test]
    fn test_freezing_and_below() {
        assert_eq!(fahrenheit_to_celsius(32), 0.0);
        assert_eq!(fahrenheit_to_celsius(0), -17.8);
        assert_eq!(fahrenheit_to_celsius(212), 100.0);
        assert_eq!(fahrenheit_to_celsius(74), 23.3);
    }

    #[test]
    fn test_wind() {
        assert_eq!(mph_to_ms(0), 0.0);
        assert_eq!(mph_to_ms(2), 0.89);
        assert_eq!(mph_to_ms(7), 3.13);
    }

    #[test]
    fn test_rain_and_pressure() {
        assert_eq!(hundredths_to_inches(0), 0.0);
        assert_eq!(hundredths_to_inches(125), 1.25);
        assert_eq!(hundredths_to_mm(100), 25.4);
        assert_eq!(tenths_to_mbar(10132), 1013.2);
        assert_eq!(tenths_to_inhg(10132), 29.92);
        assert_eq!(tenths_to_inhg(9960), 29.41);
    }

    #[test]
    fn test_rain_mm_exact_halves_round_up() {
        // 0.25 in = 6.35 mm, 0.75 in = 19.05 mm, ...
        let cases = [
            (25u16, 6.4),
            (75, 19.1),
            (175, 44.5),
            (575, 146.1),
            (725, 184.2),
        ];
        for (raw, mm) in cases {
            assert_eq!(hundredths_to_mm(raw), mm, "raw {raw}");
        }
    }
}
