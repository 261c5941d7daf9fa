//! Exact decimal amounts for price arithmetic.
//!
//! Prices arrive as JSON numbers or strings and must be multiplied and summed
//! without binary floating-point drift (`0.19 * 3` has to be `0.57`).

use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Maximum number of significant digits accepted when parsing.
const MAX_DIGITS: usize = 30;

/// Significant digits kept by arithmetic results.
pub const PRECISION: u32 = 28;

fn digit_count(units: i128) -> u32 {
    units.unsigned_abs().checked_ilog10().map_or(1, |d| d + 1)
}

/// A fixed-point decimal: `units * 10^-scale`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decimal {
    units: i128,
    scale: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid decimal literal: {0}")]
pub struct ParseDecimalError(String);

impl Decimal {
    pub const ZERO: Decimal = Decimal { units: 0, scale: 0 };

    pub fn new(units: i128, scale: u32) -> Self {
        Self { units, scale }
    }

    /// Number of digits after the decimal point.
    pub fn scale(&self) -> u32 {
        self.scale
    }

    fn rescale(self, scale: u32) -> Option<Self> {
        if scale < self.scale {
            return None;
        }
        let factor = 10i128.checked_pow(scale - self.scale)?;
        Some(Self {
            units: self.units.checked_mul(factor)?,
            scale,
        })
    }

    /// Sum rounded to [`PRECISION`] significant digits.
    pub fn checked_add(self, other: Decimal) -> Option<Decimal> {
        let scale = self.scale.max(other.scale);
        if let (Some(a), Some(b)) = (self.rescale(scale), other.rescale(scale))
            && let Some(units) = a.units.checked_add(b.units)
        {
            return Some(Self { units, scale }.round_to_precision());
        }

        // Too far apart to share a scale: round both just below the larger one's precision
        let lead = self.leading_exponent().max(other.leading_exponent());
        let target = (i64::from(PRECISION) + 1 - lead).clamp(0, i64::from(scale));
        let target = u32::try_from(target).ok()?;
        let a = self.round_to_scale(target.min(self.scale)).rescale(target)?;
        let b = other.round_to_scale(target.min(other.scale)).rescale(target)?;
        Some(
            Self {
                units: a.units.checked_add(b.units)?,
                scale: target,
            }
            .round_to_precision(),
        )
    }

    pub fn checked_mul_int(self, factor: i64) -> Option<Decimal> {
        Some(
            Self {
                units: self.units.checked_mul(i128::from(factor))?,
                scale: self.scale,
            }
            .round_to_precision(),
        )
    }

    /// Digits to the left of the decimal point (negative for small fractions).
    fn leading_exponent(&self) -> i64 {
        i64::from(digit_count(self.units)) - i64::from(self.scale)
    }

    /// Round half-even to at most `scale` fractional digits.
    fn round_to_scale(self, scale: u32) -> Self {
        if scale >= self.scale {
            return self;
        }
        let Some(divisor) = 10i128.checked_pow(self.scale - scale) else {
            // Every representable value is below half a unit at this scale
            return Self { units: 0, scale };
        };

        let quotient = self.units / divisor;
        let remainder = (self.units % divisor).abs();
        let half = divisor / 2;
        let round_away = remainder > half || (remainder == half && quotient % 2 != 0);
        let units = if round_away {
            quotient + self.units.signum()
        } else {
            quotient
        };
        Self { units, scale }
    }

    /// Drop fractional digits beyond [`PRECISION`] significant digits.
    fn round_to_precision(self) -> Self {
        let excess = digit_count(self.units).saturating_sub(PRECISION);
        if excess == 0 {
            return self;
        }
        self.round_to_scale(self.scale.saturating_sub(excess))
    }

    /// JSON rendering: integral amounts (scale 0) become JSON integers,
    /// everything else a JSON float.
    pub fn to_json(&self) -> serde_json::Value {
        if self.scale == 0
            && let Ok(int) = i64::try_from(self.units)
        {
            return serde_json::Value::from(int);
        }
        self.to_string()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(serde_json::Value::Number)
            .unwrap_or_else(|| serde_json::Value::String(self.to_string()))
    }
}

impl FromStr for Decimal {
    type Err = ParseDecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseDecimalError(s.to_string());
        let trimmed = s.trim();

        let (mantissa, exponent) = match trimmed.find(['e', 'E']) {
            Some(pos) => {
                let exp: i32 = trimmed[pos + 1..].parse().map_err(|_| err())?;
                (&trimmed[..pos], exp)
            }
            None => (trimmed, 0),
        };

        let (negative, digits) = match mantissa.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, mantissa.strip_prefix('+').unwrap_or(mantissa)),
        };

        let (int_part, frac_part) = match digits.split_once('.') {
            Some((i, f)) => (i, f),
            None => (digits, ""),
        };

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(err());
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(err());
        }
        if int_part.len() + frac_part.len() > MAX_DIGITS {
            return Err(err());
        }

        let mut units: i128 = 0;
        for b in int_part.bytes().chain(frac_part.bytes()) {
            units = units * 10 + i128::from(b - b'0');
        }
        if negative {
            units = -units;
        }

        let mut scale = frac_part.len() as i64 - i64::from(exponent);
        if scale < 0 {
            let factor = u32::try_from(-scale)
                .ok()
                .and_then(|p| 10i128.checked_pow(p))
                .ok_or_else(err)?;
            units = units.checked_mul(factor).ok_or_else(err)?;
            scale = 0;
        }
        let scale = u32::try_from(scale).map_err(|_| err())?;
        if scale as usize > MAX_DIGITS * 2 {
            return Err(err());
        }

        Ok(Self { units, scale })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.units < 0 { "-" } else { "" };
        let digits = self.units.unsigned_abs().to_string();
        if self.scale == 0 {
            return write!(f, "{sign}{digits}");
        }
        let scale = self.scale as usize;
        let padded = format!("{digits:0>width$}", width = scale + 1);
        let (int_part, frac_part) = padded.split_at(padded.len() - scale);
        write!(f, "{sign}{int_part}.{frac_part}")
    }
}

impl Serialize for Decimal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

struct DecimalVisitor;

impl Visitor<'_> for DecimalVisitor {
    type Value = Decimal;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a decimal number or numeric string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Decimal, E> {
        v.parse().map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Decimal, E> {
        Ok(Decimal::new(i128::from(v), 0))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Decimal, E> {
        Ok(Decimal::new(i128::from(v), 0))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Decimal, E> {
        if !v.is_finite() {
            return Err(E::custom("non-finite decimal"));
        }
        v.to_string().parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Decimal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DecimalVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("0.19".parse::<Decimal>().unwrap().to_string(), "0.19");
        assert_eq!("-1.5".parse::<Decimal>().unwrap().to_string(), "-1.5");
        assert_eq!("42".parse::<Decimal>().unwrap().to_string(), "42");
        assert_eq!(".5".parse::<Decimal>().unwrap().to_string(), "0.5");
        assert_eq!("1e2".parse::<Decimal>().unwrap().to_string(), "100");
        assert_eq!("1.5e-3".parse::<Decimal>().unwrap().to_string(), "0.0015");
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("".parse::<Decimal>().is_err());
        assert!("abc".parse::<Decimal>().is_err());
        assert!("1.2.3".parse::<Decimal>().is_err());
        assert!(".".parse::<Decimal>().is_err());
        assert!("1e".parse::<Decimal>().is_err());
    }

    #[test]
    fn test_exact_arithmetic() {
        let price: Decimal = "0.19".parse().unwrap();
        let total = Decimal::ZERO
            .checked_add(price.checked_mul_int(3).unwrap())
            .unwrap();
        assert_eq!(total.to_string(), "0.57");
        assert_eq!(total.to_json(), serde_json::json!(0.57));
    }

    #[test]
    fn test_distant_magnitudes_round_to_precision() {
        let tiny: Decimal = "1e-50".parse().unwrap();
        let one: Decimal = "1".parse().unwrap();

        let total = tiny.checked_add(one).unwrap();
        assert_eq!(total.to_string(), format!("1.{}", "0".repeat(27)));
        assert_eq!(total.to_json(), serde_json::json!(1.0));
        assert_eq!(one.checked_add(tiny), Some(total));
    }

    #[test]
    fn test_rounding_is_half_even() {
        let base: Decimal = "1000000000000000000000000000".parse().unwrap();
        let half: Decimal = "0.5".parse().unwrap();
        let rounded = base.checked_add(half).unwrap();
        assert_eq!(rounded.to_string(), "1000000000000000000000000000");

        let odd: Decimal = "1000000000000000000000000001".parse().unwrap();
        assert_eq!(
            odd.checked_add(half).unwrap().to_string(),
            "1000000000000000000000000002"
        );
    }

    #[test]
    fn test_json_rendering_keeps_scale() {
        let price: Decimal = "1.50".parse().unwrap();
        let total = price.checked_mul_int(2).unwrap();
        assert_eq!(total.to_string(), "3.00");
        assert!(total.to_json().is_f64());

        let whole: Decimal = "7".parse().unwrap();
        assert_eq!(whole.checked_mul_int(3).unwrap().to_json(), serde_json::json!(21));
    }

    #[test]
    fn test_deserialize_from_number_and_string() {
        let from_float: Decimal = serde_json::from_str("0.19").unwrap();
        let from_str: Decimal = serde_json::from_str("\"0.19\"").unwrap();
        let from_int: Decimal = serde_json::from_str("5").unwrap();
        assert_eq!(from_float, from_str);
        assert_eq!(from_int.to_string(), "5");
    }
}
