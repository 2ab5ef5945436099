//! Unit conversion between human-entered values and the ledger's wire form.
//!
//! Monetary values on the ledger are unsigned integers scaled by `10^18`.
//! [`Amount`] keeps the exact integer together with its scale, so no
//! conversion here ever passes through binary floating point.
//!
//! Timestamps are integer seconds on the wire. Only
//! [`epoch_millis_to_date_label`] works in milliseconds.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Local, NaiveDate, TimeZone, Utc};
use num_bigint::BigUint;
use serde::{Serialize, Serializer};

use crate::errors::{ClientError, Result};

/// Scale of every monetary field on the Genesis contract (wei per ether).
pub const ETHER_DECIMALS: u32 = 18;

const UINT256_BITS: u64 = 256;

/// An exact, non-negative decimal value: `raw / 10^decimals`.
#[derive(Debug, Clone)]
pub struct Amount {
    raw: BigUint,
    decimals: u32,
}

impl Amount {
    pub fn from_fixed_point(raw: BigUint, decimals: u32) -> Self {
        Self { raw, decimals }
    }

    pub fn zero() -> Self {
        Self::from_fixed_point(BigUint::default(), 0)
    }

    pub fn raw(&self) -> &BigUint {
        &self.raw
    }

    pub fn decimals(&self) -> u32 {
        self.decimals
    }

    pub fn is_zero(&self) -> bool {
        self.raw.bits() == 0
    }

    /// Rescale to `decimals`. Digits beyond the target scale are truncated.
    pub fn to_fixed_point(&self, decimals: u32) -> BigUint {
        match decimals.cmp(&self.decimals) {
            Ordering::Equal => self.raw.clone(),
            Ordering::Greater => &self.raw * pow10(decimals - self.decimals),
            Ordering::Less => &self.raw / pow10(self.decimals - decimals),
        }
    }
}

impl PartialEq for Amount {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Amount {}

impl PartialOrd for Amount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Amount {
    fn cmp(&self, other: &Self) -> Ordering {
        let scale = self.decimals.max(other.decimals);
        self.to_fixed_point(scale).cmp(&other.to_fixed_point(scale))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = pow10(self.decimals);
        let whole = &self.raw / &scale;
        let fraction = &self.raw % &scale;

        let digits = format!(
            "{:0>width$}",
            fraction.to_str_radix(10),
            width = self.decimals as usize
        );
        let digits = digits.trim_end_matches('0');
        let digits = if digits.is_empty() { "0" } else { digits };

        write!(f, "{whole}.{digits}")
    }
}

impl FromStr for Amount {
    type Err = ClientError;

    /// Parse a plain decimal string such as `"2.5"`, `"10"` or `".75"`.
    fn from_str(s: &str) -> Result<Self> {
        let value = s.trim();
        let invalid = |reason: &str| ClientError::InvalidAmount(format!("{reason}: {value:?}"));

        if value.starts_with('-') {
            return Err(invalid("amount must not be negative"));
        }

        let (whole, fraction) = value.split_once('.').unwrap_or((value, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("not a number"));
        }
        if !whole.bytes().chain(fraction.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid("not a number"));
        }

        let fraction = fraction.trim_end_matches('0');
        let digits = format!("{whole}{fraction}");
        let raw = if digits.is_empty() {
            BigUint::default()
        } else {
            BigUint::parse_bytes(digits.as_bytes(), 10).ok_or_else(|| invalid("not a number"))?
        };

        let decimals = u32::try_from(fraction.len()).map_err(|_| invalid("too many decimals"))?;
        Ok(Self::from_fixed_point(raw, decimals))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ─────────────────────────────────────────────────────────
// Fixed-point conversion
// ─────────────────────────────────────────────────────────

/// Interpret `raw` as a fixed-point integer scaled by `10^decimals`.
pub fn fixed_point_to_decimal(raw: &BigUint, decimals: u32) -> Amount {
    Amount::from_fixed_point(raw.clone(), decimals)
}

/// Convert a human-entered decimal string into the ledger's fixed-point
/// integer. Fails on negative, non-numeric, over-precise or out-of-range input.
pub fn decimal_to_fixed_point(value: &str, decimals: u32) -> Result<BigUint> {
    let amount: Amount = value.parse()?;
    if amount.decimals() > decimals {
        return Err(ClientError::InvalidAmount(format!(
            "{value:?} has more than {decimals} decimal places"
        )));
    }

    let raw = amount.to_fixed_point(decimals);
    if raw.bits() > UINT256_BITS {
        return Err(ClientError::InvalidAmount(format!("{value:?} is too large")));
    }
    Ok(raw)
}

// ─────────────────────────────────────────────────────────
// Hex quantities
// ─────────────────────────────────────────────────────────

/// Parse an unsigned integer written as `0x`-prefixed hex or as decimal digits.
pub fn parse_quantity(value: &str) -> Result<BigUint> {
    let value = value.trim();
    let invalid = || ClientError::Decode(format!("invalid integer quantity {value:?}"));

    let (digits, radix) = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => (hex, 16),
        None => (value, 10),
    };

    let valid = !digits.is_empty()
        && digits.chars().all(|c| {
            if radix == 16 {
                c.is_ascii_hexdigit()
            } else {
                c.is_ascii_digit()
            }
        });
    if !valid {
        return Err(invalid());
    }

    BigUint::parse_bytes(digits.as_bytes(), radix).ok_or_else(invalid)
}

/// Render a JSON-RPC quantity: lowercase hex, no leading zeros, `0x0` for zero.
pub fn to_quantity(value: &BigUint) -> String {
    format!("0x{}", value.to_str_radix(16))
}

// ─────────────────────────────────────────────────────────
// Dates
// ─────────────────────────────────────────────────────────

/// Parse a calendar date (`YYYY-MM-DD`, read as UTC midnight) or an RFC 3339
/// timestamp into whole seconds since the Unix epoch.
pub fn date_to_epoch_seconds(date: &str) -> Result<i64> {
    let date = date.trim();

    if let Some(midnight) = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|day| day.and_hms_opt(0, 0, 0))
    {
        return Ok(Utc.from_utc_datetime(&midnight).timestamp());
    }

    DateTime::parse_from_rfc3339(date)
        .map(|dt| dt.timestamp())
        .map_err(|_| ClientError::InvalidDate(date.to_string()))
}

/// Format a millisecond instant as `YYYY-MM-DD` in the host's local calendar.
pub fn epoch_millis_to_date_label(millis: i64) -> Result<String> {
    date_label_in(millis, &Local)
}

pub(crate) fn date_label_in<Tz>(millis: i64, tz: &Tz) -> Result<String>
where
    Tz: TimeZone,
    Tz::Offset: fmt::Display,
{
    let instant = instant_from_millis(millis)?;
    Ok(instant.with_timezone(tz).format("%Y-%m-%d").to_string())
}

pub(crate) fn instant_from_millis(millis: i64) -> Result<DateTime<Utc>> {
    let nanos = (millis.rem_euclid(1000) * 1_000_000) as u32;
    DateTime::from_timestamp(millis.div_euclid(1000), nanos)
        .ok_or_else(|| ClientError::InvalidDate(format!("{millis}ms is out of range")))
}

fn pow10(exponent: u32) -> BigUint {
    BigUint::from(10u32).pow(exponent)
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn wei(s: &str) -> BigUint {
        BigUint::parse_bytes(s.as_bytes(), 10).unwrap()
    }

    #[test]
    fn ether_to_wei() {
        assert_eq!(
            decimal_to_fixed_point("2.5", ETHER_DECIMALS).unwrap(),
            wei("2500000000000000000")
        );
        assert_eq!(decimal_to_fixed_point("0", ETHER_DECIMALS).unwrap(), wei("0"));
        assert_eq!(
            decimal_to_fixed_point(".000000000000000001", ETHER_DECIMALS).unwrap(),
            wei("1")
        );
    }

    #[test]
    fn decimal_round_trip_is_exact() {
        for value in ["0", "1", "2.5", "0.01", "123456789.123456789012345678"] {
            let raw = decimal_to_fixed_point(value, ETHER_DECIMALS).unwrap();
            let back = fixed_point_to_decimal(&raw, ETHER_DECIMALS);
            assert_eq!(back, value.parse::<Amount>().unwrap(), "{value}");
        }
    }

    #[test]
    fn no_precision_loss_past_two_pow_53() {
        // 9007199254740993 wei cannot be represented exactly as an f64.
        let raw = wei("9007199254740993");
        let amount = fixed_point_to_decimal(&raw, ETHER_DECIMALS);
        assert_eq!(amount.to_string(), "0.009007199254740993");
        assert_eq!(amount.to_fixed_point(ETHER_DECIMALS), raw);
    }

    #[test]
    fn display_trims_trailing_zeros() {
        let one = fixed_point_to_decimal(&wei("1000000000000000000"), ETHER_DECIMALS);
        assert_eq!(one.to_string(), "1.0");
        let cost = fixed_point_to_decimal(&wei("2500000000000000000"), ETHER_DECIMALS);
        assert_eq!(cost.to_string(), "2.5");
        assert_eq!(Amount::zero().to_string(), "0.0");
    }

    #[test]
    fn equality_ignores_scale() {
        let a: Amount = "1.50".parse().unwrap();
        let b = fixed_point_to_decimal(&wei("1500000000000000000"), ETHER_DECIMALS);
        assert_eq!(a, b);
        assert!(b < "1.6".parse::<Amount>().unwrap());
    }

    #[test]
    fn rejects_negative_and_non_numeric() {
        for bad in ["-1", "-0.5", "abc", "", ".", "1.2.3", "1e18", "+1", "0x10", " "] {
            let err = decimal_to_fixed_point(bad, ETHER_DECIMALS).unwrap_err();
            assert!(matches!(err, ClientError::InvalidAmount(_)), "{bad}: {err}");
        }
    }

    #[test]
    fn rejects_excess_precision_and_overflow() {
        assert!(decimal_to_fixed_point("0.0000000000000000001", ETHER_DECIMALS).is_err());
        // Trailing zeros are not significant.
        assert!(decimal_to_fixed_point("1.00000000000000000000", ETHER_DECIMALS).is_ok());
        let huge = "9".repeat(80);
        assert!(decimal_to_fixed_point(&huge, ETHER_DECIMALS).is_err());
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x22b1c8c1227a0000").unwrap(), wei("2500000000000000000"));
        assert_eq!(parse_quantity("42").unwrap(), wei("42"));
        assert!(parse_quantity("0x").is_err());
        assert!(parse_quantity("0xzz").is_err());
        assert!(parse_quantity("-1").is_err());
        assert_eq!(to_quantity(&wei("0")), "0x0");
        assert_eq!(to_quantity(&wei("2500000000000000000")), "0x22b1c8c1227a0000");
    }

    #[test]
    fn calendar_date_to_seconds() {
        assert_eq!(date_to_epoch_seconds("2025-01-01").unwrap(), 1_735_689_600);
        assert_eq!(
            date_to_epoch_seconds("2025-01-01T00:00:01.900Z").unwrap(),
            1_735_689_601
        );
        assert!(matches!(
            date_to_epoch_seconds("next tuesday"),
            Err(ClientError::InvalidDate(_))
        ));
        assert!(date_to_epoch_seconds("2025-02-30").is_err());
    }

    #[test]
    fn date_label_is_zero_padded() {
        assert_eq!(date_label_in(1_735_689_600_000, &Utc).unwrap(), "2025-01-01");
        assert_eq!(date_label_in(1_696_204_800_000, &Utc).unwrap(), "2023-10-02");
        assert!(epoch_millis_to_date_label(i64::MAX).is_err());
    }
}
