//! Numeric literal parsing for command-line values

use crate::{Error, Result};

/// Parse a byte size with an optional binary suffix (K, M, G, T, P, E).
///
/// Suffixes are case-insensitive and use base 1024. A fractional magnitude is
/// allowed (`1.5G`). Negative, empty or overflowing values are rejected.
///
/// Examples:
/// - `"4096"` -> 4096
/// - `"10M"` -> 10485760
/// - `"1.5K"` -> 1536
pub fn parse_byte_size(s: &str) -> Result<u64> {
    let raw = s.trim();
    if raw.is_empty() {
        return Err(Error::Parse("empty size".to_string()));
    }

    let split = raw
        .char_indices()
        .find(|(_, ch)| !(ch.is_ascii_digit() || *ch == '.'))
        .map(|(idx, _)| idx)
        .unwrap_or(raw.len());
    let (num_s, unit_s) = raw.split_at(split);

    if num_s.is_empty() {
        return Err(Error::Parse(format!("invalid size '{}': missing number", s)));
    }

    let shift = match unit_s.to_ascii_uppercase().as_str() {
        "" => 0,
        "K" => 10,
        "M" => 20,
        "G" => 30,
        "T" => 40,
        "P" => 50,
        "E" => 60,
        _ => {
            return Err(Error::Parse(format!(
                "invalid size '{}': unknown unit '{}'",
                s, unit_s
            )))
        }
    };
    let multiplier: u64 = 1 << shift;

    let overflow = || Error::Parse(format!("invalid size '{}': too large", s));

    let bytes = if num_s.contains('.') {
        let value: f64 = num_s
            .parse()
            .map_err(|_| Error::Parse(format!("invalid size '{}': bad number", s)))?;
        let bytes = value * multiplier as f64;
        if bytes > i64::MAX as f64 {
            return Err(overflow());
        }
        bytes as u64
    } else {
        let value: u64 = num_s
            .parse()
            .map_err(|_| Error::Parse(format!("invalid size '{}': bad number", s)))?;
        value.checked_mul(multiplier).ok_or_else(overflow)?
    };

    if bytes > i64::MAX as u64 {
        return Err(overflow());
    }

    Ok(bytes)
}

/// Parse a signed decimal integer, naming the offending value on failure.
pub fn parse_integer(s: &str, name: &str) -> Result<i64> {
    s.trim()
        .parse::<i64>()
        .map_err(|e| Error::Parse(format!("invalid value for {}: '{}' ({})", name, s, e)))
}
